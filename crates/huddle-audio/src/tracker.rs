//! Live per-stream volume estimates and loudest-speaker detection.
//!
//! Two cadences run on one sampling task:
//! - frame: raw RMS of every tracked stream (`frame_interval`, ~one display frame)
//! - tick: push the latest raw value into each stream's smoothing history and
//!   rebuild the ranked table (`tick_interval`, 200 ms)
//!
//! The task starts with the first tracked stream and exits once none remain.
//! Hosts without a tokio runtime drive [`AudioLevelTracker::sample_frame`] and
//! [`AudioLevelTracker::tick`] themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::analyser::{AnalyserConfig, AnalysisContext, Analyser};
use crate::level::{rms_volume, SPEAKING_THRESHOLD};
use crate::smoothing::{VolumeSmoothing, DEFAULT_HISTORY_SIZE};
use crate::source::StreamHandle;

pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_TOP_COUNT: usize = 3;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub analyser: AnalyserConfig,
    pub frame_interval: Duration,
    pub tick_interval: Duration,
    pub threshold: f32,
    pub history_size: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            analyser: AnalyserConfig::default(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            tick_interval: DEFAULT_TICK_INTERVAL,
            threshold: SPEAKING_THRESHOLD,
            history_size: DEFAULT_HISTORY_SIZE,
        }
    }
}

/// One row of the ranked volume table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeSample {
    pub stream_id: String,
    pub volume: f32,
    pub smoothed_volume: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoudestStream {
    pub stream_id: String,
    pub volume: f32,
}

struct TrackedStream {
    id: String,
    analyser: Analyser,
    volume: f32,
}

struct TrackerState {
    /// Registration order; ties resolve to the earlier entry.
    streams: Vec<TrackedStream>,
    smoothing: VolumeSmoothing,
    samples: Vec<VolumeSample>,
    loudest_smoothed: Option<LoudestStream>,
    bins: Vec<u8>,
    /// A sampling task owns these streams. Only flipped under this lock.
    sampling: bool,
}

impl TrackerState {
    fn position(&self, id: &str) -> Option<usize> {
        self.streams.iter().position(|s| s.id == id)
    }

    /// Raw RMS pass. Returns whether anything is still tracked.
    fn sample_frame(&mut self) -> bool {
        for stream in &mut self.streams {
            stream.analyser.byte_frequency_data(&mut self.bins);
            stream.volume = rms_volume(&self.bins);
        }
        !self.streams.is_empty()
    }

    fn tick(&mut self, threshold: f32) -> Vec<VolumeSample> {
        let mut samples = Vec::with_capacity(self.streams.len());
        let mut loudest: Option<LoudestStream> = None;

        for stream in &self.streams {
            self.smoothing.add_sample(&stream.id, stream.volume);
            let smoothed_volume = self.smoothing.get_smoothed_volume(&stream.id);

            let current = loudest.as_ref().map_or(0.0, |l| l.volume);
            if smoothed_volume > current && smoothed_volume > threshold {
                loudest = Some(LoudestStream {
                    stream_id: stream.id.clone(),
                    volume: smoothed_volume,
                });
            }

            samples.push(VolumeSample {
                stream_id: stream.id.clone(),
                volume: stream.volume,
                smoothed_volume,
            });
        }

        self.samples = samples.clone();
        self.loudest_smoothed = loudest;
        samples
    }

    fn clear(&mut self) {
        self.streams.clear();
        self.smoothing.clear();
        self.samples.clear();
        self.loudest_smoothed = None;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct AudioLevelTracker {
    config: TrackerConfig,
    /// `None` when analysis is unavailable; the tracker is then a no-op.
    context: Option<AnalysisContext>,
    state: Arc<Mutex<TrackerState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl Default for AudioLevelTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl AudioLevelTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let context = match AnalysisContext::new(config.analyser) {
            Ok(ctx) => Some(ctx),
            Err(err) => {
                warn!("audio analysis unavailable, level tracking disabled: {}", err);
                None
            }
        };

        let state = TrackerState {
            streams: Vec::new(),
            smoothing: VolumeSmoothing::new(config.history_size),
            samples: Vec::new(),
            loudest_smoothed: None,
            bins: vec![0; config.analyser.frequency_bin_count()],
            sampling: false,
        };

        Self {
            config,
            context,
            state: Arc::new(Mutex::new(state)),
            worker: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Whether volumes can ever be non-zero.
    pub fn is_available(&self) -> bool {
        self.context.is_some() && !self.destroyed.load(Ordering::SeqCst)
    }

    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    /// Start tracking `stream` under `id`, replacing any previous binding.
    ///
    /// Streams without an audio track are ignored.
    pub fn add_stream(&self, id: &str, stream: &StreamHandle) {
        if self.destroyed.load(Ordering::SeqCst) {
            debug!("ignoring stream {} on destroyed tracker", id);
            return;
        }
        let Some(context) = self.context.as_ref() else {
            return;
        };
        let Some(audio) = stream.audio() else {
            debug!("stream {} has no audio track, not tracking", id);
            return;
        };

        let analyser = context.create_analyser(audio);
        // Lock order: worker, then state.
        let mut worker = lock(&self.worker);
        let needs_worker = {
            let mut state = lock(&self.state);
            match state.position(id) {
                Some(index) => {
                    let entry = &mut state.streams[index];
                    entry.analyser = analyser;
                    entry.volume = 0.0;
                    debug!("rebound audio analysis for {}", id);
                }
                None => {
                    state.streams.push(TrackedStream {
                        id: id.to_string(),
                        analyser,
                        volume: 0.0,
                    });
                    info!("tracking audio for {}", id);
                }
            }
            !std::mem::replace(&mut state.sampling, true)
        };

        if needs_worker && !self.spawn_sampling(&mut worker) {
            lock(&self.state).sampling = false;
        }
    }

    pub fn remove_stream(&self, id: &str) {
        let mut worker = lock(&self.worker);
        let now_empty = {
            let mut state = lock(&self.state);
            if let Some(index) = state.position(id) {
                state.streams.remove(index);
                info!("stopped tracking audio for {}", id);
            }
            state.smoothing.remove(id);
            state.samples.retain(|s| s.stream_id != id);
            if state
                .loudest_smoothed
                .as_ref()
                .is_some_and(|l| l.stream_id == id)
            {
                state.loudest_smoothed = None;
            }
            let empty = state.streams.is_empty();
            if empty {
                state.sampling = false;
            }
            empty
        };

        if now_empty {
            abort_sampling(&mut worker);
        }
    }

    /// Latest instantaneous volume, `0` for unknown streams.
    pub fn get_volume(&self, id: &str) -> f32 {
        let state = lock(&self.state);
        state
            .streams
            .iter()
            .find(|s| s.id == id)
            .map_or(0.0, |s| s.volume)
    }

    pub fn get_all_volumes(&self) -> Vec<(String, f32)> {
        lock(&self.state)
            .streams
            .iter()
            .map(|s| (s.id.clone(), s.volume))
            .collect()
    }

    /// Stream with the highest instantaneous volume, if anyone is speaking.
    pub fn get_loudest_stream(&self) -> Option<LoudestStream> {
        let state = lock(&self.state);
        let mut loudest: Option<&TrackedStream> = None;
        for stream in &state.streams {
            if stream.volume > loudest.map_or(0.0, |l| l.volume) {
                loudest = Some(stream);
            }
        }

        loudest
            .filter(|l| l.volume > self.config.threshold)
            .map(|l| LoudestStream {
                stream_id: l.id.clone(),
                volume: l.volume,
            })
    }

    /// Loudest stream by smoothed volume as of the last tick.
    pub fn loudest_smoothed(&self) -> Option<LoudestStream> {
        lock(&self.state).loudest_smoothed.clone()
    }

    /// Ranked table from the last tick, in registration order.
    pub fn samples(&self) -> Vec<VolumeSample> {
        lock(&self.state).samples.clone()
    }

    pub fn sample_for(&self, id: &str) -> Option<VolumeSample> {
        lock(&self.state)
            .samples
            .iter()
            .find(|s| s.stream_id == id)
            .cloned()
    }

    /// Up to `count` speaking streams, loudest first by smoothed volume.
    pub fn top_loudest(&self, count: usize) -> Vec<VolumeSample> {
        let mut speaking: Vec<VolumeSample> = lock(&self.state)
            .samples
            .iter()
            .filter(|s| s.smoothed_volume > self.config.threshold)
            .cloned()
            .collect();
        speaking.sort_by(|a, b| b.smoothed_volume.total_cmp(&a.smoothed_volume));
        speaking.truncate(count);
        speaking
    }

    /// One raw RMS pass over every tracked stream.
    pub fn sample_frame(&self) {
        lock(&self.state).sample_frame();
    }

    /// One smoothing step; returns the refreshed table.
    pub fn tick(&self) -> Vec<VolumeSample> {
        lock(&self.state).tick(self.config.threshold)
    }

    pub fn tracked_count(&self) -> usize {
        lock(&self.state).streams.len()
    }

    pub fn is_analyzing(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Release every stream and stop sampling. Safe to call repeatedly.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut worker = lock(&self.worker);
        abort_sampling(&mut worker);
        let mut state = lock(&self.state);
        state.clear();
        state.sampling = false;
        debug!("audio level tracker destroyed");
    }

    /// Start a sampling task. Caller holds the worker lock and has claimed
    /// `sampling` under the state lock.
    fn spawn_sampling(&self, worker: &mut Option<JoinHandle<()>>) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime, audio sampling must be driven manually");
            return false;
        };

        abort_sampling(worker);
        let state = self.state.clone();
        let frame_interval = self.config.frame_interval;
        let tick_interval = self.config.tick_interval;
        let threshold = self.config.threshold;
        *worker = Some(runtime.spawn(run_sampling(
            state,
            frame_interval,
            tick_interval,
            threshold,
        )));
        debug!("audio sampling started");
        true
    }
}

impl Drop for AudioLevelTracker {
    fn drop(&mut self) {
        abort_sampling(&mut lock(&self.worker));
    }
}

fn abort_sampling(worker: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = worker.take() {
        handle.abort();
        debug!("audio sampling stopped");
    }
}

async fn run_sampling(
    state: Arc<Mutex<TrackerState>>,
    frame_interval: Duration,
    tick_interval: Duration,
    threshold: f32,
) {
    let mut frames = time::interval(frame_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = time::interval(tick_interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = frames.tick() => {
                let mut state = lock(&state);
                if !state.sample_frame() {
                    // Released under the state lock so a concurrent add
                    // sees it and starts a fresh task.
                    state.sampling = false;
                    break;
                }
            }
            _ = ticks.tick() => {
                lock(&state).tick(threshold);
            }
        }
    }
    debug!("audio sampling idle, exiting");
}
