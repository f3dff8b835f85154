//! One running call: the peer directory, the level tracker, and the timers
//! that keep them in step.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use huddle_audio::{AudioLevelTracker, LoudestStream, StreamHandle, TrackerConfig};
use huddle_common::{env_duration_ms, env_parse};
use huddle_groups::{Group, GroupStats, PeerGroupRegistry, PeerRecord, DEFAULT_STALE_AFTER};
use huddle_net::{Detection, NetworkLocator};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub stale_after: Duration,
    pub sweep_interval: Duration,
    pub publish_interval: Duration,
    pub tracker: TrackerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            publish_interval: DEFAULT_PUBLISH_INTERVAL,
            tracker: TrackerConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stale_after: env_duration_ms("HUDDLE_STALE_AFTER_MS", defaults.stale_after),
            sweep_interval: env_duration_ms("HUDDLE_SWEEP_INTERVAL_MS", defaults.sweep_interval),
            publish_interval: env_duration_ms(
                "HUDDLE_PUBLISH_INTERVAL_MS",
                defaults.publish_interval,
            ),
            tracker: TrackerConfig {
                threshold: env_parse("HUDDLE_SPEAKING_THRESHOLD", defaults.tracker.threshold),
                history_size: env_parse("HUDDLE_VOLUME_HISTORY", defaults.tracker.history_size),
                ..defaults.tracker
            },
        }
    }
}

/// Peer-connection lifecycle notifications.
#[derive(Clone)]
pub enum CallEvent {
    /// A call was answered or placed and the remote media arrived.
    StreamReceived {
        peer_id: String,
        stream: StreamHandle,
        network_identity: String,
    },
    CallClosed {
        peer_id: String,
    },
    CallError {
        peer_id: String,
        reason: String,
    },
    PeerLeft {
        peer_id: String,
    },
}

impl fmt::Debug for CallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallEvent::StreamReceived {
                peer_id,
                stream,
                network_identity,
            } => f
                .debug_struct("StreamReceived")
                .field("peer_id", peer_id)
                .field("stream", &stream.id())
                .field("network_identity", network_identity)
                .finish(),
            CallEvent::CallClosed { peer_id } => {
                f.debug_struct("CallClosed").field("peer_id", peer_id).finish()
            }
            CallEvent::CallError { peer_id, reason } => f
                .debug_struct("CallError")
                .field("peer_id", peer_id)
                .field("reason", reason)
                .finish(),
            CallEvent::PeerLeft { peer_id } => {
                f.debug_struct("PeerLeft").field("peer_id", peer_id).finish()
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct Session {
    config: SessionConfig,
    registry: Arc<RwLock<PeerGroupRegistry>>,
    tracker: Arc<AudioLevelTracker>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let registry = PeerGroupRegistry::with_stale_after(config.stale_after);
        let tracker = AudioLevelTracker::new(config.tracker.clone());
        Self {
            config,
            registry: Arc::new(RwLock::new(registry)),
            tracker: Arc::new(tracker),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<RwLock<PeerGroupRegistry>> {
        Arc::clone(&self.registry)
    }

    pub fn tracker(&self) -> &AudioLevelTracker {
        &self.tracker
    }

    /// Detect the local network and record it as the local group.
    pub async fn detect_network(&self, locator: &NetworkLocator) -> Detection {
        let detection = locator.detect_detailed().await;
        self.registry
            .write()
            .await
            .set_local_network_identity(detection.identity.clone());
        detection
    }

    pub async fn handle_event(&self, event: CallEvent) {
        debug!("call event: {:?}", event);
        match event {
            CallEvent::StreamReceived {
                peer_id,
                stream,
                network_identity,
            } => {
                self.tracker.add_stream(&peer_id, &stream);
                let record = PeerRecord::new(peer_id, stream, network_identity);
                self.registry.write().await.add_peer(record);
            }
            CallEvent::CallError { peer_id, reason } => {
                warn!("call with {} failed: {}", peer_id, reason);
                self.drop_peer(&peer_id).await;
            }
            CallEvent::CallClosed { peer_id } | CallEvent::PeerLeft { peer_id } => {
                self.drop_peer(&peer_id).await;
            }
        }
    }

    async fn drop_peer(&self, peer_id: &str) {
        self.tracker.remove_stream(peer_id);
        if self.registry.write().await.remove_peer(peer_id).is_some() {
            info!("peer {} left", peer_id);
        }
    }

    /// Evict stale peers from the directory and the tracker.
    pub async fn sweep(&self) -> Vec<String> {
        sweep_stale(&self.registry, &self.tracker).await
    }

    /// Push the tracker's latest smoothed levels into the directory.
    pub async fn publish_levels(&self) {
        publish_levels(&self.registry, &self.tracker).await;
    }

    /// Start the staleness sweep and the level publisher.
    ///
    /// Calling again while the timers are running is a no-op.
    pub fn spawn_timers(&self) {
        let mut tasks = lock(&self.tasks);
        if !tasks.is_empty() {
            return;
        }

        let registry = Arc::clone(&self.registry);
        let tracker = Arc::clone(&self.tracker);
        let period = self.config.sweep_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                sweep_stale(&registry, &tracker).await;
            }
        }));

        let registry = Arc::clone(&self.registry);
        let tracker = Arc::clone(&self.tracker);
        let period = self.config.publish_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                publish_levels(&registry, &tracker).await;
            }
        }));

        debug!(
            "session timers started (sweep {:?}, publish {:?})",
            self.config.sweep_interval, self.config.publish_interval
        );
    }

    pub fn timers_running(&self) -> bool {
        lock(&self.tasks).iter().any(|task| !task.is_finished())
    }

    /// Stop the timers and release all audio analysis.
    pub fn shutdown(&self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        self.tracker.destroy();
        info!("session shut down");
    }

    pub async fn groups(&self) -> Vec<Group> {
        self.registry.read().await.get_groups()
    }

    pub async fn stats(&self) -> GroupStats {
        self.registry.read().await.get_group_stats()
    }

    pub async fn loudest_peer(&self) -> Option<PeerRecord> {
        self.registry.read().await.get_overall_loudest_peer().cloned()
    }

    /// Loudest smoothed stream, if anyone is above the speaking threshold.
    pub fn loudest_speaker(&self) -> Option<LoudestStream> {
        self.tracker.loudest_smoothed()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }
}

async fn sweep_stale(
    registry: &RwLock<PeerGroupRegistry>,
    tracker: &AudioLevelTracker,
) -> Vec<String> {
    let removed = registry.write().await.cleanup_stale_peers();
    for id in &removed {
        tracker.remove_stream(id);
    }
    removed
}

async fn publish_levels(registry: &RwLock<PeerGroupRegistry>, tracker: &AudioLevelTracker) {
    let samples = tracker.samples();
    if samples.is_empty() {
        return;
    }
    let mut registry = registry.write().await;
    for sample in samples {
        registry.update_audio_level(&sample.stream_id, sample.smoothed_volume);
    }
}
