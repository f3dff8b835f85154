//! Offline checks for the level tracker using synthetic tones.

use std::sync::Arc;

use huddle_audio::{AudioLevelTracker, StreamHandle, SyntheticStream, TrackerConfig, VolumeSample};
use huddle_common::{Error, Result};

/// One `--tone` argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneSpec {
    pub id: String,
    pub amplitude: f32,
}

/// Parse `<id>:<amplitude>` with amplitude in `[0, 1]`.
pub fn parse_tone(arg: &str) -> Result<ToneSpec> {
    let (id, amplitude) = arg
        .rsplit_once(':')
        .ok_or_else(|| Error::config(format!("expected <id>:<amplitude>, got {:?}", arg)))?;
    if id.is_empty() {
        return Err(Error::config(format!("missing stream id in {:?}", arg)));
    }
    let amplitude: f32 = amplitude
        .parse()
        .map_err(|e| Error::config(format!("bad amplitude in {:?}: {}", arg, e)))?;
    if !(0.0..=1.0).contains(&amplitude) {
        return Err(Error::config(format!(
            "amplitude {} out of range [0, 1]",
            amplitude
        )));
    }
    Ok(ToneSpec {
        id: id.to_string(),
        amplitude,
    })
}

/// Drive a tracker over `tones` for `ticks` smoothing steps and return the
/// final table, loudest first.
pub fn rank_tones(tones: &[ToneSpec], ticks: usize, config: TrackerConfig) -> Vec<VolumeSample> {
    let tracker = AudioLevelTracker::new(config);
    for tone in tones {
        let stream: StreamHandle = Arc::new(if tone.amplitude > 0.0 {
            SyntheticStream::tone(tone.id.as_str(), tone.amplitude)
        } else {
            SyntheticStream::silent(tone.id.as_str())
        });
        tracker.add_stream(&tone.id, &stream);
    }

    let mut table = Vec::new();
    for _ in 0..ticks.max(1) {
        tracker.sample_frame();
        table = tracker.tick();
    }
    tracker.destroy();

    table.sort_by(|a, b| b.smoothed_volume.total_cmp(&a.smoothed_volume));
    table
}
