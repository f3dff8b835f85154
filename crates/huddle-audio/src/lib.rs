//! Audio level tracking for Huddle.
//!
//! Samples every tracked stream's spectrum, derives an RMS volume, smooths it
//! over the last few ticks, and answers "who is speaking loudest".

#![forbid(unsafe_code)]

pub mod analyser;
pub mod level;
pub mod smoothing;
pub mod source;
pub mod synthetic;
pub mod tracker;

pub use analyser::{AnalyserConfig, AnalysisContext, Analyser};
pub use level::{rms_volume, volume_threshold, SPEAKING_THRESHOLD};
pub use smoothing::VolumeSmoothing;
pub use source::{AudioSource, MediaStream, StreamHandle};
pub use synthetic::{SilentSource, SyntheticStream, ToneSource};
pub use tracker::{AudioLevelTracker, LoudestStream, TrackerConfig, VolumeSample};
