//! Handles to live media owned by the peer-connection layer.
//!
//! The core never copies or owns media; it holds reference-counted handles
//! and reads the most recent audio window when it samples.

use std::fmt;
use std::sync::Arc;

/// Mono PCM view of a live audio track.
pub trait AudioSource: Send + Sync {
    fn sample_rate(&self) -> u32;

    /// Fill `out` with the most recent samples, oldest first.
    ///
    /// Returns how many samples were written; the rest of `out` is left as
    /// silence by the caller.
    fn read_latest(&self, out: &mut [f32]) -> usize;
}

/// A live audio/video stream.
pub trait MediaStream: Send + Sync {
    fn id(&self) -> &str;

    /// The stream's audio track, if it carries one.
    fn audio(&self) -> Option<Arc<dyn AudioSource>>;

    fn has_video(&self) -> bool {
        false
    }
}

pub type StreamHandle = Arc<dyn MediaStream>;

impl fmt::Debug for dyn MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id())
            .field("audio", &self.audio().is_some())
            .field("video", &self.has_video())
            .finish()
    }
}
