//! Generated media for diagnostics and tests.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::source::{AudioSource, MediaStream};

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Continuous sine tone whose amplitude can be changed while it is tracked.
#[derive(Debug)]
pub struct ToneSource {
    frequency_hz: f32,
    sample_rate: u32,
    amplitude_bits: AtomicU32,
}

impl ToneSource {
    pub fn new(frequency_hz: f32, amplitude: f32) -> Self {
        Self {
            frequency_hz,
            sample_rate: DEFAULT_SAMPLE_RATE,
            amplitude_bits: AtomicU32::new(amplitude.clamp(0.0, 1.0).to_bits()),
        }
    }

    pub fn amplitude(&self) -> f32 {
        f32::from_bits(self.amplitude_bits.load(Ordering::Relaxed))
    }

    pub fn set_amplitude(&self, amplitude: f32) {
        self.amplitude_bits
            .store(amplitude.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

impl AudioSource for ToneSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_latest(&self, out: &mut [f32]) -> usize {
        let amplitude = self.amplitude();
        let step = TAU * self.frequency_hz / self.sample_rate as f32;
        for (n, sample) in out.iter_mut().enumerate() {
            *sample = amplitude * (step * n as f32).sin();
        }
        out.len()
    }
}

#[derive(Debug, Default)]
pub struct SilentSource;

impl AudioSource for SilentSource {
    fn sample_rate(&self) -> u32 {
        DEFAULT_SAMPLE_RATE
    }

    fn read_latest(&self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        out.len()
    }
}

/// Stream wrapper around an optional synthetic audio track.
pub struct SyntheticStream {
    id: String,
    audio: Option<Arc<dyn AudioSource>>,
    video: bool,
}

impl SyntheticStream {
    pub fn new(id: impl Into<String>, audio: Option<Arc<dyn AudioSource>>) -> Self {
        Self {
            id: id.into(),
            audio,
            video: false,
        }
    }

    pub fn tone(id: impl Into<String>, amplitude: f32) -> Self {
        Self::new(id, Some(Arc::new(ToneSource::new(1_500.0, amplitude))))
    }

    pub fn silent(id: impl Into<String>) -> Self {
        Self::new(id, Some(Arc::new(SilentSource)))
    }

    /// Video-only stream (no audio track).
    pub fn video_only(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            audio: None,
            video: true,
        }
    }
}

impl MediaStream for SyntheticStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn audio(&self) -> Option<Arc<dyn AudioSource>> {
        self.audio.clone()
    }

    fn has_video(&self) -> bool {
        self.video
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_is_bounded_by_amplitude() {
        let tone = ToneSource::new(1_500.0, 0.25);
        let mut buf = [0.0f32; 256];
        assert_eq!(tone.read_latest(&mut buf), 256);
        assert!(buf.iter().all(|s| s.abs() <= 0.25 + f32::EPSILON));
        assert!(buf.iter().any(|s| s.abs() > 0.2));
    }

    #[test]
    fn test_amplitude_is_clamped_and_adjustable() {
        let tone = ToneSource::new(440.0, 3.0);
        assert_eq!(tone.amplitude(), 1.0);
        tone.set_amplitude(0.1);
        assert!((tone.amplitude() - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_video_only_stream_has_no_audio() {
        let stream = SyntheticStream::video_only("cam");
        assert!(stream.audio().is_none());
        assert!(stream.has_video());
        assert_eq!(stream.id(), "cam");
    }
}
