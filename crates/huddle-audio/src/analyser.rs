//! Frequency-domain analyser producing 8-bit magnitude bins.
//!
//! Follows the Web Audio `AnalyserNode` model: Blackman-windowed FFT over the
//! latest `fft_size` samples, magnitudes divided by `fft_size`, exponential
//! smoothing across calls, then a dB scale mapped linearly onto `0..=255`
//! between `min_decibels` and `max_decibels`.

use std::f32::consts::TAU;
use std::sync::Arc;

use huddle_common::{Error, Result};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::source::AudioSource;

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32_768;

#[derive(Debug, Clone, Copy)]
pub struct AnalyserConfig {
    pub fft_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing_time_constant: 0.3,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AnalyserConfig {
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

/// Shared FFT plan and window; the stand-in for an audio context.
#[derive(Clone)]
pub struct AnalysisContext {
    config: AnalyserConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Arc<[f32]>,
}

impl AnalysisContext {
    pub fn new(config: AnalyserConfig) -> Result<Self> {
        let n = config.fft_size;
        if !n.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&n) {
            return Err(Error::capability(format!("unsupported fft size {n}")));
        }
        if !(0.0..=1.0).contains(&config.smoothing_time_constant) {
            return Err(Error::config(format!(
                "smoothing time constant {} outside [0, 1]",
                config.smoothing_time_constant
            )));
        }
        if config.min_decibels >= config.max_decibels {
            return Err(Error::config("min_decibels must be below max_decibels"));
        }

        let fft = FftPlanner::<f32>::new().plan_fft_forward(n);
        let window = blackman_window(n);
        Ok(Self {
            config,
            fft,
            window: window.into(),
        })
    }

    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    pub fn create_analyser(&self, source: Arc<dyn AudioSource>) -> Analyser {
        let n = self.config.fft_size;
        Analyser {
            config: self.config,
            fft: self.fft.clone(),
            window: self.window.clone(),
            source,
            time_domain: vec![0.0; n],
            spectrum: vec![Complex::new(0.0, 0.0); n],
            smoothed: vec![0.0; self.config.frequency_bin_count()],
        }
    }
}

fn blackman_window(n: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            A0 - A1 * (TAU * x).cos() + A2 * (2.0 * TAU * x).cos()
        })
        .collect()
}

/// Analyser bound to one audio source.
pub struct Analyser {
    config: AnalyserConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Arc<[f32]>,
    source: Arc<dyn AudioSource>,
    time_domain: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl Analyser {
    pub fn frequency_bin_count(&self) -> usize {
        self.smoothed.len()
    }

    /// Read the source and write one byte per frequency bin into `out`.
    ///
    /// `out` shorter than the bin count receives the lowest bins only.
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) {
        let written = self.source.read_latest(&mut self.time_domain);
        let filled = written.min(self.time_domain.len());
        self.time_domain[filled..].fill(0.0);

        for ((slot, sample), w) in self
            .spectrum
            .iter_mut()
            .zip(&self.time_domain)
            .zip(self.window.iter())
        {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.spectrum);

        let n = self.config.fft_size as f32;
        let tau = self.config.smoothing_time_constant;
        let min_db = self.config.min_decibels;
        let scale = 255.0 / (self.config.max_decibels - min_db);

        for (k, prev) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.spectrum[k].norm() / n;
            let mut value = tau * *prev + (1.0 - tau) * magnitude;
            if !value.is_finite() {
                value = 0.0;
            }
            *prev = value;

            if let Some(byte) = out.get_mut(k) {
                let db = 20.0 * value.log10();
                // NaN and -inf both land on 0.
                *byte = (scale * (db - min_db)).floor().clamp(0.0, 255.0) as u8;
            }
        }
    }
}
