//! Recency-weighted moving average over the last few volume samples.
//!
//! The i-th retained sample (oldest first) carries weight `i + 1`, so the
//! newest sample dominates without a single spike flipping the loudest
//! speaker.

use std::collections::{HashMap, VecDeque};

use crate::level::sanitize_volume;

pub const DEFAULT_HISTORY_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct VolumeSmoothing {
    history: HashMap<String, VecDeque<f32>>,
    history_size: usize,
}

impl Default for VolumeSmoothing {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl VolumeSmoothing {
    pub fn new(history_size: usize) -> Self {
        Self {
            history: HashMap::new(),
            history_size: history_size.max(1),
        }
    }

    pub fn add_sample(&mut self, stream_id: &str, volume: f32) {
        let capacity = self.history_size + 1;
        let samples = self
            .history
            .entry(stream_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        samples.push_back(sanitize_volume(volume));

        while samples.len() > self.history_size {
            samples.pop_front();
        }
    }

    pub fn get_smoothed_volume(&self, stream_id: &str) -> f32 {
        let Some(samples) = self.history.get(stream_id) else {
            return 0.0;
        };
        if samples.is_empty() {
            return 0.0;
        }

        let (weighted_sum, total_weight) = samples.iter().enumerate().fold(
            (0.0f32, 0.0f32),
            |(sum, total), (index, &sample)| {
                let weight = (index + 1) as f32;
                (sum + sample * weight, total + weight)
            },
        );
        sanitize_volume(weighted_sum / total_weight)
    }

    pub fn len_for(&self, stream_id: &str) -> usize {
        self.history.get(stream_id).map_or(0, VecDeque::len)
    }

    pub fn remove(&mut self, stream_id: &str) {
        self.history.remove(stream_id);
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_average() {
        let mut smoothing = VolumeSmoothing::default();
        for v in [0.1, 0.2, 0.3] {
            smoothing.add_sample("a", v);
        }
        let expected = (0.1 * 1.0 + 0.2 * 2.0 + 0.3 * 3.0) / 6.0;
        assert!((smoothing.get_smoothed_volume("a") - expected).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_stream_is_zero() {
        let smoothing = VolumeSmoothing::default();
        assert_eq!(smoothing.get_smoothed_volume("missing"), 0.0);
    }

    #[test]
    fn test_history_is_bounded_fifo() {
        let mut smoothing = VolumeSmoothing::default();
        for v in [0.9, 0.9, 0.1, 0.1, 0.1, 0.1, 0.1] {
            smoothing.add_sample("a", v);
        }
        assert_eq!(smoothing.len_for("a"), 5);
        // The two 0.9 samples were evicted.
        assert!((smoothing.get_smoothed_volume("a") - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_nan_samples_count_as_silence() {
        let mut smoothing = VolumeSmoothing::default();
        smoothing.add_sample("a", f32::NAN);
        smoothing.add_sample("a", 0.3);
        // (0*1 + 0.3*2) / 3
        assert!((smoothing.get_smoothed_volume("a") - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut smoothing = VolumeSmoothing::default();
        smoothing.add_sample("a", 0.5);
        smoothing.add_sample("b", 0.5);
        smoothing.remove("a");
        assert_eq!(smoothing.get_smoothed_volume("a"), 0.0);
        assert!(smoothing.get_smoothed_volume("b") > 0.0);
        smoothing.clear();
        assert_eq!(smoothing.get_smoothed_volume("b"), 0.0);
    }
}
