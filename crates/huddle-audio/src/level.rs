/// Volume a stream must exceed to count as speaking.
pub const SPEAKING_THRESHOLD: f32 = 0.01;

pub fn volume_threshold() -> f32 {
    SPEAKING_THRESHOLD
}

/// RMS over 8-bit magnitude bins, normalised to `[0, 1]`.
pub fn rms_volume(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: f32 = bins.iter().map(|&b| (b as f32) * (b as f32)).sum();
    sanitize_volume((sum / bins.len() as f32).sqrt() / 255.0)
}

/// Map NaN/inf to 0 and clamp into `[0, 1]`.
pub fn sanitize_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_bounds() {
        assert_eq!(rms_volume(&[]), 0.0);
        assert_eq!(rms_volume(&[0; 128]), 0.0);
        assert!((rms_volume(&[255; 128]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rms_value() {
        // sqrt((255^2 + 0^2) / 2) / 255 = 1/sqrt(2)
        let v = rms_volume(&[255, 0]);
        assert!((v - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_volume(f32::NAN), 0.0);
        assert_eq!(sanitize_volume(f32::INFINITY), 0.0);
        assert_eq!(sanitize_volume(-0.5), 0.0);
        assert_eq!(sanitize_volume(1.5), 1.0);
        assert_eq!(sanitize_volume(0.25), 0.25);
    }
}
