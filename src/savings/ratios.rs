//! Per-MIME WebP conversion ratios (`§4.7`): empirical estimates of how
//! much smaller a converted file tends to be, expressed as `estimated /
//! original`. Not measured against a real encoder — the crate performs
//! no actual transcoding when estimating savings.

/// `estimated_webp_bytes = original_bytes * ratio`.
const PNG_RATIO: f64 = 0.66;
const JPEG_RATIO: f64 = 0.75;
const GIF_RATIO: f64 = 0.55;
const UNKNOWN_RATIO: f64 = 0.80;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatedSavings {
    pub original_bytes: u64,
    pub estimated_webp_bytes: u64,
    pub savings_percent: f64,
}

fn ratio_for_mime(mime_type: &str) -> f64 {
    match mime_type {
        "image/png" => PNG_RATIO,
        "image/jpeg" | "image/jpg" => JPEG_RATIO,
        "image/gif" => GIF_RATIO,
        _ => UNKNOWN_RATIO,
    }
}

/// Estimate WebP savings for one image. The result is clamped so the
/// estimated size never exceeds the original and never goes negative.
#[must_use]
pub fn estimate(mime_type: &str, original_bytes: u64) -> EstimatedSavings {
    let ratio = ratio_for_mime(mime_type).clamp(0.0, 1.0);
    let estimated = (original_bytes as f64 * ratio).round().clamp(0.0, original_bytes as f64) as u64;
    let savings_percent = if original_bytes == 0 {
        0.0
    } else {
        (1.0 - estimated as f64 / original_bytes as f64) * 100.0
    };
    EstimatedSavings { original_bytes, estimated_webp_bytes: estimated, savings_percent }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_matches_the_documented_example() {
        // §8 scenario 1: 100KB PNG -> ~34% savings at ratio 0.66.
        let savings = estimate("image/png", 102_400);
        assert_eq!(savings.estimated_webp_bytes, (102_400.0_f64 * 0.66).round() as u64);
        assert!((savings.savings_percent - 34.0).abs() < 1.0);
    }

    #[test]
    fn unknown_mime_falls_back_to_default_ratio() {
        let savings = estimate("image/tiff", 1_000);
        assert_eq!(savings.estimated_webp_bytes, 800);
    }

    #[test]
    fn never_exceeds_original_size() {
        let savings = estimate("image/jpeg", 0);
        assert_eq!(savings.estimated_webp_bytes, 0);
        assert_eq!(savings.savings_percent, 0.0);
    }
}
