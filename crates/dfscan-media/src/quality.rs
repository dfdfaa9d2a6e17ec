//! Frame quality filter.
//!
//! Flags frames that are too dark or too flat for the detector's score to
//! be meaningful (black frames, fades, solid title cards).

use image::RgbImage;

/// Luma statistics of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LumaStats {
    pub mean: f64,
    /// Population standard deviation
    pub stddev: f64,
}

/// Thresholds below which a frame is anomalous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    pub min_mean: f64,
    pub min_stddev: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_mean: 15.0,
            min_stddev: 10.0,
        }
    }
}

impl QualityThresholds {
    /// Anomalous iff `mean < min_mean` or `stddev < min_stddev`.
    pub fn is_anomalous(&self, frame: &RgbImage) -> bool {
        let stats = luma_stats(frame);
        stats.mean < self.min_mean || stats.stddev < self.min_stddev
    }
}

/// Apply the default thresholds.
pub fn is_anomalous(frame: &RgbImage) -> bool {
    QualityThresholds::default().is_anomalous(frame)
}

/// Mean and standard deviation of ITU-R BT.601 luma.
///
/// An empty frame reports zeros.
pub fn luma_stats(frame: &RgbImage) -> LumaStats {
    let n = frame.width() as u64 * frame.height() as u64;
    if n == 0 {
        return LumaStats { mean: 0.0, stddev: 0.0 };
    }

    let n = n as f64;
    let mean = frame.pixels().map(luma).sum::<f64>() / n;
    let variance = frame
        .pixels()
        .map(|p| {
            let d = luma(p) - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    LumaStats {
        mean,
        stddev: variance.sqrt(),
    }
}

fn luma(pixel: &image::Rgb<u8>) -> f64 {
    let [r, g, b] = pixel.0;
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}
