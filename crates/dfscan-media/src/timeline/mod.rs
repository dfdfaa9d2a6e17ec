//! Score timeline analysis: aggregation, smoothing and segment detection.
//!
//! Everything here is pure and operates on the ordered [`FrameScore`]
//! sequence produced by the frame loop.
//!
//! [`FrameScore`]: dfscan_models::FrameScore

mod aggregate;
mod segments;
mod smoothing;

pub use aggregate::{aggregate, Aggregate};
pub use segments::{detect_segments, SegmentConfig};
pub use smoothing::{smooth, DEFAULT_SMOOTHING_WINDOW};

use dfscan_models::{AnalysisResult, FrameScore};

use crate::error::MediaResult;

/// Parameters for turning frame scores into an [`AnalysisResult`].
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    pub model: String,
    pub fps: f64,
    pub threshold: f64,
    pub smoothing_window: usize,
    pub min_segment_duration: f64,
}

/// Build the analysis result for a non-empty score sequence.
///
/// Segment keyframe paths are left unset.
pub fn build_result(frame_scores: Vec<FrameScore>, config: &TimelineConfig) -> MediaResult<AnalysisResult> {
    let summary = aggregate(&frame_scores, config.threshold)?;

    let probabilities: Vec<f64> = frame_scores.iter().map(|s| s.probability).collect();
    let smoothed = smooth(&probabilities, config.smoothing_window);

    let segments = detect_segments(
        &frame_scores,
        &smoothed,
        &SegmentConfig {
            threshold: config.threshold,
            min_duration: config.min_segment_duration,
        },
    );

    Ok(AnalysisResult {
        model: config.model.clone(),
        overall_score: summary.overall_score,
        average_score: summary.overall_score,
        confidence: summary.overall_score,
        threshold: config.threshold,
        fps: config.fps,
        total_frames: frame_scores.len(),
        verdict: summary.verdict,
        segments,
        frame_scores,
        smoothed_scores: smoothed,
        stats: summary.stats,
    })
}

#[cfg(test)]
pub(crate) fn scores_at(fps: f64, probabilities: &[f64]) -> Vec<FrameScore> {
    probabilities
        .iter()
        .enumerate()
        .map(|(i, p)| FrameScore {
            frame_index: i,
            timestamp: i as f64 / fps,
            probability: *p,
            is_anomalous: false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use dfscan_models::Verdict;

    fn config() -> TimelineConfig {
        TimelineConfig {
            model: "xception".into(),
            fps: 1.0,
            threshold: 0.5,
            smoothing_window: 5,
            min_segment_duration: 1.0,
        }
    }

    #[test]
    fn test_build_result_single_segment() {
        let scores = scores_at(1.0, &[0.1, 0.1, 0.9, 0.9, 0.9, 0.1, 0.1]);
        let result = build_result(scores, &config()).unwrap();

        assert_eq!(result.total_frames, 7);
        assert_eq!(result.smoothed_scores.len(), result.frame_scores.len());
        assert_eq!(result.segments.len(), 1);

        let segment = &result.segments[0];
        assert_eq!(segment.start_time, 2.0);
        assert_eq!(segment.end_time, 4.0);
        assert_eq!(segment.duration, 2.0);
        assert!(segment.keyframe_path.is_none());

        assert!((result.overall_score - 0.443).abs() < 1e-3);
        assert_eq!(result.verdict, Verdict::Real);
        assert_eq!(result.confidence, result.overall_score);
    }

    #[test]
    fn test_build_result_empty() {
        assert!(matches!(
            build_result(Vec::new(), &config()),
            Err(MediaError::EmptyTimeline)
        ));
    }
}
