use dfscan_models::{FrameScore, Segment};

/// Segment detection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentConfig {
    pub threshold: f64,
    /// Minimum `end_time - start_time`, in seconds
    pub min_duration: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_duration: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    Outside,
    Inside { start: usize },
}

/// Find intervals where the smoothed score stays at or above threshold.
///
/// The peak of each interval is located on the raw probabilities (first
/// maximum wins) and reported with its smoothed value. Only the common
/// prefix of `scores` and `smoothed` is considered.
pub fn detect_segments(scores: &[FrameScore], smoothed: &[f64], config: &SegmentConfig) -> Vec<Segment> {
    let len = scores.len().min(smoothed.len());
    let mut segments = Vec::new();
    let mut state = State::Outside;

    for (i, value) in smoothed.iter().enumerate().take(len) {
        let above = *value >= config.threshold;
        state = match (state, above) {
            (State::Outside, true) => State::Inside { start: i },
            (State::Inside { start }, false) => {
                segments.extend(close(scores, smoothed, start, i - 1, config));
                State::Outside
            }
            (state, _) => state,
        };
    }

    if let State::Inside { start } = state {
        segments.extend(close(scores, smoothed, start, len - 1, config));
    }

    segments
}

fn close(
    scores: &[FrameScore],
    smoothed: &[f64],
    start: usize,
    end: usize,
    config: &SegmentConfig,
) -> Option<Segment> {
    let start_time = scores[start].timestamp;
    let end_time = scores[end].timestamp;
    let duration = end_time - start_time;
    if duration < config.min_duration {
        return None;
    }

    let peak = (start..=end).fold(start, |best, i| {
        if scores[i].probability > scores[best].probability {
            i
        } else {
            best
        }
    });

    Some(Segment {
        start_time,
        end_time,
        duration,
        peak_score: smoothed[peak],
        peak_time: scores[peak].timestamp,
        keyframe_index: peak,
        keyframe_path: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{scores_at, smooth};

    fn run(fps: f64, raw: &[f64], window: usize) -> Vec<Segment> {
        let scores = scores_at(fps, raw);
        let smoothed = smooth(raw, window);
        detect_segments(&scores, &smoothed, &SegmentConfig::default())
    }

    #[test]
    fn test_single_plateau() {
        let segments = run(1.0, &[0.1, 0.1, 0.9, 0.9, 0.9, 0.1, 0.1], 5);
        assert_eq!(segments.len(), 1);
        let s = &segments[0];
        assert_eq!((s.start_time, s.end_time, s.duration), (2.0, 4.0, 2.0));
        assert_eq!(s.keyframe_index, 2);
        assert_eq!(s.peak_time, 2.0);
        assert!((s.peak_score - 0.58).abs() < 1e-9);
    }

    #[test]
    fn test_smoothing_trims_segment_at_clip_edges() {
        let segments = run(1.0, &[0.6; 10], 5);
        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].start_time, segments[0].end_time), (2.0, 7.0));
    }

    #[test]
    fn test_short_crossing_is_dropped() {
        // two frames above threshold at 3 fps span 0.33s
        let segments = run(3.0, &[0.1, 0.9, 0.9, 0.1], 1);
        assert!(segments.is_empty());
    }

    #[test]
    fn test_open_segment_closes_at_end() {
        let segments = run(1.0, &[0.1, 0.8, 0.7, 0.95], 1);
        assert_eq!(segments.len(), 1);
        let s = &segments[0];
        assert_eq!((s.start_time, s.end_time), (1.0, 3.0));
        assert_eq!(s.keyframe_index, 3);
        assert_eq!(s.peak_score, 0.95);
    }

    #[test]
    fn test_peak_located_on_raw_scores() {
        let raw = [0.6, 0.7, 0.99, 0.7, 0.6];
        let scores = scores_at(1.0, &raw);
        // peak on smoothed would be index 0
        let smoothed = [0.9, 0.8, 0.7, 0.6, 0.55];
        let segments = detect_segments(&scores, &smoothed, &SegmentConfig::default());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].keyframe_index, 2);
        assert_eq!(segments[0].peak_score, 0.7);
        assert_eq!(segments[0].peak_time, 2.0);
    }

    #[test]
    fn test_multiple_segments_and_idempotence() {
        let raw = [0.9, 0.9, 0.9, 0.1, 0.1, 0.8, 0.8, 0.8, 0.1];
        let scores = scores_at(1.0, &raw);
        let first = detect_segments(&scores, &raw, &SegmentConfig::default());
        let second = detect_segments(&scores, &raw, &SegmentConfig::default());
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        for s in &first {
            assert!(s.duration >= 1.0);
            assert!(s.start_time <= s.peak_time && s.peak_time <= s.end_time);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(detect_segments(&[], &[], &SegmentConfig::default()).is_empty());
    }
}
