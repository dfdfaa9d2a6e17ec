use dfscan_models::{FrameScore, ScoreStats, Verdict};

use crate::error::{MediaError, MediaResult};

/// Overall score, verdict and distribution of a score sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub overall_score: f64,
    pub verdict: Verdict,
    pub stats: ScoreStats,
}

/// Mean probability over non-anomalous frames.
///
/// When every frame is anomalous the mean falls back to all frames, so a
/// non-empty sequence always has a defined score.
pub fn aggregate(scores: &[FrameScore], threshold: f64) -> MediaResult<Aggregate> {
    if scores.is_empty() {
        return Err(MediaError::EmptyTimeline);
    }

    let valid: Vec<f64> = scores
        .iter()
        .filter(|s| !s.is_anomalous)
        .map(|s| s.probability)
        .collect();

    let mean_all = mean(scores.iter().map(|s| s.probability));
    let overall_score = if valid.is_empty() {
        mean_all
    } else {
        mean(valid.iter().copied())
    };

    // first occurrence wins on ties
    let mut max_idx = 0;
    let mut min = f64::INFINITY;
    for (i, s) in scores.iter().enumerate() {
        if s.probability > scores[max_idx].probability {
            max_idx = i;
        }
        min = min.min(s.probability);
    }

    let stats = ScoreStats {
        min,
        max: scores[max_idx].probability,
        mean_all,
        valid_frames: valid.len(),
        anomalous_frames: scores.len() - valid.len(),
        max_frame_index: scores[max_idx].frame_index,
        max_frame_time: scores[max_idx].timestamp,
    };

    Ok(Aggregate {
        overall_score,
        verdict: Verdict::from_score(overall_score, threshold),
        stats,
    })
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    values.sum::<f64>() / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::scores_at;

    #[test]
    fn test_mean_excludes_anomalous() {
        let mut scores = scores_at(1.0, &[0.2, 0.4, 1.0]);
        scores[2].is_anomalous = true;

        let agg = aggregate(&scores, 0.5).unwrap();
        assert!((agg.overall_score - 0.3).abs() < 1e-12);
        assert_eq!(agg.verdict, Verdict::Real);
        assert_eq!(agg.stats.valid_frames, 2);
        assert_eq!(agg.stats.anomalous_frames, 1);
        assert_eq!(agg.stats.max, 1.0);
        assert_eq!(agg.stats.max_frame_index, 2);
        assert!((agg.stats.mean_all - 0.5333).abs() < 1e-3);
    }

    #[test]
    fn test_all_anomalous_falls_back_to_all_frames() {
        let mut scores = scores_at(1.0, &[0.6, 0.8]);
        for s in &mut scores {
            s.is_anomalous = true;
        }
        let agg = aggregate(&scores, 0.5).unwrap();
        assert!((agg.overall_score - 0.7).abs() < 1e-12);
        assert_eq!(agg.verdict, Verdict::Fake);
        assert_eq!(agg.stats.valid_frames, 0);
    }

    #[test]
    fn test_verdict_at_threshold() {
        let scores = scores_at(1.0, &[0.5]);
        assert_eq!(aggregate(&scores, 0.5).unwrap().verdict, Verdict::Fake);
    }

    #[test]
    fn test_first_max_wins() {
        let scores = scores_at(2.0, &[0.3, 0.9, 0.9]);
        let agg = aggregate(&scores, 0.5).unwrap();
        assert_eq!(agg.stats.max_frame_index, 1);
        assert_eq!(agg.stats.max_frame_time, 0.5);
        assert_eq!(agg.stats.min, 0.3);
    }

    #[test]
    fn test_empty_is_error() {
        assert!(matches!(aggregate(&[], 0.5), Err(MediaError::EmptyTimeline)));
    }
}
