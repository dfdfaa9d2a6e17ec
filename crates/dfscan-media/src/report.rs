//! Timeline artifacts written next to a finished job.
//!
//! - `scores.csv`: one row per sampled frame
//! - `segments.srt`: one `SUSPECT` cue per segment
//! - `timeline.json`: the full analysis result

use std::fmt::Write as _;
use std::path::Path;

use dfscan_models::{AnalysisResult, Segment};
use tracing::{info, warn};

use crate::error::MediaResult;
use crate::fs_utils::{write_atomic, write_json_atomic};

pub const SCORES_FILE: &str = "scores.csv";
pub const SEGMENTS_FILE: &str = "segments.srt";
pub const TIMELINE_FILE: &str = "timeline.json";

/// Render per-frame scores as CSV.
pub fn scores_csv(result: &AnalysisResult) -> String {
    let mut out = String::from("frame_idx,timestamp,prob_fake,smoothed,is_anomalous\n");
    for (score, smoothed) in result.frame_scores.iter().zip(&result.smoothed_scores) {
        let _ = writeln!(
            out,
            "{},{:.3},{:.6},{:.6},{}",
            score.frame_index, score.timestamp, score.probability, smoothed, score.is_anomalous
        );
    }
    out
}

/// Render segments as SRT subtitles.
pub fn segments_srt(segments: &[Segment]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        let _ = write!(
            out,
            "{}\n{} --> {}\nSUSPECT\n\n",
            i + 1,
            srt_timestamp(segment.start_time),
            srt_timestamp(segment.end_time)
        );
    }
    out
}

/// Format seconds as `HH:MM:SS,mmm`.
pub fn srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let (h, rem) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (m, rem) = (rem / 60_000, rem % 60_000);
    let (s, ms) = (rem / 1000, rem % 1000);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// Write all artifacts into `job_dir`.
pub fn write_artifacts(job_dir: &Path, result: &AnalysisResult) -> MediaResult<()> {
    write_atomic(job_dir.join(SCORES_FILE), scores_csv(result).as_bytes())?;
    write_atomic(job_dir.join(SEGMENTS_FILE), segments_srt(&result.segments).as_bytes())?;
    write_json_atomic(job_dir.join(TIMELINE_FILE), result)?;
    info!(
        dir = %job_dir.display(),
        frames = result.total_frames,
        segments = result.segments.len(),
        "Timeline artifacts written"
    );
    Ok(())
}

/// Like [`write_artifacts`], logging instead of failing.
pub fn write_artifacts_lossy(job_dir: &Path, result: &AnalysisResult) -> bool {
    match write_artifacts(job_dir, result) {
        Ok(()) => true,
        Err(e) => {
            warn!(dir = %job_dir.display(), error = %e, "Failed to write timeline artifacts");
            false
        }
    }
}
