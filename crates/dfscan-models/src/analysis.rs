//! Frame scores, suspicious segments and analysis results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Score assigned to one sampled frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameScore {
    /// 0-based index in the sampled sequence
    pub frame_index: usize,
    /// Seconds from the start of the video
    pub timestamp: f64,
    /// Manipulation probability in `[0, 1]`
    pub probability: f64,
    /// Frame failed the quality filter (too dark or too flat)
    pub is_anomalous: bool,
}

/// A contiguous interval whose smoothed score stayed above threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    /// Smoothed score at the peak frame
    pub peak_score: f64,
    pub peak_time: f64,
    /// Index of the peak frame in the sampled sequence
    pub keyframe_index: usize,
    /// Job-relative path of the persisted keyframe image
    #[serde(default)]
    pub keyframe_path: Option<String>,
}

/// Final classification of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Fake,
    Real,
}

impl Verdict {
    /// `Fake` iff `score >= threshold`.
    pub fn from_score(score: f64, threshold: f64) -> Self {
        if score >= threshold {
            Verdict::Fake
        } else {
            Verdict::Real
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Fake => "FAKE",
            Verdict::Real => "REAL",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Score of one uploaded still image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImageDetection {
    pub model: String,
    /// Manipulation probability in `[0, 1]`
    pub probability: f64,
    pub threshold: f64,
    pub verdict: Verdict,
    pub width: u32,
    pub height: u32,
    /// Image failed the quality filter (too dark or too flat)
    pub is_anomalous: bool,
}

/// Distribution of raw frame probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreStats {
    pub min: f64,
    pub max: f64,
    /// Mean over every frame, anomalous ones included
    pub mean_all: f64,
    pub valid_frames: usize,
    pub anomalous_frames: usize,
    pub max_frame_index: usize,
    pub max_frame_time: f64,
}

/// Immutable result of a completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    /// Catalog key of the model that produced the scores
    pub model: String,
    pub overall_score: f64,
    pub average_score: f64,
    /// Equal to `overall_score`
    pub confidence: f64,
    pub threshold: f64,
    /// Analysis sampling rate
    pub fps: f64,
    pub total_frames: usize,
    pub verdict: Verdict,
    pub segments: Vec<Segment>,
    pub frame_scores: Vec<FrameScore>,
    /// Smoothed probabilities, index-aligned with `frame_scores`
    pub smoothed_scores: Vec<f64>,
    pub stats: ScoreStats,
}

impl AnalysisResult {
    pub fn is_fake(&self) -> bool {
        self.verdict == Verdict::Fake
    }
}

/// How a finished job ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Completed(AnalysisResult),
    /// The sampler yielded no frames; there is nothing to score.
    NoFrames { message: String },
}
