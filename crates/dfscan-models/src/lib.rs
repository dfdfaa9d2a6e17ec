//! Shared data models for the dfscan analysis service.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis jobs, their lifecycle and progress snapshots
//! - Per-frame scores, suspicious segments and the final analysis result
//! - Single-image detection results
//! - Analysis options and the detection model catalog

pub mod analysis;
pub mod job;
pub mod model;
pub mod options;

// Re-export common types
pub use analysis::{AnalysisOutcome, AnalysisResult, FrameScore, ImageDetection, ScoreStats, Segment, Verdict};
pub use job::{Job, JobId, JobSnapshot, JobStatus, ProgressStage};
pub use model::ModelInfo;
pub use options::{AnalysisOptions, DEFAULT_MODEL, DEFAULT_TARGET_FPS, DEFAULT_THRESHOLD};
