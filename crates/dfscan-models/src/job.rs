//! Analysis job lifecycle and progress snapshots.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::analysis::{AnalysisOutcome, AnalysisResult};
use crate::options::AnalysisOptions;

/// Unique identifier for an analysis job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the ID is safe to use as a single path component.
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is accepted and being worked on (or waiting for a worker slot)
    #[default]
    Processing,
    /// Job finished; the outcome is attached
    Completed,
    /// Job failed with an error message
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage reported alongside progress.
///
/// Each stage owns a contiguous progress band; the bands tile `0..=100`
/// in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    #[default]
    Saving,
    LoadingModel,
    AnalyzingFrames,
    AnalyzingResults,
    FindingSegments,
    ExtractingKeyframes,
    Done,
    Failed,
}

impl ProgressStage {
    /// Human-readable label shown to polling clients.
    pub fn label(&self) -> &'static str {
        match self {
            ProgressStage::Saving => "Saving video...",
            ProgressStage::LoadingModel => "Loading model...",
            ProgressStage::AnalyzingFrames => "Analyzing video...",
            ProgressStage::AnalyzingResults => "Analyzing results...",
            ProgressStage::FindingSegments => "Finding suspicious segments...",
            ProgressStage::ExtractingKeyframes => "Extracting keyframes...",
            ProgressStage::Done => "Complete",
            ProgressStage::Failed => "Failed",
        }
    }

    /// Progress band `(start, end)` owned by this stage.
    pub fn band(&self) -> (u8, u8) {
        match self {
            ProgressStage::Saving => (0, 10),
            ProgressStage::LoadingModel => (10, 30),
            ProgressStage::AnalyzingFrames => (30, 80),
            ProgressStage::AnalyzingResults => (80, 85),
            ProgressStage::FindingSegments => (85, 95),
            ProgressStage::ExtractingKeyframes => (95, 100),
            ProgressStage::Done | ProgressStage::Failed => (100, 100),
        }
    }

    /// Progress value at `fraction` (clamped to `[0, 1]`) of the way through this stage.
    pub fn at(&self, fraction: f64) -> u8 {
        let (start, end) = self.band();
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        let value = start as f64 + fraction * (end - start) as f64;
        (value.floor() as u8).clamp(start, end)
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// An analysis job record.
///
/// Mutated by exactly one worker. Progress never decreases and a terminal
/// job ignores every further update.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub stage: ProgressStage,
    pub message: String,
    pub options: AnalysisOptions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Sequence number for update ordering (monotonically increasing)
    pub seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<AnalysisOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Create a new job in `processing` at progress 0.
    pub fn new(id: JobId, options: AnalysisOptions) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Processing,
            progress: 0,
            stage: ProgressStage::Saving,
            message: "Job accepted".to_string(),
            options,
            created_at: now,
            updated_at: now,
            completed_at: None,
            seq: 0,
            outcome: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record progress. Returns `false` when the update was dropped because
    /// the job is already terminal.
    pub fn set_progress(&mut self, progress: u8, stage: ProgressStage, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.progress = self.progress.max(progress.min(100));
        self.stage = stage;
        self.message = message.into();
        self.touch();
        true
    }

    /// Mark the job completed with its outcome.
    pub fn complete(&mut self, outcome: AnalysisOutcome) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.stage = ProgressStage::Done;
        match &outcome {
            AnalysisOutcome::Completed(result) => {
                self.message = format!("Found {} suspicious segments", result.segments.len());
            }
            AnalysisOutcome::NoFrames { message } => {
                self.message = message.clone();
                self.error = Some(message.clone());
            }
        }
        self.outcome = Some(outcome);
        self.completed_at = Some(Utc::now());
        self.touch();
        true
    }

    /// Mark the job failed. Progress is left where it stopped.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        let error = error.into();
        self.status = JobStatus::Error;
        self.stage = ProgressStage::Failed;
        self.message = error.clone();
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
        self.touch();
        true
    }

    /// The analysis result, if the job completed with frames.
    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.outcome {
            Some(AnalysisOutcome::Completed(result)) => Some(result),
            _ => None,
        }
    }

    /// Build the poll view of this job.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            stage: self.stage,
            message: self.message.clone(),
            seq: self.seq,
            updated_at: self.updated_at,
            result: self.result().cloned(),
            error: self.error.clone(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.seq += 1;
    }
}

/// Point-in-time view of a job returned to polling clients.
///
/// This is also the on-disk format of a job's progress file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub stage: ProgressStage,
    pub message: String,
    pub seq: u64,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSnapshot {
    /// Whether `self` reflects a later update than `other`.
    ///
    /// Ordered by `seq`, then by `updated_at`.
    pub fn is_newer_than(&self, other: &JobSnapshot) -> bool {
        (self.seq, self.updated_at) > (other.seq, other.updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(JobId::from_string("job-1"), AnalysisOptions::default())
    }

    #[test]
    fn test_job_creation() {
        let job = job();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, 0);
        assert_eq!(job.seq, 0);
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut job = job();
        assert!(job.set_progress(40, ProgressStage::AnalyzingFrames, "Processed 3 frames"));
        assert!(job.set_progress(35, ProgressStage::AnalyzingFrames, "late update"));
        assert_eq!(job.progress, 40);
        assert_eq!(job.seq, 2);

        job.set_progress(250, ProgressStage::ExtractingKeyframes, "overflow");
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_terminal_is_final() {
        let mut job = job();
        job.set_progress(50, ProgressStage::AnalyzingFrames, "halfway");
        assert!(job.fail("model exploded"));
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.progress, 50);

        let seq = job.seq;
        assert!(!job.set_progress(90, ProgressStage::ExtractingKeyframes, "ignored"));
        assert!(!job.complete(AnalysisOutcome::NoFrames { message: "x".into() }));
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.seq, seq);
    }

    #[test]
    fn test_no_frames_outcome_completes_without_result() {
        let mut job = job();
        job.complete(AnalysisOutcome::NoFrames {
            message: "No frames processed".into(),
        });
        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.progress, 100);
        assert!(snapshot.result.is_none());
        assert_eq!(snapshot.error.as_deref(), Some("No frames processed"));
    }

    #[test]
    fn test_stage_bands() {
        assert_eq!(ProgressStage::AnalyzingFrames.at(0.0), 30);
        assert_eq!(ProgressStage::AnalyzingFrames.at(0.5), 55);
        assert_eq!(ProgressStage::AnalyzingFrames.at(1.0), 80);
        assert_eq!(ProgressStage::AnalyzingFrames.at(7.0), 80);
        assert_eq!(ProgressStage::LoadingModel.at(f64::NAN), 10);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&JobStatus::Processing).unwrap(), "\"processing\"");
        assert_eq!(serde_json::to_string(&ProgressStage::FindingSegments).unwrap(), "\"finding_segments\"");
    }

    #[test]
    fn test_snapshot_ordering() {
        let mut job = job();
        let before = job.snapshot();
        job.set_progress(10, ProgressStage::LoadingModel, "Loading model...");
        let after = job.snapshot();
        assert!(after.is_newer_than(&before));
        assert!(!before.is_newer_than(&after));
    }

    #[test]
    fn test_path_safe_ids() {
        assert!(JobId::new().is_path_safe());
        assert!(!JobId::from_string("../etc").is_path_safe());
        assert!(!JobId::from_string("").is_path_safe());
    }
}
