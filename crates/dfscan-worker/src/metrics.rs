//! Job metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder that exports them.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "dfscan_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "dfscan_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "dfscan_jobs_failed_total";
    pub const JOBS_IN_FLIGHT: &str = "dfscan_jobs_in_flight";
    pub const JOB_DURATION_SECONDS: &str = "dfscan_job_duration_seconds";

    pub const FRAMES_ANALYZED_TOTAL: &str = "dfscan_frames_analyzed_total";
    pub const ANOMALOUS_FRAMES_TOTAL: &str = "dfscan_anomalous_frames_total";
    pub const SEGMENTS_FOUND_TOTAL: &str = "dfscan_segments_found_total";

    pub const IMAGES_SCORED_TOTAL: &str = "dfscan_images_scored_total";
}

pub fn record_job_submitted(model: &str) {
    let labels = [("model", model.to_string())];
    counter!(names::JOBS_SUBMITTED_TOTAL, &labels).increment(1);
}

pub fn record_job_completed(model: &str, verdict: &str, duration_secs: f64) {
    let labels = [("model", model.to_string()), ("verdict", verdict.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "model" => model.to_string()).record(duration_secs);
}

pub fn record_job_failed(model: &str) {
    let labels = [("model", model.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn set_jobs_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}

/// Record the frames one job scored.
pub fn record_frames(model: &str, analyzed: usize, anomalous: usize) {
    counter!(names::FRAMES_ANALYZED_TOTAL, "model" => model.to_string()).increment(analyzed as u64);
    counter!(names::ANOMALOUS_FRAMES_TOTAL, "model" => model.to_string()).increment(anomalous as u64);
}

pub fn record_segments(count: usize) {
    counter!(names::SEGMENTS_FOUND_TOTAL).increment(count as u64);
}

pub fn record_image_scored(model: &str, verdict: &str) {
    let labels = [("model", model.to_string()), ("verdict", verdict.to_string())];
    counter!(names::IMAGES_SCORED_TOTAL, &labels).increment(1);
}
