//! Structured job logging.
//!
//! Every event carries the job ID and model so log lines from concurrent
//! jobs can be told apart.

use dfscan_models::JobId;
use tracing::{error, info, warn, Span};

/// Per-job structured logger.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    model: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, model: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            model: model.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, model = %self.model, "Job started: {}", message);
    }

    pub fn log_progress(&self, progress: u8, message: &str) {
        info!(
            job_id = %self.job_id,
            model = %self.model,
            progress,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, model = %self.model, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, model = %self.model, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, model = %self.model, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Span wrapping the whole pipeline run of this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, model = %self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_fields() {
        let job_id = JobId::from_string("job-42");
        let logger = JobLogger::new(&job_id, "meso4");

        assert_eq!(logger.job_id(), "job-42");
        assert_eq!(logger.model(), "meso4");
    }
}
