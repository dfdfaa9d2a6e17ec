//! Per-job progress publication.

use std::sync::Arc;

use dfscan_models::{AnalysisOutcome, JobId, JobSnapshot, ProgressStage};

use crate::logging::JobLogger;
use crate::store::{JobStore, ProgressFile};
use crate::table::JobTable;

/// Write handle for one job, held by the worker that runs it.
///
/// Every update lands in the job table and the progress file. Terminal
/// transitions are also written to the job store, after which the job
/// leaves the table. Progress never goes backwards and nothing is
/// published once the job is terminal.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    table: JobTable,
    store: Arc<dyn JobStore>,
    progress_file: ProgressFile,
    logger: JobLogger,
}

impl JobHandle {
    pub fn new(
        id: JobId,
        table: JobTable,
        store: Arc<dyn JobStore>,
        progress_file: ProgressFile,
        logger: JobLogger,
    ) -> Self {
        Self {
            id,
            table,
            store,
            progress_file,
            logger,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn logger(&self) -> &JobLogger {
        &self.logger
    }

    /// Publish progress. Returns `false` if the update was dropped.
    pub fn progress(&self, progress: u8, stage: ProgressStage, message: impl Into<String>) -> bool {
        let message = message.into();
        let snapshot = self
            .table
            .update(&self.id, |job| job.set_progress(progress, stage, message.as_str()).then(|| job.snapshot()))
            .flatten();

        match snapshot {
            Some(snapshot) => {
                self.logger.log_progress(snapshot.progress, &message);
                self.write_progress_file(&snapshot);
                true
            }
            None => false,
        }
    }

    /// Enter `stage` at the start of its progress band.
    pub fn stage(&self, stage: ProgressStage) -> bool {
        self.progress(stage.band().0, stage, stage.label())
    }

    pub fn complete(&self, outcome: AnalysisOutcome) -> bool {
        self.finish(|job| job.complete(outcome))
    }

    pub fn fail(&self, error: impl Into<String>) -> bool {
        let error = error.into();
        self.logger.log_error(&error);
        self.finish(|job| job.fail(error))
    }

    /// Latest view of this job.
    pub fn snapshot(&self) -> Option<JobSnapshot> {
        self.table.snapshot(&self.id)
    }

    /// Apply a terminal transition and persist it.
    ///
    /// Once both the progress file and the job store hold the terminal
    /// record, the job is evicted from the table and polls are answered
    /// from disk. If either write fails it stays in memory.
    fn finish(&self, transition: impl FnOnce(&mut dfscan_models::Job) -> bool) -> bool {
        let job = self
            .table
            .update(&self.id, |job| transition(&mut *job).then(|| job.clone()))
            .flatten();
        let Some(job) = job else {
            return false;
        };

        let mut durable = self.write_progress_file(&job.snapshot());
        if let Err(e) = self.store.update(&job) {
            self.logger.log_warning(&format!("Failed to persist job metadata: {}", e));
            durable = false;
        }
        if durable {
            self.table.remove(&self.id);
        }
        true
    }

    fn write_progress_file(&self, snapshot: &JobSnapshot) -> bool {
        match self.progress_file.write(snapshot) {
            Ok(()) => true,
            Err(e) => {
                self.logger.log_warning(&format!("Failed to write progress file: {}", e));
                false
            }
        }
    }
}
