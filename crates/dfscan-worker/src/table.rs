//! In-memory job table.

use std::sync::Arc;

use dashmap::DashMap;
use dfscan_models::{Job, JobId, JobSnapshot};

/// Shared map of live jobs.
///
/// Each job is written by the one worker that owns it and read by any
/// number of pollers. Cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct JobTable {
    jobs: Arc<DashMap<JobId, Job>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.insert(job.id.clone(), job);
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    pub fn snapshot(&self, id: &JobId) -> Option<JobSnapshot> {
        self.jobs.get(id).map(|entry| entry.value().snapshot())
    }

    /// Mutate a job in place. `None` if the job is unknown.
    pub fn update<R>(&self, id: &JobId, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        self.jobs.get_mut(id).map(|mut entry| f(entry.value_mut()))
    }

    /// Drop a job from memory. Returns the removed record.
    pub fn remove(&self, id: &JobId) -> Option<Job> {
        self.jobs.remove(id).map(|(_, job)| job)
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfscan_models::{AnalysisOptions, ProgressStage};

    #[test]
    fn test_clones_share_entries() {
        let table = JobTable::new();
        let reader = table.clone();
        let id = JobId::from_string("job-1");
        table.insert(Job::new(id.clone(), AnalysisOptions::default()));

        table.update(&id, |job| job.set_progress(20, ProgressStage::LoadingModel, "Loading model..."));

        let snapshot = reader.snapshot(&id).unwrap();
        assert_eq!(snapshot.progress, 20);
        assert_eq!(reader.len(), 1);
        assert!(table.update(&JobId::from_string("other"), |_| ()).is_none());
    }

    #[test]
    fn test_remove_evicts_entry() {
        let table = JobTable::new();
        let id = JobId::from_string("job-1");
        table.insert(Job::new(id.clone(), AnalysisOptions::default()));

        assert_eq!(table.remove(&id).map(|job| job.id), Some(id.clone()));
        assert!(table.is_empty());
        assert!(!table.contains(&id));
        assert!(table.remove(&id).is_none());
    }
}
