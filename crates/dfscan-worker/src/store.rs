//! Per-job directories and durable job records.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use dfscan_media::fs_utils::write_json_atomic;
use dfscan_models::{Job, JobId, JobSnapshot};
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

const METADATA_FILE: &str = "metadata.json";
const PROGRESS_FILE: &str = "progress.json";
const INPUT_STEM: &str = "input";

/// Layout of one job's directory under the data root.
#[derive(Debug, Clone)]
pub struct JobPaths {
    root: PathBuf,
}

impl JobPaths {
    pub fn new(data_dir: &Path, id: &JobId) -> Self {
        Self {
            root: data_dir.join(id.as_str()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Staged upload, keeping the client's extension.
    pub fn input(&self, extension: &str) -> PathBuf {
        self.root.join(format!("{}.{}", INPUT_STEM, extension))
    }

    pub fn metadata(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn progress(&self) -> PathBuf {
        self.root.join(PROGRESS_FILE)
    }
}

/// Durable job metadata.
///
/// Written at creation and at the terminal transition; read back for jobs
/// the current process does not hold in memory.
pub trait JobStore: Send + Sync {
    fn create(&self, job: &Job) -> WorkerResult<()>;

    fn update(&self, job: &Job) -> WorkerResult<()>;

    fn read(&self, id: &JobId) -> WorkerResult<Option<Job>>;
}

/// [`JobStore`] keeping `metadata.json` in each job directory.
#[derive(Debug, Clone)]
pub struct JsonFileJobStore {
    data_dir: PathBuf,
}

impl JsonFileJobStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn paths(&self, id: &JobId) -> WorkerResult<JobPaths> {
        if !id.is_path_safe() {
            return Err(WorkerError::job_not_found(id.as_str()));
        }
        Ok(JobPaths::new(&self.data_dir, id))
    }

    fn write(&self, job: &Job) -> WorkerResult<()> {
        let paths = self.paths(&job.id)?;
        std::fs::create_dir_all(paths.root())?;
        write_json_atomic(paths.metadata(), job).map_err(|e| WorkerError::store(e.to_string()))?;
        debug!(job_id = %job.id, status = %job.status, "Job metadata written");
        Ok(())
    }
}

impl JobStore for JsonFileJobStore {
    fn create(&self, job: &Job) -> WorkerResult<()> {
        let paths = self.paths(&job.id)?;
        if paths.metadata().exists() {
            return Err(WorkerError::store(format!("job {} already exists", job.id)));
        }
        self.write(job)
    }

    fn update(&self, job: &Job) -> WorkerResult<()> {
        self.write(job)
    }

    fn read(&self, id: &JobId) -> WorkerResult<Option<Job>> {
        let paths = match self.paths(id) {
            Ok(paths) => paths,
            Err(_) => return Ok(None),
        };
        match std::fs::read(paths.metadata()) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// The progress file: the latest [`JobSnapshot`], overwritten in place.
#[derive(Debug, Clone)]
pub struct ProgressFile {
    path: PathBuf,
}

impl ProgressFile {
    pub fn new(paths: &JobPaths) -> Self {
        Self {
            path: paths.progress(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, snapshot: &JobSnapshot) -> WorkerResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_json_atomic(&self.path, snapshot).map_err(|e| WorkerError::store(e.to_string()))
    }

    /// Latest snapshot, or `None` when the file is missing or unreadable.
    pub fn read(&self) -> Option<JobSnapshot> {
        let bytes = std::fs::read(&self.path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfscan_models::{AnalysisOptions, JobStatus};
    use tempfile::TempDir;

    #[test]
    fn test_job_paths() {
        let paths = JobPaths::new(Path::new("/data"), &JobId::from_string("abc"));
        assert_eq!(paths.root(), Path::new("/data/abc"));
        assert_eq!(paths.input("mp4"), Path::new("/data/abc/input.mp4"));
        assert_eq!(paths.progress(), Path::new("/data/abc/progress.json"));
    }

    #[test]
    fn test_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileJobStore::new(dir.path());
        let mut job = Job::new(JobId::from_string("job-1"), AnalysisOptions::default());

        store.create(&job).unwrap();
        assert!(store.create(&job).is_err());

        job.fail("decoder crashed");
        store.update(&job).unwrap();

        let read = store.read(&job.id).unwrap().unwrap();
        assert_eq!(read.status, JobStatus::Error);
        assert_eq!(read.error.as_deref(), Some("decoder crashed"));
    }

    #[test]
    fn test_store_unknown_and_unsafe_ids() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileJobStore::new(dir.path());

        assert!(store.read(&JobId::from_string("missing")).unwrap().is_none());
        assert!(store.read(&JobId::from_string("../etc")).unwrap().is_none());
    }

    #[test]
    fn test_progress_file_overwrites() {
        let dir = TempDir::new().unwrap();
        let id = JobId::from_string("job-2");
        let file = ProgressFile::new(&JobPaths::new(dir.path(), &id));
        assert!(file.read().is_none());

        let mut job = Job::new(id, AnalysisOptions::default());
        file.write(&job.snapshot()).unwrap();
        job.set_progress(40, dfscan_models::ProgressStage::AnalyzingFrames, "Processed 3 frames");
        file.write(&job.snapshot()).unwrap();

        let snapshot = file.read().unwrap();
        assert_eq!(snapshot.progress, 40);
        assert_eq!(snapshot.seq, 1);
    }
}
