//! Job submission, execution and polling.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dfscan_detector::DetectorLoader;
use dfscan_media::QualityThresholds;
use dfscan_models::{
    AnalysisOptions, AnalysisOutcome, AnalysisResult, ImageDetection, Job, JobId, JobSnapshot, JobStatus, ModelInfo,
    Verdict,
};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};
use validator::Validate;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::{AnalysisPipeline, FfmpegOpener, JobInput, VideoOpener};
use crate::progress::JobHandle;
use crate::store::{JobPaths, JobStore, ProgressFile};
use crate::table::JobTable;

const DEFAULT_EXTENSION: &str = "mp4";

/// A queued submission. The upload is already on disk.
struct WorkItem {
    id: JobId,
    video: PathBuf,
    options: AnalysisOptions,
}

/// State shared by every worker task.
struct WorkerContext {
    config: Arc<WorkerConfig>,
    table: JobTable,
    store: Arc<dyn JobStore>,
    pipeline: Arc<AnalysisPipeline>,
    in_flight: AtomicUsize,
}

impl WorkerContext {
    fn handle(&self, id: &JobId, model: &str) -> JobHandle {
        let paths = JobPaths::new(&self.config.data_dir, id);
        JobHandle::new(
            id.clone(),
            self.table.clone(),
            Arc::clone(&self.store),
            ProgressFile::new(&paths),
            JobLogger::new(id, model),
        )
    }

    /// Run one job to a terminal state. Never returns an error: failures
    /// and panics become an `error` job.
    async fn execute(&self, item: WorkItem) {
        let WorkItem { id, video, options } = item;
        let model = options.model.clone();
        let handle = self.handle(&id, &model);
        let logger = handle.logger().clone();
        logger.log_start(&format!("{}, {} fps target", video.display(), options.target_fps));

        let started = Instant::now();
        metrics::set_jobs_in_flight(self.in_flight.fetch_add(1, Ordering::SeqCst) + 1);

        let input = JobInput {
            video,
            options,
            paths: JobPaths::new(&self.config.data_dir, &id),
        };
        let pipeline = Arc::clone(&self.pipeline);
        let task_handle = handle.clone();
        let run = tokio::spawn(
            async move { pipeline.run(&task_handle, input).await }.instrument(logger.create_span()),
        );

        let outcome = match run.await {
            Ok(result) => result,
            Err(e) => Err(WorkerError::from(e)),
        };

        // Terminal records carry the full result; write them off the runtime.
        let terminal = handle.clone();
        match outcome {
            Ok(outcome) => {
                let verdict = match &outcome {
                    AnalysisOutcome::Completed(result) => result.verdict.as_str(),
                    AnalysisOutcome::NoFrames { .. } => "NONE",
                };
                let summary = match &outcome {
                    AnalysisOutcome::Completed(result) => format!(
                        "verdict {} (score {:.3}), {} segments",
                        result.verdict,
                        result.overall_score,
                        result.segments.len()
                    ),
                    AnalysisOutcome::NoFrames { message } => message.clone(),
                };
                let completed = tokio::task::spawn_blocking(move || terminal.complete(outcome))
                    .await
                    .unwrap_or(false);
                if completed {
                    metrics::record_job_completed(&model, verdict, started.elapsed().as_secs_f64());
                    logger.log_completion(&summary);
                }
            }
            Err(e) => {
                let failed = tokio::task::spawn_blocking(move || terminal.fail(e.to_string()))
                    .await
                    .unwrap_or(false);
                if failed {
                    metrics::record_job_failed(&model);
                }
            }
        }

        metrics::set_jobs_in_flight(self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1));
    }
}

/// The analysis job service.
///
/// Submissions go onto a bounded queue drained by a fixed pool of worker
/// tasks. Must be created inside a Tokio runtime.
pub struct AnalysisService {
    context: Arc<WorkerContext>,
    loader: Arc<dyn DetectorLoader>,
    sender: Mutex<Option<mpsc::Sender<WorkItem>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AnalysisService {
    /// Start a service decoding videos with FFmpeg.
    pub fn new(config: WorkerConfig, loader: Arc<dyn DetectorLoader>, store: Arc<dyn JobStore>) -> Self {
        let opener = FfmpegOpener::new(config.decode_frame_timeout);
        Self::with_opener(config, loader, store, Arc::new(opener))
    }

    pub fn with_opener(
        config: WorkerConfig,
        loader: Arc<dyn DetectorLoader>,
        store: Arc<dyn JobStore>,
        opener: Arc<dyn VideoOpener>,
    ) -> Self {
        let config = Arc::new(config);
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let context = Arc::new(WorkerContext {
            config: Arc::clone(&config),
            table: JobTable::new(),
            store,
            pipeline: Arc::new(AnalysisPipeline::new(Arc::clone(&config), Arc::clone(&loader), opener)),
            in_flight: AtomicUsize::new(0),
        });

        let workers = (0..config.max_concurrent_jobs.max(1))
            .map(|slot| tokio::spawn(worker_loop(slot, Arc::clone(&receiver), Arc::clone(&context))))
            .collect();

        info!(
            workers = config.max_concurrent_jobs,
            queue_capacity = config.queue_capacity,
            data_dir = %config.data_dir.display(),
            "Analysis service started"
        );

        Self {
            context,
            loader,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.context.config
    }

    /// Accept a video for analysis and return its job ID at once.
    ///
    /// The upload is written to the job directory and the job recorded in
    /// `processing` at progress 0 before it is queued, so an immediate poll
    /// always finds it. Only the file path travels through the queue.
    pub async fn submit_analysis(
        &self,
        video: impl AsRef<[u8]>,
        extension: Option<&str>,
        options: AnalysisOptions,
    ) -> WorkerResult<JobId> {
        options
            .validate()
            .map_err(|e| WorkerError::invalid_options(e.to_string()))?;
        self.ensure_model(&options.model)?;

        let sender = self.sender.lock().await.clone().ok_or(WorkerError::QueueClosed)?;
        let permit = sender.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => WorkerError::QueueFull,
            mpsc::error::TrySendError::Closed(()) => WorkerError::QueueClosed,
        })?;

        let job = Job::new(JobId::new(), options.clone());
        let id = job.id.clone();
        let paths = JobPaths::new(&self.context.config.data_dir, &id);
        let video = video.as_ref();

        let staged = async {
            let path = stage_upload(&paths, &sanitize_extension(extension), video).await?;
            self.record_new_job(&job, &paths).await?;
            Ok::<_, WorkerError>(path)
        }
        .await;
        let video_path = match staged {
            Ok(path) => path,
            Err(e) => {
                discard_job_dir(paths.root()).await;
                return Err(e);
            }
        };
        self.context.table.insert(job);

        info!(
            job_id = %id,
            model = %options.model,
            bytes = video.len(),
            target_fps = options.target_fps,
            threshold = options.threshold,
            "Analysis job submitted"
        );
        metrics::record_job_submitted(&options.model);

        permit.send(WorkItem {
            id: id.clone(),
            video: video_path,
            options,
        });
        Ok(id)
    }

    /// Current state of a job.
    ///
    /// The in-memory record and the progress file are compared and the
    /// later one wins (ties go to memory). Jobs this process does not hold
    /// in memory, finished ones included, are read from disk.
    pub async fn poll(&self, id: &JobId) -> WorkerResult<JobSnapshot> {
        if !id.is_path_safe() {
            return Err(WorkerError::job_not_found(id.as_str()));
        }

        let memory = self.context.table.snapshot(id);
        let progress = ProgressFile::new(&JobPaths::new(&self.context.config.data_dir, id));
        let store = Arc::clone(&self.context.store);
        let id = id.clone();

        tokio::task::spawn_blocking(move || -> WorkerResult<JobSnapshot> {
            match (memory, progress.read()) {
                (Some(memory), Some(file)) if file.is_newer_than(&memory) => Ok(file),
                (Some(memory), _) => Ok(memory),
                (None, Some(file)) => Ok(file),
                (None, None) => store
                    .read(&id)?
                    .map(|job| job.snapshot())
                    .ok_or_else(|| WorkerError::job_not_found(id.as_str())),
            }
        })
        .await?
    }

    /// The result of a job that completed with frames.
    pub async fn get_result(&self, id: &JobId) -> WorkerResult<AnalysisResult> {
        let job = match self.context.table.get(id) {
            Some(job) => job,
            None => {
                let store = Arc::clone(&self.context.store);
                let key = id.clone();
                tokio::task::spawn_blocking(move || store.read(&key))
                    .await??
                    .ok_or_else(|| WorkerError::job_not_found(id.as_str()))?
            }
        };

        match job.status {
            JobStatus::Processing => Err(WorkerError::NotFinished {
                job_id: id.to_string(),
                status: job.status,
            }),
            JobStatus::Error => Err(WorkerError::JobFailed(job.error.unwrap_or(job.message))),
            JobStatus::Completed => match job.outcome {
                Some(AnalysisOutcome::Completed(result)) => Ok(result),
                Some(AnalysisOutcome::NoFrames { message }) => Err(WorkerError::NoFrames(message)),
                None => Err(WorkerError::store(format!("job {} completed without an outcome", id))),
            },
        }
    }

    /// Score one still image (JPEG or PNG) synchronously, without a job.
    pub async fn detect_image(&self, image: Vec<u8>, model: &str, threshold: f64) -> WorkerResult<ImageDetection> {
        let options = AnalysisOptions::default().with_model(model).with_threshold(threshold);
        options
            .validate()
            .map_err(|e| WorkerError::invalid_options(e.to_string()))?;
        self.ensure_model(model)?;

        let loader = Arc::clone(&self.loader);
        let detection = tokio::task::spawn_blocking(move || -> WorkerResult<ImageDetection> {
            let frame = image::load_from_memory(&image)
                .map_err(|e| WorkerError::InvalidImage(e.to_string()))?
                .to_rgb8();
            let detector = loader.load(&options.model)?;
            let probability = detector.score(&frame)?;
            Ok(ImageDetection {
                model: options.model,
                probability,
                threshold: options.threshold,
                verdict: Verdict::from_score(probability, options.threshold),
                width: frame.width(),
                height: frame.height(),
                is_anomalous: QualityThresholds::default().is_anomalous(&frame),
            })
        })
        .await??;

        info!(
            model = %detection.model,
            probability = detection.probability,
            verdict = %detection.verdict,
            "Image scored"
        );
        metrics::record_image_scored(&detection.model, detection.verdict.as_str());
        Ok(detection)
    }

    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.loader.list()
    }

    /// Jobs currently running.
    pub fn in_flight(&self) -> usize {
        self.context.in_flight.load(Ordering::SeqCst)
    }

    /// Stop accepting jobs, drain the queue and wait for running jobs,
    /// bounded by the configured shutdown timeout.
    pub async fn shutdown(&self) {
        self.sender.lock().await.take();
        let workers = std::mem::take(&mut *self.workers.lock().await);
        if workers.is_empty() {
            return;
        }

        info!(workers = workers.len(), "Waiting for in-flight jobs to complete...");
        let drain = async {
            for worker in workers {
                let _ = worker.await;
            }
        };
        if tokio::time::timeout(self.context.config.shutdown_timeout, drain)
            .await
            .is_err()
        {
            warn!(
                in_flight = self.in_flight(),
                "Shutdown timeout elapsed with jobs still running"
            );
        }
        info!("Analysis service stopped");
    }

    fn ensure_model(&self, model: &str) -> WorkerResult<()> {
        if self.loader.list().iter().any(|m| m.key == model) {
            Ok(())
        } else {
            Err(WorkerError::UnknownModel(model.to_string()))
        }
    }

    /// Write the job's metadata and first progress file.
    async fn record_new_job(&self, job: &Job, paths: &JobPaths) -> WorkerResult<()> {
        let store = Arc::clone(&self.context.store);
        let progress = ProgressFile::new(paths);
        let job = job.clone();
        tokio::task::spawn_blocking(move || -> WorkerResult<()> {
            store.create(&job)?;
            if let Err(e) = progress.write(&job.snapshot()) {
                warn!(job_id = %job.id, error = %e, "Failed to write initial progress file");
            }
            Ok(())
        })
        .await?
    }
}

async fn worker_loop(slot: usize, receiver: Arc<Mutex<mpsc::Receiver<WorkItem>>>, context: Arc<WorkerContext>) {
    debug!(slot, "Worker started");
    loop {
        let item = receiver.lock().await.recv().await;
        let Some(item) = item else {
            break;
        };
        context.execute(item).await;
    }
    debug!(slot, "Worker stopped");
}

async fn stage_upload(paths: &JobPaths, extension: &str, video: &[u8]) -> WorkerResult<PathBuf> {
    tokio::fs::create_dir_all(paths.root()).await?;
    let path = paths.input(extension);
    tokio::fs::write(&path, video).await?;
    Ok(path)
}

async fn discard_job_dir(root: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(root).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %root.display(), error = %e, "Failed to remove job directory");
        }
    }
}

/// Keep a short alphanumeric extension, else fall back to `mp4`.
fn sanitize_extension(extension: Option<&str>) -> String {
    extension
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::*;
    use crate::store::JsonFileJobStore;
    use dfscan_detector::{CallConvention, FrameTensor, Model, ModelAdapter, OutputTensor, RawOutput};
    use dfscan_detector::{Detector, DetectorError, DetectorResult};
    use dfscan_models::{ProgressStage, Verdict};
    use std::time::Duration;
    use tempfile::TempDir;

    fn service(dir: &TempDir, detector: Arc<dyn Detector>, frames: usize, workers: usize) -> AnalysisService {
        let config = WorkerConfig {
            data_dir: dir.path().to_path_buf(),
            max_concurrent_jobs: workers,
            shutdown_timeout: Duration::from_secs(10),
            ..WorkerConfig::default()
        };
        AnalysisService::with_opener(
            config,
            Arc::new(StaticLoader { detector }),
            Arc::new(JsonFileJobStore::new(dir.path())),
            Arc::new(MemoryOpener {
                fps: 1.0,
                frames: vec![textured_frame(); frames],
            }),
        )
    }

    async fn wait_terminal(service: &AnalysisService, id: &JobId) -> JobSnapshot {
        for _ in 0..500 {
            let snapshot = service.poll(id).await.unwrap();
            if snapshot.status.is_terminal() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", id);
    }

    /// Rejects named inputs and answers a bare call with a single logit.
    struct BareOnlyModel;

    impl Model for BareOnlyModel {
        fn name(&self) -> &str {
            "bare-only"
        }

        fn input_size(&self) -> u32 {
            8
        }

        fn invoke(&self, _input: &FrameTensor, convention: CallConvention) -> DetectorResult<RawOutput> {
            match convention {
                CallConvention::Bare => Ok(RawOutput::Tensor(OutputTensor::new(vec![1, 1], vec![2.0]))),
                _ => Err(DetectorError::invocation("unexpected input 'image'")),
            }
        }
    }

    #[tokio::test]
    async fn test_submit_then_immediate_poll_sees_queued_job() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(ScriptedDetector::new(&[0.1; 3])), 3, 1);

        let id = service
            .submit_analysis(b"video".to_vec(), Some("mp4"), options())
            .await
            .unwrap();

        let snapshot = service.poll(&id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Processing);
        assert_eq!(snapshot.progress, 0);
        assert!(matches!(
            service.get_result(&id).await,
            Err(WorkerError::NotFinished { .. })
        ));

        wait_terminal(&service, &id).await;
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_job_completes_with_result() {
        let dir = TempDir::new().unwrap();
        let scores = [0.1, 0.1, 0.9, 0.9, 0.9, 0.1, 0.1];
        let service = service(&dir, Arc::new(ScriptedDetector::new(&scores)), 7, 2);

        let id = service
            .submit_analysis(b"video".to_vec(), Some(".MOV"), options())
            .await
            .unwrap();
        let snapshot = wait_terminal(&service, &id).await;

        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.stage, ProgressStage::Done);
        assert_eq!(snapshot.message, "Found 1 suspicious segments");

        let result = service.get_result(&id).await.unwrap();
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.verdict, Verdict::Real);
        assert!(dir.path().join(id.as_str()).join("input.mov").is_file());

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_bare_call_fallback_completes_job() {
        let dir = TempDir::new().unwrap();
        let detector: Arc<dyn Detector> = Arc::new(ModelAdapter::new(BareOnlyModel));
        let service = service(&dir, detector, 3, 1);

        let id = service.submit_analysis(b"video".to_vec(), None, options()).await.unwrap();
        let snapshot = wait_terminal(&service, &id).await;

        assert_eq!(snapshot.status, JobStatus::Completed);
        let result = service.get_result(&id).await.unwrap();
        assert_eq!(result.total_frames, 3);
        for score in &result.frame_scores {
            assert!((0.0..=1.0).contains(&score.probability));
            assert!(score.probability > 0.5);
        }

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_failure_becomes_error_state() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(ScriptedDetector::new(&[0.4])), 3, 1);

        let id = service.submit_analysis(b"video".to_vec(), None, options()).await.unwrap();
        let snapshot = wait_terminal(&service, &id).await;

        assert_eq!(snapshot.status, JobStatus::Error);
        assert!(snapshot.message.contains("Model invocation failed"));
        assert!(matches!(service.get_result(&id).await, Err(WorkerError::JobFailed(_))));

        // The service keeps accepting work after a failed job.
        let next = service.submit_analysis(b"video".to_vec(), None, options()).await;
        assert!(next.is_ok());
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_video_completes_without_result() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(ScriptedDetector::new(&[])), 0, 1);

        let id = service.submit_analysis(b"video".to_vec(), None, options()).await.unwrap();
        let snapshot = wait_terminal(&service, &id).await;

        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.message, "No frames processed");
        assert!(matches!(service.get_result(&id).await, Err(WorkerError::NoFrames(_))));
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_requests() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(ScriptedDetector::new(&[])), 0, 1);

        let bad_fps = options().with_target_fps(0.0);
        assert!(matches!(
            service.submit_analysis(b"", None, bad_fps).await,
            Err(WorkerError::InvalidOptions(_))
        ));

        let unknown = options().with_model("nope");
        assert!(matches!(
            service.submit_analysis(b"", None, unknown).await,
            Err(WorkerError::UnknownModel(_))
        ));

        service.shutdown().await;
        assert!(matches!(
            service.submit_analysis(b"", None, options()).await,
            Err(WorkerError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn test_poll_falls_back_to_disk() {
        let dir = TempDir::new().unwrap();
        let scores = [0.9, 0.9, 0.9];
        let first = service(&dir, Arc::new(ScriptedDetector::new(&scores)), 3, 1);
        let id = first.submit_analysis(b"video".to_vec(), None, options()).await.unwrap();
        wait_terminal(&first, &id).await;
        first.shutdown().await;

        // A fresh service over the same data directory.
        let second = service(&dir, Arc::new(ScriptedDetector::new(&[])), 0, 1);
        let snapshot = second.poll(&id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(second.get_result(&id).await.unwrap().verdict, Verdict::Fake);

        std::fs::remove_file(dir.path().join(id.as_str()).join("progress.json")).unwrap();
        assert_eq!(second.poll(&id).await.unwrap().status, JobStatus::Completed);

        assert!(matches!(
            second.poll(&JobId::from_string("unknown")).await,
            Err(WorkerError::JobNotFound(_))
        ));
        assert!(matches!(
            second.poll(&JobId::from_string("../escape")).await,
            Err(WorkerError::JobNotFound(_))
        ));
        second.shutdown().await;
    }

    #[tokio::test]
    async fn test_finished_jobs_leave_memory() {
        let dir = TempDir::new().unwrap();
        // Enough scores for the first job only; the second one fails.
        let service = service(&dir, Arc::new(ScriptedDetector::new(&[0.9; 4])), 3, 1);

        let done = service.submit_analysis(b"video", None, options()).await.unwrap();
        let failed = service.submit_analysis(b"video", None, options()).await.unwrap();
        wait_terminal(&service, &done).await;
        wait_terminal(&service, &failed).await;
        service.shutdown().await;

        assert_eq!(service.context.table.len(), 0);
        assert_eq!(service.poll(&done).await.unwrap().status, JobStatus::Completed);
        assert_eq!(service.poll(&done).await.unwrap().progress, 100);
        assert!(service.get_result(&done).await.is_ok());
        assert_eq!(service.poll(&failed).await.unwrap().status, JobStatus::Error);
        assert!(matches!(service.get_result(&failed).await, Err(WorkerError::JobFailed(_))));
    }

    #[tokio::test]
    async fn test_upload_is_staged_before_queueing() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(ScriptedDetector::new(&[0.1; 3])), 3, 1);
        service.shutdown().await;
        // Reopen the queue with no workers draining it.
        let (sender, _receiver) = mpsc::channel(1);
        *service.sender.lock().await = Some(sender);

        let id = service
            .submit_analysis(b"raw upload", Some("webm"), options())
            .await
            .unwrap();

        let staged = dir.path().join(id.as_str()).join("input.webm");
        assert_eq!(std::fs::read(staged).unwrap(), b"raw upload");
        assert_eq!(service.poll(&id).await.unwrap().progress, 0);

        assert!(matches!(
            service.submit_analysis(b"second", None, options()).await,
            Err(WorkerError::QueueFull)
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    /// Accepts nothing.
    struct FullDiskStore;

    impl JobStore for FullDiskStore {
        fn create(&self, _job: &Job) -> WorkerResult<()> {
            Err(WorkerError::store("no space left on device"))
        }

        fn update(&self, _job: &Job) -> WorkerResult<()> {
            Err(WorkerError::store("no space left on device"))
        }

        fn read(&self, _id: &JobId) -> WorkerResult<Option<Job>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_failed_submission_removes_staged_upload() {
        let dir = TempDir::new().unwrap();
        let config = WorkerConfig {
            data_dir: dir.path().to_path_buf(),
            max_concurrent_jobs: 1,
            ..WorkerConfig::default()
        };
        let service = AnalysisService::with_opener(
            config,
            Arc::new(StaticLoader {
                detector: Arc::new(ScriptedDetector::new(&[])),
            }),
            Arc::new(FullDiskStore),
            Arc::new(MemoryOpener {
                fps: 1.0,
                frames: Vec::new(),
            }),
        );

        let result = service.submit_analysis(b"video", None, options()).await;

        assert!(matches!(result, Err(WorkerError::Store(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(service.context.table.is_empty());
        service.shutdown().await;
    }

    fn png(frame: image::RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(frame)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_detect_image_scores_still() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(ScriptedDetector::new(&[0.8])), 0, 1);

        let detection = service
            .detect_image(png(textured_frame()), "scripted", 0.5)
            .await
            .unwrap();

        assert_eq!(detection.model, "scripted");
        assert_eq!(detection.probability, 0.8);
        assert_eq!(detection.verdict, Verdict::Fake);
        assert_eq!((detection.width, detection.height), (16, 16));
        assert!(!detection.is_anomalous);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_detect_image_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(ScriptedDetector::new(&[0.8])), 0, 1);

        assert!(matches!(
            service.detect_image(b"not an image".to_vec(), "scripted", 0.5).await,
            Err(WorkerError::InvalidImage(_))
        ));
        assert!(matches!(
            service.detect_image(png(textured_frame()), "nope", 0.5).await,
            Err(WorkerError::UnknownModel(_))
        ));
        assert!(matches!(
            service.detect_image(png(textured_frame()), "scripted", f64::NAN).await,
            Err(WorkerError::InvalidOptions(_))
        ));
        service.shutdown().await;
    }

    #[test]
    fn test_sanitize_extension() {
        assert_eq!(sanitize_extension(Some("webm")), "webm");
        assert_eq!(sanitize_extension(Some(".MP4")), "mp4");
        assert_eq!(sanitize_extension(Some("../sh")), "mp4");
        assert_eq!(sanitize_extension(None), "mp4");
    }
}
