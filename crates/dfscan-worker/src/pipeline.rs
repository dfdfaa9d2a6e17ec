//! The analysis pipeline run for one job.
//!
//! Stages, with the progress band each one owns:
//! save (0-10), model load (10-30), frame scoring (30-80),
//! aggregation and segmentation (80-95), keyframes and artifacts (95-100).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dfscan_detector::{Detector, DetectorLoader};
use dfscan_media::report::write_artifacts_lossy;
use dfscan_media::sampler::DEFAULT_FRAME_TIMEOUT;
use dfscan_media::{
    build_result, extract_keyframes, probe_video, FfmpegFrameSource, FrameSampler, FrameSource, KeyframeCache,
    MediaError, MediaResult, QualityThresholds, TimelineConfig, VideoInfo,
};
use dfscan_models::{AnalysisOptions, AnalysisOutcome, FrameScore, ProgressStage};
use tracing::{debug, info};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::metrics;
use crate::progress::JobHandle;
use crate::store::JobPaths;

/// Probes and decodes staged videos.
#[async_trait]
pub trait VideoOpener: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo>;

    /// Start decoding. Called from a blocking thread.
    fn open(&self, path: &Path, info: &VideoInfo) -> MediaResult<Box<dyn FrameSource + Send>>;
}

/// FFprobe + FFmpeg rawvideo decoding.
#[derive(Debug, Clone, Copy)]
pub struct FfmpegOpener {
    frame_timeout: Duration,
}

impl FfmpegOpener {
    /// Decoders that produce no frame for `frame_timeout` are killed.
    pub fn new(frame_timeout: Duration) -> Self {
        Self { frame_timeout }
    }
}

impl Default for FfmpegOpener {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_TIMEOUT)
    }
}

#[async_trait]
impl VideoOpener for FfmpegOpener {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        probe_video(path).await
    }

    fn open(&self, path: &Path, info: &VideoInfo) -> MediaResult<Box<dyn FrameSource + Send>> {
        let source = FfmpegFrameSource::open(path, info)?.with_frame_timeout(self.frame_timeout);
        Ok(Box::new(source))
    }
}

/// Everything a worker needs to run one job.
pub struct JobInput {
    /// The upload, already staged in the job directory
    pub video: PathBuf,
    pub options: AnalysisOptions,
    pub paths: JobPaths,
}

/// Scores and encoded frames collected by the frame loop.
#[derive(Debug, Default)]
struct FrameScan {
    scores: Vec<FrameScore>,
    keyframes: KeyframeCache,
    anomalous: usize,
}

pub struct AnalysisPipeline {
    config: Arc<WorkerConfig>,
    loader: Arc<dyn DetectorLoader>,
    opener: Arc<dyn VideoOpener>,
    quality: QualityThresholds,
}

impl AnalysisPipeline {
    pub fn new(config: Arc<WorkerConfig>, loader: Arc<dyn DetectorLoader>, opener: Arc<dyn VideoOpener>) -> Self {
        Self {
            config,
            loader,
            opener,
            quality: QualityThresholds::default(),
        }
    }

    /// Run every stage. Errors are returned to the caller, which owns the
    /// terminal transition.
    pub async fn run(&self, handle: &JobHandle, input: JobInput) -> WorkerResult<AnalysisOutcome> {
        let JobInput {
            video: video_path,
            options,
            paths,
        } = input;

        handle.stage(ProgressStage::Saving);
        handle.progress(ProgressStage::Saving.at(0.5), ProgressStage::Saving, "Video saved");

        let info = self.opener.probe(&video_path).await.map_err(unreadable)?;
        info!(
            job_id = %handle.id(),
            duration = info.duration,
            fps = info.fps,
            frames = info.frame_count,
            width = info.width,
            height = info.height,
            "Video probed"
        );

        handle.stage(ProgressStage::LoadingModel);
        let detector = self.load_detector(handle, &options.model).await?;

        handle.stage(ProgressStage::AnalyzingFrames);
        let scan = {
            let opener = Arc::clone(&self.opener);
            let detector = Arc::clone(&detector);
            let config = Arc::clone(&self.config);
            let quality = self.quality;
            let handle = handle.clone();
            let target_fps = options.target_fps;
            tokio::task::spawn_blocking(move || -> WorkerResult<FrameScan> {
                let source = opener.open(&video_path, &info).map_err(unreadable)?;
                let sampler = FrameSampler::new(source, target_fps)?;
                let expected = sampler.expected_samples(info.frame_count);
                scan_frames(sampler, expected, detector.as_ref(), &quality, &config, &handle)
            })
            .await??
        };

        if scan.scores.is_empty() {
            handle.logger().log_warning("No frames processed");
            return Ok(AnalysisOutcome::NoFrames {
                message: MediaError::EmptyTimeline.to_string(),
            });
        }
        metrics::record_frames(&options.model, scan.scores.len(), scan.anomalous);

        handle.stage(ProgressStage::AnalyzingResults);
        let timeline = TimelineConfig {
            model: options.model.clone(),
            fps: options.target_fps,
            threshold: options.threshold,
            smoothing_window: self.config.smoothing_window,
            min_segment_duration: self.config.min_segment_duration,
        };
        let FrameScan { scores, keyframes, .. } = scan;
        let result = build_result(scores, &timeline)?;
        handle.progress(
            ProgressStage::FindingSegments.band().0,
            ProgressStage::FindingSegments,
            format!("Found {} suspicious segments", result.segments.len()),
        );
        metrics::record_segments(result.segments.len());

        handle.stage(ProgressStage::ExtractingKeyframes);
        let job_dir = paths.root().to_path_buf();
        let result = tokio::task::spawn_blocking(move || {
            let mut result = result;
            let mut keyframes = keyframes;
            keyframes.retain_peaks(&result.segments);
            let written = extract_keyframes(&job_dir, &mut result.segments, &keyframes);
            debug!(written, segments = result.segments.len(), "Keyframes extracted");
            write_artifacts_lossy(&job_dir, &result);
            result
        })
        .await?;

        Ok(AnalysisOutcome::Completed(result))
    }

    async fn load_detector(&self, handle: &JobHandle, model: &str) -> WorkerResult<Arc<dyn Detector>> {
        let loader = Arc::clone(&self.loader);
        let key = model.to_string();
        let detector = tokio::task::spawn_blocking(move || loader.load(&key)).await??;
        handle.progress(
            ProgressStage::LoadingModel.at(0.5),
            ProgressStage::LoadingModel,
            format!("Model {} loaded", detector.name()),
        );

        let warm = Arc::clone(&detector);
        tokio::task::spawn_blocking(move || warm.warmup()).await??;
        Ok(detector)
    }
}

/// A probe or open failure means the upload is not a decodable video.
/// Missing tools and decoder stalls keep their own kind.
fn unreadable(e: MediaError) -> MediaError {
    match e {
        MediaError::FfmpegNotFound
        | MediaError::FfprobeNotFound
        | MediaError::SourceUnreadable(_)
        | MediaError::DecodeTimeout { .. } => e,
        other => MediaError::source_unreadable(other.to_string()),
    }
}

/// Score every sampled frame in order.
///
/// The first decode or inference error aborts the scan.
fn scan_frames<S: FrameSource>(
    sampler: FrameSampler<S>,
    expected: usize,
    detector: &dyn Detector,
    quality: &QualityThresholds,
    config: &WorkerConfig,
    handle: &JobHandle,
) -> WorkerResult<FrameScan> {
    let mut scan = FrameScan::default();

    for sample in sampler {
        let sample = sample?;
        let is_anomalous = quality.is_anomalous(&sample.pixels);
        let probability = detector.score(&sample.pixels)?;
        if is_anomalous {
            scan.anomalous += 1;
        }

        scan.scores.push(FrameScore {
            frame_index: sample.index,
            timestamp: sample.timestamp,
            probability,
            is_anomalous,
        });
        scan.keyframes.insert(sample.index, &sample.pixels);

        let processed = sample.index + 1;
        if config.should_report(processed) {
            let fraction = if expected > 0 {
                processed as f64 / expected as f64
            } else {
                0.0
            };
            handle.progress(
                ProgressStage::AnalyzingFrames.at(fraction),
                ProgressStage::AnalyzingFrames,
                format!("Processed {} frames", processed),
            );
        }
    }

    Ok(scan)
}
