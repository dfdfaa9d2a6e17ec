//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use dfscan_media::sampler::DEFAULT_FRAME_TIMEOUT;
use dfscan_media::timeline::DEFAULT_SMOOTHING_WINDOW;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Maximum queued submissions waiting for a worker slot
    pub queue_capacity: usize,
    /// Root of per-job directories
    pub data_dir: PathBuf,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Longest wait for the decoder to produce the next frame
    pub decode_frame_timeout: Duration,
    /// Moving-average window, in frames
    pub smoothing_window: usize,
    /// Shortest segment kept, in seconds
    pub min_segment_duration: f64,
    /// Report progress after every frame until this many frames are done
    pub dense_progress_frames: usize,
    /// Afterwards, report every this many frames
    pub progress_every: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            queue_capacity: 64,
            data_dir: PathBuf::from("data/jobs"),
            shutdown_timeout: Duration::from_secs(30),
            decode_frame_timeout: DEFAULT_FRAME_TIMEOUT,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            min_segment_duration: 1.0,
            dense_progress_frames: 30,
            progress_every: 3,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(2),
            queue_capacity: std::env::var("WORKER_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(64),
            data_dir: std::env::var("DFSCAN_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/jobs")),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            decode_frame_timeout: std::env::var("DECODE_FRAME_TIMEOUT")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_FRAME_TIMEOUT),
            smoothing_window: std::env::var("SMOOTHING_WINDOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SMOOTHING_WINDOW),
            min_segment_duration: std::env::var("MIN_SEGMENT_DURATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1.0),
            dense_progress_frames: 30,
            progress_every: 3,
        }
    }

    /// Whether progress should be published after `processed` frames.
    pub fn should_report(&self, processed: usize) -> bool {
        processed < self.dense_progress_frames || processed % self.progress_every.max(1) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_cadence() {
        let config = WorkerConfig::default();
        assert!((1..30).all(|n| config.should_report(n)));
        assert!(config.should_report(30));
        assert!(!config.should_report(31));
        assert!(!config.should_report(32));
        assert!(config.should_report(33));
    }

    #[test]
    fn test_decode_watchdog_on_by_default() {
        assert_eq!(WorkerConfig::default().decode_frame_timeout, Duration::from_secs(60));
    }
}
