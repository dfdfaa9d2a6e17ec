//! Analysis job orchestration.
//!
//! This crate provides:
//! - [`AnalysisService`]: submission, a bounded worker pool and polling
//! - The per-job pipeline from staged upload to keyframes
//! - Progress publication to the job table, progress file and job store

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod table;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::AnalysisService;
pub use logging::JobLogger;
pub use pipeline::{AnalysisPipeline, FfmpegOpener, JobInput, VideoOpener};
pub use progress::JobHandle;
pub use store::{JobPaths, JobStore, JsonFileJobStore, ProgressFile};
pub use table::JobTable;
