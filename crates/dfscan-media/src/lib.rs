//! Frame sampling and score timeline analysis.
//!
//! This crate provides:
//! - FFprobe metadata and FFmpeg rawvideo frame decoding
//! - Target-rate frame sampling
//! - Frame quality (darkness / flatness) filtering
//! - Score aggregation, temporal smoothing and segment detection
//! - Keyframe extraction and timeline artifacts

pub mod error;
pub mod fs_utils;
pub mod keyframe;
pub mod probe;
pub mod quality;
pub mod report;
pub mod sampler;
pub mod timeline;

pub use error::{MediaError, MediaResult};
pub use keyframe::{extract_keyframes, KeyframeCache};
pub use probe::{probe_video, VideoInfo};
pub use quality::{is_anomalous, luma_stats, LumaStats, QualityThresholds};
pub use sampler::{frame_step, FfmpegFrameSource, FrameSample, FrameSampler, FrameSource, MemoryFrameSource};
pub use timeline::{build_result, TimelineConfig};
