//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Frame rate assumed when the container does not report a usable one.
pub const FALLBACK_FPS: f64 = 25.0;

/// Video file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Native frame rate (fps)
    pub fps: f64,
    /// Number of native frames (reported, or estimated from duration)
    pub frame_count: u64,
    /// Video codec
    pub codec: String,
    /// File size in bytes
    pub size: u64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let info = parse_probe_output(&output.stdout)?;
    debug!(
        path = %path.display(),
        width = info.width,
        height = info.height,
        fps = info.fps,
        frames = info.frame_count,
        "Probed video"
    );
    Ok(info)
}

/// Parse FFprobe JSON into [`VideoInfo`].
fn parse_probe_output(bytes: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(bytes)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::source_unreadable("No video stream found"))?;

    let duration = probe
        .format
        .duration
        .as_ref()
        .or(video_stream.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(FALLBACK_FPS);

    let frame_count = video_stream
        .nb_frames
        .as_ref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| (duration * fps).round().max(0.0) as u64);

    Ok(VideoInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        frame_count,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        size,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
///
/// Returns `None` for zero, negative or non-finite rates.
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.trim().parse().ok()?
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
        assert!(parse_frame_rate("garbage").is_none());
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{
            "format": {"duration": "10.0", "size": "1024"},
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "h264", "width": 640, "height": 360,
                 "avg_frame_rate": "0/0", "r_frame_rate": "30/1"}
            ]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 640);
        assert_eq!(info.height, 360);
        assert!((info.fps - 30.0).abs() < 1e-9);
        assert_eq!(info.frame_count, 300);
        assert_eq!(info.codec, "h264");
    }

    #[test]
    fn test_missing_video_stream_is_unreadable() {
        let json = br#"{"format": {}, "streams": [{"codec_type": "audio"}]}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::SourceUnreadable(_))
        ));
    }

    #[test]
    fn test_unknown_rate_falls_back() {
        let json = br#"{"format": {}, "streams": [{"codec_type": "video", "width": 2, "height": 2}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.fps, FALLBACK_FPS);
    }
}
