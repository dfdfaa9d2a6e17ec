//! Frame sampling at a target analysis rate.
//!
//! A [`FrameSource`] yields every native frame of a video in decode order;
//! [`FrameSampler`] keeps one out of every `frame_step` of them and stamps
//! each kept frame with its position on the analysis timeline.

use std::io::{self, ErrorKind, Read};
use std::iter::FusedIterator;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::RgbImage;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::probe::{VideoInfo, FALLBACK_FPS};

/// A decoded frame retained by the sampler.
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// 0-based index among sampled frames (contiguous)
    pub index: usize,
    /// Index of the frame in the native stream
    pub source_index: u64,
    /// `index / target_fps`, in seconds
    pub timestamp: f64,
    pub pixels: RgbImage,
}

/// A decoder producing native frames in order.
pub trait FrameSource {
    /// Native frame rate as reported by the container.
    fn source_fps(&self) -> f64;

    /// Next decoded frame, `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Option<MediaResult<RgbImage>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn source_fps(&self) -> f64 {
        (**self).source_fps()
    }

    fn next_frame(&mut self) -> Option<MediaResult<RgbImage>> {
        (**self).next_frame()
    }
}

/// Number of native frames between two sampled frames.
///
/// `max(round(source_fps / target_fps), 1)`; a missing or invalid source
/// rate is treated as 25 fps.
pub fn frame_step(source_fps: f64, target_fps: f64) -> u64 {
    let source_fps = if source_fps.is_finite() && source_fps > 0.0 {
        source_fps
    } else {
        FALLBACK_FPS
    };
    let step = (source_fps / target_fps).round();
    if step.is_finite() && step >= 1.0 {
        step as u64
    } else {
        1
    }
}

/// Lazy, finite, non-restartable sequence of sampled frames.
pub struct FrameSampler<S: FrameSource> {
    source: S,
    target_fps: f64,
    step: u64,
    source_index: u64,
    output_index: usize,
    exhausted: bool,
}

impl<S: FrameSource> FrameSampler<S> {
    pub fn new(source: S, target_fps: f64) -> MediaResult<Self> {
        if !target_fps.is_finite() || target_fps <= 0.0 {
            return Err(MediaError::invalid_argument(format!(
                "target fps must be positive, got {}",
                target_fps
            )));
        }
        let step = frame_step(source.source_fps(), target_fps);
        debug!(
            source_fps = source.source_fps(),
            target_fps,
            step,
            "Frame sampler initialized"
        );
        Ok(Self {
            source,
            target_fps,
            step,
            source_index: 0,
            output_index: 0,
            exhausted: false,
        })
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn target_fps(&self) -> f64 {
        self.target_fps
    }

    /// Expected number of samples for a stream of `source_frames` native frames.
    pub fn expected_samples(&self, source_frames: u64) -> usize {
        source_frames.div_ceil(self.step) as usize
    }
}

impl<S: FrameSource> Iterator for FrameSampler<S> {
    type Item = MediaResult<FrameSample>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted {
            match self.source.next_frame() {
                None => self.exhausted = true,
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
                Some(Ok(pixels)) => {
                    let source_index = self.source_index;
                    self.source_index += 1;
                    if source_index % self.step != 0 {
                        continue;
                    }
                    let index = self.output_index;
                    self.output_index += 1;
                    return Some(Ok(FrameSample {
                        index,
                        source_index,
                        timestamp: index as f64 / self.target_fps,
                        pixels,
                    }));
                }
            }
        }
        None
    }
}

impl<S: FrameSource> FusedIterator for FrameSampler<S> {}

/// Frames held in memory, mainly for tests and pre-decoded inputs.
pub struct MemoryFrameSource {
    fps: f64,
    frames: std::vec::IntoIter<RgbImage>,
}

impl MemoryFrameSource {
    pub fn new(fps: f64, frames: Vec<RgbImage>) -> Self {
        Self {
            fps,
            frames: frames.into_iter(),
        }
    }
}

impl FrameSource for MemoryFrameSource {
    fn source_fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Option<MediaResult<RgbImage>> {
        self.frames.next().map(Ok)
    }
}

/// Default wait for one decoded frame before FFmpeg is considered stuck.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(60);

/// Bytes of FFmpeg stderr kept for error messages (the tail).
const STDERR_TAIL: usize = 16 * 1024;

/// Frames decoded ahead of the consumer.
const READ_AHEAD: usize = 2;

/// Native-rate RGB24 frames decoded by an FFmpeg child process.
///
/// FFmpeg writes raw frames to stdout; a reader thread pulls exactly one
/// `width * height * 3` chunk at a time and a second thread drains stderr,
/// so neither pipe can fill up and stall the child. A trailing partial
/// chunk is discarded. If no frame arrives within the frame timeout the
/// child is killed and the decode fails.
pub struct FfmpegFrameSource {
    child: Child,
    frames: Receiver<io::Result<Vec<u8>>>,
    stderr: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    fps: f64,
    frame_timeout: Duration,
    frames_read: u64,
    finished: bool,
}

impl FfmpegFrameSource {
    /// Start decoding `path` using dimensions and rate from a prior probe.
    pub fn open(path: impl AsRef<Path>, info: &VideoInfo) -> MediaResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let mut command = Command::new("ffmpeg");
        command
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-vsync", "passthrough", "-pix_fmt", "rgb24", "-f", "rawvideo", "-"]);
        Self::spawn(command, info)
    }

    /// Run `command` as the decoder. It must write rgb24 frames of the
    /// probed size to stdout.
    pub(crate) fn spawn(mut command: Command, info: &VideoInfo) -> MediaResult<Self> {
        if info.width == 0 || info.height == 0 {
            return Err(MediaError::source_unreadable("video has no decodable dimensions"));
        }

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MediaError::source_unreadable(format!("Failed to spawn FFmpeg: {}", e)))?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(MediaError::source_unreadable("Failed to capture FFmpeg output"));
            }
        };

        let frame_len = info.width as usize * info.height as usize * 3;
        let (sender, frames) = mpsc::sync_channel(READ_AHEAD);
        thread::spawn(move || read_frames(stdout, frame_len, sender));
        let stderr = thread::spawn(move || drain_tail(stderr, STDERR_TAIL));

        Ok(Self {
            child,
            frames,
            stderr: Some(stderr),
            width: info.width,
            height: info.height,
            fps: info.fps,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            frames_read: 0,
            finished: false,
        })
    }

    /// Maximum wait for each decoded frame.
    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    fn stderr_tail(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }

    fn abort(&mut self) {
        self.finished = true;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }

    /// Reap the child once stdout is drained. A failed decode that produced
    /// no frames at all means the input could not be opened.
    fn finish(&mut self) -> Option<MediaResult<RgbImage>> {
        self.finished = true;

        let status = self.child.wait();
        let stderr = self.stderr_tail();
        match status {
            Ok(status) if status.success() => None,
            Ok(status) if self.frames_read == 0 => Some(Err(MediaError::source_unreadable(format!(
                "FFmpeg exited with {:?}: {}",
                status.code(),
                stderr.trim()
            )))),
            Ok(status) => {
                warn!(
                    code = ?status.code(),
                    frames = self.frames_read,
                    stderr = %stderr.trim(),
                    "FFmpeg exited with error after partial decode"
                );
                None
            }
            Err(e) => Some(Err(MediaError::Io(e))),
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    fn source_fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Option<MediaResult<RgbImage>> {
        if self.finished {
            return None;
        }

        match self.frames.recv_timeout(self.frame_timeout) {
            Ok(Ok(buffer)) => {
                self.frames_read += 1;
                match RgbImage::from_raw(self.width, self.height, buffer) {
                    Some(frame) => Some(Ok(frame)),
                    None => Some(Err(MediaError::InvalidFrame(format!(
                        "frame {} does not match {}x{}",
                        self.frames_read, self.width, self.height
                    )))),
                }
            }
            Ok(Err(e)) => {
                self.abort();
                Some(Err(MediaError::Io(e)))
            }
            Err(RecvTimeoutError::Disconnected) => self.finish(),
            Err(RecvTimeoutError::Timeout) => {
                self.abort();
                warn!(
                    frames = self.frames_read,
                    timeout_secs = self.frame_timeout.as_secs_f64(),
                    "FFmpeg produced no frame in time, killed"
                );
                Some(Err(MediaError::DecodeTimeout {
                    frames: self.frames_read,
                    timeout: self.frame_timeout,
                }))
            }
        }
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        if !self.finished {
            self.abort();
        }
    }
}

/// Send exact frame-sized chunks until EOF, an error, or a gone receiver.
fn read_frames(mut stdout: ChildStdout, frame_len: usize, sender: SyncSender<io::Result<Vec<u8>>>) {
    loop {
        let mut buffer = vec![0u8; frame_len];
        let item = match stdout.read_exact(&mut buffer) {
            Ok(()) => Ok(buffer),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return,
            Err(e) => Err(e),
        };
        let failed = item.is_err();
        if sender.send(item).is_err() || failed {
            return;
        }
    }
}

/// Read `pipe` to EOF, keeping only the last `limit` bytes.
fn drain_tail(mut pipe: impl Read, limit: usize) -> String {
    let mut tail: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > limit {
                    tail.drain(..tail.len() - limit);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&tail).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize) -> Vec<RgbImage> {
        (0..n)
            .map(|i| RgbImage::from_pixel(2, 2, image::Rgb([i as u8, 0, 0])))
            .collect()
    }

    #[test]
    fn test_frame_step() {
        assert_eq!(frame_step(30.0, 3.0), 10);
        assert_eq!(frame_step(29.97, 3.0), 10);
        assert_eq!(frame_step(25.0, 60.0), 1);
        assert_eq!(frame_step(0.0, 5.0), 5);
        assert_eq!(frame_step(f64::NAN, 25.0), 1);
    }

    #[test]
    fn test_sampling_30fps_at_3fps() {
        let source = MemoryFrameSource::new(30.0, frames(25));
        let sampler = FrameSampler::new(source, 3.0).unwrap();
        assert_eq!(sampler.step(), 10);

        let samples: Vec<FrameSample> = sampler.map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 3);

        let sources: Vec<u64> = samples.iter().map(|s| s.source_index).collect();
        assert_eq!(sources, vec![0, 10, 20]);

        let indices: Vec<usize> = samples.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        assert_eq!(samples[0].timestamp, 0.0);
        assert!((samples[1].timestamp - 0.333).abs() < 1e-3);
        assert!((samples[2].timestamp - 0.667).abs() < 1e-3);
        assert_eq!(samples[2].pixels.get_pixel(0, 0)[0], 20);
    }

    #[test]
    fn test_sampler_is_fused() {
        let mut sampler = FrameSampler::new(MemoryFrameSource::new(10.0, frames(1)), 10.0).unwrap();
        assert!(sampler.next().is_some());
        assert!(sampler.next().is_none());
        assert!(sampler.next().is_none());
    }

    #[test]
    fn test_rejects_invalid_target_fps() {
        assert!(FrameSampler::new(MemoryFrameSource::new(30.0, frames(1)), 0.0).is_err());
        assert!(FrameSampler::new(MemoryFrameSource::new(30.0, frames(1)), f64::INFINITY).is_err());
    }

    #[test]
    fn test_expected_samples() {
        let sampler = FrameSampler::new(MemoryFrameSource::new(30.0, vec![]), 3.0).unwrap();
        assert_eq!(sampler.expected_samples(25), 3);
        assert_eq!(sampler.expected_samples(30), 3);
        assert_eq!(sampler.expected_samples(31), 4);
        assert_eq!(sampler.expected_samples(0), 0);
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn source_fps(&self) -> f64 {
            30.0
        }

        fn next_frame(&mut self) -> Option<MediaResult<RgbImage>> {
            Some(Err(MediaError::source_unreadable("boom")))
        }
    }

    #[test]
    fn test_source_error_ends_sequence() {
        let mut sampler = FrameSampler::new(FailingSource, 3.0).unwrap();
        assert!(matches!(sampler.next(), Some(Err(MediaError::SourceUnreadable(_)))));
        assert!(sampler.next().is_none());
    }

    #[test]
    fn test_open_missing_file() {
        let info = VideoInfo {
            duration: 1.0,
            width: 2,
            height: 2,
            fps: 30.0,
            frame_count: 30,
            codec: "h264".into(),
            size: 0,
        };
        assert!(matches!(
            FfmpegFrameSource::open("/nonexistent/video.mp4", &info),
            Err(MediaError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_drain_tail_keeps_last_bytes() {
        let input: Vec<u8> = (0..10_000u32).map(|i| b'a' + (i % 26) as u8).collect();
        let tail = drain_tail(&input[..], 100);
        assert_eq!(tail.len(), 100);
        assert_eq!(tail.as_bytes(), &input[input.len() - 100..]);
    }

    #[cfg(unix)]
    mod decoder {
        use super::*;
        use std::sync::mpsc;

        fn info() -> VideoInfo {
            VideoInfo {
                duration: 0.1,
                width: 2,
                height: 2,
                fps: 30.0,
                frame_count: 3,
                codec: "rawvideo".into(),
                size: 0,
            }
        }

        fn shell(script: &str) -> Command {
            let mut command = Command::new("sh");
            command.args(["-c", script]);
            command
        }

        /// Drain a source on another thread so a stuck decoder fails the
        /// test instead of hanging it.
        fn collect(source: FfmpegFrameSource) -> Vec<MediaResult<RgbImage>> {
            let (tx, rx) = mpsc::channel();
            thread::spawn(move || {
                let mut source = source;
                let mut out = Vec::new();
                while let Some(frame) = source.next_frame() {
                    out.push(frame);
                }
                let _ = tx.send(out);
            });
            rx.recv_timeout(Duration::from_secs(10))
                .expect("decoder stalled")
        }

        #[test]
        fn test_noisy_stderr_does_not_stall_decoding() {
            // 200KB of stderr before any frame overflows the pipe buffer
            let command = shell("head -c 200000 /dev/zero >&2; head -c 36 /dev/zero");
            let source = FfmpegFrameSource::spawn(command, &info()).unwrap();

            let frames = collect(source);

            assert_eq!(frames.len(), 3);
            assert!(frames.iter().all(|f| f.is_ok()));
        }

        #[test]
        fn test_failed_decode_reports_stderr_tail() {
            let command = shell("echo 'moov atom not found' >&2; exit 1");
            let source = FfmpegFrameSource::spawn(command, &info()).unwrap();

            let frames = collect(source);

            assert_eq!(frames.len(), 1);
            match &frames[0] {
                Err(MediaError::SourceUnreadable(message)) => {
                    assert!(message.contains("moov atom not found"))
                }
                other => panic!("unexpected {:?}", other.as_ref().map(|_| ())),
            }
        }

        #[test]
        fn test_silent_decoder_times_out() {
            let source = FfmpegFrameSource::spawn(shell("exec sleep 30"), &info())
                .unwrap()
                .with_frame_timeout(Duration::from_millis(200));

            let frames = collect(source);

            assert_eq!(frames.len(), 1);
            assert!(matches!(
                frames[0],
                Err(MediaError::DecodeTimeout { frames: 0, .. })
            ));
        }
    }
}
