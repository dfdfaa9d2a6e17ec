//! Keyframe caching and extraction.
//!
//! The frame loop cannot know which frames will end up as segment peaks,
//! so every sampled frame is kept JPEG-encoded in a [`KeyframeCache`].
//! Once segments are known the cache is pruned to the peaks and the
//! survivors are written under the job's `keyframes/` directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dfscan_models::Segment;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Directory (relative to the job directory) holding keyframes.
pub const KEYFRAME_DIR: &str = "keyframes";

const JPEG_QUALITY: u8 = 90;

/// Encoded sampled frames keyed by sampled-frame index.
#[derive(Debug, Default)]
pub struct KeyframeCache {
    frames: BTreeMap<usize, Vec<u8>>,
}

impl KeyframeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode and keep `frame`. Encoding failures are logged and skipped.
    pub fn insert(&mut self, index: usize, frame: &RgbImage) {
        match encode_jpeg(frame) {
            Ok(bytes) => {
                self.frames.insert(index, bytes);
            }
            Err(e) => warn!(frame_index = index, error = %e, "Failed to encode frame for keyframe cache"),
        }
    }

    /// Drop every frame that is not a peak of one of `segments`.
    pub fn retain_peaks(&mut self, segments: &[Segment]) {
        let keep: Vec<usize> = segments.iter().map(|s| s.keyframe_index).collect();
        self.frames.retain(|index, _| keep.contains(index));
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.frames.get(&index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Job-relative path of the keyframe for the 1-based segment `n`.
pub fn keyframe_relative_path(n: usize) -> String {
    format!("{}/segment_{}_keyframe.jpg", KEYFRAME_DIR, n)
}

/// Persist the peak frame of every segment and set its `keyframe_path`.
///
/// Failures are logged per segment and leave that segment's path unset.
/// Returns the number of keyframes written.
pub fn extract_keyframes(job_dir: &Path, segments: &mut [Segment], cache: &KeyframeCache) -> usize {
    if segments.is_empty() {
        return 0;
    }

    let dir = job_dir.join(KEYFRAME_DIR);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(dir = %dir.display(), error = %e, "Failed to create keyframe directory");
        return 0;
    }

    let mut written = 0;
    for (i, segment) in segments.iter_mut().enumerate() {
        let relative = keyframe_relative_path(i + 1);
        match persist(job_dir, &relative, segment.keyframe_index, cache) {
            Ok(path) => {
                debug!(path = %path.display(), frame_index = segment.keyframe_index, "Keyframe saved");
                segment.keyframe_path = Some(relative);
                written += 1;
            }
            Err(e) => {
                warn!(segment = i + 1, error = %e, "Keyframe not persisted");
                segment.keyframe_path = None;
            }
        }
    }
    written
}

fn persist(job_dir: &Path, relative: &str, index: usize, cache: &KeyframeCache) -> MediaResult<PathBuf> {
    let path = job_dir.join(relative);
    let bytes = cache
        .get(index)
        .ok_or_else(|| MediaError::keyframe_persist(&path, format!("frame {} not cached", index)))?;
    std::fs::write(&path, bytes).map_err(|e| MediaError::keyframe_persist(&path, e.to_string()))?;
    Ok(path)
}

fn encode_jpeg(frame: &RgbImage) -> MediaResult<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        ColorType::Rgb8,
    )?;
    Ok(bytes)
}
