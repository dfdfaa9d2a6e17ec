//! Frame preprocessing for classifier input.

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::{DetectorError, DetectorResult};

/// Per-channel normalization applied after scaling pixels to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelNormalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl PixelNormalization {
    /// ImageNet statistics.
    pub const IMAGENET: Self = Self {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };

    /// Maps `[0, 1]` to `[-1, 1]`.
    pub const SYMMETRIC: Self = Self {
        mean: [0.5, 0.5, 0.5],
        std: [0.5, 0.5, 0.5],
    };
}

impl Default for PixelNormalization {
    fn default() -> Self {
        Self::IMAGENET
    }
}

/// A normalized `[1, 3, size, size]` input tensor in NCHW order.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTensor {
    pub size: u32,
    pub data: Vec<f32>,
}

impl FrameTensor {
    pub fn shape(&self) -> [usize; 4] {
        let s = self.size as usize;
        [1, 3, s, s]
    }
}

/// Resize `frame` to `size`x`size` and convert HWC u8 to normalized CHW f32.
pub fn preprocess(frame: &RgbImage, size: u32, norm: &PixelNormalization) -> DetectorResult<FrameTensor> {
    if size == 0 {
        return Err(DetectorError::Preprocess("input size must be positive".into()));
    }
    if frame.width() == 0 || frame.height() == 0 {
        return Err(DetectorError::Preprocess("frame has no pixels".into()));
    }

    let resized;
    let rgb = if frame.width() == size && frame.height() == size {
        frame
    } else {
        resized = imageops::resize(frame, size, size, FilterType::Triangle);
        &resized
    };

    let plane = (size * size) as usize;
    let mut data = vec![0f32; 3 * plane];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            let v = pixel[c] as f32 / 255.0;
            data[c * plane + i] = (v - norm.mean[c]) / norm.std[c];
        }
    }

    Ok(FrameTensor { size, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_layout_is_chw() {
        let mut frame = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
        frame.put_pixel(1, 0, Rgb([255, 0, 0]));

        let tensor = preprocess(&frame, 2, &PixelNormalization::SYMMETRIC).unwrap();
        assert_eq!(tensor.shape(), [1, 3, 2, 2]);
        assert_eq!(tensor.data.len(), 12);
        // red plane, pixel (x=1, y=0)
        assert_eq!(tensor.data[1], 1.0);
        assert_eq!(tensor.data[0], -1.0);
        // green plane same pixel
        assert_eq!(tensor.data[4 + 1], -1.0);
    }

    #[test]
    fn test_resizes_to_input_size() {
        let frame = RgbImage::from_pixel(64, 36, Rgb([128, 128, 128]));
        let tensor = preprocess(&frame, 16, &PixelNormalization::IMAGENET).unwrap();
        assert_eq!(tensor.data.len(), 3 * 16 * 16);
        let expected = (128.0 / 255.0 - 0.485) / 0.229;
        assert!((tensor.data[0] - expected).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_empty() {
        assert!(preprocess(&RgbImage::new(0, 0), 16, &PixelNormalization::IMAGENET).is_err());
        assert!(preprocess(&RgbImage::new(4, 4), 0, &PixelNormalization::IMAGENET).is_err());
    }
}
