//! Frame type and conversions: YUYV luma extraction, warm-up detection, JPEG codec.

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat};

/// Pixel layout of [`Frame::data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 1 byte per pixel.
    Luma8,
    /// 3 bytes per pixel, R G B.
    Rgb8,
}

impl PixelLayout {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Luma8 => 1,
            Self::Rgb8 => 3,
        }
    }

    fn color_type(&self) -> ExtendedColorType {
        match self {
            Self::Luma8 => ExtendedColorType::L8,
            Self::Rgb8 => ExtendedColorType::Rgb8,
        }
    }
}

/// A still frame pulled from a visual source, at the source's native size.
#[derive(Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub timestamp: std::time::Instant,
}

impl Frame {
    pub fn luma(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            layout: PixelLayout::Luma8,
            timestamp: std::time::Instant::now(),
        }
    }

    pub fn rgb(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            layout: PixelLayout::Rgb8,
            timestamp: std::time::Instant::now(),
        }
    }

    /// Decode a JPEG into an RGB frame.
    pub fn from_jpeg(bytes: &[u8]) -> Result<Self, FrameError> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?.to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Self::rgb(img.into_raw(), width, height))
    }

    /// False for zero-sized frames or buffers shorter than the declared size.
    pub fn is_ready(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len()
                >= self.width as usize * self.height as usize * self.layout.bytes_per_pixel()
    }
}

/// Encoded image handed to the recognition service. Never persisted.
#[derive(Debug, Clone)]
pub struct FrameSample {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

/// Compress a frame at its native dimensions. `quality` is 1–100.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<FrameSample, FrameError> {
    if !frame.is_ready() {
        return Err(FrameError::EmptyFrame {
            width: frame.width,
            height: frame.height,
        });
    }
    let pixels = frame.width as usize * frame.height as usize * frame.layout.bytes_per_pixel();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode(
        &frame.data[..pixels],
        frame.width,
        frame.height,
        frame.layout.color_type(),
    )?;
    Ok(FrameSample {
        jpeg,
        width: frame.width,
        height: frame.height,
        captured_at: Utc::now(),
    })
}

/// Convert packed YUYV (4:2:2) to grayscale by extracting the Y channel.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}

/// True when more than `threshold_pct` of pixels fall in the darkest bucket (0–31).
///
/// Cameras emit black frames while exposure settles after acquisition.
pub fn is_dark_frame(gray: &[u8], threshold_pct: f32) -> bool {
    if gray.is_empty() {
        return true;
    }
    let dark_count = gray.iter().filter(|&&p| p < 32).count();
    (dark_count as f32 / gray.len() as f32) > threshold_pct
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("image codec: {0}")]
    Codec(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let data = (0..width * height).map(|i| (i % 256) as u8).collect();
        Frame::luma(data, width, height)
    }

    #[test]
    fn test_yuyv_to_grayscale() {
        let yuyv = vec![100, 128, 200, 128];
        let gray = yuyv_to_grayscale(&yuyv, 2, 1).unwrap();
        assert_eq!(gray, vec![100, 200]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(yuyv_to_grayscale(&[100, 128], 2, 1).is_err());
    }

    #[test]
    fn test_dark_frame_all_black() {
        assert!(is_dark_frame(&[0u8; 1000], 0.95));
    }

    #[test]
    fn test_dark_frame_normal() {
        assert!(!is_dark_frame(&[128u8; 1000], 0.95));
    }

    #[test]
    fn test_dark_frame_empty() {
        assert!(is_dark_frame(&[], 0.95));
    }

    #[test]
    fn test_zero_sized_frame_not_ready() {
        assert!(!Frame::luma(vec![], 0, 0).is_ready());
        assert!(!Frame::rgb(vec![0; 5], 2, 1).is_ready());
        assert!(Frame::rgb(vec![0; 6], 2, 1).is_ready());
    }

    #[test]
    fn test_encode_rejects_empty_frame() {
        let err = encode_jpeg(&Frame::luma(vec![], 0, 0), 75).unwrap_err();
        assert!(matches!(err, FrameError::EmptyFrame { .. }));
    }

    #[test]
    fn test_encode_keeps_native_size() {
        let sample = encode_jpeg(&gradient(32, 24), 75).unwrap();
        assert_eq!((sample.width, sample.height), (32, 24));
        assert_eq!(&sample.jpeg[..2], &[0xFF, 0xD8]);

        let decoded = Frame::from_jpeg(&sample.jpeg).unwrap();
        assert_eq!((decoded.width, decoded.height), (32, 24));
        assert_eq!(decoded.layout, PixelLayout::Rgb8);
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let frame = gradient(64, 64);
        let low = encode_jpeg(&frame, 20).unwrap();
        let high = encode_jpeg(&frame, 95).unwrap();
        assert!(low.jpeg.len() < high.jpeg.len());
    }
}
