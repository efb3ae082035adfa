use image::{DynamicImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::ImageId;

/// Pixel layouts a capture surface can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Single 8-bit intensity channel.
    R8,
    Rgb24,
    Rgba32,
}

impl PixelFormat {
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba32 => 4,
        }
    }

    #[inline]
    pub fn is_single_channel(self) -> bool {
        matches!(self, PixelFormat::R8)
    }
}

/// Image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A photo read back from the capture surface.
#[derive(Clone, Debug)]
pub struct CapturedImage {
    pub id: ImageId,
    pub size: PixelSize,
    pub format: PixelFormat,
    pub data: Vec<u8>, // row-major, len = w*h*bpp
}

impl CapturedImage {
    /// Wrap a raw frame, assigning it a fresh identifier.
    pub fn new(size: PixelSize, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            id: ImageId::generate(),
            size,
            format,
            data,
        }
    }

    #[inline]
    pub fn expected_len(&self) -> usize {
        self.size.pixel_count() * self.format.bytes_per_pixel()
    }
}

/// Single-channel intensity image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub size: PixelSize,
    pub data: Vec<u8>, // row-major, len = w*h
}

/// Errors from pixel format conversion.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConvertError {
    #[error("invalid pixel buffer length (expected {expected} bytes, got {got})")]
    InvalidBufferLength { expected: usize, got: usize },
}

/// Convert a captured image to an 8-bit luminance buffer.
///
/// `R8` input is copied as-is; colour input is reduced with the `image`
/// crate's luma weights (alpha is ignored).
pub fn to_grayscale(src: &CapturedImage) -> Result<GrayImage, ConvertError> {
    let expected = src.expected_len();
    if src.data.len() != expected {
        return Err(ConvertError::InvalidBufferLength {
            expected,
            got: src.data.len(),
        });
    }

    let PixelSize { width, height } = src.size;
    let invalid = || ConvertError::InvalidBufferLength {
        expected,
        got: src.data.len(),
    };
    let data = match src.format {
        PixelFormat::R8 => src.data.clone(),
        PixelFormat::Rgb24 => {
            let rgb = RgbImage::from_raw(width, height, src.data.clone()).ok_or_else(invalid)?;
            DynamicImage::ImageRgb8(rgb).to_luma8().into_raw()
        }
        PixelFormat::Rgba32 => {
            let rgba = RgbaImage::from_raw(width, height, src.data.clone()).ok_or_else(invalid)?;
            DynamicImage::ImageRgba8(rgba).to_luma8().into_raw()
        }
    };

    Ok(GrayImage {
        size: src.size,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_input_is_copied() {
        let img = CapturedImage::new(PixelSize::new(2, 2), PixelFormat::R8, vec![0, 64, 128, 255]);
        let gray = to_grayscale(&img).unwrap();
        assert_eq!(gray.data, vec![0, 64, 128, 255]);
        assert_eq!(gray.size, img.size);
    }

    #[test]
    fn rgb_white_and_black_map_to_extremes() {
        let img = CapturedImage::new(
            PixelSize::new(2, 1),
            PixelFormat::Rgb24,
            vec![255, 255, 255, 0, 0, 0],
        );
        let gray = to_grayscale(&img).unwrap();
        assert_eq!(gray.data, vec![255, 0]);
    }

    #[test]
    fn rgba_ignores_alpha() {
        let img = CapturedImage::new(
            PixelSize::new(1, 1),
            PixelFormat::Rgba32,
            vec![255, 255, 255, 0],
        );
        assert_eq!(to_grayscale(&img).unwrap().data, vec![255]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let img = CapturedImage::new(PixelSize::new(4, 4), PixelFormat::Rgb24, vec![0; 10]);
        assert_eq!(
            to_grayscale(&img),
            Err(ConvertError::InvalidBufferLength {
                expected: 48,
                got: 10
            })
        );
    }
}
