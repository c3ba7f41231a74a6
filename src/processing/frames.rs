//! Frame codec helpers: JPEG out, any supported format in.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageOutputFormat, RgbImage};

use crate::common::error::{FaceGateError, Result};

/// Decode a received payload into an RGB frame.
///
/// # Errors
/// - `MalformedFrame` if the bytes are not a decodable image
pub fn decompress(bytes: &[u8]) -> Result<RgbImage> {
    image::load_from_memory(bytes)
        .map(|image| image.to_rgb8())
        .map_err(|e| FaceGateError::MalformedFrame(format!("frame decoding failed: {}", e)))
}

/// JPEG-encode a frame at `quality` (1-100).
pub fn compress(frame: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut jpeg = Vec::new();
    DynamicImage::ImageRgb8(frame.clone())
        .write_to(
            &mut Cursor::new(&mut jpeg),
            ImageOutputFormat::Jpeg(quality.clamp(1, 100)),
        )
        .map_err(|e| FaceGateError::MalformedFrame(format!("frame encoding failed: {}", e)))?;
    Ok(jpeg)
}

/// Resize by `factor` on both axes, never below 1x1.
///
/// A factor of 1.0 (or more) returns an unscaled copy.
pub fn downscale(frame: &RgbImage, factor: f32) -> RgbImage {
    if factor >= 1.0 {
        return frame.clone();
    }
    let scaled = |v: u32| ((v as f32 * factor).round() as u32).max(1);
    imageops::resize(
        frame,
        scaled(frame.width()),
        scaled(frame.height()),
        FilterType::Triangle,
    )
}
