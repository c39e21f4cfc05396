//! JPEG compressor - re-encodes source images at a fixed quality
//!
//! Decoding and encoding are CPU bound, so the async entry point runs them
//! on the blocking pool.

use crate::error::{AppError, Result};
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Default JPEG quality factor
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// JPEG compressor
#[derive(Debug, Clone)]
pub struct JpegCompressor {
    quality: u8,
}

impl Default for JpegCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl JpegCompressor {
    /// Quality is clamped to 1..=100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Decode any supported format and re-encode as JPEG (blocking)
    ///
    /// **Note:** Call `compress_async` from async code.
    pub fn compress(&self, original: &[u8]) -> Result<Bytes> {
        let img = image::load_from_memory(original)
            .map_err(|e| AppError::Internal(format!("Failed to decode image: {e}")))?;

        let (width, height) = img.dimensions();

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

        let mut buf = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Jpeg(self.quality))
            .map_err(|e| AppError::Internal(format!("Failed to encode JPEG: {e}")))?;

        debug!(
            width,
            height,
            original_size = original.len(),
            compressed_size = buf.len(),
            "Image compressed"
        );

        Ok(Bytes::from(buf))
    }

    /// Compress on a blocking thread
    pub async fn compress_async(self: Arc<Self>, original: Bytes) -> Result<Bytes> {
        tokio::task::spawn_blocking(move || self.compress(&original))
            .await
            .map_err(|e| AppError::Internal(format!("Compression task panicked: {e}")))?
    }
}
