use super::ReferenceImage;
use crate::ai::mime::detect_image_mime;
use crate::{Error, Result};
use base64::Engine as _;
use image::ImageFormat;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Longest side, in pixels, a reference image is sent at.
pub const MAX_REFERENCE_DIMENSION: u32 = 2048;

pub struct ReferenceImageProcessor {
    max_dimension: u32,
}

impl Default for ReferenceImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceImageProcessor {
    pub fn new() -> Self {
        Self::with_max_dimension(MAX_REFERENCE_DIMENSION)
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    /// Decodes and, if needed, downsizes one image. Returns the bytes to send
    /// and their MIME type.
    fn prepare_sync(bytes: Vec<u8>, max_dimension: u32) -> Result<(Vec<u8>, &'static str)> {
        let img = image::load_from_memory(&bytes)?;

        if img.width() <= max_dimension && img.height() <= max_dimension {
            let mime_type = detect_image_mime(&bytes);
            return Ok((bytes, mime_type));
        }

        tracing::debug!(
            "Downscaling reference image from {}x{} to fit {}px",
            img.width(),
            img.height(),
            max_dimension
        );
        let resized = img.resize(
            max_dimension,
            max_dimension,
            image::imageops::FilterType::Lanczos3,
        );
        let mut out = Vec::new();
        resized.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        Ok((out, "image/png"))
    }

    /// Loads one reference image. Any read or decode failure is a
    /// [`Error::Validation`] naming the file.
    pub async fn prepare(&self, path: &Path) -> Result<ReferenceImage> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            Error::Validation(format!("Failed to read reference image {}: {}", path.display(), e))
        })?;

        let max_dimension = self.max_dimension;
        let (bytes, mime_type) =
            tokio::task::spawn_blocking(move || Self::prepare_sync(bytes, max_dimension))
                .await
                .map_err(|e| Error::Invariant(format!("Image processing task join error: {}", e)))?
                .map_err(|e| {
                    Error::Validation(format!(
                        "Failed to process reference image {}: {}",
                        path.display(),
                        e
                    ))
                })?;

        Ok(ReferenceImage {
            source: path.to_path_buf(),
            mime_type: mime_type.to_string(),
            data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }

    /// Loads every reference image in order, stopping at the first failure.
    pub async fn prepare_all(&self, paths: &[PathBuf]) -> Result<Vec<ReferenceImage>> {
        let mut images = Vec::with_capacity(paths.len());
        for path in paths {
            images.push(self.prepare(path).await?);
        }
        Ok(images)
    }
}
