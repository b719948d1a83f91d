//! Download packaging: normalize every thumbnail and zip them up.
//!
//! Models do not reliably honor the requested aspect ratio, so each image
//! is re-encoded at its variant's exact export resolution before it goes
//! into the archive. The archive is all-or-nothing: one bad image fails
//! the whole export instead of shipping a partial set.

use std::io::{Cursor, Write};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::generation::types::{AspectRatio, decode_data_uri};

const JPEG_QUALITY: u8 = 95;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no images to export")]
    Empty,

    #[error("failed to decode thumbnail {id}: {cause}")]
    Decode { id: u32, cause: String },

    #[error("failed to encode thumbnail {id}: {cause}")]
    Encode { id: u32, cause: String },

    #[error("failed to assemble archive: {0}")]
    Archive(String),

    #[error("export task failed: {0}")]
    Task(String),
}

/// One settled thumbnail queued for download.
#[derive(Debug, Clone)]
pub struct ExportImage {
    pub id: u32,
    pub aspect_ratio: AspectRatio,
    pub data_uri: String,
}

pub struct ExportPackager;

impl ExportPackager {
    pub fn new() -> Self {
        Self
    }

    /// Build the download archive and return its bytes. Runs on the
    /// blocking pool; resizing six images is pure CPU work.
    pub async fn package_all(&self, images: Vec<ExportImage>) -> Result<Vec<u8>, ExportError> {
        if images.is_empty() {
            return Err(ExportError::Empty);
        }
        info!(count = images.len(), "packaging thumbnails for download");

        tokio::task::spawn_blocking(move || build_archive(&images))
            .await
            .map_err(|e| ExportError::Task(e.to_string()))?
    }
}

impl Default for ExportPackager {
    fn default() -> Self {
        Self::new()
    }
}

fn build_archive(images: &[ExportImage]) -> Result<Vec<u8>, ExportError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for image in images {
        let jpeg = normalize(image)?;
        writer
            .start_file(entry_name(image), options)
            .map_err(|e| ExportError::Archive(e.to_string()))?;
        writer
            .write_all(&jpeg)
            .map_err(|e| ExportError::Archive(e.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| ExportError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Decode, force the variant's exact export resolution, and re-encode as
/// high-quality JPEG.
fn normalize(image: &ExportImage) -> Result<Vec<u8>, ExportError> {
    let bytes = decode_data_uri(&image.data_uri).map_err(|e| ExportError::Decode {
        id: image.id,
        cause: e.to_string(),
    })?;
    let decoded = image::load_from_memory(&bytes).map_err(|e| ExportError::Decode {
        id: image.id,
        cause: e.to_string(),
    })?;

    let (width, height) = image.aspect_ratio.export_dimensions();
    let resized = decoded.resize_exact(width, height, FilterType::Lanczos3);

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&resized.to_rgb8())
        .map_err(|e| ExportError::Encode {
            id: image.id,
            cause: e.to_string(),
        })?;
    Ok(jpeg)
}

fn entry_name(image: &ExportImage) -> String {
    format!("thumbnail-{}-{}.jpg", image.id, image.aspect_ratio.as_str())
}
