//! Image extraction.
//!
//! Images are decoded, turned upright from their EXIF orientation, fit inside
//! a bounding box (never upscaled), flattened to RGB and re-encoded as JPEG.
//! The model gets a base64 data URI. Sources above the inclusion ceiling
//! contribute only their dimensions; thumbnails have their own ceiling and are
//! always attempted.

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use exif::{In, Reader as ExifReader, Tag};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use tracing::{debug, error, warn};

use parcel_core::PipelineConfig;

use super::{display_name, ModelInput};

/// A re-encoded image ready for a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

pub async fn extract(path: &Path, config: &PipelineConfig) -> ModelInput {
    let file = display_name(path);
    let size = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            error!(file = %file, error = %e, "Failed to stat image");
            return ModelInput::Empty;
        }
    };

    let owned = path.to_path_buf();
    if size > config.image_max_bytes {
        warn!(file = %file, size, limit = config.image_max_bytes, "Image exceeds size ceiling, leaving it out of the prompt");
        return match blocking(move || read_dimensions(&owned)).await {
            Some((width, height)) => ModelInput::Image {
                data_uri: None,
                width,
                height,
            },
            None => ModelInput::Empty,
        };
    }

    let max_dimension = config.image_max_dimension;
    let quality = config.jpeg_quality;
    match blocking(move || encode_file(&owned, max_dimension, quality)).await {
        Some(encoded) => {
            debug!(file = %file, width = encoded.width, height = encoded.height, "Image re-encoded");
            ModelInput::Image {
                data_uri: Some(encoded.data_uri),
                width: encoded.width,
                height: encoded.height,
            }
        }
        None => ModelInput::Empty,
    }
}

/// Thumbnail data URI, skipped above the thumbnail ceiling.
pub async fn thumbnail(path: &Path, config: &PipelineConfig) -> Option<String> {
    let file = display_name(path);
    let size = tokio::fs::metadata(path).await.ok()?.len();
    if size > config.thumbnail_max_bytes {
        debug!(file = %file, size, "Image too large for thumbnail");
        return None;
    }
    let owned = path.to_path_buf();
    let max_dimension = config.thumbnail_max_dimension;
    let quality = config.jpeg_quality;
    blocking(move || encode_file(&owned, max_dimension, quality))
        .await
        .map(|encoded| encoded.data_uri)
}

/// Run image work on the blocking pool. Failures are logged inside `f`;
/// a panicked task is logged here.
async fn blocking<T, F>(f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> Option<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Image task failed");
            None
        }
    }
}

fn encode_file(path: &Path, max_dimension: u32, quality: u8) -> Option<EncodedImage> {
    let file = display_name(path);
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(file = %file, error = %e, "Failed to read image");
            return None;
        }
    };
    match encode_bounded(&bytes, max_dimension, quality) {
        Ok(encoded) => Some(encoded),
        Err(e) => {
            warn!(file = %file, error = %e, "Failed to decode image");
            None
        }
    }
}

fn read_dimensions(path: &Path) -> Option<(u32, u32)> {
    let result = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| e.to_string())
        .and_then(|reader| reader.into_dimensions().map_err(|e| e.to_string()));
    match result {
        Ok(dims) => Some(dims),
        Err(e) => {
            warn!(file = %display_name(path), error = %e, "Failed to read image dimensions");
            None
        }
    }
}

/// Decode, orient, fit and re-encode an image held in memory.
pub fn encode_bounded(bytes: &[u8], max_dimension: u32, quality: u8) -> Result<EncodedImage, String> {
    let img = image::load_from_memory(bytes).map_err(|e| format!("Failed to load image: {e}"))?;
    let img = apply_orientation(img, exif_orientation(bytes));

    let (width, height) = img.dimensions();
    let (target_w, target_h) = fit_within(width, height, max_dimension);
    let img = if (target_w, target_h) == (width, height) {
        img
    } else {
        img.resize_exact(target_w, target_h, FilterType::Lanczos3)
    };

    let jpeg = encode_jpeg(&img, quality)?;
    Ok(EncodedImage {
        data_uri: format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg)),
        width: img.width(),
        height: img.height(),
    })
}

/// Largest size with the same aspect ratio that fits in `max x max`.
/// Images already inside the box keep their size.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = (max as f64 / width as f64).min(max as f64 / height as f64);
    let w = ((width as f64 * scale).round() as u32).clamp(1, max);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max);
    (w, h)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, String> {
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| format!("Failed to encode JPEG: {e}"))?;
    Ok(out)
}

/// EXIF orientation tag (1-8); 1 when absent.
fn exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    ExifReader::new()
        .read_from_container(&mut cursor)
        .ok()
        .and_then(|exif| {
            exif.get_field(Tag::Orientation, In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1)
}

fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
