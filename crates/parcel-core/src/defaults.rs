//! Centralized default constants for the parcel attachment pipeline.
//!
//! **This module is the single source of truth** for all shared default values.
//! `PipelineConfig` starts from these and lets the environment override them.

// =============================================================================
// SIZE CEILINGS
// =============================================================================

/// Maximum source size for text, code, tabular and document extraction.
pub const TEXT_EXTRACTION_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum source size for an image to be included in a model prompt.
pub const IMAGE_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum source size for an image to be decoded for a thumbnail.
pub const THUMBNAIL_MAX_BYTES: u64 = 50 * 1024 * 1024;

/// Maximum inflated size of a single member of a zip-packaged office file.
pub const ARCHIVE_ENTRY_MAX_BYTES: u64 = 32 * 1024 * 1024;

/// Highest zero-based spreadsheet column index (`XFD`).
pub const SPREADSHEET_MAX_COLUMN: usize = 16_383;

// =============================================================================
// IMAGE ENCODING
// =============================================================================

/// Bounding box (both axes, pixels) for images sent to a model.
pub const IMAGE_MAX_DIMENSION: u32 = 2048;

/// Bounding box (both axes, pixels) for thumbnails.
pub const THUMBNAIL_MAX_DIMENSION: u32 = 256;

/// JPEG quality used for every re-encoded image.
pub const IMAGE_JPEG_QUALITY: u8 = 85;

/// Pixels per token for vision inputs.
pub const IMAGE_PIXELS_PER_TOKEN: f64 = 750.0;

// =============================================================================
// TOKENS
// =============================================================================

/// Characters per token for the heuristic estimator.
pub const CHARS_PER_TOKEN: f32 = 3.7;

// =============================================================================
// DETECTION
// =============================================================================

/// Bytes read by the byte sniffer.
pub const SNIFF_SAMPLE_BYTES: usize = 1024;

/// Fraction of suspicious bytes above which a sample is binary.
pub const SNIFF_SUSPICIOUS_RATIO: f64 = 0.10;

/// Bytes read for container signature matching.
pub const SIGNATURE_SAMPLE_BYTES: usize = 8192;

/// Type assigned when nothing else matches.
pub const FALLBACK_MIME: &str = "application/octet-stream";

// =============================================================================
// STAGING
// =============================================================================

/// Directory name (under the OS temp dir) for staged payloads.
pub const TEMP_DIR_NAME: &str = "parcel-staging";

/// Delay before a staged file is deleted.
pub const TEMP_CLEANUP_DELAY_SECS: u64 = 30 * 60;

/// Extension given to staged files whose name has none.
pub const TEMP_DEFAULT_EXTENSION: &str = "tmp";

/// Maximum staged filename length.
pub const FILENAME_MAX_LENGTH: usize = 255;

// =============================================================================
// ORCHESTRATION
// =============================================================================

/// Maximum extractions running at once.
pub const MAX_CONCURRENT_EXTRACTIONS: usize = 4;

/// Maximum directory depth walked by the directory extractor.
pub const DIRECTORY_MAX_DEPTH: usize = 8;

/// Maximum entries visited by the directory extractor.
pub const DIRECTORY_MAX_ENTRIES: usize = 10_000;
