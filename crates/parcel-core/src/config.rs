//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

/// Which token counter backs text estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCounter {
    /// Characters-per-token ratio. Cheap, monotonic.
    #[default]
    Heuristic,
    /// cl100k BPE via tiktoken.
    Cl100k,
}

impl std::str::FromStr for TokenCounter {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "heuristic" | "estimate" => Ok(Self::Heuristic),
            "cl100k" | "cl100k_base" | "tiktoken" => Ok(Self::Cl100k),
            _ => Err(format!("Invalid token counter: {}", s)),
        }
    }
}

/// Configuration for the extraction pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Size ceiling for text, code, tabular and document sources.
    pub text_max_bytes: u64,
    /// Size ceiling above which an image is left out of the prompt.
    pub image_max_bytes: u64,
    /// Size ceiling above which no thumbnail is attempted.
    pub thumbnail_max_bytes: u64,
    /// Inflated size ceiling for one member of a zip-packaged office file.
    pub archive_entry_max_bytes: u64,
    /// Bounding box for model images.
    pub image_max_dimension: u32,
    /// Bounding box for thumbnails.
    pub thumbnail_max_dimension: u32,
    /// JPEG quality (1-100) for re-encoded images.
    pub jpeg_quality: u8,
    /// Directory that receives staged payloads.
    pub temp_dir: PathBuf,
    /// Delay before a staged payload is removed.
    pub cleanup_delay: Duration,
    /// Maximum extractions running at once.
    pub max_concurrent_extractions: usize,
    /// Directory traversal depth bound.
    pub directory_max_depth: usize,
    /// Directory traversal entry bound.
    pub directory_max_entries: usize,
    /// Token counter for text content.
    pub token_counter: TokenCounter,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            text_max_bytes: defaults::TEXT_EXTRACTION_MAX_BYTES,
            image_max_bytes: defaults::IMAGE_MAX_BYTES,
            thumbnail_max_bytes: defaults::THUMBNAIL_MAX_BYTES,
            archive_entry_max_bytes: defaults::ARCHIVE_ENTRY_MAX_BYTES,
            image_max_dimension: defaults::IMAGE_MAX_DIMENSION,
            thumbnail_max_dimension: defaults::THUMBNAIL_MAX_DIMENSION,
            jpeg_quality: defaults::IMAGE_JPEG_QUALITY,
            temp_dir: std::env::temp_dir().join(defaults::TEMP_DIR_NAME),
            cleanup_delay: Duration::from_secs(defaults::TEMP_CLEANUP_DELAY_SECS),
            max_concurrent_extractions: defaults::MAX_CONCURRENT_EXTRACTIONS,
            directory_max_depth: defaults::DIRECTORY_MAX_DEPTH,
            directory_max_entries: defaults::DIRECTORY_MAX_ENTRIES,
            token_counter: TokenCounter::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `PARCEL_TEXT_MAX_BYTES` | `10485760` | Text/document size ceiling |
    /// | `PARCEL_IMAGE_MAX_BYTES` | `10485760` | Image prompt-inclusion ceiling |
    /// | `PARCEL_THUMBNAIL_MAX_BYTES` | `52428800` | Thumbnail decode ceiling |
    /// | `PARCEL_ARCHIVE_ENTRY_MAX_BYTES` | `33554432` | Inflated office member ceiling |
    /// | `PARCEL_IMAGE_MAX_DIMENSION` | `2048` | Model image bounding box |
    /// | `PARCEL_THUMBNAIL_MAX_DIMENSION` | `256` | Thumbnail bounding box |
    /// | `PARCEL_JPEG_QUALITY` | `85` | Re-encode quality |
    /// | `PARCEL_TEMP_DIR` | `$TMPDIR/parcel-staging` | Staging directory |
    /// | `PARCEL_CLEANUP_DELAY_SECS` | `1800` | Staged file lifetime |
    /// | `PARCEL_MAX_CONCURRENT` | `4` | Concurrent extractions |
    /// | `PARCEL_DIRECTORY_MAX_DEPTH` | `8` | Directory walk depth |
    /// | `PARCEL_DIRECTORY_MAX_ENTRIES` | `10000` | Directory walk entries |
    /// | `PARCEL_TOKEN_COUNTER` | `heuristic` | `heuristic` or `cl100k` |
    ///
    /// # Errors
    /// Returns `Config` if a variable is set but is not a valid value for its
    /// setting.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Unset or blank keys keep
    /// their default; anything else must parse and fit its setting.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str| -> Result<Option<u64>> {
            get(key)
                .map(|v| {
                    v.parse::<u64>().map_err(|_| {
                        Error::Config(format!("{} must be a non-negative integer, got {:?}", key, v))
                    })
                })
                .transpose()
        };
        let dimension = |key: &str| -> Result<Option<u32>> {
            number(key)?
                .map(|v| fit::<u32>(key, v).map(|px| px.max(1)))
                .transpose()
        };
        let count = |key: &str| -> Result<Option<usize>> {
            number(key)?.map(|v| fit::<usize>(key, v)).transpose()
        };

        let token_counter = get("PARCEL_TOKEN_COUNTER")
            .map(|v| {
                v.parse::<TokenCounter>()
                    .map_err(|e| Error::Config(format!("PARCEL_TOKEN_COUNTER: {}", e)))
            })
            .transpose()?
            .unwrap_or(base.token_counter);

        Ok(Self {
            text_max_bytes: number("PARCEL_TEXT_MAX_BYTES")?.unwrap_or(base.text_max_bytes),
            image_max_bytes: number("PARCEL_IMAGE_MAX_BYTES")?.unwrap_or(base.image_max_bytes),
            thumbnail_max_bytes: number("PARCEL_THUMBNAIL_MAX_BYTES")?
                .unwrap_or(base.thumbnail_max_bytes),
            archive_entry_max_bytes: number("PARCEL_ARCHIVE_ENTRY_MAX_BYTES")?
                .unwrap_or(base.archive_entry_max_bytes),
            image_max_dimension: dimension("PARCEL_IMAGE_MAX_DIMENSION")?
                .unwrap_or(base.image_max_dimension),
            thumbnail_max_dimension: dimension("PARCEL_THUMBNAIL_MAX_DIMENSION")?
                .unwrap_or(base.thumbnail_max_dimension),
            // out-of-range quality clamps to 1..=100
            jpeg_quality: number("PARCEL_JPEG_QUALITY")?
                .map(|q| q.clamp(1, 100) as u8)
                .unwrap_or(base.jpeg_quality),
            temp_dir: get("PARCEL_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(base.temp_dir),
            cleanup_delay: number("PARCEL_CLEANUP_DELAY_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(base.cleanup_delay),
            max_concurrent_extractions: count("PARCEL_MAX_CONCURRENT")?
                .map(|v| v.max(1))
                .unwrap_or(base.max_concurrent_extractions),
            directory_max_depth: count("PARCEL_DIRECTORY_MAX_DEPTH")?
                .unwrap_or(base.directory_max_depth),
            directory_max_entries: count("PARCEL_DIRECTORY_MAX_ENTRIES")?
                .map(|v| v.max(1))
                .unwrap_or(base.directory_max_entries),
            token_counter,
        })
    }

    /// Set the staging directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Set the text/document size ceiling.
    pub fn with_text_max_bytes(mut self, bytes: u64) -> Self {
        self.text_max_bytes = bytes;
        self
    }

    /// Set the image prompt-inclusion ceiling.
    pub fn with_image_max_bytes(mut self, bytes: u64) -> Self {
        self.image_max_bytes = bytes;
        self
    }

    /// Set the inflated size ceiling for office archive members.
    pub fn with_archive_entry_max_bytes(mut self, bytes: u64) -> Self {
        self.archive_entry_max_bytes = bytes;
        self
    }

    /// Set the model image bounding box.
    pub fn with_image_max_dimension(mut self, px: u32) -> Self {
        self.image_max_dimension = px.max(1);
        self
    }

    /// Set the thumbnail bounding box.
    pub fn with_thumbnail_max_dimension(mut self, px: u32) -> Self {
        self.thumbnail_max_dimension = px.max(1);
        self
    }

    /// Set the staged file lifetime.
    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    /// Set maximum concurrent extractions.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_extractions = max.max(1);
        self
    }

    /// Set directory traversal bounds.
    pub fn with_directory_bounds(mut self, max_depth: usize, max_entries: usize) -> Self {
        self.directory_max_depth = max_depth;
        self.directory_max_entries = max_entries.max(1);
        self
    }

    /// Select the token counter.
    pub fn with_token_counter(mut self, counter: TokenCounter) -> Self {
        self.token_counter = counter;
        self
    }
}

fn fit<T: TryFrom<u64>>(key: &str, value: u64) -> Result<T> {
    T::try_from(value).map_err(|_| Error::Config(format!("{} is out of range: {}", key, value)))
}
