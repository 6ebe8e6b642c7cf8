//! Extractor variants.
//!
//! The variant set is closed, so extractors are a plain enum dispatched by
//! `match` rather than trait objects. Every variant shares the same lifecycle:
//! metadata first (cached on the [`ExtractionContext`]), then model content,
//! then an optional thumbnail. None of these steps fail: degradation is
//! reported as [`ModelInput::Empty`] or `None`.

pub mod audio;
pub mod csv;
pub mod directory;
pub mod document;
pub mod image;
mod office;
pub mod presentation;
pub mod spreadsheet;
pub mod text;
pub mod unsupported;

use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;
use tracing::{error, warn};

use parcel_core::{
    describe_kind, estimate_image_tokens, known_kind, CanonicalType, FileMetadata, PipelineConfig,
    TokenEstimator, TypeDetector,
};

/// The extractor families the registry can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    Text,
    Code,
    Csv,
    Spreadsheet,
    Document,
    Presentation,
    Image,
    Audio,
    Directory,
    Unsupported,
}

impl ExtractorKind {
    /// Stable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Code => "code",
            Self::Csv => "csv",
            Self::Spreadsheet => "spreadsheet",
            Self::Document => "document",
            Self::Presentation => "presentation",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Directory => "directory",
            Self::Unsupported => "unsupported",
        }
    }

    /// Human kind description for metadata.
    ///
    /// Code and Text share extraction and differ only here.
    pub fn describe(&self, file_type: &CanonicalType) -> String {
        match self {
            Self::Code => known_kind(file_type).unwrap_or("Source code").to_string(),
            Self::Directory => "Folder".to_string(),
            _ => describe_kind(file_type),
        }
    }

    /// Stat the source once and cache the result on the context.
    ///
    /// A failed stat is logged and yields `None`; it never fails the request.
    pub async fn collect_metadata(
        &self,
        ctx: &ExtractionContext,
        config: &PipelineConfig,
    ) -> Option<FileMetadata> {
        ctx.metadata
            .get_or_init(|| async {
                match self {
                    Self::Directory => directory::collect_metadata(ctx, config).await,
                    _ => stat_metadata(ctx, self.describe(&ctx.file_type_or_default())).await,
                }
            })
            .await
            .clone()
    }

    /// Run the variant-specific extraction.
    pub async fn extract_for_model(
        &self,
        ctx: &ExtractionContext,
        config: &PipelineConfig,
    ) -> ModelInput {
        let file_type = ctx.file_type_or_default();
        match self {
            Self::Text | Self::Code => text::extract(ctx.path(), config).await,
            Self::Csv => csv::extract(ctx.path(), &file_type, config).await,
            Self::Spreadsheet => spreadsheet::extract(ctx.path(), &file_type, config).await,
            Self::Document => document::extract(ctx.path(), &file_type, config).await,
            Self::Presentation => presentation::extract(ctx.path(), &file_type, config).await,
            Self::Image => image::extract(ctx.path(), config).await,
            Self::Audio => audio::extract(ctx.path()),
            Self::Directory => ModelInput::Empty,
            Self::Unsupported => unsupported::extract(ctx.path(), &file_type),
        }
    }

    /// Encoded thumbnail, for variants that can produce one.
    pub async fn thumbnail(&self, ctx: &ExtractionContext, config: &PipelineConfig) -> Option<String> {
        match self {
            Self::Image => image::thumbnail(ctx.path(), config).await,
            _ => None,
        }
    }
}

impl std::fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What an extractor hands back for the model prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelInput {
    /// Extracted text, verbatim or rendered.
    Text(String),
    /// A re-encoded image. `data_uri` is `None` when the source was too large
    /// to include; the dimensions are then the original ones.
    Image {
        data_uri: Option<String>,
        width: u32,
        height: u32,
    },
    /// Placeholder standing in for audio content.
    Audio { placeholder: String },
    /// Nothing usable.
    Empty,
}

impl ModelInput {
    /// Token cost of this input. Images are priced by area, everything else
    /// by its text.
    pub fn estimate_tokens(&self, estimator: &TokenEstimator) -> usize {
        match self {
            Self::Text(text) => estimator.estimate(text),
            Self::Image { width, height, .. } => estimate_image_tokens(*width, *height),
            Self::Audio { placeholder } => estimator.estimate(placeholder),
            Self::Empty => 0,
        }
    }

    /// The string stored in the result's `content` field.
    pub fn into_content(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Image { data_uri, .. } => data_uri.unwrap_or_default(),
            Self::Audio { placeholder } => placeholder,
            Self::Empty => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Image { data_uri, .. } => data_uri.is_none(),
            Self::Audio { placeholder } => placeholder.is_empty(),
            Self::Empty => true,
        }
    }
}

/// Per-request state. Holds the resolved type and metadata so neither is
/// computed twice for one extraction.
#[derive(Debug)]
pub struct ExtractionContext {
    path: PathBuf,
    type_hint: Option<CanonicalType>,
    file_type: OnceCell<CanonicalType>,
    metadata: OnceCell<Option<FileMetadata>>,
}

impl ExtractionContext {
    pub fn new(path: impl Into<PathBuf>, type_hint: Option<CanonicalType>) -> Self {
        Self {
            path: path.into(),
            type_hint,
            file_type: OnceCell::new(),
            metadata: OnceCell::new(),
        }
    }

    /// Context with the type already fixed (directory requests).
    pub fn with_type(path: impl Into<PathBuf>, file_type: CanonicalType) -> Self {
        let ctx = Self::new(path, None);
        let _ = ctx.file_type.set(file_type);
        ctx
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display name: the last path component.
    pub fn name(&self) -> String {
        display_name(&self.path)
    }

    pub fn type_hint(&self) -> Option<&CanonicalType> {
        self.type_hint.as_ref()
    }

    /// The resolved type, if resolution already ran.
    pub fn file_type(&self) -> Option<&CanonicalType> {
        self.file_type.get()
    }

    fn file_type_or_default(&self) -> CanonicalType {
        self.file_type().cloned().unwrap_or_else(CanonicalType::octet_stream)
    }

    /// Resolve the type once: the caller's hint wins over detection.
    pub async fn resolve_type(&self, detector: &TypeDetector) -> &CanonicalType {
        self.file_type
            .get_or_init(|| async {
                match &self.type_hint {
                    Some(hint) => hint.clone(),
                    None => detector.detect(&self.path).await,
                }
            })
            .await
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn stat_metadata(ctx: &ExtractionContext, kind: String) -> Option<FileMetadata> {
    match tokio::fs::metadata(ctx.path()).await {
        Ok(meta) => Some(FileMetadata::from_fs(ctx.name(), kind, &meta)),
        Err(e) => {
            error!(file = %ctx.name(), error = %e, "Failed to collect file metadata");
            None
        }
    }
}

/// Read a whole file if it is within `max_bytes`. Oversized or unreadable
/// sources yield `None`.
pub(crate) async fn read_bounded(path: &Path, max_bytes: u64) -> Option<Vec<u8>> {
    let file = display_name(path);
    let size = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            error!(file = %file, error = %e, "Failed to stat source");
            return None;
        }
    };
    if size > max_bytes {
        warn!(file = %file, size, limit = max_bytes, "Source exceeds size ceiling, skipping content");
        return None;
    }
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            error!(file = %file, error = %e, "Failed to read source");
            None
        }
    }
}

/// Cut `text` to at most `max_bytes` bytes on a char boundary.
pub(crate) fn truncate_to_bytes(mut text: String, max_bytes: u64) -> String {
    let max = usize::try_from(max_bytes).unwrap_or(usize::MAX);
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text
}

/// Wrap rendered text, mapping an empty rendering to [`ModelInput::Empty`].
pub(crate) fn text_or_empty(text: String) -> ModelInput {
    if text.trim().is_empty() {
        ModelInput::Empty
    } else {
        ModelInput::Text(text)
    }
}
