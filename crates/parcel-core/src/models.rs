//! Data model shared by detection, extraction and the call bridge.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults::FALLBACK_MIME;
use crate::error::{Error, Result};

// =============================================================================
// CANONICAL TYPE
// =============================================================================

/// Normalized `family/subtype` content type, a `family/*` wildcard, or the
/// literal `directory` marker.
///
/// Parameters (`; charset=utf-8`) are stripped and the value is lowercased, so
/// two types compare equal whenever they name the same content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalType(String);

impl CanonicalType {
    /// Marker used for directory results.
    pub const DIRECTORY: &'static str = "directory";

    /// Parse and normalize a type string.
    ///
    /// Returns `None` unless the input is `directory` or a valid
    /// `family/subtype` (subtype may be `*`).
    pub fn parse(raw: &str) -> Option<Self> {
        let essence = raw.split(';').next().unwrap_or("").trim().to_lowercase();
        if essence == Self::DIRECTORY {
            return Some(Self(essence));
        }
        if is_valid_mime_type(&essence) {
            Some(Self(essence))
        } else {
            None
        }
    }

    /// Build from a string known to be valid (static tables, `infer` output).
    /// Invalid input degrades to `application/octet-stream`.
    pub fn from_static(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(Self::octet_stream)
    }

    /// The generic binary type.
    pub fn octet_stream() -> Self {
        Self(FALLBACK_MIME.to_string())
    }

    /// `text/plain`.
    pub fn plain_text() -> Self {
        Self("text/plain".to_string())
    }

    /// The directory marker.
    pub fn directory() -> Self {
        Self(Self::DIRECTORY.to_string())
    }

    /// Wildcard for a whole family, e.g. `image/*`.
    pub fn family_wildcard(family: &str) -> Self {
        Self(format!("{}/*", family.trim().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before `/` (or the whole marker for `directory`).
    pub fn family(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    /// The part after `/`, if any.
    pub fn subtype(&self) -> Option<&str> {
        self.0.split_once('/').map(|(_, sub)| sub)
    }

    pub fn is_wildcard(&self) -> bool {
        self.subtype() == Some("*")
    }

    pub fn is_directory(&self) -> bool {
        self.0 == Self::DIRECTORY
    }

    /// The `family/*` wildcard covering this type. `None` for the directory
    /// marker and for types that are already wildcards.
    pub fn wildcard(&self) -> Option<Self> {
        if self.is_directory() || self.is_wildcard() {
            return None;
        }
        Some(Self::family_wildcard(self.family()))
    }

    /// Whether callers should run the extraction pipeline for this type.
    pub fn should_extract(&self) -> bool {
        should_extract(self)
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CanonicalType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidInput(format!("Invalid content type: {}", s)))
    }
}

impl AsRef<str> for CanonicalType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Cheap advisory check: images are handled another way by callers, while
/// text, application and audio families go through the pipeline.
pub fn should_extract(file_type: &CanonicalType) -> bool {
    matches!(file_type.family(), "text" | "application" | "audio")
}

/// Validate MIME type format per RFC 2045 (type/subtype).
///
/// Returns `true` if the format is valid: exactly one `/`, both parts non-empty,
/// no whitespace, and only printable ASCII characters. A subtype of `*` is
/// accepted for family wildcards.
pub fn is_valid_mime_type(mime: &str) -> bool {
    let parts: Vec<&str> = mime.split('/').collect();
    if parts.len() != 2 {
        return false;
    }
    let (media_type, subtype) = (parts[0], parts[1]);
    if media_type.is_empty() || subtype.is_empty() {
        return false;
    }
    let is_token_char = |c: char| -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '!' | '#' | '$' | '&' | '-' | '^' | '_' | '.' | '+')
    };
    media_type.chars().all(is_token_char) && (subtype == "*" || subtype.chars().all(is_token_char))
}

// =============================================================================
// FILE METADATA
// =============================================================================

/// Filesystem facts about an attachment, derived once per extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// File or directory name (no parent components).
    pub name: String,
    /// Size in bytes. For directories, the total of the files visited.
    pub size: u64,
    /// Human description of the kind, e.g. "PNG image".
    pub kind: String,
    /// Creation time; falls back to modification time where the filesystem
    /// does not record birth time.
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl FileMetadata {
    /// Build from a `std::fs::Metadata` stat result.
    pub fn from_fs(name: impl Into<String>, kind: impl Into<String>, meta: &std::fs::Metadata) -> Self {
        let modified_at = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let created_at = meta
            .created()
            .map(DateTime::<Utc>::from)
            .unwrap_or(modified_at);

        Self {
            name: name.into(),
            size: meta.len(),
            kind: kind.into(),
            created_at,
            modified_at,
        }
    }

    /// Build from raw timestamps (used by the directory extractor and tests).
    pub fn new(
        name: impl Into<String>,
        size: u64,
        kind: impl Into<String>,
        created: SystemTime,
        modified: SystemTime,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            kind: kind.into(),
            created_at: created.into(),
            modified_at: modified.into(),
        }
    }
}

// =============================================================================
// EXTRACTION RESULT
// =============================================================================

/// The pipeline's output record, serialized by the call bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Display name of the attachment.
    pub name: String,
    /// Estimated token cost of `content`.
    pub tokens: usize,
    /// Source path.
    pub path: PathBuf,
    /// Resolved content type.
    #[serde(rename = "type")]
    pub file_type: CanonicalType,
    /// Filesystem metadata; `None` when stat failed during extraction.
    pub metadata: Option<FileMetadata>,
    /// Text (or image data URI) for the model. Empty when nothing was extracted.
    pub content: String,
    /// Thumbnail data URI for image attachments.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub thumbnail: Option<String>,
}

impl ExtractionResult {
    /// Whether extraction produced anything for the model.
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

// =============================================================================
// STAGE PAYLOAD
// =============================================================================

/// Raw attachment content handed over by the call bridge instead of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagePayload {
    /// Bytes written to disk unchanged.
    Bytes(Vec<u8>),
    /// A `data:` URI (base64 or raw) or plain text.
    Text(String),
}

impl StagePayload {
    pub fn is_data_uri(&self) -> bool {
        matches!(self, Self::Text(s) if s.starts_with("data:"))
    }
}

impl From<Vec<u8>> for StagePayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for StagePayload {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<String> for StagePayload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for StagePayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_params() {
        let ty = CanonicalType::parse(" Text/Plain; charset=UTF-8 ").unwrap();
        assert_eq!(ty.as_str(), "text/plain");
        assert_eq!(ty.family(), "text");
        assert_eq!(ty.subtype(), Some("plain"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CanonicalType::parse("").is_none());
        assert!(CanonicalType::parse("plain").is_none());
        assert!(CanonicalType::parse("a/b/c").is_none());
        assert!(CanonicalType::parse("text/ plain").is_none());
    }

    #[test]
    fn test_directory_marker() {
        let ty = CanonicalType::parse("directory").unwrap();
        assert!(ty.is_directory());
        assert_eq!(ty, CanonicalType::directory());
        assert!(ty.wildcard().is_none());
        assert!(ty.subtype().is_none());
    }

    #[test]
    fn test_wildcard() {
        let ty = CanonicalType::from_static("image/png");
        let wild = ty.wildcard().unwrap();
        assert_eq!(wild.as_str(), "image/*");
        assert!(wild.is_wildcard());
        assert!(wild.wildcard().is_none());
        assert_eq!(CanonicalType::parse("image/*").unwrap(), wild);
    }

    #[test]
    fn test_from_static_degrades() {
        assert_eq!(
            CanonicalType::from_static("not a type"),
            CanonicalType::octet_stream()
        );
    }

    #[test]
    fn test_from_str_error() {
        assert!("nope".parse::<CanonicalType>().is_err());
        assert_eq!(
            "text/csv".parse::<CanonicalType>().unwrap().as_str(),
            "text/csv"
        );
    }

    #[test]
    fn test_should_extract() {
        assert!(!should_extract(&CanonicalType::from_static("image/png")));
        assert!(should_extract(&CanonicalType::from_static("text/plain")));
        assert!(should_extract(&CanonicalType::from_static("application/pdf")));
        assert!(should_extract(&CanonicalType::from_static("audio/mpeg")));
        assert!(!should_extract(&CanonicalType::from_static("video/mp4")));
        assert!(!CanonicalType::directory().should_extract());
    }

    #[test]
    fn test_valid_mime_type() {
        assert!(is_valid_mime_type("application/vnd.ms-excel"));
        assert!(is_valid_mime_type("image/svg+xml"));
        assert!(is_valid_mime_type("text/*"));
        assert!(!is_valid_mime_type("*/*x"));
        assert!(!is_valid_mime_type("/plain"));
    }

    #[test]
    fn test_extraction_result_serializes_type_field() {
        let result = ExtractionResult {
            name: "a.txt".into(),
            tokens: 2,
            path: PathBuf::from("/tmp/a.txt"),
            file_type: CanonicalType::plain_text(),
            metadata: None,
            content: "Hello".into(),
            thumbnail: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "text/plain");
        assert_eq!(json["content"], "Hello");
        assert!(json.get("thumbnail").is_none());
        assert!(json["metadata"].is_null());

        let back: ExtractionResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_stage_payload_conversions() {
        assert!(StagePayload::from("data:text/plain;base64,SGVsbG8=").is_data_uri());
        assert!(!StagePayload::from("plain words").is_data_uri());
        assert!(!StagePayload::from(b"data:".as_slice()).is_data_uri());
    }

    #[test]
    fn test_file_metadata_from_fs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, b"12345").unwrap();
        let meta = std::fs::metadata(&path).unwrap();

        let fm = FileMetadata::from_fs("note.txt", "Plain text document", &meta);
        assert_eq!(fm.size, 5);
        assert_eq!(fm.name, "note.txt");
        assert!(fm.created_at <= fm.modified_at + chrono::Duration::seconds(1));
    }
}
