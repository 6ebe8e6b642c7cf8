//! Content type detection for attachments.
//!
//! Cascade, each step tried only if the previous produced no answer:
//! 1. Magic byte signature (images, PDF, archives, audio, office containers)
//! 2. Extension override for ambiguous extensions and generic containers
//! 3. Extension lookup
//! 4. Byte sniffer: `text/plain` or `application/octet-stream`
//!
//! Detection never consults the adapter registry and never fails.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::defaults::{SIGNATURE_SAMPLE_BYTES, SNIFF_SAMPLE_BYTES};
use crate::models::CanonicalType;
use crate::sniff::{read_prefix, sample_looks_like_text};

/// Extensions whose extension-based type always beats a signature match.
///
/// TypeScript sources share `.ts` with MPEG transport streams, and a source
/// file that happens to start with `G` can satisfy a transport-stream sniff.
const EXTENSION_OVERRIDES: &[&str] = &["ts", "tsx", "mts", "cts"];

/// Signatures matched on leading text (`#!`, `<?xml`, `<html`). They only
/// describe how a text file opens, so any known extension refines them.
const TEXTUAL_SIGNATURES: &[&str] = &["text/x-shellscript", "text/xml", "text/html", "application/xml"];

/// Signatures that only identify a container, not the format inside it.
/// When the extension names a format carried in that container, the extension
/// is more specific.
const GENERIC_CONTAINERS: &[(&str, &[&str])] = &[
    (
        "application/zip",
        &[
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            "application/vnd.oasis.opendocument.text",
            "application/vnd.oasis.opendocument.spreadsheet",
            "application/vnd.oasis.opendocument.presentation",
            "application/epub+zip",
        ],
    ),
    (
        "application/x-ole-storage",
        &[
            "application/msword",
            "application/vnd.ms-excel",
            "application/vnd.ms-powerpoint",
        ],
    ),
];

/// MPEG transport stream: 0x47 sync byte repeated every 188-byte packet.
fn is_mpeg_transport_stream(buf: &[u8]) -> bool {
    buf.len() > 188 && buf[0] == 0x47 && buf[188] == 0x47
}

/// Detects the canonical type of a file on disk.
pub struct TypeDetector {
    signatures: infer::Infer,
}

impl TypeDetector {
    pub fn new() -> Self {
        let mut signatures = infer::Infer::new();
        signatures.add("video/mp2t", "ts", is_mpeg_transport_stream);
        Self { signatures }
    }

    /// Detect the canonical type of `path`. Never fails: total failure
    /// degrades to `application/octet-stream`.
    pub async fn detect(&self, path: &Path) -> CanonicalType {
        let file = file_name(path);

        if let Ok(meta) = tokio::fs::metadata(path).await {
            if meta.is_dir() {
                debug!(file = %file, step = "stat", verdict = CanonicalType::DIRECTORY, "Detected directory");
                return CanonicalType::directory();
            }
        }

        let sample = match read_prefix(path, SIGNATURE_SAMPLE_BYTES).await {
            Ok(sample) => Some(sample),
            Err(e) => {
                debug!(file = %file, error = %e, "Could not read file prefix, skipping content sniffing");
                None
            }
        };

        if let Some(detected) = self.detect_from_name_and_prefix(&file, sample.as_deref().unwrap_or(&[])) {
            return detected;
        }

        // 4. Byte sniffer fallback
        let is_text = sample
            .as_deref()
            .map(|s| sample_looks_like_text(&s[..s.len().min(SNIFF_SAMPLE_BYTES)]))
            .unwrap_or(false);
        let verdict = if is_text {
            CanonicalType::plain_text()
        } else {
            CanonicalType::octet_stream()
        };
        debug!(file = %file, step = "sniff", verdict = %verdict, "Byte sniffer verdict");
        verdict
    }

    /// Steps 1-3 of the cascade over an in-memory prefix. Returns `None` when
    /// only the byte sniffer could decide.
    pub fn detect_from_name_and_prefix(&self, filename: &str, prefix: &[u8]) -> Option<CanonicalType> {
        // 1. Signature sniffing
        let signature = self
            .signatures
            .get(prefix)
            .map(|kind| CanonicalType::from_static(kind.mime_type()));
        debug!(
            file = %filename,
            step = "signature",
            verdict = signature.as_ref().map(|t| t.as_str()).unwrap_or("none"),
            "Signature sniff"
        );

        let extension = extension_of(filename);
        let by_extension = mime_from_filename(filename).map(CanonicalType::from_static);

        if let Some(signature) = signature {
            // 2. Override for ambiguous extensions and generic containers
            if let (Some(ext), Some(ext_type)) = (extension.as_deref(), by_extension.as_ref()) {
                if prefers_extension(ext, &signature, ext_type) {
                    debug!(
                        file = %filename,
                        step = "override",
                        signature = %signature,
                        verdict = %ext_type,
                        "Extension overrides signature"
                    );
                    return Some(ext_type.clone());
                }
            }
            return Some(signature);
        }

        // 3. Extension lookup
        debug!(
            file = %filename,
            step = "extension",
            verdict = by_extension.as_ref().map(|t| t.as_str()).unwrap_or("none"),
            "Extension lookup"
        );
        by_extension
    }
}

impl Default for TypeDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the extension-derived type should replace a signature match.
fn prefers_extension(ext: &str, signature: &CanonicalType, ext_type: &CanonicalType) -> bool {
    if signature == ext_type {
        return false;
    }
    if EXTENSION_OVERRIDES.contains(&ext) || TEXTUAL_SIGNATURES.contains(&signature.as_str()) {
        return true;
    }
    GENERIC_CONTAINERS
        .iter()
        .any(|(container, carried)| signature.as_str() == *container && carried.contains(&ext_type.as_str()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Lowercased extension of a file name, if it has one.
pub fn extension_of(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Type for a file name: well-known extensionless names first, then the
/// extension table.
pub fn mime_from_filename(filename: &str) -> Option<&'static str> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .to_lowercase();
    match name.as_str() {
        "dockerfile" | "makefile" | "justfile" | "license" | "readme" => return Some("text/plain"),
        ".gitignore" | ".dockerignore" | ".env" | ".editorconfig" => return Some("text/plain"),
        _ => {}
    }
    extension_of(&name).and_then(|ext| mime_from_extension(&ext))
}

/// Map file extensions to canonical types.
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        // Plain text
        "txt" | "text" | "log" => Some("text/plain"),
        "ini" | "cfg" | "conf" | "env" | "properties" => Some("text/plain"),
        "csv" => Some("text/csv"),
        "tsv" | "tab" => Some("text/tab-separated-values"),
        // Markup
        "html" | "htm" => Some("text/html"),
        "css" => Some("text/css"),
        "xml" | "xsl" | "xslt" => Some("application/xml"),
        "json" => Some("application/json"),
        "jsonl" | "ndjson" => Some("application/x-ndjson"),
        "yaml" | "yml" => Some("application/yaml"),
        "toml" => Some("application/toml"),
        "md" | "markdown" => Some("text/markdown"),
        "rst" => Some("text/x-rst"),
        "tex" | "latex" => Some("application/x-tex"),
        "svg" => Some("image/svg+xml"),
        // Code
        "rs" => Some("text/x-rust"),
        "py" | "pyi" => Some("text/x-python"),
        "js" | "mjs" | "cjs" => Some("text/javascript"),
        "ts" | "tsx" | "mts" | "cts" => Some("text/typescript"),
        "jsx" => Some("text/jsx"),
        "go" => Some("text/x-go"),
        "java" => Some("text/x-java"),
        "c" | "h" => Some("text/x-c"),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => Some("text/x-c++"),
        "cs" => Some("text/x-csharp"),
        "rb" => Some("text/x-ruby"),
        "php" => Some("text/x-php"),
        "swift" => Some("text/x-swift"),
        "kt" | "kts" => Some("text/x-kotlin"),
        "scala" => Some("text/x-scala"),
        "sql" => Some("application/sql"),
        "r" => Some("text/x-r"),
        "lua" => Some("text/x-lua"),
        "pl" | "pm" => Some("text/x-perl"),
        "sh" | "bash" | "zsh" => Some("text/x-shellscript"),
        "vue" | "svelte" => Some("text/x-component"),
        // Images
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "ico" => Some("image/x-icon"),
        "heic" => Some("image/heic"),
        // Audio
        "mp3" => Some("audio/mpeg"),
        "wav" => Some("audio/x-wav"),
        "flac" => Some("audio/x-flac"),
        "ogg" | "oga" => Some("audio/ogg"),
        "m4a" => Some("audio/m4a"),
        "aac" => Some("audio/aac"),
        // Video
        "mp4" => Some("video/mp4"),
        "mov" => Some("video/quicktime"),
        "webm" => Some("video/webm"),
        "mkv" => Some("video/x-matroska"),
        // Documents
        "pdf" => Some("application/pdf"),
        "rtf" => Some("application/rtf"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "odt" => Some("application/vnd.oasis.opendocument.text"),
        "epub" => Some("application/epub+zip"),
        // Spreadsheets
        "xls" => Some("application/vnd.ms-excel"),
        "xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        "ods" => Some("application/vnd.oasis.opendocument.spreadsheet"),
        // Presentations
        "ppt" => Some("application/vnd.ms-powerpoint"),
        "pptx" => Some("application/vnd.openxmlformats-officedocument.presentationml.presentation"),
        "odp" => Some("application/vnd.oasis.opendocument.presentation"),
        // Archives
        "zip" => Some("application/zip"),
        "gz" => Some("application/gzip"),
        "tar" => Some("application/x-tar"),
        "7z" => Some("application/x-7z-compressed"),
        "rar" => Some("application/vnd.rar"),
        _ => None,
    }
}

/// Human descriptions keyed by canonical type.
static KIND_DESCRIPTIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("text/plain", "Plain text document"),
        ("text/markdown", "Markdown document"),
        ("text/x-rst", "reStructuredText document"),
        ("text/csv", "CSV spreadsheet"),
        ("text/tab-separated-values", "TSV spreadsheet"),
        ("text/html", "HTML document"),
        ("text/css", "CSS stylesheet"),
        ("text/xml", "XML document"),
        ("application/xml", "XML document"),
        ("application/json", "JSON document"),
        ("application/x-ndjson", "JSON Lines document"),
        ("application/yaml", "YAML document"),
        ("application/toml", "TOML document"),
        ("application/x-tex", "LaTeX document"),
        ("image/svg+xml", "SVG image"),
        ("text/x-rust", "Rust source code"),
        ("text/x-python", "Python source code"),
        ("text/javascript", "JavaScript source code"),
        ("text/typescript", "TypeScript source code"),
        ("text/jsx", "JSX source code"),
        ("text/x-go", "Go source code"),
        ("text/x-java", "Java source code"),
        ("text/x-c", "C source code"),
        ("text/x-c++", "C++ source code"),
        ("text/x-csharp", "C# source code"),
        ("text/x-ruby", "Ruby source code"),
        ("text/x-php", "PHP source code"),
        ("text/x-swift", "Swift source code"),
        ("text/x-kotlin", "Kotlin source code"),
        ("text/x-scala", "Scala source code"),
        ("text/x-r", "R source code"),
        ("text/x-lua", "Lua source code"),
        ("text/x-perl", "Perl source code"),
        ("text/x-component", "Component source code"),
        ("text/x-shellscript", "Shell script"),
        ("application/sql", "SQL script"),
        ("image/png", "PNG image"),
        ("image/jpeg", "JPEG image"),
        ("image/gif", "GIF image"),
        ("image/webp", "WebP image"),
        ("image/bmp", "BMP image"),
        ("image/tiff", "TIFF image"),
        ("image/x-icon", "Icon image"),
        ("image/heic", "HEIC image"),
        ("audio/mpeg", "MP3 audio"),
        ("audio/x-wav", "WAV audio"),
        ("audio/x-flac", "FLAC audio"),
        ("audio/ogg", "Ogg audio"),
        ("audio/m4a", "M4A audio"),
        ("audio/aac", "AAC audio"),
        ("video/mp4", "MP4 video"),
        ("video/quicktime", "QuickTime video"),
        ("video/webm", "WebM video"),
        ("video/mp2t", "MPEG transport stream"),
        ("application/pdf", "PDF document"),
        ("application/rtf", "Rich Text document"),
        ("application/msword", "Word 97-2003 document"),
        (
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "Word document",
        ),
        ("application/vnd.oasis.opendocument.text", "OpenDocument text"),
        ("application/epub+zip", "EPUB book"),
        ("application/vnd.ms-excel", "Excel 97-2003 spreadsheet"),
        (
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "Excel spreadsheet",
        ),
        ("application/vnd.oasis.opendocument.spreadsheet", "OpenDocument spreadsheet"),
        ("application/vnd.ms-powerpoint", "PowerPoint 97-2003 presentation"),
        (
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            "PowerPoint presentation",
        ),
        ("application/vnd.oasis.opendocument.presentation", "OpenDocument presentation"),
        ("application/zip", "ZIP archive"),
        ("application/gzip", "Gzip archive"),
        ("application/x-tar", "Tar archive"),
        ("application/x-7z-compressed", "7-Zip archive"),
        ("application/vnd.rar", "RAR archive"),
        ("application/octet-stream", "Binary file"),
    ]
    .into_iter()
    .collect()
});

/// Description for a type listed in the kind table, without family fallback.
pub fn known_kind(file_type: &CanonicalType) -> Option<&'static str> {
    KIND_DESCRIPTIONS.get(file_type.as_str()).copied()
}

/// Human description of a canonical type, e.g. "PNG image".
pub fn describe_kind(file_type: &CanonicalType) -> String {
    if file_type.is_directory() {
        return "Folder".to_string();
    }
    if let Some(label) = known_kind(file_type) {
        return label.to_string();
    }
    match file_type.family() {
        "text" => "Text document",
        "image" => "Image",
        "audio" => "Audio",
        "video" => "Video",
        "font" => "Font",
        _ => "Document",
    }
    .to_string()
}
