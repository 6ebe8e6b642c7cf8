//! Adapter registry for dispatching canonical types to extractors.
//!
//! Resolution order: exact `family/subtype`, then `family/*`, then the
//! fallback. Exact entries exist precisely so that some subtypes escape their
//! family's default (CSV is `text/*` but must not be read as plain text).

use std::collections::HashMap;

use tracing::debug;

use parcel_core::CanonicalType;

use crate::adapters::ExtractorKind;

/// Source code types. Extracted like text, described as code.
const CODE_TYPES: &[&str] = &[
    "text/x-rust",
    "text/x-python",
    "text/javascript",
    "application/javascript",
    "text/typescript",
    "text/jsx",
    "text/x-go",
    "text/x-java",
    "text/x-c",
    "text/x-c++",
    "text/x-csharp",
    "text/x-ruby",
    "text/x-php",
    "text/x-swift",
    "text/x-kotlin",
    "text/x-scala",
    "text/x-r",
    "text/x-lua",
    "text/x-perl",
    "text/x-shellscript",
    "text/x-component",
    "application/x-sh",
    "application/sql",
];

/// Structured text outside the `text/` family.
const APPLICATION_TEXT_TYPES: &[&str] = &[
    "application/json",
    "application/x-ndjson",
    "application/xml",
    "application/yaml",
    "application/toml",
    "application/x-tex",
    // rendered markup, not decodable pixels
    "image/svg+xml",
];

const CSV_TYPES: &[&str] = &["text/csv", "text/tab-separated-values"];

const SPREADSHEET_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.oasis.opendocument.spreadsheet",
    "application/vnd.ms-excel",
];

const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.oasis.opendocument.text",
    "application/rtf",
    "text/rtf",
    "application/msword",
];

const PRESENTATION_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.oasis.opendocument.presentation",
    "application/vnd.ms-powerpoint",
];

/// Registry mapping canonical type patterns to extractor kinds.
///
/// Populated before the pipeline starts and read-only afterwards; the
/// pipeline holds it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    exact: HashMap<CanonicalType, ExtractorKind>,
    wildcard: HashMap<String, ExtractorKind>,
    fallback: Option<ExtractorKind>,
}

impl AdapterRegistry {
    /// Create an empty registry with no fallback.
    pub fn empty() -> Self {
        Self {
            exact: HashMap::new(),
            wildcard: HashMap::new(),
            fallback: None,
        }
    }

    /// The standard table, falling back to [`ExtractorKind::Unsupported`].
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        registry.register(CanonicalType::family_wildcard("text"), ExtractorKind::Text);
        registry.register(CanonicalType::family_wildcard("image"), ExtractorKind::Image);
        registry.register(CanonicalType::family_wildcard("audio"), ExtractorKind::Audio);
        registry.register(CanonicalType::directory(), ExtractorKind::Directory);

        let tables: [(&[&str], ExtractorKind); 6] = [
            (CODE_TYPES, ExtractorKind::Code),
            (APPLICATION_TEXT_TYPES, ExtractorKind::Text),
            (CSV_TYPES, ExtractorKind::Csv),
            (SPREADSHEET_TYPES, ExtractorKind::Spreadsheet),
            (DOCUMENT_TYPES, ExtractorKind::Document),
            (PRESENTATION_TYPES, ExtractorKind::Presentation),
        ];
        for (types, kind) in tables {
            for ty in types {
                registry.register(CanonicalType::from_static(ty), kind);
            }
        }

        registry.set_fallback(ExtractorKind::Unsupported);
        registry
    }

    /// Register a pattern. `family/*` patterns go to the wildcard table.
    /// Replaces any existing entry for the same pattern.
    pub fn register(&mut self, pattern: CanonicalType, kind: ExtractorKind) {
        if pattern.is_wildcard() {
            self.wildcard.insert(pattern.family().to_string(), kind);
        } else {
            self.exact.insert(pattern, kind);
        }
    }

    /// Set the kind used when neither table matches.
    pub fn set_fallback(&mut self, kind: ExtractorKind) {
        self.fallback = Some(kind);
    }

    /// Resolve a type: exact, then wildcard, then fallback. `None` only when
    /// the registry has no fallback.
    pub fn resolve(&self, file_type: &CanonicalType) -> Option<ExtractorKind> {
        if let Some(kind) = self.exact.get(file_type) {
            debug!(mime = %file_type, extractor = %kind, step = "exact", "Resolved extractor");
            return Some(*kind);
        }
        if let Some(kind) = self.wildcard.get(file_type.family()) {
            debug!(mime = %file_type, extractor = %kind, step = "wildcard", "Resolved extractor");
            return Some(*kind);
        }
        debug!(mime = %file_type, extractor = ?self.fallback.map(|k| k.name()), step = "fallback", "Resolved extractor");
        self.fallback
    }

    /// Check if an exact or wildcard entry covers the type.
    pub fn has_adapter(&self, file_type: &CanonicalType) -> bool {
        self.exact.contains_key(file_type) || self.wildcard.contains_key(file_type.family())
    }

    /// Number of registered patterns (exact plus wildcard).
    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All exact patterns, for diagnostics.
    pub fn registered_types(&self) -> Vec<CanonicalType> {
        let mut types: Vec<CanonicalType> = self.exact.keys().cloned().collect();
        types.extend(self.wildcard.keys().map(|f| CanonicalType::family_wildcard(f)));
        types.sort();
        types
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(s: &str) -> CanonicalType {
        CanonicalType::from_static(s)
    }

    #[test]
    fn test_registry_empty() {
        let registry = AdapterRegistry::empty();
        assert!(registry.is_empty());
        assert_eq!(registry.resolve(&ty("text/plain")), None);
        assert!(!registry.has_adapter(&ty("text/plain")));
    }

    #[test]
    fn test_exact_beats_wildcard() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.resolve(&ty("text/csv")), Some(ExtractorKind::Csv));
        assert_eq!(
            registry.resolve(&ty("text/tab-separated-values")),
            Some(ExtractorKind::Csv)
        );
        assert_eq!(registry.resolve(&ty("text/plain")), Some(ExtractorKind::Text));
        assert_eq!(registry.resolve(&ty("image/svg+xml")), Some(ExtractorKind::Text));
        assert_eq!(registry.resolve(&ty("image/png")), Some(ExtractorKind::Image));
    }

    #[test]
    fn test_exact_beats_wildcard_regardless_of_order() {
        let mut registry = AdapterRegistry::empty();
        registry.register(ty("text/csv"), ExtractorKind::Csv);
        registry.register(CanonicalType::family_wildcard("text"), ExtractorKind::Text);
        assert_eq!(registry.resolve(&ty("text/csv")), Some(ExtractorKind::Csv));
        assert_eq!(registry.resolve(&ty("text/markdown")), Some(ExtractorKind::Text));
    }

    #[test]
    fn test_code_types() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.resolve(&ty("text/x-rust")), Some(ExtractorKind::Code));
        assert_eq!(registry.resolve(&ty("text/typescript")), Some(ExtractorKind::Code));
    }

    #[test]
    fn test_office_types() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.resolve(&ty("application/pdf")), Some(ExtractorKind::Document));
        assert_eq!(
            registry.resolve(&ty(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            )),
            Some(ExtractorKind::Spreadsheet)
        );
        assert_eq!(
            registry.resolve(&ty(
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            )),
            Some(ExtractorKind::Presentation)
        );
    }

    #[test]
    fn test_audio_and_directory() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.resolve(&ty("audio/mpeg")), Some(ExtractorKind::Audio));
        assert_eq!(
            registry.resolve(&CanonicalType::directory()),
            Some(ExtractorKind::Directory)
        );
    }

    #[test]
    fn test_unregistered_falls_back_to_unsupported() {
        let registry = AdapterRegistry::with_defaults();
        for unknown in ["application/zip", "video/mp4", "application/octet-stream", "font/woff2"] {
            assert_eq!(registry.resolve(&ty(unknown)), Some(ExtractorKind::Unsupported));
            assert!(!registry.has_adapter(&ty(unknown)));
        }
    }

    #[test]
    fn test_every_registered_type_is_supported() {
        let registry = AdapterRegistry::with_defaults();
        for registered in registry.registered_types() {
            if registered.is_wildcard() {
                continue;
            }
            let kind = registry.resolve(&registered).unwrap();
            assert_ne!(kind, ExtractorKind::Unsupported, "{} resolved to unsupported", registered);
        }
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = AdapterRegistry::with_defaults();
        let before = registry.len();
        registry.register(ty("text/csv"), ExtractorKind::Text);
        assert_eq!(registry.len(), before);
        assert_eq!(registry.resolve(&ty("text/csv")), Some(ExtractorKind::Text));
    }
}
