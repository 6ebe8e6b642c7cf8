//! Catch-all extractor for types nothing else handles (archives, video,
//! arbitrary binaries). Contributes metadata only.

use std::path::Path;

use tracing::debug;

use parcel_core::CanonicalType;

use super::{display_name, ModelInput};

pub fn extract(path: &Path, file_type: &CanonicalType) -> ModelInput {
    debug!(file = %display_name(path), mime = %file_type, "No content extraction for type");
    ModelInput::Empty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_empty() {
        let ty = CanonicalType::from_static("application/zip");
        assert_eq!(extract(Path::new("/tmp/archive.zip"), &ty), ModelInput::Empty);
        assert_eq!(extract(Path::new(""), &CanonicalType::octet_stream()), ModelInput::Empty);
    }
}
