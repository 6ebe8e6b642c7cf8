//! Text and source code extraction.
//!
//! Reads the file as UTF-8 (with lossy conversion for invalid sequences) and
//! returns it verbatim. Code files take the same path.

use std::path::Path;

use parcel_core::PipelineConfig;

use super::{read_bounded, text_or_empty, ModelInput};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

pub async fn extract(path: &Path, config: &PipelineConfig) -> ModelInput {
    match read_bounded(path, config.text_max_bytes).await {
        Some(bytes) => text_or_empty(decode_text(&bytes)),
        None => ModelInput::Empty,
    }
}

/// Lossy UTF-8 decode with a leading BOM removed.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
