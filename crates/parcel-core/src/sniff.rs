//! Byte sniffer: decides text vs. binary from a short file prefix.
//!
//! This is the detector's last resort, so it never fails. Any I/O error reads
//! as "binary".

use std::path::Path;

use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::defaults::{SNIFF_SAMPLE_BYTES, SNIFF_SUSPICIOUS_RATIO};

/// Read at most `limit` bytes from the start of `path`.
///
/// The handle is dropped on every return path, including read errors.
pub async fn read_prefix(path: &Path, limit: usize) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut buf = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Classify a byte sample.
///
/// - empty sample: not text
/// - any NUL byte: binary
/// - more than 10% bytes outside printable ASCII, TAB, LF, CR and >= 0x80: binary
pub fn sample_looks_like_text(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return false;
    }

    let suspicious = sample
        .iter()
        .filter(|&&b| !matches!(b, 32..=126 | b'\t' | b'\n' | b'\r' | 128..=255))
        .count();

    (suspicious as f64 / sample.len() as f64) <= SNIFF_SUSPICIOUS_RATIO
}

/// Whether the file at `path` looks like text, sampling the default 1 KiB.
pub async fn looks_like_text(path: &Path) -> bool {
    looks_like_text_with(path, SNIFF_SAMPLE_BYTES).await
}

/// Whether the file at `path` looks like text, sampling `sample_size` bytes.
pub async fn looks_like_text_with(path: &Path, sample_size: usize) -> bool {
    match read_prefix(path, sample_size).await {
        Ok(sample) => sample_looks_like_text(&sample),
        Err(e) => {
            debug!(file = %path.display(), error = %e, "Byte sniff failed, treating as binary");
            false
        }
    }
}
