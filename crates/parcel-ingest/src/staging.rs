//! Temporary file staging for attachments that arrive as bytes instead of paths.
//!
//! The manager only ever tracks files it wrote itself. Deletion is idempotent,
//! and timed cleanups run as detached tasks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use parcel_core::defaults::{FILENAME_MAX_LENGTH, TEMP_DEFAULT_EXTENSION};
use parcel_core::{Error, Result, StagePayload};

/// A staged file and when it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempFileRecord {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Owns a staging directory and the set of files written into it.
///
/// Cheap to clone; clones share the same tracked set.
#[derive(Debug, Clone)]
pub struct TempFileManager {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    dir: PathBuf,
    tracked: Mutex<HashMap<PathBuf, TempFileRecord>>,
}

impl TempFileManager {
    /// The directory is created lazily on first stage.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                dir: dir.into(),
                tracked: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Decode `payload` and write it under a unique name that keeps the
    /// original extension.
    ///
    /// # Errors
    /// - `InvalidPayload` for a malformed data URI
    /// - `Staging` when the directory or file cannot be written
    pub async fn stage(&self, name: &str, payload: impl Into<StagePayload>) -> Result<PathBuf> {
        let bytes = decode_payload(payload.into())?;

        tokio::fs::create_dir_all(&self.inner.dir).await.map_err(|e| {
            Error::Staging(format!(
                "Failed to create temp directory {}: {}",
                self.inner.dir.display(),
                e
            ))
        })?;

        let path = self.inner.dir.join(staged_file_name(name));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| Error::Staging(format!("Failed to write {}: {}", path.display(), e)))?;

        let record = TempFileRecord {
            path: path.clone(),
            created_at: Utc::now(),
        };
        self.inner.tracked.lock().await.insert(path.clone(), record);

        info!(file = %name, path = %path.display(), size = bytes.len(), "Staged payload");
        Ok(path)
    }

    /// Delete a tracked file and stop tracking it. Untracked or already
    /// deleted paths are left alone. A file that cannot be removed stays
    /// tracked so a later sweep can retry it.
    pub async fn tracked_delete(&self, path: &Path) -> Result<()> {
        let mut tracked = self.inner.tracked.lock().await;
        if !tracked.contains_key(path) {
            debug!(path = %path.display(), "Path not tracked, nothing to delete");
            return Ok(());
        }
        match remove_staged(path).await {
            Ok(_) => {
                tracked.remove(path);
                debug!(path = %path.display(), "Deleted staged file");
                Ok(())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Delete `path` after `delay` without blocking the caller.
    pub fn schedule_cleanup(&self, path: PathBuf, delay: Duration) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = manager.tracked_delete(&path).await {
                warn!(path = %path.display(), error = %e, "Scheduled cleanup failed");
            }
        })
    }

    /// Delete every tracked file. Individual failures are logged, stay
    /// tracked, and the sweep continues. Returns the number of files removed.
    pub async fn cleanup_all(&self) -> usize {
        let mut tracked = self.inner.tracked.lock().await;
        let paths: Vec<PathBuf> = tracked.keys().cloned().collect();

        let total = paths.len();
        let mut removed = 0;
        for path in paths {
            match remove_staged(&path).await {
                Ok(deleted) => {
                    tracked.remove(&path);
                    removed += usize::from(deleted);
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to delete staged file");
                }
            }
        }
        info!(tracked = total, removed, remaining = tracked.len(), "Temp file sweep complete");
        removed
    }

    pub async fn tracked_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.inner.tracked.lock().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub async fn is_tracked(&self, path: &Path) -> bool {
        self.inner.tracked.lock().await.contains_key(path)
    }
}

/// Remove a staged file. `Ok(false)` when it was already gone.
async fn remove_staged(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Bytes to write for a payload.
///
/// A `data:` URI contributes the segment after its first comma, base64-decoded
/// when the header ends in `;base64`. Any other text is written as-is.
pub fn decode_payload(payload: StagePayload) -> Result<Vec<u8>> {
    match payload {
        StagePayload::Bytes(bytes) => Ok(bytes),
        StagePayload::Text(text) => match text.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest
                    .split_once(',')
                    .ok_or_else(|| Error::InvalidPayload("data URI has no ',' separator".to_string()))?;
                if header.to_ascii_lowercase().ends_with(";base64") {
                    STANDARD
                        .decode(data.trim())
                        .map_err(|e| Error::InvalidPayload(format!("Invalid base64: {}", e)))
                } else {
                    Ok(data.as_bytes().to_vec())
                }
            }
            None => Ok(text.into_bytes()),
        },
    }
}

/// `<uuid>_<sanitized name>`, with a default extension when the name has none.
fn staged_file_name(name: &str) -> String {
    let mut base = sanitize_filename(name);
    if !has_extension(&base) {
        base = format!("{}.{}", base, TEMP_DEFAULT_EXTENSION);
    }
    let unique = format!("{}_{}", Uuid::new_v4(), base);
    truncate_preserving_extension(&unique, FILENAME_MAX_LENGTH)
}

fn has_extension(name: &str) -> bool {
    matches!(name.rsplit_once('.'), Some((stem, ext)) if !stem.is_empty() && !ext.is_empty())
}

/// Strip path components and characters that are unsafe in file names.
/// Empty or dot-only names become `payload`.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        return "payload".to_string();
    }
    truncate_preserving_extension(sanitized, FILENAME_MAX_LENGTH)
}

/// Cut a name to `max` bytes on a char boundary, keeping the extension.
fn truncate_preserving_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if name.len() - dot < max => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    };
    let mut end = max - ext.len();
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &stem[..end], ext)
}
