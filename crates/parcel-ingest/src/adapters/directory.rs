//! Directory attachments.
//!
//! No file content is read. The walk is bounded in depth and entry count and
//! never follows symlinks; it only feeds the size and item count in metadata.

use std::path::Path;

use tracing::{debug, error, warn};
use walkdir::WalkDir;

use parcel_core::{FileMetadata, PipelineConfig};

use super::{display_name, ExtractionContext};

/// What a bounded walk saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectorySummary {
    /// Entries visited below the root (files, directories, links).
    pub entries: usize,
    /// Total size of the regular files visited.
    pub total_size: u64,
    /// Whether a bound cut the walk short.
    pub truncated: bool,
}

impl DirectorySummary {
    pub fn kind(&self) -> String {
        let suffix = if self.truncated { "+" } else { "" };
        match self.entries {
            1 if !self.truncated => "Folder (1 item)".to_string(),
            n => format!("Folder ({}{} items)", n, suffix),
        }
    }
}

pub async fn collect_metadata(ctx: &ExtractionContext, config: &PipelineConfig) -> Option<FileMetadata> {
    let name = ctx.name();
    let meta = match tokio::fs::metadata(ctx.path()).await {
        Ok(meta) => meta,
        Err(e) => {
            error!(file = %name, error = %e, "Failed to stat directory");
            return None;
        }
    };

    let root = ctx.path().to_path_buf();
    let (max_depth, max_entries) = (config.directory_max_depth, config.directory_max_entries);
    let summary = match tokio::task::spawn_blocking(move || summarize(&root, max_depth, max_entries)).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(file = %name, error = %e, "Directory walk task failed");
            DirectorySummary::default()
        }
    };
    if summary.truncated {
        warn!(
            file = %name,
            entries = summary.entries,
            max_depth,
            max_entries,
            "Directory walk truncated"
        );
    }

    let mut metadata = FileMetadata::from_fs(name, summary.kind(), &meta);
    metadata.size = summary.total_size;
    Some(metadata)
}

/// Walk `root` up to `max_depth` levels and `max_entries` entries.
pub fn summarize(root: &Path, max_depth: usize, max_entries: usize) -> DirectorySummary {
    let mut summary = DirectorySummary::default();

    for entry in WalkDir::new(root).min_depth(1).max_depth(max_depth).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(file = %display_name(root), error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        if summary.entries >= max_entries {
            summary.truncated = true;
            break;
        }
        summary.entries += 1;

        let file_type = entry.file_type();
        if file_type.is_file() {
            summary.total_size += entry.metadata().map(|m| m.len()).unwrap_or(0);
        } else if file_type.is_dir() && entry.depth() == max_depth && has_children(entry.path()) {
            summary.truncated = true;
        }
    }
    summary
}

fn has_children(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "12345").unwrap();
        std::fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), "123").unwrap();
        std::fs::write(dir.path().join("sub/deeper/c.txt"), "1").unwrap();
        dir
    }

    #[test]
    fn test_summarize_full_tree() {
        let dir = tree();
        let summary = summarize(dir.path(), 8, 100);
        // a.txt, sub, sub/b.txt, sub/deeper, sub/deeper/c.txt
        assert_eq!(summary.entries, 5);
        assert_eq!(summary.total_size, 9);
        assert!(!summary.truncated);
    }

    #[test]
    fn test_summarize_depth_bound() {
        let dir = tree();
        let summary = summarize(dir.path(), 1, 100);
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.total_size, 5);
        assert!(summary.truncated);
    }

    #[test]
    fn test_summarize_entry_bound() {
        let dir = tree();
        let summary = summarize(dir.path(), 8, 2);
        assert_eq!(summary.entries, 2);
        assert!(summary.truncated);
    }

    #[test]
    fn test_summarize_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(summarize(dir.path(), 8, 100), DirectorySummary::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_not_followed() {
        let dir = tree();
        let link_root = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path(), link_root.path().join("loop")).unwrap();
        let summary = summarize(link_root.path(), 8, 100);
        assert_eq!(summary.entries, 1);
        assert_eq!(summary.total_size, 0);
    }

    #[test]
    fn test_kind_description() {
        let one = DirectorySummary {
            entries: 1,
            ..Default::default()
        };
        assert_eq!(one.kind(), "Folder (1 item)");
        let many = DirectorySummary {
            entries: 12,
            total_size: 0,
            truncated: true,
        };
        assert_eq!(many.kind(), "Folder (12+ items)");
        assert_eq!(DirectorySummary::default().kind(), "Folder (0 items)");
    }

    #[tokio::test]
    async fn test_collect_metadata() {
        let dir = tree();
        let ctx = ExtractionContext::new(dir.path(), None);
        let meta = collect_metadata(&ctx, &PipelineConfig::default()).await.unwrap();
        assert_eq!(meta.size, 9);
        assert_eq!(meta.kind, "Folder (5 items)");
    }
}
