//! Artifact store for generated report workbooks.
//!
//! The original workflow left workbooks in the process working directory
//! forever. This module replaces that with a request-scoped store: workbooks
//! live under one configured directory, are addressed by their report UUID,
//! and are swept by a background retention task once they age out.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Filename suffix shared by every workbook artifact.
const WORKBOOK_SUFFIX: &str = "_wind_data_with_charts.xlsx";

/// How often the retention sweeper wakes up (seconds).
const SWEEP_INTERVAL_SECS: u64 = 3600;

/// Filesystem-backed store of report workbooks, keyed by report id.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    retention: Duration,
}

impl ArtifactStore {
    /// Open (and create if needed) the store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, retention: Duration) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, retention })
    }

    /// Canonical workbook filename for a report id.
    pub fn workbook_filename(report_id: Uuid) -> String {
        format!("{}{}", report_id, WORKBOOK_SUFFIX)
    }

    /// Absolute path the workbook for `report_id` is written to.
    pub fn workbook_path(&self, report_id: Uuid) -> PathBuf {
        self.root.join(Self::workbook_filename(report_id))
    }

    /// Resolve a download filename to a stored workbook path.
    ///
    /// Only bare filenames matching `{uuid}_wind_data_with_charts.xlsx` are
    /// accepted; anything else (path separators, traversal components,
    /// foreign names) resolves to `None`. Returns `None` when the file does
    /// not exist on disk.
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        let stem = filename.strip_suffix(WORKBOOK_SUFFIX)?;
        let report_id: Uuid = stem.parse().ok()?;

        let path = self.workbook_path(report_id);
        if path.is_file() {
            Some(path)
        } else {
            None
        }
    }

    /// Delete workbooks older than the retention period.
    ///
    /// Returns the number of files removed. Unreadable entries are skipped
    /// rather than aborting the sweep.
    pub fn sweep_expired(&self) -> std::io::Result<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(self.retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.root)? {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !is_workbook(&entry.path()) {
                continue;
            }
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(_) => continue,
            };
            // Inclusive: a file exactly at the cutoff age is expired. With
            // zero retention this expires everything written up to now, even
            // on filesystems with whole-second mtime granularity.
            if modified <= cutoff {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => {
                        tracing::debug!("Swept expired report {}", entry.path().display());
                        removed += 1;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to sweep {}: {}", entry.path().display(), e);
                    }
                }
            }
        }

        Ok(removed)
    }
}

fn is_workbook(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(WORKBOOK_SUFFIX))
}

/// Background task deleting expired workbooks on an interval.
///
/// Runs for the lifetime of the process, same shape as a background poller:
/// wake, sweep, log, sleep.
pub async fn run_retention_sweeper(store: ArtifactStore) {
    let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
    // The first tick fires immediately, clearing leftovers from before a restart.
    loop {
        interval.tick().await;
        match store.sweep_expired() {
            Ok(0) => {}
            Ok(removed) => tracing::info!("Retention sweep removed {} report(s)", removed),
            Err(e) => tracing::error!("Retention sweep failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_retention(retention: Duration) -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), retention).unwrap();
        (dir, store)
    }

    #[test]
    fn test_workbook_filename_pattern() {
        let id = Uuid::new_v4();
        let name = ArtifactStore::workbook_filename(id);
        assert!(name.starts_with(&id.to_string()));
        assert!(name.ends_with("_wind_data_with_charts.xlsx"));
    }

    #[test]
    fn test_resolve_existing_workbook() {
        let (_dir, store) = store_with_retention(Duration::from_secs(3600));
        let id = Uuid::new_v4();
        std::fs::write(store.workbook_path(id), b"xlsx bytes").unwrap();

        let resolved = store.resolve(&ArtifactStore::workbook_filename(id));
        assert_eq!(resolved, Some(store.workbook_path(id)));
    }

    #[test]
    fn test_resolve_missing_workbook() {
        let (_dir, store) = store_with_retention(Duration::from_secs(3600));
        let name = ArtifactStore::workbook_filename(Uuid::new_v4());
        assert_eq!(store.resolve(&name), None);
    }

    #[test]
    fn test_resolve_rejects_traversal_and_foreign_names() {
        let (_dir, store) = store_with_retention(Duration::from_secs(3600));

        assert_eq!(store.resolve("../etc/passwd"), None);
        assert_eq!(
            store.resolve("../../x_wind_data_with_charts.xlsx"),
            None,
            "traversal prefix must not parse as a UUID"
        );
        assert_eq!(store.resolve("report.xlsx"), None);
        assert_eq!(store.resolve(""), None);
    }

    #[test]
    fn test_sweep_removes_only_expired_workbooks() {
        // Zero retention: everything previously written is expired.
        let (_dir, store) = store_with_retention(Duration::from_secs(0));
        let id = Uuid::new_v4();
        std::fs::write(store.workbook_path(id), b"old").unwrap();
        // A non-workbook file must survive the sweep.
        let bystander = store.workbook_path(id).with_file_name("notes.txt");
        std::fs::write(&bystander, b"keep me").unwrap();

        let removed = store.sweep_expired().unwrap();
        assert_eq!(removed, 1);
        assert!(!store.workbook_path(id).exists());
        assert!(bystander.exists());
    }

    #[test]
    fn test_sweep_keeps_fresh_workbooks() {
        let (_dir, store) = store_with_retention(Duration::from_secs(3600));
        let id = Uuid::new_v4();
        std::fs::write(store.workbook_path(id), b"fresh").unwrap();

        let removed = store.sweep_expired().unwrap();
        assert_eq!(removed, 0);
        assert!(store.workbook_path(id).exists());
    }
}
