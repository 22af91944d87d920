#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Holder of the current traffic snapshot.
//!
//! There is exactly one current [`Snapshot`]. Readers take an [`Arc`] of
//! it and never observe a partially replaced snapshot; publishing swaps
//! the `Arc` under a short write lock. When a path is configured, every
//! published snapshot is also written to disk as JSON (write to `.tmp`,
//! then rename) and loaded again on startup.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use traffic_monitor_traffic_models::Snapshot;

/// Default location of the persisted snapshot.
pub const DEFAULT_SNAPSHOT_PATH: &str = "data/snapshot.json";

/// Errors from loading or persisting the snapshot document.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the snapshot file failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// File being accessed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The snapshot document could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Returns the snapshot path from `SNAPSHOT_PATH`, or the default.
#[must_use]
pub fn snapshot_path_from_env() -> PathBuf {
    std::env::var("SNAPSHOT_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH), PathBuf::from)
}

/// The current snapshot plus its optional on-disk copy.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
    version: AtomicU64,
    path: Option<PathBuf>,
}

impl SnapshotStore {
    /// Creates a store that only lives in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a store persisted at `path`, starting from the document
    /// already there. A missing file starts from the empty initial
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file exists but cannot be read or
    /// does not hold a snapshot document.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let snapshot = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let snapshot: Snapshot = serde_json::from_str(&contents)?;
                log::info!(
                    "Loaded snapshot from {} ({} jams, {} cameras)",
                    path.display(),
                    snapshot.traffic_jams.len(),
                    snapshot.speed_cameras.len()
                );
                snapshot
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No snapshot at {}, starting empty", path.display());
                Snapshot::default()
            }
            Err(e) => return Err(io_error(&path)(e)),
        };

        Ok(Self {
            current: RwLock::new(Arc::new(snapshot)),
            version: AtomicU64::new(0),
            path: Some(path),
        })
    }

    /// Creates an empty store persisted at `path` without reading it.
    #[must_use]
    pub fn empty_at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the current snapshot and persists it.
    ///
    /// The swap always happens. A failed write does not roll it back: the
    /// new snapshot stays published and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the snapshot could not be written to disk.
    pub fn publish(&self, snapshot: Snapshot) -> Result<Arc<Snapshot>, StoreError> {
        let snapshot = Arc::new(snapshot);
        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *current = Arc::clone(&snapshot);
        }
        self.version.fetch_add(1, Ordering::SeqCst);

        if let Some(path) = &self.path {
            persist(path, &snapshot)?;
        }

        Ok(snapshot)
    }

    /// Number of snapshots published since the store was created.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Path of the on-disk copy, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn persist(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(io_error(dir))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let contents = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(&tmp_path, contents).map_err(io_error(&tmp_path))?;
    std::fs::rename(&tmp_path, path).map_err(io_error(path))?;

    log::debug!("Saved snapshot to {}", path.display());
    Ok(())
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.display().to_string();
    move |source| StoreError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use traffic_monitor_traffic_models::{CauseCategory, RoadCode, TrafficDisruption, UNKNOWN};

    use super::*;

    fn snapshot(delay: u32) -> Snapshot {
        let at = DateTime::<Utc>::UNIX_EPOCH;
        Snapshot {
            traffic_jams: vec![TrafficDisruption {
                id: "4f2a".to_string(),
                road: RoadCode::parse("A2").unwrap(),
                direction: "richting Utrecht".to_string(),
                delay_minutes: delay,
                length_km: 3.5,
                source_location: UNKNOWN.to_string(),
                destination_location: "Utrecht".to_string(),
                route_details: UNKNOWN.to_string(),
                cause: CauseCategory::Roadworks,
                last_updated: at,
            }],
            speed_cameras: Vec::new(),
            last_updated: Some(at),
        }
    }

    #[test]
    fn starts_with_the_initial_snapshot() {
        let store = SnapshotStore::in_memory();
        assert!(store.current().is_initial());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn publish_replaces_the_whole_snapshot() {
        let store = SnapshotStore::in_memory();
        let before = store.current();

        store.publish(snapshot(12)).unwrap();

        assert!(before.is_initial());
        assert_eq!(store.current().traffic_jams[0].delay_minutes, 12);
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn persisted_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.json");

        let store = SnapshotStore::open(&path).unwrap();
        assert!(store.current().is_initial());
        store.publish(snapshot(7)).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = SnapshotStore::open(&path).unwrap();
        assert_eq!(*reopened.current(), snapshot(7));
        assert_eq!(reopened.version(), 0);
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(SnapshotStore::open(&path), Err(StoreError::Json(_))));
    }

    #[test]
    fn failed_write_keeps_the_new_snapshot_published() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("snapshot.json");
        std::fs::create_dir(&path).unwrap();

        let store = SnapshotStore::empty_at(&path);
        let result = store.publish(snapshot(3));

        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert_eq!(store.current().traffic_jams[0].delay_minutes, 3);
        assert_eq!(store.version(), 1);
    }
}
