// # File Backend
//
// File-based implementation of DnsBackend with crash recovery.
//
// ## Purpose
//
// Keeps a zone and record snapshot on disk so that a reconciliation pass can
// be planned, applied and re-run against the same state across restarts.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good snapshot
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "updated_at": "2025-01-09T12:00:00Z",
//   "zones": [{ "zone": "example.com", "view": "default" }],
//   "records": {
//     "record:a/00000001:host.example.com/default": {
//       "zone": "example.com",
//       "view": "default",
//       "record": { "type": "A", "name": "host.example.com", "address": "10.1.2.3", "ttl": 300 }
//     }
//   },
//   "next_id": 1
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::record::BackendRecord;
use super::store::RecordStore;
use super::{BackendRef, DnsBackend, RecordFilters, RecordPage};
use crate::Error;
use crate::endpoint::RecordType;
use crate::zone::Zone;

/// Snapshot file format version
const SNAPSHOT_VERSION: &str = "1.0";

/// File-based backend with crash recovery
///
/// Every mutation is written through to disk before the call returns.
///
/// # Example
///
/// ```rust,no_run
/// use zonesync_core::backend::{DnsBackend, FileBackend, view_filters};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = FileBackend::new("/var/lib/zonesync/zones.json").await?;
///     backend.add_zone("example.com", "default").await?;
///
///     let zones = backend.list_zones(&view_filters("default")).await?;
///     assert_eq!(zones.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    store: Arc<RwLock<RecordStore>>,
}

/// Serializable snapshot file format
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct SnapshotFile {
    version: String,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    store: RecordStore,
}

impl FileBackend {
    /// Create or load a file backend
    ///
    /// This will:
    /// 1. Try to load the existing snapshot
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start with an empty store
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create snapshot directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let store = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            store: Arc::new(RwLock::new(store)),
        })
    }

    /// Load the snapshot with automatic recovery
    ///
    /// Only a parse failure counts as corruption; I/O errors propagate.
    async fn load_with_recovery(path: &Path) -> Result<RecordStore, Error> {
        let err = match Self::load(path).await {
            Ok(store) => {
                tracing::debug!("Loaded snapshot from file: {} records", store.len());
                return Ok(store);
            }
            Err(e @ Error::Json(_)) => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(
            "Snapshot file appears corrupted: {}. Attempting recovery from backup.",
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty snapshot.");
            return Ok(RecordStore::default());
        }

        match Self::load(&backup_path).await {
            Ok(store) => {
                tracing::info!("Recovered snapshot from backup: {} records", store.len());
                if let Err(restore_err) = fs::copy(&backup_path, path).await {
                    tracing::error!(
                        "Failed to restore snapshot file from backup: {}",
                        restore_err
                    );
                }
                Ok(store)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with empty snapshot.",
                    backup_err
                );
                Ok(RecordStore::default())
            }
        }
    }

    /// Load a snapshot from file
    async fn load(path: &Path) -> Result<RecordStore, Error> {
        if !path.exists() {
            tracing::debug!("Snapshot file does not exist: {}", path.display());
            return Ok(RecordStore::default());
        }

        let content = fs::read_to_string(path).await?;
        let snapshot: SnapshotFile = serde_json::from_str(&content)?;

        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                "Snapshot file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                SNAPSHOT_VERSION,
                snapshot.version
            );
        }

        Ok(snapshot.store)
    }

    /// Write the snapshot to file atomically
    async fn write(&self, store: &RecordStore) -> Result<(), Error> {
        let snapshot = SnapshotFile {
            version: SNAPSHOT_VERSION.to_string(),
            updated_at: Some(Utc::now()),
            store: store.clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::backend(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Snapshot written to file: {}", self.path.display());
        Ok(())
    }

    /// Apply a mutation and persist the result while holding the write lock
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut RecordStore) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut guard = self.store.write().await;
        let out = op(&mut *guard)?;
        self.write(&*guard).await?;
        Ok(out)
    }

    /// Register a zone in a view
    pub async fn add_zone(&self, zone: &str, view: &str) -> Result<(), Error> {
        self.mutate(|store| {
            store.add_zone(zone, view);
            Ok(())
        })
        .await
    }

    /// All stored records
    pub async fn records(&self) -> Vec<BackendRecord> {
        self.store
            .read()
            .await
            .records()
            .into_iter()
            .map(|s| s.record)
            .collect()
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl DnsBackend for FileBackend {
    async fn list_zones(&self, filters: &RecordFilters) -> Result<Vec<Zone>, Error> {
        self.store.read().await.zones(filters)
    }

    async fn fetch_page(
        &self,
        zone: &str,
        record_type: RecordType,
        filters: &RecordFilters,
        page: Option<&str>,
    ) -> Result<RecordPage, Error> {
        self.store
            .read()
            .await
            .page(zone, record_type, filters, page)
    }

    async fn lookup_record(&self, record: &BackendRecord) -> Result<Option<BackendRef>, Error> {
        Ok(self.store.read().await.lookup(record))
    }

    async fn create_record(&self, record: &BackendRecord) -> Result<BackendRef, Error> {
        self.mutate(|store| store.insert(record)).await
    }

    async fn update_record(
        &self,
        record: &BackendRecord,
        reference: &BackendRef,
    ) -> Result<BackendRef, Error> {
        self.mutate(|store| store.replace(record, reference)).await
    }

    async fn delete_record(&self, reference: &BackendRef) -> Result<BackendRef, Error> {
        self.mutate(|store| store.remove(reference)).await
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
