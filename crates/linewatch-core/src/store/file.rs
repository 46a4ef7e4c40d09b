// # File Store
//
// File-based implementation of StatusStore, LogStore and OutageStore with
// crash recovery.
//
// ## Purpose
//
// Keeps status events, device log entries and outages across daemon
// restarts without requiring a database server.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## All-or-nothing mutations
//
// Every mutation is applied to a copy of the records. The copy replaces
// the in-memory state only after it has been written to disk, so a failed
// write leaves both the file and the in-memory view unchanged.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "data": {
//     "status_events": [...],
//     "log_entries": [...],
//     "outages": [...],
//     "last_status_id": 3,
//     "last_log_id": 120,
//     "last_outage_id": 45
//   }
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{
    ConnectionStatus, LogEntry, OutageInterval, OutageRecord, OutageStatus, RawLogLine,
    StatusEvent,
};
use crate::store::data::StoreData;
use crate::traits::{LogStore, OutageStore, StatusStore};

/// Store file format version
/// Used for future migration if format changes
const STORE_FILE_VERSION: &str = "1.0";

/// File-based store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use linewatch_core::store::FileStore;
/// use linewatch_core::traits::LogStore;
/// use linewatch_core::log_line::parse_log_line;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStore::new("/var/lib/linewatch/store.json").await?;
///
///     let line = parse_log_line("01.01.24 10:00:00 Internetverbindung wurde getrennt.");
///     let inserted = store.ingest_entries(&[line], "tr064").await?;
///     assert_eq!(inserted, 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: RwLock<StoreData>,
}

/// Serializable store file format
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    data: StoreData,
}

impl FileStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Try to load the existing store file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start with empty state
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut data = Self::load_with_recovery(&path).await?;
        data.reindex();

        Ok(Self {
            path,
            state: RwLock::new(data),
        })
    }

    /// Load the store file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main file
    /// 2. If it fails to parse, try loading backup
    /// 3. If backup also fails, start with empty state
    async fn load_with_recovery(path: &Path) -> Result<StoreData, Error> {
        match Self::load(path).await {
            Ok(data) => {
                tracing::debug!("Loaded store from file: {}", path.display());
                Ok(data)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Store file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty store.");
                    return Ok(StoreData::default());
                }

                match Self::load(&backup_path).await {
                    Ok(data) => {
                        tracing::info!("Recovered store from backup");

                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore store file from backup: {}",
                                restore_err
                            );
                        }

                        Ok(data)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also corrupted: {}. Starting with empty store.",
                            backup_err
                        );
                        Ok(StoreData::default())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load the store from file
    async fn load(path: &Path) -> Result<StoreData, Error> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(StoreData::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!("Failed to read store file {}: {}", path.display(), e))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content)?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.data)
    }

    /// Write `data` to disk atomically
    async fn write(&self, data: &StoreData) -> Result<(), Error> {
        let file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            data: data.clone(),
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::store(format!("Failed to serialize store: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut handle = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            handle.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            handle.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Store written to file: {}", self.path.display());
        Ok(())
    }

    /// Apply `mutation` to a copy, persist it, then publish it
    async fn mutate<T>(
        &self,
        mutation: impl FnOnce(&mut StoreData) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let value = mutation(&mut next)?;
        self.write(&next).await?;
        *guard = next;
        Ok(value)
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
impl StatusStore for FileStore {
    async fn record_event(
        &self,
        status: ConnectionStatus,
        timestamp: DateTime<Utc>,
        details: serde_json::Value,
    ) -> Result<StatusEvent, Error> {
        self.mutate(|data| Ok(data.record_event(status, timestamp, details)))
            .await
    }

    async fn latest_event(&self) -> Result<Option<StatusEvent>, Error> {
        Ok(self.state.read().await.latest_event())
    }

    async fn list_events(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<StatusEvent>, Error> {
        Ok(self.state.read().await.list_events(start, end))
    }
}

#[async_trait]
impl LogStore for FileStore {
    async fn ingest_entries(&self, entries: &[RawLogLine], source: &str) -> Result<usize, Error> {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let inserted = next.ingest_entries(entries, source);

        // Nothing new: skip the disk write
        if inserted > 0 {
            self.write(&next).await?;
            *guard = next;
        }

        Ok(inserted)
    }

    async fn list_entries(
        &self,
        limit: Option<usize>,
        ascending: bool,
    ) -> Result<Vec<LogEntry>, Error> {
        Ok(self.state.read().await.list_entries(limit, ascending))
    }
}

#[async_trait]
impl OutageStore for FileStore {
    async fn replace_calculated_outages(&self, intervals: &[OutageInterval]) -> Result<(), Error> {
        self.mutate(|data| {
            data.replace_calculated_outages(intervals);
            Ok(())
        })
        .await
    }

    async fn list_outages(&self) -> Result<Vec<OutageRecord>, Error> {
        Ok(self.state.read().await.list_outages())
    }

    async fn create_manual_outage(
        &self,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
        status: OutageStatus,
    ) -> Result<u64, Error> {
        self.mutate(|data| data.create_manual_outage(start, end, status))
            .await
    }
}
