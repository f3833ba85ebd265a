//! File-backed queue store: one JSON document per record in a namespace directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use trackflow_core::{ExpenseId, QueuedExpense};

use crate::{QueueStore, StoreError, check_version};

const RECORD_EXT: &str = "json";
const TEMP_EXT: &str = "tmp";
/// Record files that could not be parsed are renamed to this extension.
const CORRUPT_EXT: &str = "corrupt";

/// On-disk envelope. `seq` fixes the insertion position across restarts.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    seq: u64,
    record: QueuedExpense,
}

/// Durable queue store rooted at one namespace directory.
///
/// Each record lives in `<dir>/<id>.json`. Writes go to a temporary file that
/// is synced and then renamed over the target, so a crash leaves either the
/// old record or the new one, never a torn file. All operations are
/// serialised through one async mutex.
///
/// A record file that does not parse is renamed to `<id>.corrupt` and left
/// out of the queue; a record written by a newer client stays on disk but is
/// skipped. Neither blocks the rest of the queue, and [`clear`](QueueStore::clear)
/// removes both.
pub struct FileStore {
    dir: PathBuf,
    quota: Option<usize>,
    /// Next insertion sequence number.
    next_seq: Mutex<u64>,
}

impl FileStore {
    /// Open or create the store directory.
    ///
    /// Leftover temporary files from an interrupted write are discarded and
    /// unparseable records are moved aside.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(StoreError::from_io)?;

        let mut next_seq = 0;
        let mut entries = fs::read_dir(&dir).await.map_err(StoreError::from_io)?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some(RECORD_EXT) => {
                    if let Some(stored) = load_record(&path).await? {
                        next_seq = next_seq.max(stored.seq + 1);
                    }
                }
                Some(TEMP_EXT) => {
                    debug!(path = %path.display(), "removing interrupted write");
                    fs::remove_file(&path).await?;
                }
                _ => {}
            }
        }

        info!(dir = %dir.display(), next_seq, "opened offline queue");
        Ok(Self {
            dir,
            quota: None,
            next_seq: Mutex::new(next_seq),
        })
    }

    /// Refuse new records once `limit` are stored.
    pub fn with_quota(mut self, limit: usize) -> Self {
        self.quota = Some(limit);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: ExpenseId) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_EXT}"))
    }

    async fn read_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let mut stored = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await.map_err(StoreError::from_io)?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXT) {
                if let Some(record) = load_record(&path).await? {
                    stored.push(record);
                }
            }
        }
        stored.sort_by_key(|s| s.seq);
        Ok(stored)
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension(TEMP_EXT);
        let mut file = fs::File::create(&tmp).await.map_err(StoreError::from_io)?;
        file.write_all(bytes).await.map_err(StoreError::from_io)?;
        file.sync_all().await.map_err(StoreError::from_io)?;
        drop(file);
        fs::rename(&tmp, path).await.map_err(StoreError::from_io)?;
        Ok(())
    }
}

/// Read one record file. `None` means the file was moved aside or skipped.
async fn load_record(path: &Path) -> Result<Option<StoredRecord>, StoreError> {
    let bytes = fs::read(path).await.map_err(StoreError::from_io)?;
    let stored: StoredRecord = match serde_json::from_slice(&bytes) {
        Ok(stored) => stored,
        Err(e) => {
            let target = path.with_extension(CORRUPT_EXT);
            warn!(path = %path.display(), error = %e, "moving unreadable record aside");
            fs::rename(path, &target).await.map_err(StoreError::from_io)?;
            return Ok(None);
        }
    };
    if let Err(e) = check_version(&stored.record) {
        warn!(path = %path.display(), error = %e, "skipping record");
        return Ok(None);
    }
    Ok(Some(stored))
}

#[async_trait]
impl QueueStore for FileStore {
    async fn enqueue(&self, record: &QueuedExpense) -> Result<(), StoreError> {
        check_version(record)?;
        let mut next_seq = self.next_seq.lock().await;
        let path = self.record_path(record.id());

        let existing = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<StoredRecord>(&bytes)
                .ok()
                .map(|s| s.seq),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::from_io(e)),
        };
        let seq = match existing {
            Some(seq) => seq,
            None => {
                if let Some(limit) = self.quota {
                    if self.read_all().await?.len() >= limit {
                        return Err(StoreError::QuotaExceeded(format!(
                            "record limit of {limit} reached"
                        )));
                    }
                }
                let seq = *next_seq;
                *next_seq += 1;
                seq
            }
        };

        let bytes = serde_json::to_vec(&StoredRecord {
            seq,
            record: record.clone(),
        })?;
        self.write_atomic(&path, &bytes).await?;
        debug!(id = %record.id(), seq, "queued expense written");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<QueuedExpense>, StoreError> {
        let _guard = self.next_seq.lock().await;
        Ok(self.read_all().await?.into_iter().map(|s| s.record).collect())
    }

    async fn remove(&self, id: ExpenseId) -> Result<(), StoreError> {
        let _guard = self.next_seq.lock().await;
        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => {
                debug!(id = %id, "queued expense removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::from_io(e)),
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.next_seq.lock().await;
        let mut removed = 0usize;
        let mut entries = fs::read_dir(&self.dir).await.map_err(StoreError::from_io)?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(RECORD_EXT | CORRUPT_EXT) = path.extension().and_then(|e| e.to_str()) {
                fs::remove_file(&path).await.map_err(StoreError::from_io)?;
                removed += 1;
            }
        }
        info!(removed, dir = %self.dir.display(), "offline queue cleared");
        Ok(())
    }
}
