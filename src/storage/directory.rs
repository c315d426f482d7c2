//! Directory storage backend
//!
//! Stores each snapshot as a pretty-printed JSON file inside one directory.
//!
//! ## Write Protocol
//!
//! ```text
//! write  .<pid>-<n>.tmp          (hidden, never matches a record name)
//! fsync  .<pid>-<n>.tmp
//! link   .<pid>-<n>.tmp → mysql_metrics_<second>[_N].json   (fails if taken → N += 1)
//! unlink .<pid>-<n>.tmp
//! ```
//!
//! Hard-linking is atomic and never replaces an existing file, so readers either see
//! a complete record or none at all, and two writers in the same second cannot
//! clobber each other.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, trace, warn};

use super::backend::SnapshotStore;
use super::error::{StorageError, StorageResult};
use super::record::RecordId;
use crate::Snapshot;

/// Distinguishes temp files of concurrent writers within one process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One-file-per-snapshot storage backend
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    /// Open (and create if needed) a snapshot directory
    #[instrument(skip_all)]
    pub async fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        debug!("snapshot directory ready at {}", dir.display());

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, id: &RecordId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    async fn write_temp(&self, body: &[u8]) -> StorageResult<PathBuf> {
        let temp = self.dir.join(format!(
            ".{}-{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let written = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(body).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        Ok(temp)
    }

    /// Link the temp file under the first free record name for this second
    async fn publish(&self, temp: &Path, snapshot: &Snapshot) -> StorageResult<RecordId> {
        let mut sequence = 0;
        loop {
            let id = RecordId::new(snapshot.timestamp, sequence);
            match fs::hard_link(temp, self.path_of(&id)).await {
                Ok(()) => return Ok(id),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    trace!("{id} already taken, trying next sequence number");
                    sequence += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl SnapshotStore for DirectoryStore {
    #[instrument(skip_all, fields(timestamp = %snapshot.timestamp))]
    async fn save(&self, snapshot: &Snapshot) -> StorageResult<RecordId> {
        let body = serde_json::to_vec_pretty(snapshot)?;
        let temp = self.write_temp(&body).await?;

        let published = self.publish(&temp, snapshot).await;

        if let Err(e) = fs::remove_file(&temp).await {
            warn!("failed to remove temp file {}: {e}", temp.display());
        }

        let id = published?;
        debug!("saved snapshot as {id}");
        Ok(id)
    }

    /// Records are ordered by second first. Within one second the sequence number
    /// reflects save order only, so the snapshots themselves decide.
    #[instrument(skip(self))]
    async fn latest(&self) -> StorageResult<Snapshot> {
        let ids = self.list().await?;

        for same_second in ids.chunk_by(|a, b| a.taken_at() == b.taken_at()).rev() {
            let mut newest: Option<Snapshot> = None;

            for id in same_second {
                match self.load(id).await {
                    Ok(snapshot) => {
                        if newest
                            .as_ref()
                            .is_none_or(|current| snapshot.timestamp >= current.timestamp)
                        {
                            newest = Some(snapshot);
                        }
                    }
                    Err(e) => warn!("skipping unreadable record {id}: {e}"),
                }
            }

            if let Some(snapshot) = newest {
                trace!("latest readable snapshot taken at {}", snapshot.timestamp);
                return Ok(snapshot);
            }
        }

        Err(StorageError::NotFound)
    }

    async fn list(&self) -> StorageResult<Vec<RecordId>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut ids = vec![];

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(id) = file_name.to_str().and_then(RecordId::parse) {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn load(&self, id: &RecordId) -> StorageResult<Snapshot> {
        let body = fs::read(self.path_of(id)).await?;

        serde_json::from_slice(&body).map_err(|e| StorageError::Corrupted {
            record: id.file_name(),
            reason: e.to_string(),
        })
    }
}
