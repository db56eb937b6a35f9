//! Chunk store for partially received uploads
//!
//! Every upload owns one data file `<root>/<upload_id>` plus an optional
//! `<root>/<upload_id>.info` sidecar holding the serialized [`UploadSession`].
//! Appends must start exactly at the current end of the data file.
//!
//! A per-id activity table serializes work on the same upload inside this
//! process: one append at a time, and no appends once finalization has claimed
//! the upload. Finalization holds a [`ChunkLease`], which removes the chunk
//! files when released or dropped.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;
use vidup_core::UploadSession;

use crate::traits::{StorageError, StorageResult};

const INFO_SUFFIX: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    Appending,
    Finalizing,
}

type ActivityTable = Arc<Mutex<HashMap<String, Activity>>>;

fn lock_table(table: &ActivityTable) -> MutexGuard<'_, HashMap<String, Activity>> {
    // A panic while holding the lock cannot leave the map half-updated
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks an upload as busy until dropped.
struct ActivityGuard {
    table: ActivityTable,
    upload_id: String,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        lock_table(&self.table).remove(&self.upload_id);
    }
}

/// Resolved paths of one upload inside the chunk store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHandle {
    upload_id: String,
    data_path: PathBuf,
    info_path: PathBuf,
}

impl ChunkHandle {
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }
}

/// File-per-upload holding area for bytes that have not been finalized yet.
#[derive(Clone)]
pub struct ChunkStore {
    root: PathBuf,
    activity: ActivityTable,
}

impl ChunkStore {
    /// Create a chunk store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create chunk store directory {}: {}",
                root.display(),
                e
            ))
        })?;

        tracing::info!(path = %root.display(), "Chunk store initialized");

        Ok(Self {
            root,
            activity: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mint a new upload id: 32 lowercase hex characters.
    pub fn new_upload_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    fn handle_for(&self, upload_id: &str) -> StorageResult<ChunkHandle> {
        let valid = !upload_id.is_empty()
            && upload_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(upload_id.to_string()));
        }

        Ok(ChunkHandle {
            upload_id: upload_id.to_string(),
            data_path: self.root.join(upload_id),
            info_path: self.root.join(format!("{}.{}", upload_id, INFO_SUFFIX)),
        })
    }

    fn begin(&self, upload_id: &str, activity: Activity) -> StorageResult<ActivityGuard> {
        let mut table = lock_table(&self.activity);
        match table.get(upload_id) {
            Some(Activity::Finalizing) => {
                return Err(StorageError::AlreadyFinalized(upload_id.to_string()))
            }
            Some(Activity::Appending) => return Err(StorageError::Busy(upload_id.to_string())),
            None => {}
        }
        table.insert(upload_id.to_string(), activity);

        Ok(ActivityGuard {
            table: self.activity.clone(),
            upload_id: upload_id.to_string(),
        })
    }

    fn is_finalizing(&self, upload_id: &str) -> bool {
        lock_table(&self.activity).get(upload_id) == Some(&Activity::Finalizing)
    }

    /// Create the data file for `upload_id`, or return the existing one.
    pub async fn open(&self, upload_id: &str) -> StorageResult<ChunkHandle> {
        let handle = self.handle_for(upload_id)?;
        if self.is_finalizing(upload_id) {
            return Err(StorageError::AlreadyFinalized(upload_id.to_string()));
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&handle.data_path)
            .await?;

        tracing::debug!(upload_id = %upload_id, "Chunk file opened");
        Ok(handle)
    }

    /// Resolve an existing upload. Fails with `UnknownUpload` when no data file exists.
    pub async fn lookup(&self, upload_id: &str) -> StorageResult<ChunkHandle> {
        let handle = self.handle_for(upload_id)?;
        if !fs::try_exists(&handle.data_path).await? {
            return Err(StorageError::UnknownUpload(upload_id.to_string()));
        }
        Ok(handle)
    }

    /// Number of bytes stored so far.
    pub async fn size(&self, handle: &ChunkHandle) -> StorageResult<u64> {
        match fs::metadata(&handle.data_path).await {
            Ok(metadata) => Ok(metadata.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::UnknownUpload(handle.upload_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Append `bytes` at `offset`, which must equal the current size.
    ///
    /// Returns the new size. On a failed write the file is truncated back to its
    /// previous length so a retry at the same offset is accepted.
    pub async fn append(
        &self,
        handle: &ChunkHandle,
        offset: u64,
        bytes: &[u8],
    ) -> StorageResult<u64> {
        let _guard = self.begin(&handle.upload_id, Activity::Appending)?;

        let mut file = match OpenOptions::new().append(true).open(&handle.data_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::UnknownUpload(handle.upload_id.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let current = file.metadata().await?.len();
        if offset != current {
            return Err(StorageError::RangeConflict {
                upload_id: handle.upload_id.clone(),
                expected: current,
                actual: offset,
            });
        }

        if bytes.is_empty() {
            return Ok(current);
        }

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;

        if let Err(e) = written {
            if let Err(truncate_err) = file.set_len(current).await {
                tracing::error!(
                    upload_id = %handle.upload_id,
                    error = %truncate_err,
                    "Failed to roll back partial chunk write"
                );
            }
            return Err(StorageError::UploadFailed(format!(
                "Failed to append to upload {}: {}",
                handle.upload_id, e
            )));
        }

        let new_size = current + bytes.len() as u64;
        tracing::trace!(
            upload_id = %handle.upload_id,
            offset = offset,
            size_bytes = bytes.len(),
            new_size = new_size,
            "Chunk appended"
        );
        Ok(new_size)
    }

    /// Whether the stored size has reached the declared length.
    pub async fn is_complete(&self, handle: &ChunkHandle, declared_length: u64) -> StorageResult<bool> {
        Ok(self.size(handle).await? == declared_length)
    }

    /// Delete the data file and its sidecar. Missing files are not an error.
    pub async fn remove(&self, handle: &ChunkHandle) -> StorageResult<()> {
        for path in [&handle.data_path, &handle.info_path] {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        tracing::debug!(upload_id = %handle.upload_id, "Chunk files removed");
        Ok(())
    }

    /// Persist the session next to the data file.
    pub async fn write_info(&self, handle: &ChunkHandle, session: &UploadSession) -> StorageResult<()> {
        let json = serde_json::to_vec(session)
            .map_err(|e| StorageError::BackendError(format!("Failed to serialize session: {}", e)))?;

        let tmp_path = handle.info_path.with_extension("info.tmp");
        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &handle.info_path).await?;
        Ok(())
    }

    /// Load the persisted session, with `bytes_received` taken from the data file.
    pub async fn read_info(&self, handle: &ChunkHandle) -> StorageResult<UploadSession> {
        let json = match fs::read(&handle.info_path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::UnknownUpload(handle.upload_id.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut session: UploadSession = serde_json::from_slice(&json).map_err(|e| {
            StorageError::BackendError(format!(
                "Corrupt session info for upload {}: {}",
                handle.upload_id, e
            ))
        })?;
        session.bytes_received = self.size(handle).await?;
        session.chunk_store_path = handle.data_path.clone();
        Ok(session)
    }

    /// Claim the upload for finalization.
    ///
    /// Only one claim per upload can ever succeed: a second claim, or a claim on an
    /// upload whose files are already gone, fails with `AlreadyFinalized`. Appends
    /// in flight make the claim fail with `Busy`.
    pub async fn claim(&self, handle: &ChunkHandle) -> StorageResult<ChunkLease> {
        let guard = self.begin(&handle.upload_id, Activity::Finalizing)?;

        if !fs::try_exists(&handle.data_path).await? {
            return Err(StorageError::AlreadyFinalized(handle.upload_id.clone()));
        }

        Ok(ChunkLease {
            store: self.clone(),
            handle: handle.clone(),
            _guard: guard,
            released: false,
        })
    }
}

/// Exclusive right to finalize one upload.
///
/// The chunk files are removed when the lease is released, and also when it is
/// dropped without being released (early return, error, panic unwinding).
pub struct ChunkLease {
    store: ChunkStore,
    handle: ChunkHandle,
    _guard: ActivityGuard,
    released: bool,
}

impl ChunkLease {
    pub fn handle(&self) -> &ChunkHandle {
        &self.handle
    }

    pub fn upload_id(&self) -> &str {
        &self.handle.upload_id
    }

    /// Path of the data file while the lease is held.
    pub fn path(&self) -> &Path {
        &self.handle.data_path
    }

    /// Remove whatever is left of the chunk files and end the lease.
    pub async fn release(mut self) -> StorageResult<()> {
        let result = self.store.remove(&self.handle).await;
        self.released = result.is_ok();
        result
    }
}

impl Drop for ChunkLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        // Runs before `_guard` releases the claim, so nobody can reopen the id first
        for path in [&self.handle.data_path, &self.handle.info_path] {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != ErrorKind::NotFound {
                    tracing::error!(
                        upload_id = %self.handle.upload_id,
                        path = %path.display(),
                        error = %e,
                        "Failed to remove chunk file"
                    );
                }
            }
        }
    }
}
