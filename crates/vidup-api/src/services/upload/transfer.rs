//! Resumable transfer engine
//!
//! Drives the chunk store for uploads that arrive over several requests and
//! triggers finalization when the last byte of the declared length is stored.

use vidup_core::{AppError, FinalizedArtifact, RawMetadata, UploadSession};
use vidup_storage::ChunkStore;

use super::finalizer::UploadFinalizer;

/// Result of creating an upload. `artifact` is set when the declared length was zero.
#[derive(Debug)]
pub struct CreatedUpload {
    pub upload_id: String,
    pub artifact: Option<FinalizedArtifact>,
}

/// Result of an append. `artifact` is set when the append completed the upload.
#[derive(Debug)]
pub struct AppendOutcome {
    pub offset: u64,
    pub artifact: Option<FinalizedArtifact>,
}

#[derive(Clone)]
pub struct TransferService {
    chunks: ChunkStore,
    finalizer: UploadFinalizer,
    max_upload_size_bytes: u64,
}

impl TransferService {
    pub fn new(chunks: ChunkStore, finalizer: UploadFinalizer, max_upload_size_bytes: u64) -> Self {
        Self {
            chunks,
            finalizer,
            max_upload_size_bytes,
        }
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_bytes
    }

    fn check_size(&self, length: u64) -> Result<(), AppError> {
        if length > self.max_upload_size_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Upload length {} exceeds the maximum of {} bytes",
                length, self.max_upload_size_bytes
            )));
        }
        Ok(())
    }

    /// Start a new upload. `None` defers the length until a later append.
    pub async fn create(
        &self,
        declared_length: Option<u64>,
        metadata: RawMetadata,
    ) -> Result<CreatedUpload, AppError> {
        if let Some(length) = declared_length {
            self.check_size(length)?;
        }

        let upload_id = ChunkStore::new_upload_id();
        let handle = self.chunks.open(&upload_id).await?;
        let session = UploadSession::new(upload_id.clone(), declared_length, metadata);

        if let Err(e) = self.chunks.write_info(&handle, &session).await {
            if let Err(cleanup_err) = self.chunks.remove(&handle).await {
                tracing::warn!(upload_id = %upload_id, error = %cleanup_err, "Failed to clean up chunk file");
            }
            return Err(e.into());
        }

        tracing::info!(
            upload_id = %upload_id,
            declared_length = ?declared_length,
            "Upload created"
        );

        // Nothing will ever be appended to an empty upload
        let artifact = if declared_length == Some(0) {
            Some(self.finalizer.finalize(&upload_id, &session.metadata).await?)
        } else {
            None
        };

        Ok(CreatedUpload {
            upload_id,
            artifact,
        })
    }

    /// Current state of an upload that has not been finalized yet.
    pub async fn status(&self, upload_id: &str) -> Result<UploadSession, AppError> {
        let handle = self.chunks.lookup(upload_id).await?;
        Ok(self.chunks.read_info(&handle).await?)
    }

    /// Append `bytes` at `offset`, finalizing the upload if this completes it.
    ///
    /// `upload_length` sets a deferred length; it must not contradict a length
    /// that is already known.
    pub async fn append(
        &self,
        upload_id: &str,
        offset: u64,
        bytes: &[u8],
        upload_length: Option<u64>,
    ) -> Result<AppendOutcome, AppError> {
        let handle = self.chunks.lookup(upload_id).await?;
        let mut session = self.chunks.read_info(&handle).await?;

        // A stale offset is a conflict even when the chunk would also overrun the length
        if offset != session.bytes_received {
            return Err(AppError::RangeConflict {
                upload_id: upload_id.to_string(),
                expected: session.bytes_received,
                actual: offset,
            });
        }

        if let Some(length) = upload_length {
            match session.declared_length {
                None => {
                    self.check_size(length)?;
                    if length < session.bytes_received {
                        return Err(AppError::BadRequest(format!(
                            "Upload-Length {} is smaller than the {} bytes already received",
                            length, session.bytes_received
                        )));
                    }
                    session.declared_length = Some(length);
                    self.chunks.write_info(&handle, &session).await?;
                }
                Some(existing) if existing != length => {
                    return Err(AppError::BadRequest(format!(
                        "Upload-Length {} does not match the declared length {}",
                        length, existing
                    )));
                }
                Some(_) => {}
            }
        }

        let end = offset.saturating_add(bytes.len() as u64);
        let limit = session
            .declared_length
            .unwrap_or(self.max_upload_size_bytes);
        if end > limit {
            return Err(AppError::PayloadTooLarge(format!(
                "Chunk ending at byte {} exceeds the upload length {}",
                end, limit
            )));
        }

        let new_offset = self.chunks.append(&handle, offset, bytes).await?;

        let complete = match session.declared_length {
            Some(declared) => self.chunks.is_complete(&handle, declared).await?,
            None => false,
        };

        let artifact = if complete {
            tracing::debug!(upload_id = %upload_id, size_bytes = new_offset, "Upload complete");
            Some(self.finalizer.finalize(upload_id, &session.metadata).await?)
        } else {
            None
        };

        Ok(AppendOutcome {
            offset: new_offset,
            artifact,
        })
    }

    /// Abandon an upload and delete its chunk files.
    pub async fn abort(&self, upload_id: &str) -> Result<(), AppError> {
        let handle = self.chunks.lookup(upload_id).await?;
        let lease = self.chunks.claim(&handle).await?;
        lease.release().await?;
        tracing::info!(upload_id = %upload_id, "Upload aborted");
        Ok(())
    }
}
