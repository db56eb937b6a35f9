//! Single-shot uploads
//!
//! The whole file arrives in one request. It is streamed into a fresh chunk-store
//! entry with contiguous appends and finalized straight away; nothing about the
//! partial state is ever exposed to the client.

use std::fmt::Display;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use vidup_core::{AppError, FinalizedArtifact, StorageTarget, UploadMetadata};
use vidup_storage::{ChunkHandle, ChunkStore};

use super::finalizer::UploadFinalizer;

pub const NO_FILE_MESSAGE: &str = "No file was uploaded.";

/// Body frames are coalesced up to this size before each append.
pub const DEFAULT_APPEND_BUFFER_BYTES: usize = 4 * 1024 * 1024;

#[derive(Clone)]
pub struct UploadGateway {
    chunks: ChunkStore,
    finalizer: UploadFinalizer,
    max_upload_size_bytes: u64,
    append_buffer_bytes: usize,
}

impl UploadGateway {
    pub fn new(chunks: ChunkStore, finalizer: UploadFinalizer, max_upload_size_bytes: u64) -> Self {
        Self {
            chunks,
            finalizer,
            max_upload_size_bytes,
            append_buffer_bytes: DEFAULT_APPEND_BUFFER_BYTES,
        }
    }

    #[cfg(test)]
    fn with_append_buffer(mut self, bytes: usize) -> Self {
        self.append_buffer_bytes = bytes.max(1);
        self
    }

    /// Store `body` under `target` and finalize it.
    ///
    /// An empty body is rejected with `BadRequest` and leaves nothing behind.
    pub async fn upload_single<S, E>(
        &self,
        filename: Option<String>,
        content_type: Option<String>,
        target: StorageTarget,
        body: S,
    ) -> Result<FinalizedArtifact, AppError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Display,
    {
        let upload_id = ChunkStore::new_upload_id();
        let handle = self.chunks.open(&upload_id).await?;

        match self.receive(&handle, body).await {
            Ok(0) => {
                self.discard(&handle).await;
                return Err(AppError::BadRequest(NO_FILE_MESSAGE.to_string()));
            }
            Ok(size) => {
                tracing::debug!(upload_id = %upload_id, size_bytes = size, "Single-shot body received");
            }
            Err(e) => {
                self.discard(&handle).await;
                return Err(e);
            }
        }

        let metadata = UploadMetadata {
            filename: filename.unwrap_or_default(),
            storage_type: target.to_string(),
            content_type,
        };
        self.finalizer.finalize_decoded(&upload_id, metadata).await
    }

    async fn receive<S, E>(&self, handle: &ChunkHandle, body: S) -> Result<u64, AppError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Display,
    {
        let mut body = std::pin::pin!(body);
        let mut buffer = BytesMut::new();
        let mut offset = 0u64;
        let mut received = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk
                .map_err(|e| AppError::BadRequest(format!("Failed to read upload body: {}", e)))?;

            received += chunk.len() as u64;
            if received > self.max_upload_size_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "File exceeds the maximum of {} bytes",
                    self.max_upload_size_bytes
                )));
            }

            buffer.extend_from_slice(&chunk);
            if buffer.len() >= self.append_buffer_bytes {
                offset = self.chunks.append(handle, offset, &buffer).await?;
                buffer.clear();
            }
        }

        if !buffer.is_empty() {
            offset = self.chunks.append(handle, offset, &buffer).await?;
        }

        Ok(offset)
    }

    async fn discard(&self, handle: &ChunkHandle) {
        if let Err(e) = self.chunks.remove(handle).await {
            tracing::warn!(upload_id = %handle.upload_id(), error = %e, "Failed to discard chunk file");
        }
    }
}
