//! Per-handle write buffering and the multipart commit protocol.
//!
//! Writes are appended to an in-memory buffer. Once the buffer holds
//! [`FLUSH_THRESHOLD`] bytes, or when the handle is flushed on close/fsync,
//! the buffered bytes are committed to the bucket with a multipart upload.
//!
//! Two commit protocols are available, see [`FlushMode`].

use bytes::Bytes;
use object_store::{CompletedPart, ObjectStoreClient, ObjectStoreError, UploadId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Buffer size that triggers a flush from within `write`.
///
/// Also the S3 minimum size of every non-final multipart part.
pub const FLUSH_THRESHOLD: usize = 5 * 1024 * 1024;

/// How buffered bytes are committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FlushMode {
    /// Every flush creates a fresh upload holding only the current buffer as
    /// part 1 and completes it. A later flush therefore replaces whatever an
    /// earlier flush of the same handle committed.
    Replace,
    /// One upload per handle: threshold flushes add numbered parts, and the
    /// close/fsync flush uploads the tail and completes the upload, so the
    /// object ends up with every byte written through the handle.
    #[default]
    Accumulate,
}

/// What caused a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// The buffer reached [`FLUSH_THRESHOLD`] during a write.
    Threshold,
    /// The handle was closed or synced.
    Explicit,
}

#[derive(Debug)]
struct UploadSession {
    upload_id: UploadId,
    parts: Vec<CompletedPart>,
}

impl UploadSession {
    fn next_part_number(&self) -> u32 {
        self.parts.len() as u32 + 1
    }
}

/// Bytes written through one file handle that are not yet committed.
#[derive(Debug, Default)]
pub struct WriteBuffer {
    data: Vec<u8>,
    session: Option<UploadSession>,
    accepted: u64,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether an accumulating upload has been started and not yet completed.
    pub fn has_pending_upload(&self) -> bool {
        self.session.is_some()
    }

    /// Append `data` to the end of the buffer.
    ///
    /// Writes are append-only; `offset` is only checked against the number
    /// of bytes this handle has accepted so far.
    pub fn append(&mut self, data: &[u8], offset: i64) {
        if u64::try_from(offset).ok() != Some(self.accepted) {
            warn!(
                offset,
                expected = self.accepted,
                "non-sequential write, appending at end of buffer"
            );
        }
        self.data.extend_from_slice(data);
        self.accepted += data.len() as u64;
    }

    /// Drop buffered bytes and any open upload, as after a truncate.
    ///
    /// An abandoned upload is left for the bucket's lifecycle rules.
    pub fn discard(&mut self) {
        self.data.clear();
        self.session = None;
        self.accepted = 0;
    }

    pub fn should_flush(&self) -> bool {
        self.data.len() >= FLUSH_THRESHOLD
    }

    /// Commit buffered bytes to `key`.
    ///
    /// On failure the bytes that did not reach the store stay buffered and
    /// the error is returned unchanged.
    pub async fn flush(
        &mut self,
        store: &dyn ObjectStoreClient,
        key: &str,
        mode: FlushMode,
        reason: FlushReason,
    ) -> Result<(), ObjectStoreError> {
        match mode {
            FlushMode::Replace => self.replace(store, key).await,
            FlushMode::Accumulate => {
                self.upload_buffered(store, key).await?;
                if reason == FlushReason::Explicit {
                    self.complete(store, key).await?;
                }
                Ok(())
            }
        }
    }

    fn take_body(&mut self) -> Bytes {
        Bytes::from(std::mem::take(&mut self.data))
    }

    async fn replace(
        &mut self,
        store: &dyn ObjectStoreClient,
        key: &str,
    ) -> Result<(), ObjectStoreError> {
        if self.data.is_empty() {
            return Ok(());
        }

        debug!(key = %key, size = self.data.len(), "initializing multipart upload");
        let upload_id = store.create_multipart_upload(key).await?;

        let body = self.take_body();
        let part = match store.upload_part(key, &upload_id, 1, body.clone()).await {
            Ok(part) => part,
            Err(err) => {
                warn!(key = %key, error = %err, "error uploading part");
                self.data = body.to_vec();
                return Err(err);
            }
        };

        if let Err(err) = store
            .complete_multipart_upload(key, &upload_id, vec![part])
            .await
        {
            warn!(key = %key, error = %err, "error completing multipart upload");
            self.data = body.to_vec();
            return Err(err);
        }

        debug!(key = %key, size = body.len(), "buffer flushed");
        Ok(())
    }

    async fn upload_buffered(
        &mut self,
        store: &dyn ObjectStoreClient,
        key: &str,
    ) -> Result<(), ObjectStoreError> {
        if self.data.is_empty() {
            return Ok(());
        }

        let mut session = match self.session.take() {
            Some(session) => session,
            None => {
                debug!(key = %key, "initializing multipart upload");
                UploadSession {
                    upload_id: store.create_multipart_upload(key).await?,
                    parts: Vec::new(),
                }
            }
        };

        let part_number = session.next_part_number();
        let body = self.take_body();
        debug!(key = %key, part_number, size = body.len(), "uploading part");
        let outcome = match store
            .upload_part(key, &session.upload_id, part_number, body.clone())
            .await
        {
            Ok(part) => {
                session.parts.push(part);
                Ok(())
            }
            Err(err) => {
                warn!(key = %key, part_number, error = %err, "error uploading part");
                self.data = body.to_vec();
                Err(err)
            }
        };
        self.session = Some(session);
        outcome
    }

    async fn complete(
        &mut self,
        store: &dyn ObjectStoreClient,
        key: &str,
    ) -> Result<(), ObjectStoreError> {
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };

        debug!(key = %key, parts = session.parts.len(), "completing multipart upload");
        store
            .complete_multipart_upload(key, &session.upload_id, session.parts.clone())
            .await
            .inspect_err(|err| {
                warn!(key = %key, error = %err, "error completing multipart upload");
            })?;
        self.session = None;
        Ok(())
    }
}
