use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use blob_store::BlobStores;
use dashmap::DashMap;
use validator::Validate;

use crate::config::StoreConfig;
use crate::store::encoding::get_encoding_type;
use crate::store::errors::{StoreError, StoreResult};
use crate::store::types::{AssetKey, Batch, Chunk, InitAssetKey, UploadChunk};
use crate::typ::{BatchId, ChunkId};

/// Tracks in-progress uploads and owns their buffered chunk bytes.
pub struct UploadSessions {
    config: Arc<StoreConfig>,
    batches: DashMap<BatchId, Batch>,
    /// Committed batch ids and when they were committed.
    committed: DashMap<BatchId, Instant>,
    next_batch_id: AtomicU64,
    next_chunk_id: AtomicU64,
    blobs: BlobStores,
}

// Hands out 1, 2, 3, ... and `None` once the id space is used up.
fn next_id(counter: &AtomicU64) -> Option<u64> {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| current.checked_add(1))
        .ok()
        .map(|previous| previous + 1)
}

impl UploadSessions {
    pub fn new(config: Arc<StoreConfig>, blobs: BlobStores) -> Self {
        Self {
            config,
            batches: DashMap::new(),
            committed: DashMap::new(),
            next_batch_id: AtomicU64::new(0),
            next_chunk_id: AtomicU64::new(0),
            blobs,
        }
    }

    pub fn create_batch(&self, init: InitAssetKey) -> StoreResult<BatchId> {
        init.validate()
            .map_err(|e| StoreError::InvalidKey(e.to_string()))?;
        if !init.full_path.starts_with('/') {
            return Err(StoreError::InvalidKey(format!(
                "full_path {} must start with /",
                init.full_path
            )));
        }
        let encoding_type = get_encoding_type(&init.encoding_type)?;

        self.clear_expired_batches();

        if self.batches.len() >= self.config.max_live_batches {
            return Err(StoreError::ResourceExhausted("too many open batches"));
        }
        let batch_id = next_id(&self.next_batch_id)
            .ok_or(StoreError::ResourceExhausted("batch ids"))?;

        tracing::debug!("batch {} opened for {}", batch_id, init.full_path);
        self.batches.insert(
            batch_id,
            Batch {
                key: AssetKey::from(init),
                encoding_type,
                chunks: BTreeMap::new(),
                next_arrival: 0,
                expires_at: Instant::now() + self.config.batch_ttl,
            },
        );

        Ok(batch_id)
    }

    pub fn create_chunk(
        &self,
        UploadChunk {
            batch_id,
            content,
            order_id,
        }: UploadChunk,
    ) -> StoreResult<ChunkId> {
        let now = Instant::now();
        self.ensure_live(batch_id, now)?;

        if content.len() > self.config.max_chunk_bytes {
            return Err(StoreError::ChunkTooLarge {
                size: content.len(),
                max: self.config.max_chunk_bytes,
            });
        }

        let chunk_id = next_id(&self.next_chunk_id)
            .ok_or(StoreError::ResourceExhausted("chunk ids"))?;

        // written outside the shard lock
        self.blobs
            .as_trait()
            .upload_chunk(&chunk_id.to_string(), &content)?;

        let mut batch = match self.batches.get_mut(&batch_id) {
            Some(batch) if !batch.is_expired(now) => batch,
            _ => {
                self.discard_chunk(chunk_id);
                return Err(StoreError::UnknownBatch(batch_id));
            }
        };

        let order_id = order_id.unwrap_or(batch.next_arrival);
        batch.next_arrival += 1;
        batch.chunks.insert(
            chunk_id,
            Chunk {
                order_id,
                length: content.len(),
            },
        );
        batch.expires_at = now + self.config.batch_ttl;
        drop(batch);

        tracing::trace!("chunk {} ({} bytes) added to batch {}", chunk_id, content.len(), batch_id);
        Ok(chunk_id)
    }

    /// Takes a batch out of the live map so that only one commit can work on it.
    /// Until it is restored or finished, uploads to it see `UnknownBatch`.
    pub(crate) fn claim_batch(&self, batch_id: BatchId) -> StoreResult<Batch> {
        let now = Instant::now();

        match self.batches.remove(&batch_id) {
            Some((_, batch)) if batch.is_expired(now) => {
                self.delete_chunks(&batch);
                Err(StoreError::UnknownBatch(batch_id))
            }
            Some((_, batch)) => Ok(batch),
            None if self.committed.contains_key(&batch_id) => {
                Err(StoreError::AlreadyCommitted(batch_id))
            }
            None => Err(StoreError::UnknownBatch(batch_id)),
        }
    }

    /// Puts back a claimed batch whose commit failed.
    pub(crate) fn restore_batch(&self, batch_id: BatchId, batch: Batch) {
        self.batches.insert(batch_id, batch);
    }

    /// Records a successful commit and releases the batch's chunk bytes.
    pub(crate) fn finish_batch(&self, batch_id: BatchId, batch: Batch) {
        self.committed.insert(batch_id, Instant::now());
        self.delete_chunks(&batch);
    }

    pub(crate) fn read_chunk(&self, chunk_id: ChunkId) -> StoreResult<Vec<u8>> {
        Ok(self.blobs.as_trait().read_chunk(&chunk_id.to_string())?)
    }

    /// Drops batches past their deadline and forgets old commits. Returns how many batches went.
    pub fn clear_expired_batches(&self) -> usize {
        let now = Instant::now();

        let expired: Vec<BatchId> = self
            .batches
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| *entry.key())
            .collect();

        let removed = expired
            .into_iter()
            .filter(|batch_id| self.expire_batch(*batch_id, now))
            .count();

        let ttl = self.config.batch_ttl;
        self.committed
            .retain(|_, committed_at| now.duration_since(*committed_at) < ttl);

        if removed > 0 {
            tracing::info!("cleared {} expired batches", removed);
        }
        removed
    }

    pub fn live_batches(&self) -> usize {
        self.batches.len()
    }

    fn expire_batch(&self, batch_id: BatchId, now: Instant) -> bool {
        match self.batches.remove_if(&batch_id, |_, batch| batch.is_expired(now)) {
            Some((_, batch)) => {
                tracing::debug!("batch {} expired with {} buffered bytes", batch_id, batch.buffered_bytes());
                self.delete_chunks(&batch);
                true
            }
            None => false,
        }
    }

    fn ensure_live(&self, batch_id: BatchId, now: Instant) -> StoreResult<()> {
        let expired = match self.batches.get(&batch_id) {
            Some(batch) => batch.is_expired(now),
            None => return Err(StoreError::UnknownBatch(batch_id)),
        };

        if expired {
            self.expire_batch(batch_id, now);
            return Err(StoreError::UnknownBatch(batch_id));
        }
        Ok(())
    }

    fn delete_chunks(&self, batch: &Batch) {
        for chunk_id in batch.chunks.keys() {
            self.discard_chunk(*chunk_id);
        }
    }

    fn discard_chunk(&self, chunk_id: ChunkId) {
        if let Err(e) = self.blobs.as_trait().delete_chunk(&chunk_id.to_string()) {
            tracing::warn!("failed to release chunk {}: {}", chunk_id, e);
        }
    }

    #[cfg(test)]
    pub(crate) fn exhaust_ids(&self) {
        self.next_batch_id.store(u64::MAX, Ordering::SeqCst);
        self.next_chunk_id.store(u64::MAX, Ordering::SeqCst);
    }
}
