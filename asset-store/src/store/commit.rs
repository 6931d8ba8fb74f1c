use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::store::assets::AssetStore;
use crate::store::batches::UploadSessions;
use crate::store::errors::{StoreError, StoreResult};
use crate::store::types::{Asset, AssetEncoding, Batch, CommitBatch, unix_nanos};
use crate::typ::{BatchId, ChunkId, HeaderField};

/// Turns a batch into a published asset. All or nothing: on error the
/// batch is left open and no asset changes.
///
/// The batch is out of the live map while the commit runs, so a concurrent
/// `create_chunk` on it fails with `UnknownBatch` even if this commit is then
/// rejected and the batch restored. Uploads must finish before the commit.
pub fn commit_batch(
    sessions: &UploadSessions,
    assets: &AssetStore,
    commit: CommitBatch,
) -> StoreResult<Arc<Asset>> {
    let batch_id = commit.batch_id;
    let batch = sessions.claim_batch(batch_id)?;

    match commit_chunks(sessions, assets, commit, &batch) {
        Ok(asset) => {
            sessions.finish_batch(batch_id, batch);
            Ok(asset)
        }
        Err(e) => {
            tracing::debug!("commit of batch {} rejected: {}", batch_id, e);
            sessions.restore_batch(batch_id, batch);
            Err(e)
        }
    }
}

fn commit_chunks(
    sessions: &UploadSessions,
    assets: &AssetStore,
    CommitBatch {
        batch_id,
        chunk_ids,
        headers,
    }: CommitBatch,
    batch: &Batch,
) -> StoreResult<Arc<Asset>> {
    validate_headers(&headers)?;

    let ordered = resolve_order(batch_id, batch, &chunk_ids)?;

    let mut content_chunks: Vec<Vec<u8>> = Vec::with_capacity(ordered.len());
    for chunk_id in ordered.iter() {
        content_chunks.push(sessions.read_chunk(*chunk_id)?);
    }

    let now = unix_nanos();
    let encoding = Arc::new(AssetEncoding::new(content_chunks, now));

    let asset = assets.publish(&batch.key.full_path, |current| {
        let mut asset = Asset {
            key: batch.key.clone(),
            headers,
            encodings: HashMap::new(),
            created_at: now,
            updated_at: now,
        };

        if let Some(current) = current {
            if current.key.collection != batch.key.collection {
                return Err(StoreError::CollectionMismatch {
                    provided: batch.key.collection.clone(),
                    existing: current.key.collection.clone(),
                });
            }
            asset.encodings = current.encodings.clone();
            asset.created_at = current.created_at;
        }

        asset
            .encodings
            .insert(batch.encoding_type.clone(), encoding.clone());
        Ok(asset)
    })?;

    tracing::info!(
        "batch {} committed to {} ({} bytes, {} encoding, sha256 {})",
        batch_id,
        batch.key.full_path,
        encoding.total_length,
        batch.encoding_type,
        encoding.sha256_hex()
    );
    Ok(asset)
}

/// Byte order of the committed chunks.
///
/// An explicit list is authoritative; repeated ids count once. An empty list
/// falls back to the order ids given at upload time.
fn resolve_order(batch_id: BatchId, batch: &Batch, chunk_ids: &[ChunkId]) -> StoreResult<Vec<ChunkId>> {
    if batch.chunks.is_empty() {
        return Err(StoreError::EmptyCommit(batch_id));
    }

    if chunk_ids.is_empty() {
        let mut ordered: Vec<(ChunkId, u64)> = batch
            .chunks
            .iter()
            .map(|(chunk_id, chunk)| (*chunk_id, chunk.order_id))
            .collect();
        ordered.sort_by_key(|(chunk_id, order_id)| (*order_id, *chunk_id));
        return Ok(ordered.into_iter().map(|(chunk_id, _)| chunk_id).collect());
    }

    let mut seen = HashSet::with_capacity(chunk_ids.len());
    let mut ordered = Vec::with_capacity(chunk_ids.len());

    for chunk_id in chunk_ids.iter() {
        if !batch.chunks.contains_key(chunk_id) {
            return Err(StoreError::MissingChunk {
                batch_id,
                chunk_id: *chunk_id,
            });
        }
        if seen.insert(*chunk_id) {
            ordered.push(*chunk_id);
        } else {
            tracing::debug!("chunk {} listed twice in batch {}", chunk_id, batch_id);
        }
    }

    let unreferenced: Vec<ChunkId> = batch
        .chunks
        .keys()
        .filter(|chunk_id| !seen.contains(*chunk_id))
        .copied()
        .collect();
    if !unreferenced.is_empty() {
        return Err(StoreError::IncompleteBatch {
            batch_id,
            unreferenced,
        });
    }

    Ok(ordered)
}

fn validate_headers(headers: &[HeaderField]) -> StoreResult<()> {
    for (name, value) in headers.iter() {
        let valid_name = !name.is_empty() && name.bytes().all(is_token_byte);
        let valid_value = value
            .bytes()
            .all(|b| b == b'\t' || (0x20..0x7f).contains(&b));

        if !valid_name || !valid_value {
            return Err(StoreError::InvalidHeader(name.clone()));
        }
    }
    Ok(())
}

// RFC 9110 token characters
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
