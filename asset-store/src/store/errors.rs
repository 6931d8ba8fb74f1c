use thiserror::Error;

use crate::typ::{BatchId, ChunkId, FullPath};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Batch {0} not found")]
    UnknownBatch(BatchId),

    #[error("Batch {0} has already been committed")]
    AlreadyCommitted(BatchId),

    #[error("Chunk {chunk_id} was not uploaded to batch {batch_id}")]
    MissingChunk { batch_id: BatchId, chunk_id: ChunkId },

    #[error("Batch {batch_id} has uploaded chunks missing from the commit: {unreferenced:?}")]
    IncompleteBatch {
        batch_id: BatchId,
        unreferenced: Vec<ChunkId>,
    },

    #[error("Chunk of {size} bytes exceeds the limit of {max} bytes")]
    ChunkTooLarge { size: usize, max: usize },

    #[error("Asset {0} changed while it was being streamed")]
    StaleAsset(FullPath),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(&'static str),

    #[error("Batch {0} has no chunk to commit")]
    EmptyCommit(BatchId),

    #[error("Invalid asset key: {0}")]
    InvalidKey(String),

    #[error("Invalid url {0}")]
    InvalidUrl(String),

    #[error("Asset encoding {0} is not supported")]
    UnsupportedEncoding(String),

    #[error("Provided collection {provided} does not match existing collection {existing}")]
    CollectionMismatch { provided: String, existing: String },

    #[error("Invalid header {0:?}")]
    InvalidHeader(String),

    #[error("Stream index {index} is not a page boundary of {full_path}")]
    InvalidStreamIndex { full_path: FullPath, index: u64 },

    #[error("Streamed asset {0} not found")]
    AssetNotFound(FullPath),

    #[error("Streamed asset encoding {0} not found")]
    EncodingNotFound(String),

    #[error("Chunk buffer failure: {0}")]
    Blob(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
