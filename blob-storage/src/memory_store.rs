use std::io::{Error, ErrorKind};
use std::sync::Arc;
use dashmap::DashMap;
use crate::store::BlobStore;

/// Chunk buffer held in process memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    chunks: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Number of chunks currently buffered.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn upload_chunk(&self, chunk_id: &str, data: &[u8]) -> std::io::Result<()> {
        self.chunks.insert(chunk_id.to_string(), data.to_vec());
        Ok(())
    }

    fn read_chunk(&self, chunk_id: &str) -> std::io::Result<Vec<u8>> {
        self.chunks
            .get(chunk_id)
            .map(|data| data.value().clone())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("chunk {} not buffered", chunk_id)))
    }

    fn delete_chunk(&self, chunk_id: &str) -> std::io::Result<()> {
        self.chunks.remove(chunk_id);
        Ok(())
    }
}
