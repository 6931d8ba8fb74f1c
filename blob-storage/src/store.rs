use std::path::PathBuf;
use crate::local_store::LocalFileBlobStore;
use crate::memory_store::MemoryBlobStore;

/// Byte buffer for uploaded chunks, keyed by chunk id.
pub trait BlobStore: Send + Sync {
    /// Stores a chunk, replacing any previous content under the same id.
    fn upload_chunk(&self, chunk_id: &str, data: &[u8]) -> std::io::Result<()>;

    /// Reads a chunk back. Unknown ids fail with `ErrorKind::NotFound`.
    fn read_chunk(&self, chunk_id: &str) -> std::io::Result<Vec<u8>>;

    /// Deletes a chunk. Deleting an unknown id is not an error.
    fn delete_chunk(&self, chunk_id: &str) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub enum BlobStores {
    Memory(MemoryBlobStore),
    Local(LocalFileBlobStore),
}

impl BlobStores {
    /// Memory-backed buffer when no directory is given, file-backed otherwise.
    pub fn from_dir(directory: Option<PathBuf>) -> std::io::Result<Self> {
        match directory {
            None => Ok(BlobStores::Memory(MemoryBlobStore::default())),
            Some(dir) => {
                std::fs::create_dir_all(&dir)?;
                Ok(BlobStores::Local(LocalFileBlobStore::new(dir)))
            }
        }
    }

    /// Returns a reference to the inner value as a trait object.
    pub fn as_trait(&self) -> &dyn BlobStore {
        match self {
            BlobStores::Memory(a) => a,
            BlobStores::Local(b) => b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_from_dir_picks_backend() {
        let memory = BlobStores::from_dir(None).unwrap();
        assert!(matches!(memory, BlobStores::Memory(_)));

        let temp_dir = tempdir().unwrap();
        let nested = temp_dir.path().join("chunks");
        let local = BlobStores::from_dir(Some(nested.clone())).unwrap();
        assert!(matches!(local, BlobStores::Local(_)));
        assert!(nested.is_dir());
    }

    #[test]
    fn test_backends_behave_alike() {
        let temp_dir = tempdir().unwrap();
        let stores = vec![
            BlobStores::from_dir(None).unwrap(),
            BlobStores::from_dir(Some(temp_dir.path().to_path_buf())).unwrap(),
        ];

        for store in stores {
            let store = store.as_trait();
            store.upload_chunk("7", b"seven").unwrap();
            assert_eq!(store.read_chunk("7").unwrap(), b"seven");

            store.delete_chunk("7").unwrap();
            let err = store.read_chunk("7").unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::NotFound);

            // deleting twice is fine
            store.delete_chunk("7").unwrap();
        }
    }
}
