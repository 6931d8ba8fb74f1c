use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use crate::store::BlobStore;

/// Keeps every chunk in its own file under `base_path`.
#[derive(Clone, Debug)]
pub struct LocalFileBlobStore {
    base_path: PathBuf,
}

impl LocalFileBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into() }
    }

    fn chunk_path(&self, chunk_id: &str) -> PathBuf {
        self.base_path.join(chunk_id)
    }
}

impl BlobStore for LocalFileBlobStore {
    fn upload_chunk(&self, chunk_id: &str, data: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.chunk_path(chunk_id))?;
        file.write_all(data)?;
        Ok(())
    }

    fn read_chunk(&self, chunk_id: &str) -> std::io::Result<Vec<u8>> {
        fs::read(self.chunk_path(chunk_id))
    }

    fn delete_chunk(&self, chunk_id: &str) -> std::io::Result<()> {
        match fs::remove_file(self.chunk_path(chunk_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::warn!("failed to delete chunk file {}: {}", chunk_id, e);
                Err(e)
            }
        }
    }
}
