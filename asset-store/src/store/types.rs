use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use validator::Validate;

use crate::typ::{BatchId, ChunkId, FullPath, HeaderField};

/// Asset identity declared by the client when an upload starts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Validate)]
pub struct InitAssetKey {
    #[validate(length(min = 1))]
    pub collection: String,
    #[validate(length(min = 1))]
    pub full_path: FullPath,
    #[validate(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    /// `identity` when absent.
    pub encoding_type: Option<String>,
    /// When set, the published asset is only served to requests carrying this token.
    pub token: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InitUploadResult {
    pub batch_id: BatchId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UploadChunk {
    pub batch_id: BatchId,
    pub content: Vec<u8>,
    pub order_id: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UploadChunkResult {
    pub chunk_id: ChunkId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CommitBatch {
    pub batch_id: BatchId,
    /// Final byte order. Empty means "every uploaded chunk, by order id".
    #[serde(default)]
    pub chunk_ids: Vec<ChunkId>,
    #[serde(default)]
    pub headers: Vec<HeaderField>,
}

/// Identity of a stored asset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AssetKey {
    pub collection: String,
    pub full_path: FullPath,
    pub name: String,
    pub description: Option<String>,
    pub token: Option<String>,
}

impl From<InitAssetKey> for AssetKey {
    fn from(init: InitAssetKey) -> Self {
        let InitAssetKey {
            collection,
            full_path,
            name,
            description,
            token,
            encoding_type: _,
        } = init;
        AssetKey {
            collection,
            full_path,
            name,
            description,
            token,
        }
    }
}

/// Bookkeeping for one uploaded chunk. The bytes live in the chunk buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub order_id: u64,
    pub length: usize,
}

/// An upload in progress.
#[derive(Debug, Clone)]
pub struct Batch {
    pub key: AssetKey,
    pub encoding_type: String,
    pub chunks: BTreeMap<ChunkId, Chunk>,
    /// Arrival sequence handed to the next chunk uploaded without an order id.
    pub next_arrival: u64,
    pub expires_at: Instant,
}

impl Batch {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn buffered_bytes(&self) -> usize {
        self.chunks.values().map(|chunk| chunk.length).sum()
    }
}

/// One content variant of an asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetEncoding {
    pub modified: u64,
    /// Non-empty pieces in commit order. Each one is a page of a streamed response.
    pub content_chunks: Vec<Vec<u8>>,
    pub total_length: usize,
    pub sha256: [u8; 32],
    offsets: Vec<usize>,
}

impl AssetEncoding {
    pub fn new(content_chunks: Vec<Vec<u8>>, modified: u64) -> Self {
        let content_chunks: Vec<Vec<u8>> = content_chunks
            .into_iter()
            .filter(|chunk| !chunk.is_empty())
            .collect();

        let mut hasher = Sha256::new();
        let mut offsets = Vec::with_capacity(content_chunks.len());
        let mut total_length = 0;

        for chunk in content_chunks.iter() {
            offsets.push(total_length);
            total_length += chunk.len();
            hasher.update(chunk);
        }

        let mut sha256 = [0u8; 32];
        sha256.copy_from_slice(&hasher.finalize());

        AssetEncoding {
            modified,
            content_chunks,
            total_length,
            sha256,
            offsets,
        }
    }

    /// The whole content as one buffer.
    pub fn body(&self) -> Vec<u8> {
        self.content_chunks.concat()
    }

    /// The content chunk starting at byte `offset`, if a chunk starts there.
    pub fn page_at(&self, offset: usize) -> Option<&[u8]> {
        self.offsets
            .binary_search(&offset)
            .ok()
            .map(|i| self.content_chunks[i].as_slice())
    }

    pub fn sha256_hex(&self) -> String {
        self.sha256.iter().map(|byte| format!("{:02x}", byte)).collect()
    }
}

/// A published, servable asset.
#[derive(Debug, Clone)]
pub struct Asset {
    pub key: AssetKey,
    pub headers: Vec<HeaderField>,
    pub encodings: HashMap<String, Arc<AssetEncoding>>,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Nanoseconds since the unix epoch.
pub fn unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_digest_and_length() {
        let encoding = AssetEncoding::new(vec![b"CD".to_vec(), b"AB".to_vec()], 1);
        assert_eq!(encoding.total_length, 4);
        assert_eq!(encoding.body(), b"CDAB");

        let expected: [u8; 32] = {
            let mut out = [0u8; 32];
            out.copy_from_slice(&Sha256::digest(b"CDAB"));
            out
        };
        assert_eq!(encoding.sha256, expected);
        assert_eq!(encoding.sha256_hex().len(), 64);
    }

    #[test]
    fn test_pages_start_on_chunk_boundaries() {
        let encoding = AssetEncoding::new(
            vec![b"abc".to_vec(), Vec::new(), b"de".to_vec(), b"f".to_vec()],
            1,
        );
        // the empty chunk is dropped
        assert_eq!(encoding.content_chunks.len(), 3);

        assert_eq!(encoding.page_at(0), Some(&b"abc"[..]));
        assert_eq!(encoding.page_at(3), Some(&b"de"[..]));
        assert_eq!(encoding.page_at(5), Some(&b"f"[..]));
        assert_eq!(encoding.page_at(1), None);
        assert_eq!(encoding.page_at(6), None);
    }

    #[test]
    fn test_empty_encoding() {
        let encoding = AssetEncoding::new(vec![Vec::new()], 1);
        assert_eq!(encoding.total_length, 0);
        assert!(encoding.body().is_empty());
        assert_eq!(encoding.page_at(0), None);
    }

    #[test]
    fn test_key_from_init_drops_encoding() {
        let init = InitAssetKey {
            collection: "images".to_string(),
            full_path: "/logo.png".to_string(),
            name: "logo.png".to_string(),
            description: None,
            encoding_type: Some("gzip".to_string()),
            token: Some("secret".to_string()),
        };
        let key = AssetKey::from(init);
        assert_eq!(key.full_path, "/logo.png");
        assert_eq!(key.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_commit_batch_defaults() {
        let commit: CommitBatch = serde_json::from_str(r#"{"batch_id": 4}"#).unwrap();
        assert_eq!(commit.batch_id, 4);
        assert!(commit.chunk_ids.is_empty());
        assert!(commit.headers.is_empty());
    }
}
