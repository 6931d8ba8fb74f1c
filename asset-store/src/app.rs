use std::sync::Arc;

use blob_store::BlobStores;

use crate::config::{ConfigError, StoreConfig};
use crate::network::http::{
    build_headers, create_token, error_response, streaming_strategy, HttpRequest, HttpResponse,
    StreamingCallbackHttpResponse, StreamingCallbackToken,
};
use crate::store::assets::{AssetStore, PublicAsset};
use crate::store::batches::UploadSessions;
use crate::store::commit::commit_batch;
use crate::store::encoding::build_encodings;
use crate::store::errors::{StoreError, StoreResult};
use crate::store::types::{
    CommitBatch, InitAssetKey, InitUploadResult, UploadChunk, UploadChunkResult,
};

// Representation of the service state. Shared by every request handler.
pub struct App {
    pub config: Arc<StoreConfig>,
    pub uploads: UploadSessions,
    pub assets: AssetStore,
}

impl App {
    pub fn new(config: StoreConfig) -> Result<App, ConfigError> {
        let config = Arc::new(config.validate()?);
        let blobs = BlobStores::from_dir(config.chunk_dir.clone())?;

        Ok(App {
            uploads: UploadSessions::new(config.clone(), blobs),
            assets: AssetStore::default(),
            config,
        })
    }

    pub fn init_asset_upload(&self, init: InitAssetKey) -> StoreResult<InitUploadResult> {
        let batch_id = self.uploads.create_batch(init)?;
        Ok(InitUploadResult { batch_id })
    }

    pub fn upload_asset_chunk(&self, chunk: UploadChunk) -> StoreResult<UploadChunkResult> {
        let chunk_id = self.uploads.create_chunk(chunk)?;
        Ok(UploadChunkResult { chunk_id })
    }

    pub fn commit_asset_upload(&self, commit: CommitBatch) -> StoreResult<()> {
        commit_batch(&self.uploads, &self.assets, commit)?;
        Ok(())
    }

    /// Serves an asset. Failures are reported as error responses, never as `Err`.
    pub fn http_request(
        &self,
        HttpRequest {
            url,
            method,
            headers: req_headers,
            body: _,
        }: HttpRequest,
    ) -> HttpResponse {
        if !method.eq_ignore_ascii_case("GET") {
            return error_response(405, "Method Not Allowed.");
        }

        let asset = match self.assets.get_public_for_url(&url) {
            Ok(PublicAsset { asset: Some(asset), .. }) => asset,
            Ok(PublicAsset { asset: None, url }) => {
                tracing::debug!("no asset for {}", url);
                return error_response(404, "No asset found.");
            }
            Err(e) => return error_response(400, e.to_string()),
        };

        for encoding_type in build_encodings(&req_headers).iter() {
            if let Some(encoding) = asset.encodings.get(encoding_type) {
                let headers = build_headers(&asset, encoding_type);

                if encoding.total_length <= self.config.max_response_bytes {
                    return HttpResponse {
                        status_code: 200,
                        headers,
                        body: encoding.body(),
                        streaming_strategy: None,
                    };
                }

                return HttpResponse {
                    body: encoding.content_chunks[0].clone(),
                    status_code: 200,
                    streaming_strategy: streaming_strategy(
                        &asset.key,
                        encoding,
                        encoding_type,
                        &headers,
                        &self.config.callback_service,
                    ),
                    headers,
                };
            }
        }

        error_response(500, "No asset encoding found.")
    }

    /// Serves the page a continuation token points at.
    pub fn http_request_streaming_callback(
        &self,
        StreamingCallbackToken {
            full_path,
            encoding_type,
            index,
            sha256,
            token,
            headers,
        }: StreamingCallbackToken,
    ) -> StoreResult<StreamingCallbackHttpResponse> {
        let asset = self
            .assets
            .get_public(&full_path, token.as_deref())
            .ok_or_else(|| StoreError::AssetNotFound(full_path.clone()))?;

        let encoding = asset
            .encodings
            .get(&encoding_type)
            .ok_or_else(|| StoreError::EncodingNotFound(encoding_type.clone()))?;

        if let Some(expected) = sha256 {
            if expected.as_slice() != encoding.sha256.as_slice() {
                tracing::warn!("{} was replaced while streaming", full_path);
                return Err(StoreError::StaleAsset(full_path));
            }
        }

        let page = usize::try_from(index)
            .ok()
            .and_then(|offset| encoding.page_at(offset))
            .ok_or_else(|| StoreError::InvalidStreamIndex {
                full_path: full_path.clone(),
                index,
            })?;

        let next = index as usize + page.len();
        Ok(StreamingCallbackHttpResponse {
            body: page.to_vec(),
            token: create_token(&asset.key, next, encoding, &encoding_type, &headers),
        })
    }

    pub fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    pub fn clear_expired_batches(&self) -> usize {
        self.uploads.clear_expired_batches()
    }
}
