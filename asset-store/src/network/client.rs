use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;

use crate::network::http::{
    HttpRequest, HttpResponse, StreamingCallbackHttpResponse, StreamingCallbackToken,
    StreamingStrategy,
};
use crate::store::types::{
    CommitBatch, InitAssetKey, InitUploadResult, UploadChunkResult,
};
use crate::typ::{BatchId, ChunkId, HeaderField};

const DEFAULT_MAX_RETRIES: usize = 3;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{url} answered with status {status}")]
    Http { url: String, status: u16 },
}

impl ClientError {
    fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }
}

/// Talks to an asset server over its `/api` endpoints.
#[derive(Clone)]
pub struct AssetClient {
    base_url: String,
    client: reqwest::Client,
    max_retries: usize,
}

impl AssetClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub async fn init_asset_upload(&self, key: &InitAssetKey) -> Result<BatchId, ClientError> {
        let res: InitUploadResult = self
            .send_request_with_retries("api/init_asset_upload", key, self.max_retries)
            .await?;
        Ok(res.batch_id)
    }

    /// Uploads one chunk. Not retried: a retry after a lost response would
    /// leave an orphan chunk that the commit then rejects.
    pub async fn upload_asset_chunk(
        &self,
        batch_id: BatchId,
        order_id: Option<u64>,
        content: Vec<u8>,
    ) -> Result<ChunkId, ClientError> {
        let url = format!("{}/api/upload_asset_chunk", self.base_url);
        let mut query = vec![("batch_id", batch_id)];
        if let Some(order_id) = order_id {
            query.push(("order_id", order_id));
        }

        let response = self
            .client
            .post(&url)
            .query(&query)
            .body(content)
            .send()
            .await?;
        let res: UploadChunkResult = Self::read_json(response).await?;
        Ok(res.chunk_id)
    }

    pub async fn commit_asset_upload(&self, commit: &CommitBatch) -> Result<(), ClientError> {
        let url = format!("{}/api/commit_asset_upload", self.base_url);
        let response = self.client.post(&url).json(commit).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    pub async fn http_request(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
        self.send_request_with_retries("api/http_request", request, self.max_retries)
            .await
    }

    pub async fn http_request_streaming_callback(
        &self,
        token: &StreamingCallbackToken,
    ) -> Result<StreamingCallbackHttpResponse, ClientError> {
        self.send_request_with_retries("api/http_request_streaming_callback", token, self.max_retries)
            .await
    }

    pub async fn version(&self) -> Result<String, ClientError> {
        let url = format!("{}/api/version", self.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(Self::check_status(response).await?.text().await?)
    }

    /// Runs a whole upload: init, one request per chunk, then commit.
    pub async fn upload_asset(
        &self,
        key: &InitAssetKey,
        content: &[u8],
        chunk_size: usize,
        headers: Vec<HeaderField>,
    ) -> Result<BatchId, ClientError> {
        let batch_id = self.init_asset_upload(key).await?;

        let mut chunk_ids = Vec::new();
        if content.is_empty() {
            chunk_ids.push(self.upload_asset_chunk(batch_id, Some(0), Vec::new()).await?);
        }
        for (order_id, chunk) in content.chunks(chunk_size.max(1)).enumerate() {
            let chunk_id = self
                .upload_asset_chunk(batch_id, Some(order_id as u64), chunk.to_vec())
                .await?;
            chunk_ids.push(chunk_id);
        }

        tracing::debug!("uploaded {} chunks to batch {}", chunk_ids.len(), batch_id);
        self.commit_asset_upload(&CommitBatch {
            batch_id,
            chunk_ids,
            headers,
        })
        .await?;
        Ok(batch_id)
    }

    /// Fetches a full asset, following continuation tokens until the last page.
    pub async fn fetch_asset(
        &self,
        url: &str,
        headers: Vec<HeaderField>,
    ) -> Result<(Vec<HeaderField>, Vec<u8>), ClientError> {
        let response = self
            .http_request(&HttpRequest {
                url: url.to_string(),
                method: "GET".to_string(),
                headers,
                body: Vec::new(),
            })
            .await?;

        if response.status_code != 200 {
            return Err(ClientError::Http {
                url: url.to_string(),
                status: response.status_code,
            });
        }

        let mut body = response.body;
        let mut next = response
            .streaming_strategy
            .map(|StreamingStrategy::Callback { token, .. }| token);

        while let Some(token) = next {
            let page = self.http_request_streaming_callback(&token).await?;
            body.extend_from_slice(&page.body);
            next = page.token;
        }

        Ok((response.headers, body))
    }

    async fn send_request_with_retries<T, R>(
        &self,
        endpoint: &str,
        body: &T,
        max_retries: usize,
    ) -> Result<R, ClientError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut retries = 0;
        let mut delay = Duration::from_millis(5);
        loop {
            match self.send_request(endpoint, body).await {
                Ok(res) => return Ok(res),
                Err(err) => {
                    if !err.is_retryable() || retries >= max_retries {
                        return Err(err);
                    }
                    retries += 1;
                    tracing::warn!(
                        "request to {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        endpoint,
                        retries,
                        max_retries,
                        err,
                        delay
                    );
                    sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    async fn send_request<T, R>(&self, endpoint: &str, body: &T) -> Result<R, ClientError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self.client.post(&url).json(body).send().await?;
        Self::read_json(response).await
    }

    async fn read_json<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, ClientError> {
        let response_text = Self::check_status(response).await?.text().await?;
        Ok(serde_json::from_str(&response_text)?)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }
}
