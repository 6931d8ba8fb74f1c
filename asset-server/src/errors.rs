use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use asset_store::config::ConfigError;
use asset_store::network::client::ClientError;
use asset_store::store::errors::StoreError;
use serde_json::error::Error as SerdeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetServerErr {
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] SerdeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Worker pool is unavailable")]
    Blocking(#[from] BlockingError),
}

impl ResponseError for AssetServerErr {
    fn status_code(&self) -> StatusCode {
        match self {
            AssetServerErr::Json(_) => StatusCode::BAD_REQUEST,
            AssetServerErr::Store(e) => store_status(e),
            AssetServerErr::Blocking(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        HttpResponse::build(status).body(self.to_string())
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::UnknownBatch(_)
        | StoreError::AssetNotFound(_)
        | StoreError::EncodingNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::AlreadyCommitted(_)
        | StoreError::StaleAsset(_)
        | StoreError::CollectionMismatch { .. } => StatusCode::CONFLICT,
        StoreError::ChunkTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        StoreError::InvalidStreamIndex { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
        StoreError::MissingChunk { .. }
        | StoreError::IncompleteBatch { .. }
        | StoreError::EmptyCommit(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::InvalidKey(_)
        | StoreError::InvalidUrl(_)
        | StoreError::UnsupportedEncoding(_)
        | StoreError::InvalidHeader(_) => StatusCode::BAD_REQUEST,
        StoreError::ResourceExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Blob(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Failures of the command line entry points.
#[derive(Debug, Error)]
pub enum CliErr {
    #[error("Invalid store configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Client(#[from] ClientError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (StoreError::UnknownBatch(1), 404),
            (StoreError::AlreadyCommitted(1), 409),
            (StoreError::StaleAsset("/a".to_string()), 409),
            (StoreError::ChunkTooLarge { size: 3, max: 2 }, 413),
            (
                StoreError::InvalidStreamIndex {
                    full_path: "/a".to_string(),
                    index: 1,
                },
                416,
            ),
            (StoreError::MissingChunk { batch_id: 1, chunk_id: 2 }, 422),
            (StoreError::EmptyCommit(1), 422),
            (StoreError::UnsupportedEncoding("lz4".to_string()), 400),
            (StoreError::ResourceExhausted("batch ids"), 503),
        ];

        for (err, status) in cases {
            assert_eq!(AssetServerErr::from(err).status_code().as_u16(), status);
        }
    }
}
