use std::sync::Arc;

use actix_web::web;
use asset_store::app::App as AssetApp;
use asset_store::config::{ConfigError, StoreConfig};
use asset_store::start_asset_store;
use serde::de::DeserializeOwned;

use crate::errors::AssetServerErr;

pub mod http_service;
pub mod upload_service;

pub const APP_TYPE_JSON: &str = "application/json";

pub struct AppState {
    pub(crate) store: Arc<AssetApp>,
}

impl AppState {
    pub fn new(config: StoreConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            store: start_asset_store(config)?,
        })
    }
}

/// Registers the `/api` endpoints. Asset serving is the app's default service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(upload_service::init_asset_upload)
        .service(upload_service::upload_asset_chunk)
        .service(upload_service::commit_asset_upload)
        .service(http_service::http_request)
        .service(http_service::http_request_streaming_callback)
        .service(http_service::version);
}

// One byte over the chunk limit so oversized chunks reach the store and get its error.
pub fn payload_config(state: &web::Data<AppState>) -> web::PayloadConfig {
    web::PayloadConfig::new(state.store.config.max_chunk_bytes + 1)
}

pub(crate) fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AssetServerErr> {
    Ok(serde_json::from_slice(bytes)?)
}
