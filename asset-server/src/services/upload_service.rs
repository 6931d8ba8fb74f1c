use actix_web::{post, web, HttpResponse};
use asset_store::store::types::{CommitBatch, InitAssetKey, UploadChunk};
use serde::Deserialize;

use crate::errors::AssetServerErr;
use crate::services::{parse_json, AppState, APP_TYPE_JSON};

#[derive(Deserialize, Debug)]
pub struct UploadChunkQuery {
    batch_id: u64,
    order_id: Option<u64>,
}

#[post("/api/init_asset_upload")]
async fn init_asset_upload(
    request_json_bytes: web::Bytes,
    shared_state: web::Data<AppState>,
) -> Result<HttpResponse, AssetServerErr> {
    let key: InitAssetKey = parse_json(&request_json_bytes)?;
    tracing::debug!("init upload of {}", key.full_path);

    let store = shared_state.store.clone();
    let res = web::block(move || store.init_asset_upload(key)).await??;
    Ok(HttpResponse::Ok().content_type(APP_TYPE_JSON).json(res))
}

#[post("/api/upload_asset_chunk")]
async fn upload_asset_chunk(
    query: web::Query<UploadChunkQuery>,
    content: web::Bytes,
    shared_state: web::Data<AppState>,
) -> Result<HttpResponse, AssetServerErr> {
    let UploadChunkQuery { batch_id, order_id } = query.into_inner();
    let chunk = UploadChunk {
        batch_id,
        content: content.to_vec(),
        order_id,
    };

    let store = shared_state.store.clone();
    let res = web::block(move || store.upload_asset_chunk(chunk)).await??;
    Ok(HttpResponse::Ok().content_type(APP_TYPE_JSON).json(res))
}

#[post("/api/commit_asset_upload")]
async fn commit_asset_upload(
    request_json_bytes: web::Bytes,
    shared_state: web::Data<AppState>,
) -> Result<HttpResponse, AssetServerErr> {
    let commit: CommitBatch = parse_json(&request_json_bytes)?;

    let store = shared_state.store.clone();
    web::block(move || store.commit_asset_upload(commit)).await??;
    Ok(HttpResponse::NoContent().finish())
}
