use std::sync::Arc;

use actix_web::http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpRequest, HttpResponse, HttpResponseBuilder};
use asset_store::app::App as AssetApp;
use asset_store::network::http::{
    HttpRequest as AssetRequest, HttpResponse as AssetResponse, StreamingCallbackToken,
    StreamingStrategy,
};
use futures::stream::{self, StreamExt};

use crate::errors::AssetServerErr;
use crate::services::{parse_json, AppState, APP_TYPE_JSON};

#[post("/api/http_request")]
async fn http_request(
    request_json_bytes: web::Bytes,
    shared_state: web::Data<AppState>,
) -> Result<HttpResponse, AssetServerErr> {
    let req: AssetRequest = parse_json(&request_json_bytes)?;

    let store = shared_state.store.clone();
    let res = web::block(move || store.http_request(req)).await?;
    Ok(HttpResponse::Ok().content_type(APP_TYPE_JSON).json(res))
}

#[post("/api/http_request_streaming_callback")]
async fn http_request_streaming_callback(
    request_json_bytes: web::Bytes,
    shared_state: web::Data<AppState>,
) -> Result<HttpResponse, AssetServerErr> {
    let token: StreamingCallbackToken = parse_json(&request_json_bytes)?;

    let store = shared_state.store.clone();
    let res = web::block(move || store.http_request_streaming_callback(token)).await??;
    Ok(HttpResponse::Ok().content_type(APP_TYPE_JSON).json(res))
}

#[get("/api/version")]
async fn version(shared_state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().body(shared_state.store.version())
}

/// Serves any other request as an asset. Paged assets are streamed to the end
/// by following their callback tokens here.
pub async fn serve_asset(
    req: HttpRequest,
    shared_state: web::Data<AppState>,
) -> Result<HttpResponse, AssetServerErr> {
    let asset_req = AssetRequest {
        url: req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
        method: req.method().as_str().to_string(),
        headers: req
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect(),
        body: Vec::new(),
    };

    let store = shared_state.store.clone();
    let res = web::block(move || store.http_request(asset_req)).await?;
    Ok(into_http_response(res, shared_state.store.clone()))
}

fn into_http_response(res: AssetResponse, store: Arc<AssetApp>) -> HttpResponse {
    let status = StatusCode::from_u16(res.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponseBuilder::new(status);

    // actix computes the framing itself
    for (name, value) in res.headers.iter() {
        if name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str())
            || name.eq_ignore_ascii_case(TRANSFER_ENCODING.as_str())
        {
            continue;
        }
        builder.append_header((name.as_str(), value.as_str()));
    }

    let token = match res.streaming_strategy {
        None => return builder.body(res.body),
        Some(StreamingStrategy::Callback { token, .. }) => token,
    };

    let first_page = web::Bytes::from(res.body);
    let first = stream::once(async move { Ok::<_, AssetServerErr>(first_page) });
    let rest = stream::unfold(Some(token), move |next| {
        let store = store.clone();
        async move {
            let token = next?;
            match web::block(move || store.http_request_streaming_callback(token)).await {
                Ok(Ok(page)) => Some((Ok(web::Bytes::from(page.body)), page.token)),
                Ok(Err(e)) => {
                    tracing::warn!("streaming stopped: {}", e);
                    Some((Err(AssetServerErr::from(e)), None))
                }
                Err(e) => Some((Err(AssetServerErr::from(e)), None)),
            }
        }
    });

    builder.streaming(first.chain(rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header;
    use actix_web::{test, App};
    use asset_store::config::StoreConfig;
    use asset_store::store::types::{CommitBatch, InitAssetKey, UploadChunk};
    use serde_json::json;

    use crate::services::{configure, payload_config};

    fn publish(state: &AppState, init: InitAssetKey, chunks: &[&[u8]], headers: Vec<(String, String)>) {
        let batch_id = state.store.init_asset_upload(init).unwrap().batch_id;
        let chunk_ids = chunks
            .iter()
            .map(|content| {
                state
                    .store
                    .upload_asset_chunk(UploadChunk {
                        batch_id,
                        content: content.to_vec(),
                        order_id: None,
                    })
                    .unwrap()
                    .chunk_id
            })
            .collect();
        state
            .store
            .commit_asset_upload(CommitBatch {
                batch_id,
                chunk_ids,
                headers,
            })
            .unwrap();
    }

    fn key(full_path: &str) -> InitAssetKey {
        InitAssetKey {
            collection: "site".to_string(),
            full_path: full_path.to_string(),
            name: full_path.trim_start_matches('/').to_string(),
            description: None,
            encoding_type: None,
            token: None,
        }
    }

    fn state() -> web::Data<AppState> {
        web::Data::new(
            AppState::new(StoreConfig {
                max_response_bytes: 4,
                ..Default::default()
            })
            .unwrap(),
        )
    }

    #[actix_web::test]
    async fn test_paged_asset_is_streamed_whole() {
        let state = state();
        publish(
            &state,
            key("/index.html"),
            &[b"<html>", b"<body>", b"</html>"],
            vec![("Content-Type".to_string(), "text/html".to_string())],
        );
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .app_data(payload_config(&state))
                .configure(configure)
                .default_service(web::to(serve_asset)),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "text/html");
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], b"<html><body></html>");
    }

    #[actix_web::test]
    async fn test_plain_get_errors() {
        let state = state();
        let mut protected = key("/private.txt");
        protected.token = Some("t0k".to_string());
        publish(&state, protected, &[b"hi"], Vec::new());
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(configure)
                .default_service(web::to(serve_asset)),
        )
        .await;

        let req = test::TestRequest::get().uri("/private.txt").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/private.txt?token=t0k").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(&test::read_body(resp).await[..], b"hi");

        let req = test::TestRequest::delete().uri("/private.txt").to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[actix_web::test]
    async fn test_rpc_endpoints() {
        let state = state();
        publish(&state, key("/big.bin"), &[b"01234", b"56789"], Vec::new());
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/http_request")
            .set_json(json!({"url": "/big.bin", "method": "GET"}))
            .to_request();
        let res: AssetResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(res.body, b"01234");
        let Some(StreamingStrategy::Callback { token, callback }) = res.streaming_strategy else {
            panic!("expected a streaming strategy");
        };
        assert_eq!(callback.method, "http_request_streaming_callback");

        let req = test::TestRequest::post()
            .uri("/api/http_request_streaming_callback")
            .set_json(&token)
            .to_request();
        let page: asset_store::network::http::StreamingCallbackHttpResponse =
            test::call_and_read_body_json(&app, req).await;
        assert_eq!(page.body, b"56789");
        assert!(page.token.is_none());

        let mut misaligned = token;
        misaligned.index = 3;
        let req = test::TestRequest::post()
            .uri("/api/http_request_streaming_callback")
            .set_json(&misaligned)
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::RANGE_NOT_SATISFIABLE
        );

        let req = test::TestRequest::get().uri("/api/version").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(&body[..], env!("CARGO_PKG_VERSION").as_bytes());
    }
}
