use serde::{Deserialize, Serialize};

use crate::store::encoding::ASSET_ENCODING_NO_COMPRESSION;
use crate::store::types::{Asset, AssetEncoding, AssetKey};
use crate::typ::{FullPath, HeaderField};

pub const STREAMING_CALLBACK_METHOD: &str = "http_request_streaming_callback";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: Vec<HeaderField>,
    #[serde(default)]
    pub body: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: Vec<HeaderField>,
    pub body: Vec<u8>,
    pub streaming_strategy: Option<StreamingStrategy>,
}

/// Continuation of a paged response: the token to send back, and where to send it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum StreamingStrategy {
    Callback {
        token: StreamingCallbackToken,
        callback: CallbackTarget,
    },
}

/// Names the operation that serves the next page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CallbackTarget {
    pub service: String,
    pub method: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StreamingCallbackToken {
    pub full_path: FullPath,
    pub encoding_type: String,
    /// Byte offset of the next page.
    pub index: u64,
    pub sha256: Option<Vec<u8>>,
    /// Access token of a protected asset.
    pub token: Option<String>,
    #[serde(default)]
    pub headers: Vec<HeaderField>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StreamingCallbackHttpResponse {
    pub body: Vec<u8>,
    pub token: Option<StreamingCallbackToken>,
}

pub fn error_response(status_code: u16, message: impl Into<String>) -> HttpResponse {
    HttpResponse {
        status_code,
        headers: Vec::new(),
        body: message.into().into_bytes(),
        streaming_strategy: None,
    }
}

/// Stored headers, plus `Content-Encoding` for compressed variants.
pub fn build_headers(asset: &Asset, encoding_type: &str) -> Vec<HeaderField> {
    let mut headers = asset.headers.clone();

    let declared = headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("content-encoding"));
    if encoding_type != ASSET_ENCODING_NO_COMPRESSION && !declared {
        headers.push(("Content-Encoding".to_string(), encoding_type.to_string()));
    }

    headers
}

/// Token for the page starting at `index`, or `None` once the content is exhausted.
pub fn create_token(
    key: &AssetKey,
    index: usize,
    encoding: &AssetEncoding,
    encoding_type: &str,
    headers: &[HeaderField],
) -> Option<StreamingCallbackToken> {
    if index >= encoding.total_length {
        return None;
    }

    Some(StreamingCallbackToken {
        full_path: key.full_path.clone(),
        encoding_type: encoding_type.to_string(),
        index: index as u64,
        sha256: Some(encoding.sha256.to_vec()),
        token: key.token.clone(),
        headers: headers.to_vec(),
    })
}

pub fn streaming_strategy(
    key: &AssetKey,
    encoding: &AssetEncoding,
    encoding_type: &str,
    headers: &[HeaderField],
    service: &str,
) -> Option<StreamingStrategy> {
    let first_page = encoding.content_chunks.first().map(Vec::len).unwrap_or(0);

    create_token(key, first_page, encoding, encoding_type, headers).map(|token| {
        StreamingStrategy::Callback {
            token,
            callback: CallbackTarget {
                service: service.to_string(),
                method: STREAMING_CALLBACK_METHOD.to_string(),
            },
        }
    })
}
