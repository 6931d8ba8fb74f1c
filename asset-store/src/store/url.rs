use std::path::Path;

use percent_encoding::percent_decode_str;
use url::{ParseError, Url};

use crate::store::errors::{StoreError, StoreResult};

/// Lookup path and access token of a requested url.
#[derive(Debug, Clone, PartialEq)]
pub struct MapUrl {
    pub path: String,
    pub token: Option<String>,
}

/// Splits a request url into its path (query dropped) and its `token` parameter.
pub fn map_url(url: &str) -> StoreResult<MapUrl> {
    let parsed_url = build_url(url).map_err(|_| StoreError::InvalidUrl(url.to_string()))?;

    let token = parsed_url
        .query_pairs()
        .find(|(name, _)| name == "token")
        .map(|(_, value)| value.into_owned());

    // keys are stored unencoded
    let path = percent_decode_str(parsed_url.path())
        .decode_utf8()
        .map_err(|_| StoreError::InvalidUrl(url.to_string()))?
        .into_owned();

    Ok(MapUrl { path, token })
}

/// Paths tried before the exact one when the request has no file extension.
pub fn map_alternative_paths(path: &str) -> Vec<String> {
    match Path::new(path).extension() {
        Some(_) => Vec::new(),
        None => aliases_of(path),
    }
}

// /about -> /about.html, /about/index.html ; /docs/ -> /docs/index.html
fn aliases_of(key: &str) -> Vec<String> {
    if key.ends_with('/') {
        vec![format!("{}index.html", key)]
    } else if !key.ends_with(".html") {
        vec![format!("{}.html", key), format!("{}/index.html", key)]
    } else {
        Vec::new()
    }
}

fn build_url(url: &str) -> Result<Url, ParseError> {
    let separator = if url.starts_with('/') { "" } else { "/" };

    Url::parse(&["http://localhost", separator, url].join(""))
}
