use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::store::errors::StoreResult;
use crate::store::types::Asset;
use crate::store::url::{map_alternative_paths, map_url, MapUrl};
use crate::typ::FullPath;

/// Result of resolving a request url.
#[derive(Debug, Clone)]
pub struct PublicAsset {
    /// The requested path, query removed.
    pub url: String,
    pub asset: Option<Arc<Asset>>,
}

/// Published assets keyed by full path.
///
/// Each asset is replaced as a whole, so a reader holding an `Arc<Asset>`
/// always sees one consistent commit.
#[derive(Debug, Default)]
pub struct AssetStore {
    assets: DashMap<FullPath, Arc<Asset>>,
}

impl AssetStore {
    pub fn get(&self, full_path: &str) -> Option<Arc<Asset>> {
        self.assets.get(full_path).map(|asset| asset.value().clone())
    }

    /// Looks up an asset, hiding token protected assets unless `token` matches.
    pub fn get_public(&self, full_path: &str, token: Option<&str>) -> Option<Arc<Asset>> {
        let asset = self.get(full_path)?;

        match &asset.key.token {
            None => Some(asset),
            Some(asset_token) if token == Some(asset_token.as_str()) => Some(asset),
            Some(_) => None,
        }
    }

    /// Resolves a request url, trying html aliases before the exact path.
    pub fn get_public_for_url(&self, url: &str) -> StoreResult<PublicAsset> {
        let MapUrl { path, token } = map_url(url)?;

        // first match wins
        let asset = map_alternative_paths(&path)
            .iter()
            .chain(std::iter::once(&path))
            .find_map(|candidate| self.get_public(candidate, token.as_deref()));

        Ok(PublicAsset { url: path, asset })
    }

    /// Builds and stores the next version of `full_path` under the entry lock,
    /// so concurrent commits to the same path apply one after the other.
    pub(crate) fn publish<F>(&self, full_path: &str, build: F) -> StoreResult<Arc<Asset>>
    where
        F: FnOnce(Option<&Asset>) -> StoreResult<Asset>,
    {
        match self.assets.entry(full_path.to_string()) {
            Entry::Occupied(mut entry) => {
                let asset = Arc::new(build(Some(&**entry.get()))?);
                entry.insert(asset.clone());
                Ok(asset)
            }
            Entry::Vacant(entry) => {
                let asset = Arc::new(build(None)?);
                entry.insert(asset.clone());
                Ok(asset)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
