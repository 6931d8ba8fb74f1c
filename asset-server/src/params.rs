use std::path::PathBuf;
use std::time::Duration;

use asset_store::config::{
    StoreConfig, DEFAULT_MAX_CHUNK_BYTES, DEFAULT_MAX_LIVE_BATCHES, DEFAULT_MAX_RESPONSE_BYTES,
};
use asset_store::typ::HeaderField;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(name = "asset-server", version, about = "Chunked asset upload and streaming server")]
pub struct Args {
    #[clap(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Upload a file to a running server.
    Upload(UploadArgs),
    /// Download an asset from a running server.
    Fetch(FetchArgs),
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[clap(long, env = "ASSET_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    pub(crate) http_addr: String,
    /// Buffer uploaded chunks on disk instead of in memory.
    #[clap(long, env = "ASSET_CHUNK_DIR")]
    pub(crate) chunk_dir: Option<PathBuf>,
    #[clap(long, env = "ASSET_MAX_CHUNK_BYTES", default_value_t = DEFAULT_MAX_CHUNK_BYTES)]
    pub(crate) max_chunk_bytes: usize,
    #[clap(long, env = "ASSET_MAX_RESPONSE_BYTES", default_value_t = DEFAULT_MAX_RESPONSE_BYTES)]
    pub(crate) max_response_bytes: usize,
    #[clap(long, env = "ASSET_BATCH_TTL_SECS", default_value_t = 300)]
    pub(crate) batch_ttl_secs: u64,
    #[clap(long, env = "ASSET_MAX_LIVE_BATCHES", default_value_t = DEFAULT_MAX_LIVE_BATCHES)]
    pub(crate) max_live_batches: usize,
    /// Seconds between sweeps of expired batches.
    #[clap(long, env = "ASSET_REAP_INTERVAL_SECS", default_value_t = 60)]
    pub(crate) reap_interval_secs: u64,
}

impl ServeArgs {
    pub(crate) fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_chunk_bytes: self.max_chunk_bytes,
            max_response_bytes: self.max_response_bytes,
            batch_ttl: Duration::from_secs(self.batch_ttl_secs),
            max_live_batches: self.max_live_batches,
            chunk_dir: self.chunk_dir.clone(),
            ..Default::default()
        }
    }
}

#[derive(Parser, Debug)]
pub struct UploadArgs {
    #[clap(long, env = "ASSET_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    pub(crate) server: String,
    pub(crate) file: PathBuf,
    #[clap(long, default_value = "assets")]
    pub(crate) collection: String,
    /// Defaults to `/<file name>`.
    #[clap(long)]
    pub(crate) full_path: Option<String>,
    #[clap(long)]
    pub(crate) description: Option<String>,
    #[clap(long)]
    pub(crate) encoding: Option<String>,
    /// Access token required to read the asset.
    #[clap(long)]
    pub(crate) token: Option<String>,
    /// Response header stored with the asset, as `NAME=VALUE`. Repeatable.
    #[clap(long = "header", value_parser = parse_header)]
    pub(crate) headers: Vec<HeaderField>,
    #[clap(long, default_value_t = DEFAULT_MAX_CHUNK_BYTES)]
    pub(crate) chunk_size: usize,
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    #[clap(long, env = "ASSET_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    pub(crate) server: String,
    /// Request url, e.g. `/index.html` or `/private.txt?token=...`.
    pub(crate) url: String,
    /// Write the body here instead of stdout.
    #[clap(long, short)]
    pub(crate) output: Option<PathBuf>,
    #[clap(long)]
    pub(crate) accept_encoding: Option<String>,
}

fn parse_header(s: &str) -> Result<HeaderField, String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {:?}", s))?;
    if name.trim().is_empty() {
        return Err(format!("empty header name in {:?}", s));
    }
    Ok((name.trim().to_string(), value.trim().to_string()))
}
