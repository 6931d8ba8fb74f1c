mod cli;
mod errors;
mod params;
mod services;

use std::time::Duration;

use actix_web::{web, App, HttpServer};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::errors::CliErr;
use crate::params::{Args, Command, ServeArgs};
use crate::services::{configure, http_service, payload_config, AppState};

#[actix_web::main]
async fn main() -> Result<(), CliErr> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match args.command {
        Command::Serve(serve) => run_server(serve).await,
        Command::Upload(upload) => cli::upload(upload).await,
        Command::Fetch(fetch) => cli::fetch(fetch).await,
    }
}

async fn run_server(args: ServeArgs) -> Result<(), CliErr> {
    let state = web::Data::new(AppState::new(args.store_config())?);

    // Sweep expired batches in the background.
    let reaper_state = state.clone();
    let reap_interval = Duration::from_secs(args.reap_interval_secs.max(1));
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(reap_interval);
        loop {
            interval.tick().await;
            let store = reaper_state.store.clone();
            if let Err(e) = web::block(move || store.clear_expired_batches()).await {
                tracing::warn!("batch reaper failed: {}", e);
            }
        }
    });

    tracing::info!("listening on {}", args.http_addr);
    let server_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(server_state.clone())
            .app_data(payload_config(&server_state))
            .configure(configure)
            .default_service(web::to(http_service::serve_asset))
    })
    .bind(args.http_addr.clone())?
    .run()
    .await?;

    Ok(())
}
