mod badge;
mod block_chain;
mod config;
mod db;
mod error;
mod mint;
mod routes;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::block_chain::{ChainService, Network};
use crate::config::{AppConfig, ChainConfig};
use crate::db::{MemoryStore, ProgressStore};
use crate::mint::dispatcher::{BadgeDispatch, SimulatedDispatch};
use crate::mint::queue::{MintQueue, MintWorker};
use crate::routes::BadgeState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("invalid server configuration")?;
    let (queue, receiver) = MintQueue::new(config.queue_capacity, &config.metadata_base_url);

    // a broken chain setup degrades to simulation instead of stopping the server
    let (dispatcher, state): (Arc<dyn BadgeDispatch>, BadgeState) =
        match ChainConfig::from_env().and_then(|chain| ChainService::initialize(&chain)) {
            Ok(service) => {
                let networks = service.dispatcher.networks();
                info!(?networks, sender = ?service.sender, "Badge minting enabled");
                let state = BadgeState {
                    queue: queue.clone(),
                    balances: Some(service.balances.clone()),
                    networks,
                    init_error: None,
                };
                let dispatcher: Arc<dyn BadgeDispatch> = service.dispatcher;
                (dispatcher, state)
            }
            Err(e) => {
                warn!(error = %e, "Blockchain service unavailable, running in SIMULATION MODE");
                let networks = Network::ALL.to_vec();
                let state = BadgeState {
                    queue: queue.clone(),
                    balances: None,
                    networks: networks.clone(),
                    init_error: Some(e.to_string()),
                };
                let dispatcher: Arc<dyn BadgeDispatch> = Arc::new(SimulatedDispatch::new(networks));
                (dispatcher, state)
            }
        };

    let worker = MintWorker::new(receiver, dispatcher).spawn();
    let store: Arc<dyn ProgressStore> = Arc::new(MemoryStore::new());

    let state = web::Data::new(state);
    let store = web::Data::new(store);
    info!(bind_address = %config.bind_address, "Starting HTTP server");
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .app_data(store.clone())
            .configure(routes::configure)
    })
    .bind(&config.bind_address)
    .with_context(|| format!("failed to bind {}", config.bind_address))?
    .run();

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server terminated");
            }
        }
        result = worker => {
            if let Err(e) = result {
                error!(error = %e, "Mint worker terminated");
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received, terminating all tasks"),
    }

    info!("Application shutdown complete");
    Ok(())
}
