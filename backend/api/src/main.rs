//! Stratafi API entry point.
//!
//! Serves the campaign, contribution and wallet endpoints over Axum and runs
//! a background sweeper that opens and finalizes fundraising windows on
//! schedule. State lives in SQLite.

mod api;
mod config;
mod db;
mod errors;
mod records;
mod service;
mod sweeper;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use service::Service;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;
    let service = Service::new(pool, config.policy.clone(), config.treasury_wallet.clone());
    let shutdown = CancellationToken::new();

    // ─── Lifecycle sweeper ────────────────────────────────
    let sweeper = tokio::spawn(sweeper::run(
        service.clone(),
        config.sweep_interval_secs,
        shutdown.clone(),
    ));

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(api::ApiState { service });

    let app = Router::new()
        .route("/health", get(api::health))
        .route(
            "/campaigns",
            get(api::list_campaigns).post(api::create_campaign),
        )
        .route("/campaigns/:id", get(api::get_campaign))
        .route(
            "/campaigns/:id/contributions",
            get(api::get_contributions).post(api::contribute),
        )
        .route("/campaigns/:id/finalize", post(api::finalize))
        .route("/campaigns/:id/activate", post(api::activate))
        .route("/campaigns/:id/wallets/:holder", get(api::get_wallet))
        .route(
            "/campaigns/:id/wallets/:holder/release",
            post(api::release),
        )
        .route("/campaigns/:id/wallets/:holder/unlock", post(api::unlock))
        .route(
            "/campaigns/:id/wallets/:holder/transfer",
            post(api::transfer),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(api_state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    sweeper.await?;
    Ok(())
}
