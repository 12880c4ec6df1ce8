//! Tote Server - document service for cart and wishlist synchronization.
//!
//! Stores one document per user per list kind in PostgreSQL and pushes
//! every new revision to long-poll and WebSocket subscribers.

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod routes;
mod websocket;

use crate::config::Config;
use crate::db::Pool;
use crate::websocket::SubscriptionHub;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub config: Arc<Config>,
    pub hub: Arc<SubscriptionHub>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tote_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Tote Server on {}:{}", config.host, config.port);
    if config.auth_secret.is_none() {
        tracing::warn!("AUTH_SECRET is not set, accepting unauthenticated requests");
    }

    let pool = db::create_pool(&config.database_url).await?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        hub: SubscriptionHub::new_shared(),
    };

    let app = routes::create_app(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
