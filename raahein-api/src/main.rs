use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use raahein_api::{app, worker, AppState};
use raahein_core::MarketStore;
use raahein_engine::{Market, MarketPolicy};
use raahein_store::app_config::{Config, StorageBackend};
use raahein_store::{DbClient, MemoryStore, RateLimiter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "raahein_api=debug,raahein_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Raahein API on port {}", config.server.port);

    let store: Arc<dyn MarketStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(db.market_store())
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let rules = &config.business_rules;
    let policy = MarketPolicy::new(rules.cancellation_cutoff_minutes, rules.request_ttl_hours);
    let market = Arc::new(Market::new(store, policy));

    let mut state = AppState::new(market.clone(), config.auth.jwt_secret.clone());
    match &config.redis {
        Some(redis) => {
            let limiter = RateLimiter::new(
                &redis.url,
                config.rate_limit.requests_per_window,
                config.rate_limit.window_seconds,
            )
            .context("Invalid Redis URL")?;
            state = state.with_rate_limiter(limiter);
        }
        None => tracing::info!("No Redis configured, rate limiting disabled"),
    }

    worker::spawn_expiry_sweeper(
        market,
        std::time::Duration::from_secs(rules.sweep_interval_seconds),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
