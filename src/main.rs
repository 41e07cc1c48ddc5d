//! Post-only Executor - Entry Point
//!
//! Initializes configuration, logging and the Binance adapter, then
//! serves the webhook API until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Load Binance auth from env vars (BINANCE_API_KEY, BINANCE_API_SECRET)
//! 4. Create BinanceClient (HTTP + signing + rate limit)
//! 5. Create BinanceFutures (implements OrderGateway + MarketData)
//! 6. Build ConcurrencyGuard + PositionTransitioner under a root token
//! 7. Spawn the HTTP server (webhook, manual, cancel, health, metrics)
//! 8. Wait for SIGINT → cancel root token → openings stop, closings
//!    finish, server drains → exit once every lease is released

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use postonly_executor::adapters::binance::{
    BinanceAuth, BinanceClient, BinanceClientConfig, BinanceFutures,
};
use postonly_executor::adapters::metrics::MetricsRegistry;
use postonly_executor::adapters::server::{self, AppState};
use postonly_executor::config;
use postonly_executor::usecases::{
    ConcurrencyGuard, PositionTransitioner, RepriceConfig, TransitionConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config_path = std::env::var("POSTONLY_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config =
        config::loader::load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.bot.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.bot.name,
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.exchange.base_url,
        default_symbol = %config.bot.default_symbol,
        "Starting post-only executor"
    );

    // ── 3. Load Binance auth from env vars ──────────────────
    let auth = Arc::new(
        BinanceAuth::from_env().context("Failed to load Binance credentials from env")?,
    );
    let webhook_secret = std::env::var("TV_WEBHOOK_SECRET")
        .ok()
        .filter(|s| !s.is_empty());
    if webhook_secret.is_none() {
        warn!("TV_WEBHOOK_SECRET not set, webhook accepts unauthenticated signals");
    }

    // ── 4. Create Binance HTTP client ───────────────────────
    let client = Arc::new(
        BinanceClient::new(auth, BinanceClientConfig::from(&config.exchange))
            .context("Failed to create Binance client")?,
    );

    // ── 5. Create exchange adapter (both ports) ─────────────
    let exchange = Arc::new(BinanceFutures::new(client, &config.exchange));

    // ── 6. Core: guard + transitioner under the root token ──
    let root = CancellationToken::new();
    let guard = ConcurrencyGuard::with_root(root.clone());
    let transitioner = Arc::new(PositionTransitioner::new(
        Arc::clone(&exchange),
        exchange,
        guard.clone(),
        RepriceConfig::from(&config.execution),
        TransitionConfig::new(&config.execution, config.bot.default_quantity),
    ));

    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
    let state = AppState {
        transitioner,
        metrics,
        webhook_secret,
        default_symbol: config.bot.default_symbol.clone(),
    };

    // ── 7. Spawn HTTP server ────────────────────────────────
    let server_handle = tokio::spawn(server::serve(
        state,
        config.server.bind_address.clone(),
        root.clone(),
    ));

    info!(address = %config.server.bind_address, "Executor is running");

    // ── 8. Wait for SIGINT ──────────────────────────────────
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for SIGINT");
    }
    info!(active = guard.active().len(), "SIGINT received, initiating graceful shutdown");
    root.cancel();

    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
        Err(e) => error!(error = %e, "HTTP server task panicked"),
    }

    // Transitions run detached from their requests and may outlive the server.
    let active = guard.active();
    if !active.is_empty() {
        info!(active = active.len(), "Waiting for in-flight transitions to finish");
    }
    guard.wait_idle().await;

    info!("Shutdown complete");
    Ok(())
}
