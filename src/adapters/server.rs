//! HTTP Server - Signal Ingestion, Health and Metrics
//!
//! Serves the executor's HTTP surface via axum 0.7:
//! - `POST /tv/webhook`: TradingView alert `{symbol?, side, secret?}`
//! - `POST /trade/manual`: manual signal `{symbol?, side, qty?}`
//! - `POST /trade/cancel`: cooperative cancel `{symbol}`
//! - `GET /transitions`: active transitions with their phase
//! - `GET /healthz`: liveness
//! - `GET /metrics`: Prometheus text exposition
//!
//! Transition results map to DONE → 200, BUSY → 409, FAILED → 500.
//! Each signal runs in its own task, so a client that disconnects only
//! loses the response; the transition still reaches a terminal state.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::trade::{PositionSide, Signal, TransitionOutcome, TransitionResult};
use crate::ports::gateway::OrderGateway;
use crate::ports::market_data::MarketData;
use crate::usecases::transition::PositionTransitioner;

/// TradingView alert body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub symbol: Option<String>,
    pub side: String,
    pub secret: Option<String>,
}

/// Manual trade body.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualPayload {
    pub symbol: Option<String>,
    pub side: String,
    pub qty: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelPayload {
    pub symbol: String,
}

/// State shared by all handlers.
pub struct AppState<G: OrderGateway, M: MarketData> {
    pub transitioner: Arc<PositionTransitioner<G, M>>,
    pub metrics: Arc<MetricsRegistry>,
    /// Required webhook secret, when configured.
    pub webhook_secret: Option<String>,
    /// Symbol used when a payload omits one.
    pub default_symbol: String,
}

impl<G: OrderGateway, M: MarketData> Clone for AppState<G, M> {
    fn clone(&self) -> Self {
        Self {
            transitioner: Arc::clone(&self.transitioner),
            metrics: Arc::clone(&self.metrics),
            webhook_secret: self.webhook_secret.clone(),
            default_symbol: self.default_symbol.clone(),
        }
    }
}

impl<G: OrderGateway, M: MarketData> AppState<G, M> {
    fn symbol_or_default(&self, symbol: Option<&str>) -> String {
        symbol
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.default_symbol)
            .to_ascii_uppercase()
    }

    /// Run a signal to completion and map the result to a response.
    async fn run(&self, signal: Signal) -> Response {
        let state = self.clone();
        let task = tokio::spawn(async move { state.execute(signal).await });

        let result = match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Transition task failed");
                return failure(StatusCode::INTERNAL_SERVER_ERROR, "transition task failed");
            }
        };

        let status = match result.outcome {
            TransitionOutcome::Done => StatusCode::OK,
            TransitionOutcome::Busy => StatusCode::CONFLICT,
            TransitionOutcome::Failed => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(result)).into_response()
    }

    async fn execute(&self, signal: Signal) -> TransitionResult {
        if !self.transitioner.guard().is_active(&signal.symbol) {
            self.transitioner.prepare(&signal.symbol).await;
        }

        let started = Instant::now();
        self.metrics.active_transitions.inc();
        let result = self.transitioner.execute(&signal).await;
        self.metrics.active_transitions.dec();
        self.metrics.record(&result, started.elapsed());
        result
    }
}

/// Build the router with all routes.
pub fn router<G: OrderGateway, M: MarketData>(state: AppState<G, M>) -> Router {
    Router::new()
        .route("/tv/webhook", post(tv_webhook::<G, M>))
        .route("/trade/manual", post(manual_trade::<G, M>))
        .route("/trade/cancel", post(cancel_transition::<G, M>))
        .route("/transitions", get(active_transitions::<G, M>))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics::<G, M>))
        .with_state(state)
}

/// Serve until `shutdown` is cancelled, then drain in-flight requests.
#[instrument(skip(state, shutdown))]
pub async fn serve<G: OrderGateway, M: MarketData>(
    state: AppState<G, M>,
    bind_address: String,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "HTTP server started");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

fn failure(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "error": detail.into() }))).into_response()
}

fn parse_side(side: &str) -> Result<PositionSide, Response> {
    side.parse::<PositionSide>()
        .map_err(|e| failure(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
}

pub async fn tv_webhook<G: OrderGateway, M: MarketData>(
    State(state): State<AppState<G, M>>,
    Json(payload): Json<WebhookPayload>,
) -> Response {
    if let Some(expected) = state.webhook_secret.as_deref() {
        if payload.secret.as_deref() != Some(expected) {
            warn!("Webhook rejected, bad secret");
            return failure(StatusCode::FORBIDDEN, "bad secret");
        }
    }

    let side = match parse_side(&payload.side) {
        Ok(side) => side,
        Err(response) => return response,
    };
    let symbol = state.symbol_or_default(payload.symbol.as_deref());
    info!(symbol = %symbol, side = %side, "Webhook signal received");

    state.run(Signal::new(symbol, side, None)).await
}

pub async fn manual_trade<G: OrderGateway, M: MarketData>(
    State(state): State<AppState<G, M>>,
    Json(payload): Json<ManualPayload>,
) -> Response {
    let side = match parse_side(&payload.side) {
        Ok(side) => side,
        Err(response) => return response,
    };
    if payload.qty.is_some_and(|qty| qty <= Decimal::ZERO) {
        return failure(StatusCode::UNPROCESSABLE_ENTITY, "qty must be positive");
    }
    let symbol = state.symbol_or_default(payload.symbol.as_deref());
    info!(symbol = %symbol, side = %side, qty = ?payload.qty, "Manual signal received");

    state.run(Signal::new(symbol, side, payload.qty)).await
}

pub async fn cancel_transition<G: OrderGateway, M: MarketData>(
    State(state): State<AppState<G, M>>,
    Json(payload): Json<CancelPayload>,
) -> Response {
    let symbol = payload.symbol.trim().to_ascii_uppercase();
    if state.transitioner.guard().cancel(&symbol) {
        (StatusCode::OK, Json(json!({ "symbol": symbol, "cancelled": true }))).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "symbol": symbol, "cancelled": false })),
        )
            .into_response()
    }
}

pub async fn active_transitions<G: OrderGateway, M: MarketData>(
    State(state): State<AppState<G, M>>,
) -> Response {
    Json(state.transitioner.guard().active()).into_response()
}

pub async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

pub async fn metrics<G: OrderGateway, M: MarketData>(
    State(state): State<AppState<G, M>>,
) -> Response {
    match state.metrics.render() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
