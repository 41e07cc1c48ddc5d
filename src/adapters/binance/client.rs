//! Binance HTTP Client - Rate-limited Futures REST Client
//!
//! Wraps reqwest with a concurrency cap, a client-side request-rate
//! limiter and HMAC query signing for the USD-M futures API.
//! Retrying is left to the caller: every failure is classified into a
//! `GatewayError` whose `is_transient()` tells the core what to do.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::auth::{BinanceAuth, encode_query};
use super::types::ApiErrorResponse;
use crate::config::ExchangeConfig;
use crate::error::GatewayError;

/// Configuration for the Binance HTTP client.
#[derive(Debug, Clone)]
pub struct BinanceClientConfig {
  /// Base URL for the futures API.
  pub base_url: String,
  /// Request timeout.
  pub timeout: Duration,
  /// Signed request validity window.
  pub recv_window_ms: u64,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
  /// Client-side request budget per second.
  pub max_requests_per_second: u32,
}

impl Default for BinanceClientConfig {
  fn default() -> Self {
    Self::from(&ExchangeConfig::default())
  }
}

impl From<&ExchangeConfig> for BinanceClientConfig {
  fn from(config: &ExchangeConfig) -> Self {
    Self {
      base_url: config.base_url.trim_end_matches('/').to_string(),
      timeout: Duration::from_millis(config.timeout_ms),
      recv_window_ms: config.recv_window_ms,
      max_concurrent: 10,
      max_requests_per_second: config.max_requests_per_second,
    }
  }
}

/// Rate-limited HTTP client for the Binance futures API.
pub struct BinanceClient {
  /// Underlying HTTP client.
  http: Client,
  /// Signing credentials.
  auth: Arc<BinanceAuth>,
  /// Client configuration.
  config: BinanceClientConfig,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
  /// Request-rate limiter.
  limiter: DefaultDirectRateLimiter,
}

impl BinanceClient {
  /// Create a new Binance client.
  pub fn new(auth: Arc<BinanceAuth>, config: BinanceClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()
      .context("Failed to build HTTP client")?;

    let per_second = NonZeroU32::new(config.max_requests_per_second)
      .context("max_requests_per_second must be positive")?;
    let limiter = RateLimiter::direct(Quota::per_second(per_second));

    Ok(Self {
      http,
      auth,
      semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
      config,
      limiter,
    })
  }

  /// Unsigned GET (market data).
  pub async fn public_get<T: DeserializeOwned>(
    &self,
    path: &str,
    params: &[(&str, String)],
  ) -> Result<T, GatewayError> {
    let query = encode_query(params);
    let url = if query.is_empty() {
      format!("{}{}", self.config.base_url, path)
    } else {
      format!("{}{}?{}", self.config.base_url, path, query)
    };
    self.execute(self.http.get(url), "GET", path).await
  }

  /// Signed request with `X-MBX-APIKEY`, `recvWindow`, `timestamp`
  /// and `signature` in the query string.
  pub async fn signed<T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    params: &[(&str, String)],
  ) -> Result<T, GatewayError> {
    let query = self.auth.signed_query(
      params,
      self.config.recv_window_ms,
      BinanceAuth::timestamp_ms(),
    );
    let url = format!("{}{}?{}", self.config.base_url, path, query);
    let label = method.as_str().to_string();
    let request = self
      .http
      .request(method, url)
      .header("X-MBX-APIKEY", self.auth.api_key());
    self.execute(request, &label, path).await
  }

  /// Send with concurrency and rate limiting, then classify the response.
  async fn execute<T: DeserializeOwned>(
    &self,
    request: RequestBuilder,
    method: &str,
    path: &str,
  ) -> Result<T, GatewayError> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .map_err(|_| GatewayError::Transport("client shut down".to_string()))?;
    self.limiter.until_ready().await;

    let response = request.send().await.map_err(|e| {
      warn!(method, path, error = %e, "Request failed");
      GatewayError::Transport(e.to_string())
    })?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| GatewayError::Transport(e.to_string()))?;

    if !status.is_success() {
      let err = classify_error(status, &body);
      debug!(method, path, status = %status, error = %err, "Request rejected");
      return Err(err);
    }

    serde_json::from_str(&body)
      .map_err(|e| GatewayError::Malformed(format!("{method} {path}: {e}")))
  }
}

/// Map a non-2xx response onto the gateway error taxonomy.
///
/// - 418/429 (rate limited or banned) and 5xx are transport-level
/// - Anything with a Binance `{code, msg}` body is an exchange error
pub fn classify_error(status: StatusCode, body: &str) -> GatewayError {
  if status == StatusCode::TOO_MANY_REQUESTS
    || status == StatusCode::IM_A_TEAPOT
    || status.is_server_error()
  {
    return GatewayError::Transport(format!("HTTP {status}: {body}"));
  }

  match serde_json::from_str::<ApiErrorResponse>(body) {
    Ok(api) => GatewayError::Exchange {
      code: api.code,
      msg: api.msg,
    },
    Err(_) => GatewayError::Exchange {
      code: i64::from(status.as_u16()),
      msg: body.to_string(),
    },
  }
}
