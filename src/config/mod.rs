//! Configuration Module - TOML-based Executor Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! Credentials never live here: API keys and the webhook secret come
//! from environment variables only.

pub mod loader;

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Top-level executor configuration.
///
/// Every section has defaults, so an empty file is a valid config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
  /// Identity, logging and signal defaults.
  #[serde(default)]
  pub bot: BotConfig,
  /// Exchange endpoint and account setup.
  #[serde(default)]
  pub exchange: ExchangeConfig,
  /// Reprice and transition tuning.
  #[serde(default)]
  pub execution: ExecutionConfig,
  /// Webhook/health HTTP server.
  #[serde(default)]
  pub server: ServerConfig,
}

/// Bot identity and signal defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
  /// Human-readable name.
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Symbol used when a signal omits one.
  #[serde(default = "default_symbol")]
  pub default_symbol: String,
  /// Quantity used when a signal omits one.
  #[serde(default = "default_quantity")]
  pub default_quantity: Decimal,
}

impl Default for BotConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
      default_symbol: default_symbol(),
      default_quantity: default_quantity(),
    }
  }
}

/// Exchange connectivity and per-symbol account setup.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
  /// REST base URL (USD-M futures).
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Per-request timeout in milliseconds.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Signed request validity window in milliseconds.
  #[serde(default = "default_recv_window_ms")]
  pub recv_window_ms: u64,
  /// Client-side request budget.
  #[serde(default = "default_max_rps")]
  pub max_requests_per_second: u32,
  /// Leverage applied before trading a symbol.
  #[serde(default = "default_leverage")]
  pub leverage: u32,
  /// Switch symbols to isolated margin before trading.
  #[serde(default = "default_true")]
  pub isolated_margin: bool,
}

impl Default for ExchangeConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_ms: default_timeout_ms(),
      recv_window_ms: default_recv_window_ms(),
      max_requests_per_second: default_max_rps(),
      leverage: default_leverage(),
      isolated_margin: true,
    }
  }
}

/// Reprice engine and transition orchestrator tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
  /// Order status poll cadence.
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,
  /// Minimum time between drift checks on a resting order.
  #[serde(default = "default_reprice_interval_ms")]
  pub reprice_interval_ms: u64,
  /// Replace a resting order after this long even without drift (0 = never).
  #[serde(default = "default_max_order_age_ms")]
  pub max_order_age_ms: u64,
  /// Ceiling for one CLOSING engine run.
  #[serde(default = "default_close_timeout_ms")]
  pub close_timeout_ms: u64,
  /// Ceiling for one OPENING engine run.
  #[serde(default = "default_open_timeout_ms")]
  pub open_timeout_ms: u64,
  /// Ticks behind the touch to quote.
  #[serde(default)]
  pub price_offset_ticks: u32,
  /// Drift in ticks tolerated before a reprice.
  #[serde(default)]
  pub price_tolerance_ticks: u32,
  /// CLOSING engine runs before giving up.
  #[serde(default = "default_attempts")]
  pub max_close_attempts: u32,
  /// OPENING engine runs before giving up.
  #[serde(default = "default_attempts")]
  pub max_open_attempts: u32,
  /// Silent retries on transport failures per gateway call.
  #[serde(default = "default_attempts")]
  pub transport_retries: u32,
  /// Pause between transport retries.
  #[serde(default = "default_transport_retry_delay_ms")]
  pub transport_retry_delay_ms: u64,
}

impl Default for ExecutionConfig {
  fn default() -> Self {
    Self {
      poll_interval_ms: default_poll_interval_ms(),
      reprice_interval_ms: default_reprice_interval_ms(),
      max_order_age_ms: default_max_order_age_ms(),
      close_timeout_ms: default_close_timeout_ms(),
      open_timeout_ms: default_open_timeout_ms(),
      price_offset_ticks: 0,
      price_tolerance_ticks: 0,
      max_close_attempts: default_attempts(),
      max_open_attempts: default_attempts(),
      transport_retries: default_attempts(),
      transport_retry_delay_ms: default_transport_retry_delay_ms(),
    }
  }
}

impl ExecutionConfig {
  pub const fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }

  pub const fn reprice_interval(&self) -> Duration {
    Duration::from_millis(self.reprice_interval_ms)
  }

  /// `None` when age-based replacement is disabled.
  pub const fn max_order_age(&self) -> Option<Duration> {
    if self.max_order_age_ms == 0 {
      None
    } else {
      Some(Duration::from_millis(self.max_order_age_ms))
    }
  }

  pub const fn close_timeout(&self) -> Duration {
    Duration::from_millis(self.close_timeout_ms)
  }

  pub const fn open_timeout(&self) -> Duration {
    Duration::from_millis(self.open_timeout_ms)
  }

  pub const fn transport_retry_delay(&self) -> Duration {
    Duration::from_millis(self.transport_retry_delay_ms)
  }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Listen address for webhook, health and metrics routes.
  #[serde(default = "default_bind_address")]
  pub bind_address: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind_address: default_bind_address(),
    }
  }
}

// Default value functions for serde

fn default_name() -> String {
  "postonly-executor".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_symbol() -> String {
  "ETHUSDT".to_string()
}

fn default_quantity() -> Decimal {
  Decimal::new(1, 2) // 0.01
}

fn default_base_url() -> String {
  "https://fapi.binance.com".to_string()
}

fn default_timeout_ms() -> u64 {
  5_000
}

fn default_recv_window_ms() -> u64 {
  5_000
}

fn default_max_rps() -> u32 {
  20
}

fn default_leverage() -> u32 {
  10
}

fn default_true() -> bool {
  true
}

fn default_poll_interval_ms() -> u64 {
  200
}

fn default_reprice_interval_ms() -> u64 {
  200
}

fn default_max_order_age_ms() -> u64 {
  400
}

fn default_close_timeout_ms() -> u64 {
  2_500
}

fn default_open_timeout_ms() -> u64 {
  5_000 // 25 polls at 200ms
}

fn default_attempts() -> u32 {
  3
}

fn default_transport_retry_delay_ms() -> u64 {
  100
}

fn default_bind_address() -> String {
  "0.0.0.0:8000".to_string()
}
