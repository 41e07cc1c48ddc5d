//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    symbol = %config.bot.default_symbol,
    quantity = %config.bot.default_quantity,
    poll_ms = config.execution.poll_interval_ms,
    reprice_ms = config.execution.reprice_interval_ms,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty symbol and endpoint
/// - Positive default quantity
/// - Non-zero cadences, timeouts and attempt bounds
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.bot.default_symbol.trim().is_empty(),
    "bot.default_symbol must not be empty"
  );
  anyhow::ensure!(
    config.bot.default_quantity > Decimal::ZERO,
    "bot.default_quantity must be positive, got {}",
    config.bot.default_quantity
  );

  anyhow::ensure!(
    !config.exchange.base_url.is_empty(),
    "exchange.base_url must not be empty"
  );
  anyhow::ensure!(
    config.exchange.max_requests_per_second > 0,
    "exchange.max_requests_per_second must be positive"
  );
  anyhow::ensure!(
    (1..=125).contains(&config.exchange.leverage),
    "exchange.leverage must be in [1, 125], got {}",
    config.exchange.leverage
  );

  let exec = &config.execution;
  anyhow::ensure!(exec.poll_interval_ms > 0, "execution.poll_interval_ms must be positive");
  anyhow::ensure!(
    exec.close_timeout_ms >= exec.poll_interval_ms,
    "execution.close_timeout_ms ({}) must cover at least one poll ({})",
    exec.close_timeout_ms,
    exec.poll_interval_ms
  );
  anyhow::ensure!(
    exec.open_timeout_ms >= exec.poll_interval_ms,
    "execution.open_timeout_ms ({}) must cover at least one poll ({})",
    exec.open_timeout_ms,
    exec.poll_interval_ms
  );
  anyhow::ensure!(
    exec.max_close_attempts > 0 && exec.max_open_attempts > 0,
    "execution attempt bounds must be positive"
  );

  anyhow::ensure!(
    config.server.bind_address.parse::<std::net::SocketAddr>().is_ok(),
    "server.bind_address is not a socket address: {}",
    config.server.bind_address
  );

  Ok(())
}
