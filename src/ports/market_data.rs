//! Market Data Port - On-demand Top-of-Book Interface
//!
//! The reprice engine asks for the current book on every cycle it
//! needs a price. Staleness here turns directly into post-only
//! rejections, which the core tolerates but should not provoke.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::filters::SymbolFilters;
use crate::domain::pricing::BookTicker;
use crate::error::GatewayError;

/// Trait for market data providers.
///
/// Read-only and stateless from the core's point of view.
#[async_trait]
pub trait MarketData: Send + Sync + 'static {
  /// Current best bid and ask.
  async fn best_bid_ask(&self, symbol: &str) -> Result<BookTicker, GatewayError>;

  /// Last traded price.
  async fn last_price(&self, symbol: &str) -> Result<Decimal, GatewayError>;

  /// Tick size, lot step and notional floor for the symbol.
  async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters, GatewayError>;
}
