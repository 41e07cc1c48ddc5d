//! Order Gateway Port - Exchange Order Management Interface
//!
//! Defines the trait for placing, cancelling and querying post-only
//! orders and reading positions on a single exchange.
//!
//! Key design decisions:
//! - A post-only rejection is a normal `PlaceOutcome`, not an error
//! - Cancel is idempotent: "already gone" is a normal `CancelOutcome`
//! - Every call must be safe to retry on transport failure; placement
//!   is idempotent on `client_order_id`

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::trade::{OrderId, OrderSide, OrderSnapshot, Position, Symbol};
use crate::error::GatewayError;

/// A limit order request as submitted to the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
  /// Symbol to trade.
  pub symbol: Symbol,
  /// Buy or sell.
  pub side: OrderSide,
  /// Limit price, already on the tick grid.
  pub price: Decimal,
  /// Quantity, already on the lot-step grid.
  pub quantity: Decimal,
  /// Reject instead of taking liquidity.
  pub post_only: bool,
  /// Only ever reduce an existing position.
  pub reduce_only: bool,
  /// Caller-chosen idempotency key.
  pub client_order_id: String,
}

/// Handle to an order accepted by the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderHandle {
  /// Exchange-assigned order ID.
  pub order_id: OrderId,
  /// Echo of the client order ID.
  pub client_order_id: String,
}

/// Result of an order placement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceOutcome {
  /// Order is resting on the book.
  Placed(OrderHandle),
  /// Order was refused, typically because it would have crossed.
  Rejected {
    /// Exchange-provided reason.
    reason: String,
  },
}

/// Result of a cancellation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
  /// Order was live and is now cancelled; carries its final state.
  Canceled(OrderSnapshot),
  /// Order was already filled, cancelled or expired.
  AlreadyGone,
}

/// Trait for exchange order gateways.
///
/// Implementors wrap the exchange REST API. The core only relies on
/// this narrow contract and never sees transport details.
#[async_trait]
pub trait OrderGateway: Send + Sync + 'static {
  /// Place a limit order.
  ///
  /// Resubmitting a `client_order_id` the exchange already accepted
  /// must resolve to that order instead of failing.
  ///
  /// # Errors
  /// Returns `GatewayError` on transport failure or a non-crossing
  /// exchange rejection (insufficient margin, bad filters, ...).
  async fn place_order(&self, request: &OrderRequest) -> Result<PlaceOutcome, GatewayError>;

  /// Cancel an order. Cancelling an order that is already gone is not an error.
  async fn cancel_order(
    &self,
    symbol: &str,
    order_id: &str,
  ) -> Result<CancelOutcome, GatewayError>;

  /// Query the current state of an order.
  async fn get_order(&self, symbol: &str, order_id: &str) -> Result<OrderSnapshot, GatewayError>;

  /// Read the current position for a symbol (flat when none).
  async fn get_position(&self, symbol: &str) -> Result<Position, GatewayError>;

  /// Cancel every open order on a symbol. Default: nothing to do.
  async fn cancel_all(&self, _symbol: &str) -> Result<(), GatewayError> {
    Ok(())
  }

  /// Best-effort account preparation before trading a symbol
  /// (margin mode, leverage). Default: nothing to do.
  async fn prepare_symbol(&self, _symbol: &str) -> Result<(), GatewayError> {
    Ok(())
  }
}
