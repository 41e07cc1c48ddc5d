//! Binance Futures API Request/Response Types
//!
//! Wire shapes for the USD-M futures REST endpoints the executor uses.
//! Prices and quantities arrive as JSON strings and deserialize
//! straight into `Decimal`.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::filters::SymbolFilters;
use crate::domain::trade::{OrderSnapshot, OrderStatus};
use crate::error::GatewayError;

/// Error body: `{"code": -5022, "msg": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
  pub code: i64,
  pub msg: String,
}

/// Post-only order would immediately match.
pub const CODE_POST_ONLY_REJECTED: i64 = -5022;
/// Cancel of an order that no longer exists.
pub const CODE_UNKNOWN_ORDER_ON_CANCEL: i64 = -2011;
/// Query of an order the matching engine does not know (yet).
pub const CODE_ORDER_DOES_NOT_EXIST: i64 = -2013;
/// `newClientOrderId` already used by an accepted order.
pub const CODE_DUPLICATE_CLIENT_ORDER_ID: i64 = -4116;
/// Margin type already set.
pub const CODE_NO_NEED_TO_CHANGE_MARGIN: i64 = -4046;

/// GET /fapi/v1/ticker/bookTicker
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookTickerResponse {
  pub bid_price: Decimal,
  pub ask_price: Decimal,
}

/// GET /fapi/v1/ticker/price
#[derive(Debug, Clone, Deserialize)]
pub struct PriceTickerResponse {
  pub price: Decimal,
}

/// GET /fapi/v1/exchangeInfo (only what we read).
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfoResponse {
  pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
  pub symbol: String,
  #[serde(default)]
  pub filters: Vec<SymbolFilterEntry>,
}

/// One entry of a symbol's `filters` array.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilterEntry {
  #[serde(rename = "PRICE_FILTER")]
  Price {
    #[serde(rename = "tickSize")]
    tick_size: Decimal,
  },
  #[serde(rename = "LOT_SIZE")]
  LotSize {
    #[serde(rename = "stepSize")]
    step_size: Decimal,
  },
  #[serde(rename = "MIN_NOTIONAL")]
  MinNotional { notional: Decimal },
  #[serde(other)]
  Other,
}

impl SymbolInfo {
  /// Collapse the filter list, keeping defaults for anything missing.
  pub fn to_filters(&self) -> SymbolFilters {
    self
      .filters
      .iter()
      .fold(SymbolFilters::default(), |mut acc, entry| {
        match entry {
          SymbolFilterEntry::Price { tick_size } => acc.tick_size = *tick_size,
          SymbolFilterEntry::LotSize { step_size } => acc.step_size = *step_size,
          SymbolFilterEntry::MinNotional { notional } => acc.min_notional = *notional,
          SymbolFilterEntry::Other => {}
        }
        acc
      })
  }
}

/// POST/DELETE/GET /fapi/v1/order
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
  pub order_id: i64,
  #[serde(default)]
  pub client_order_id: String,
  pub status: String,
  pub price: Decimal,
  pub orig_qty: Decimal,
  pub executed_qty: Decimal,
}

impl OrderResponse {
  /// Normalize into the core's snapshot. Unknown states are malformed.
  pub fn to_snapshot(&self) -> Result<OrderSnapshot, GatewayError> {
    Ok(OrderSnapshot {
      order_id: self.order_id.to_string(),
      status: parse_status(&self.status)?,
      price: self.price,
      quantity: self.orig_qty,
      executed_quantity: self.executed_qty,
    })
  }
}

/// Map a futures order status string.
pub fn parse_status(status: &str) -> Result<OrderStatus, GatewayError> {
  match status {
    "NEW" => Ok(OrderStatus::New),
    "PARTIALLY_FILLED" => Ok(OrderStatus::PartiallyFilled),
    "FILLED" => Ok(OrderStatus::Filled),
    "CANCELED" => Ok(OrderStatus::Canceled),
    "REJECTED" => Ok(OrderStatus::Rejected),
    "EXPIRED" | "EXPIRED_IN_MATCH" => Ok(OrderStatus::Expired),
    other => Err(GatewayError::Malformed(format!("unknown order status {other}"))),
  }
}

/// GET /fapi/v2/positionRisk entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRiskEntry {
  pub symbol: String,
  pub position_amt: Decimal,
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  #[test]
  fn test_parse_book_ticker() {
    let json = r#"{"symbol":"ETHUSDT","bidPrice":"2500.10","bidQty":"12.5","askPrice":"2500.11","askQty":"3.2","time":1700000000000}"#;
    let ticker: BookTickerResponse = serde_json::from_str(json).unwrap();
    assert_eq!(ticker.bid_price, dec!(2500.10));
    assert_eq!(ticker.ask_price, dec!(2500.11));
  }

  #[test]
  fn test_parse_exchange_info_filters() {
    let json = r#"{
      "symbols": [{
        "symbol": "ETHUSDT",
        "filters": [
          {"filterType":"PRICE_FILTER","minPrice":"39.86","maxPrice":"306177","tickSize":"0.01"},
          {"filterType":"LOT_SIZE","minQty":"0.001","maxQty":"10000","stepSize":"0.001"},
          {"filterType":"MARKET_LOT_SIZE","stepSize":"0.001"},
          {"filterType":"MIN_NOTIONAL","notional":"20"}
        ]
      }]
    }"#;
    let info: ExchangeInfoResponse = serde_json::from_str(json).unwrap();
    let filters = info.symbols[0].to_filters();
    assert_eq!(filters.tick_size, dec!(0.01));
    assert_eq!(filters.step_size, dec!(0.001));
    assert_eq!(filters.min_notional, dec!(20));
  }

  #[test]
  fn test_parse_order_response() {
    let json = r#"{
      "orderId": 8389765519062315521,
      "symbol": "ETHUSDT",
      "status": "PARTIALLY_FILLED",
      "clientOrderId": "open-1a2b3c4d5e",
      "price": "2500.10",
      "avgPrice": "2500.10",
      "origQty": "0.020",
      "executedQty": "0.005",
      "timeInForce": "GTX",
      "type": "LIMIT",
      "reduceOnly": false,
      "side": "BUY"
    }"#;
    let order: OrderResponse = serde_json::from_str(json).unwrap();
    let snapshot = order.to_snapshot().unwrap();
    assert_eq!(snapshot.order_id, "8389765519062315521");
    assert_eq!(snapshot.status, OrderStatus::PartiallyFilled);
    assert_eq!(snapshot.executed_quantity, dec!(0.005));
  }

  #[test]
  fn test_unknown_status_is_malformed() {
    assert!(matches!(parse_status("PENDING_NEW"), Err(GatewayError::Malformed(_))));
    assert_eq!(parse_status("EXPIRED").unwrap(), OrderStatus::Expired);
  }

  #[test]
  fn test_parse_position_risk() {
    let json = r#"[{"symbol":"ETHUSDT","positionAmt":"-0.020","entryPrice":"2490.5","leverage":"10","marginType":"isolated"}]"#;
    let entries: Vec<PositionRiskEntry> = serde_json::from_str(json).unwrap();
    assert_eq!(entries[0].position_amt, dec!(-0.020));
  }

  #[test]
  fn test_parse_api_error() {
    let err: ApiErrorResponse =
      serde_json::from_str(r#"{"code":-5022,"msg":"Due to the order could not be executed as maker, the Post Only order will be rejected."}"#)
        .unwrap();
    assert_eq!(err.code, CODE_POST_ONLY_REJECTED);
  }
}
