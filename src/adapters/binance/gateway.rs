//! Binance Futures Gateway - Port Implementations
//!
//! Implements `OrderGateway` and `MarketData` on top of the shared
//! `BinanceClient`. All orders are LIMIT with `timeInForce=GTX`
//! (post-only); exchange quirks are normalized here so the core only
//! sees the port contract:
//! - `-5022` and immediate `EXPIRED` on entry become `PlaceOutcome::Rejected`
//! - `-4116` on placement resolves the earlier order by client order ID
//! - `-2011` on cancel becomes `CancelOutcome::AlreadyGone`
//! - `-2013` on query becomes the transient `GatewayError::UnknownOrder`

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use rust_decimal::Decimal;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use super::client::BinanceClient;
use super::types::{
    BookTickerResponse, CODE_DUPLICATE_CLIENT_ORDER_ID, CODE_NO_NEED_TO_CHANGE_MARGIN,
    CODE_ORDER_DOES_NOT_EXIST, CODE_POST_ONLY_REJECTED, CODE_UNKNOWN_ORDER_ON_CANCEL,
    ExchangeInfoResponse, OrderResponse, PositionRiskEntry, PriceTickerResponse,
};
use crate::config::ExchangeConfig;
use crate::domain::filters::SymbolFilters;
use crate::domain::pricing::BookTicker;
use crate::domain::trade::{OrderSnapshot, Position};
use crate::error::GatewayError;
use crate::ports::gateway::{CancelOutcome, OrderGateway, OrderHandle, OrderRequest, PlaceOutcome};
use crate::ports::market_data::MarketData;

/// Binance USD-M futures adapter.
pub struct BinanceFutures {
    /// Shared client with signing and rate limiting.
    client: Arc<BinanceClient>,
    /// Symbol filters from exchangeInfo, fetched once per process.
    filters: OnceCell<HashMap<String, SymbolFilters>>,
    /// Leverage set by `prepare_symbol`.
    leverage: u32,
    /// Switch to isolated margin in `prepare_symbol`.
    isolated_margin: bool,
}

impl BinanceFutures {
    pub fn new(client: Arc<BinanceClient>, config: &ExchangeConfig) -> Self {
        Self {
            client,
            filters: OnceCell::new(),
            leverage: config.leverage,
            isolated_margin: config.isolated_margin,
        }
    }

    async fn load_filters(&self) -> Result<&HashMap<String, SymbolFilters>, GatewayError> {
        self.filters
            .get_or_try_init(|| async {
                let info: ExchangeInfoResponse =
                    self.client.public_get("/fapi/v1/exchangeInfo", &[]).await?;
                info!(symbols = info.symbols.len(), "Exchange info loaded");
                Ok::<_, GatewayError>(
                    info.symbols
                        .iter()
                        .map(|s| (s.symbol.clone(), s.to_filters()))
                        .collect(),
                )
            })
            .await
    }

    /// Look an order up by the client order ID it was submitted with.
    async fn order_by_client_id(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> Result<OrderResponse, GatewayError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("origClientOrderId", client_order_id.to_string()),
        ];
        match self
            .client
            .signed(Method::GET, "/fapi/v1/order", &params)
            .await
        {
            Err(GatewayError::Exchange { code, .. }) if code == CODE_ORDER_DOES_NOT_EXIST => {
                Err(GatewayError::UnknownOrder(client_order_id.to_string()))
            }
            other => other,
        }
    }
}

/// An accepted GTX order that expired on entry would have crossed.
fn placement_outcome(order: OrderResponse) -> PlaceOutcome {
    if order.status == "EXPIRED" {
        debug!(order_id = order.order_id, "GTX order expired on entry");
        return PlaceOutcome::Rejected {
            reason: "post-only order expired on entry".to_string(),
        };
    }
    PlaceOutcome::Placed(OrderHandle {
        order_id: order.order_id.to_string(),
        client_order_id: order.client_order_id,
    })
}

fn order_params(request: &OrderRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("symbol", request.symbol.clone()),
        ("side", request.side.to_string()),
        ("type", "LIMIT".to_string()),
        (
            "timeInForce",
            if request.post_only { "GTX" } else { "GTC" }.to_string(),
        ),
        ("quantity", request.quantity.normalize().to_string()),
        ("price", request.price.normalize().to_string()),
        ("newClientOrderId", request.client_order_id.clone()),
    ];
    if request.reduce_only {
        params.push(("reduceOnly", "true".to_string()));
    }
    params
}

#[async_trait]
impl OrderGateway for BinanceFutures {
    #[instrument(skip_all, fields(symbol = %request.symbol, side = %request.side, price = %request.price, qty = %request.quantity))]
    async fn place_order(&self, request: &OrderRequest) -> Result<PlaceOutcome, GatewayError> {
        let params = order_params(request);
        let placed: Result<OrderResponse, _> = self
            .client
            .signed(Method::POST, "/fapi/v1/order", &params)
            .await;

        match placed {
            Ok(order) => Ok(placement_outcome(order)),
            Err(GatewayError::Exchange { code, msg }) if code == CODE_POST_ONLY_REJECTED => {
                Ok(PlaceOutcome::Rejected { reason: msg })
            }
            // An earlier attempt reached the exchange but its response was lost.
            Err(GatewayError::Exchange { code, .. }) if code == CODE_DUPLICATE_CLIENT_ORDER_ID => {
                warn!(
                    client_order_id = %request.client_order_id,
                    "Client order ID already accepted, resolving earlier placement"
                );
                let order = self
                    .order_by_client_id(&request.symbol, &request.client_order_id)
                    .await?;
                Ok(placement_outcome(order))
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn cancel_order(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<CancelOutcome, GatewayError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let cancelled: Result<OrderResponse, _> = self
            .client
            .signed(Method::DELETE, "/fapi/v1/order", &params)
            .await;

        match cancelled {
            Ok(order) => Ok(CancelOutcome::Canceled(order.to_snapshot()?)),
            Err(GatewayError::Exchange { code, .. }) if code == CODE_UNKNOWN_ORDER_ON_CANCEL => {
                debug!("Order already gone");
                Ok(CancelOutcome::AlreadyGone)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_order(&self, symbol: &str, order_id: &str) -> Result<OrderSnapshot, GatewayError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let queried: Result<OrderResponse, _> = self
            .client
            .signed(Method::GET, "/fapi/v1/order", &params)
            .await;

        match queried {
            Ok(order) => order.to_snapshot(),
            Err(GatewayError::Exchange { code, .. }) if code == CODE_ORDER_DOES_NOT_EXIST => {
                Err(GatewayError::UnknownOrder(order_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn get_position(&self, symbol: &str) -> Result<Position, GatewayError> {
        let entries: Vec<PositionRiskEntry> = self
            .client
            .signed(Method::GET, "/fapi/v2/positionRisk", &[("symbol", symbol.to_string())])
            .await?;

        let amount: Decimal = entries
            .iter()
            .filter(|entry| entry.symbol == symbol)
            .map(|entry| entry.position_amt)
            .sum();
        Ok(Position::from_signed_amount(symbol, amount))
    }

    #[instrument(skip(self))]
    async fn cancel_all(&self, symbol: &str) -> Result<(), GatewayError> {
        let _: serde_json::Value = self
            .client
            .signed(
                Method::DELETE,
                "/fapi/v1/allOpenOrders",
                &[("symbol", symbol.to_string())],
            )
            .await?;
        debug!("Open orders swept");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn prepare_symbol(&self, symbol: &str) -> Result<(), GatewayError> {
        if self.isolated_margin {
            let margin: Result<serde_json::Value, _> = self
                .client
                .signed(
                    Method::POST,
                    "/fapi/v1/marginType",
                    &[
                        ("symbol", symbol.to_string()),
                        ("marginType", "ISOLATED".to_string()),
                    ],
                )
                .await;
            match margin {
                Ok(_) => info!("Margin type set to ISOLATED"),
                Err(GatewayError::Exchange { code, .. })
                    if code == CODE_NO_NEED_TO_CHANGE_MARGIN => {}
                Err(e) => warn!(error = %e, "Failed to set margin type"),
            }
        }

        let _: serde_json::Value = self
            .client
            .signed(
                Method::POST,
                "/fapi/v1/leverage",
                &[
                    ("symbol", symbol.to_string()),
                    ("leverage", self.leverage.to_string()),
                ],
            )
            .await?;
        info!(leverage = self.leverage, "Leverage set");
        Ok(())
    }
}

#[async_trait]
impl MarketData for BinanceFutures {
    async fn best_bid_ask(&self, symbol: &str) -> Result<BookTicker, GatewayError> {
        let ticker: BookTickerResponse = self
            .client
            .public_get("/fapi/v1/ticker/bookTicker", &[("symbol", symbol.to_string())])
            .await?;
        Ok(BookTicker::new(ticker.bid_price, ticker.ask_price))
    }

    async fn last_price(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        let ticker: PriceTickerResponse = self
            .client
            .public_get("/fapi/v1/ticker/price", &[("symbol", symbol.to_string())])
            .await?;
        Ok(ticker.price)
    }

    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters, GatewayError> {
        self.load_filters()
            .await?
            .get(symbol)
            .copied()
            .ok_or_else(|| GatewayError::Exchange {
                code: -1121,
                msg: format!("Invalid symbol {symbol}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::binance::{BinanceAuth, BinanceClientConfig};
    use crate::domain::trade::OrderSide;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(reduce_only: bool) -> OrderRequest {
        OrderRequest {
            symbol: "ETHUSDT".to_string(),
            side: OrderSide::Sell,
            price: dec!(2500.110),
            quantity: dec!(0.020),
            post_only: true,
            reduce_only,
            client_order_id: "close-0123456789".to_string(),
        }
    }

    fn adapter(server: &MockServer) -> BinanceFutures {
        let exchange = ExchangeConfig {
            base_url: server.uri(),
            ..ExchangeConfig::default()
        };
        let auth = Arc::new(BinanceAuth::new("key", "secret"));
        let client = BinanceClient::new(auth, BinanceClientConfig::from(&exchange))
            .expect("client builds");
        BinanceFutures::new(Arc::new(client), &exchange)
    }

    fn order_json(order_id: i64, status: &str) -> serde_json::Value {
        json!({
            "orderId": order_id,
            "symbol": "ETHUSDT",
            "status": status,
            "clientOrderId": "close-0123456789",
            "price": "2500.11",
            "origQty": "0.020",
            "executedQty": "0",
            "timeInForce": "GTX",
            "type": "LIMIT",
            "side": "SELL"
        })
    }

    #[test]
    fn test_order_params_are_post_only_limit() {
        let params = order_params(&request(false));
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("type").as_deref(), Some("LIMIT"));
        assert_eq!(get("timeInForce").as_deref(), Some("GTX"));
        assert_eq!(get("side").as_deref(), Some("SELL"));
        assert_eq!(get("price").as_deref(), Some("2500.11"));
        assert_eq!(get("quantity").as_deref(), Some("0.02"));
        assert_eq!(get("reduceOnly"), None);
    }

    #[test]
    fn test_reduce_only_flag_is_sent() {
        let params = order_params(&request(true));
        assert!(params.contains(&("reduceOnly", "true".to_string())));
    }

    #[tokio::test]
    async fn test_duplicate_client_order_id_resolves_earlier_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fapi/v1/order"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"code": -4116, "msg": "ClientOrderId is duplicated."})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fapi/v1/order"))
            .and(query_param("origClientOrderId", "close-0123456789"))
            .respond_with(ResponseTemplate::new(200).set_body_json(order_json(77, "NEW")))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = adapter(&server).place_order(&request(true)).await.unwrap();
        assert_eq!(
            outcome,
            PlaceOutcome::Placed(OrderHandle {
                order_id: "77".to_string(),
                client_order_id: "close-0123456789".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_post_only_rejection_is_an_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fapi/v1/order"))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                json!({"code": -5022, "msg": "Post Only order will be rejected."}),
            ))
            .mount(&server)
            .await;

        let outcome = adapter(&server).place_order(&request(false)).await.unwrap();
        assert!(matches!(outcome, PlaceOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_expired_on_entry_is_a_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fapi/v1/order"))
            .respond_with(ResponseTemplate::new(200).set_body_json(order_json(78, "EXPIRED")))
            .mount(&server)
            .await;

        let outcome = adapter(&server).place_order(&request(false)).await.unwrap();
        assert!(matches!(outcome, PlaceOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_cancel_all_targets_symbol() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/fapi/v1/allOpenOrders"))
            .and(query_param("symbol", "ETHUSDT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"code": 200, "msg": "The operation of cancel all open order is done."}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        adapter(&server).cancel_all("ETHUSDT").await.unwrap();
    }
}
