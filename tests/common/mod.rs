//! Simulated Exchange - Deterministic Test Double for Both Ports
//!
//! Enforces the exchange rules the core relies on and records every
//! breach instead of panicking, so scenarios can assert on them:
//! - post-only: a price crossing the current book is rejected
//! - reduce-only: must shrink the position and never exceed it
//! - no new exposure on the entry side while an opposing position is open
//! - a resubmitted client order ID resolves to the order already accepted
//!
//! The book advances one scripted entry per order query; fills follow
//! the configured `FillRule` and an optional global fill budget.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use postonly_executor::domain::filters::SymbolFilters;
use postonly_executor::domain::pricing::{BookTicker, crosses};
use postonly_executor::domain::trade::{OrderSide, OrderSnapshot, OrderStatus, Position};
use postonly_executor::error::GatewayError;
use postonly_executor::ports::gateway::{
    CancelOutcome, OrderGateway, OrderHandle, OrderRequest, PlaceOutcome,
};
use postonly_executor::ports::market_data::MarketData;
use postonly_executor::usecases::{ConcurrencyGuard, RepriceConfig, RetryPolicy};

pub const SYMBOL: &str = "ETHUSDT";

/// When resting orders execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    /// Nothing ever fills.
    Never,
    /// Fill on the first query after placement.
    Immediately,
    /// Fill once the script reached its last book and the order rests
    /// at that book's touch.
    AtFinalTouch,
}

#[derive(Debug, Clone)]
pub struct SimOrder {
    pub request: OrderRequest,
    pub status: OrderStatus,
    pub executed: Decimal,
}

impl SimOrder {
    fn snapshot(&self, order_id: &str) -> OrderSnapshot {
        OrderSnapshot {
            order_id: order_id.to_string(),
            status: self.status,
            price: self.request.price,
            quantity: self.request.quantity,
            executed_quantity: self.executed,
        }
    }

    const fn is_live(&self) -> bool {
        matches!(self.status, OrderStatus::New | OrderStatus::PartiallyFilled)
    }
}

#[derive(Debug)]
pub struct SimState {
    pub books: Vec<BookTicker>,
    pub book_index: usize,
    pub filters: SymbolFilters,
    /// Signed position amount.
    pub position: Decimal,
    pub orders: HashMap<String, SimOrder>,
    pub next_order_id: u64,
    pub fill_rule: FillRule,
    /// Total quantity that may still fill across all orders.
    pub fill_budget: Option<Decimal>,
    /// Upcoming calls (any method) that fail with a transport error.
    pub transport_failures: u32,
    /// Upcoming placements rejected as post-only crossings.
    pub forced_rejections: u32,
    /// Upcoming placements accepted whose response is lost in transit.
    pub lost_acks: u32,
    /// Symbols swept by `cancel_all`, in call order.
    pub sweeps: Vec<String>,
    pub placements: Vec<OrderRequest>,
    pub cancels: Vec<String>,
    pub violations: Vec<String>,
}

/// Shared handle; clone freely between the test and the core.
#[derive(Clone)]
pub struct SimExchange {
    state: Arc<Mutex<SimState>>,
}

impl SimExchange {
    pub fn new(books: Vec<BookTicker>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                books,
                book_index: 0,
                filters: SymbolFilters {
                    tick_size: dec!(0.01),
                    step_size: dec!(0.001),
                    min_notional: dec!(5),
                },
                position: Decimal::ZERO,
                orders: HashMap::new(),
                next_order_id: 0,
                fill_rule: FillRule::Immediately,
                fill_budget: None,
                transport_failures: 0,
                forced_rejections: 0,
                lost_acks: 0,
                sweeps: Vec::new(),
                placements: Vec::new(),
                cancels: Vec::new(),
                violations: Vec::new(),
            })),
        }
    }

    /// Single static book at 2500.10 / 2500.11.
    pub fn steady() -> Self {
        Self::new(vec![book(dec!(2500.10), dec!(2500.11))])
    }

    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap()
    }

    pub fn with_position(self, amount: Decimal) -> Self {
        self.state().position = amount;
        self
    }

    pub fn with_fill_rule(self, rule: FillRule) -> Self {
        self.set_fill_rule(rule);
        self
    }

    pub fn with_fill_budget(self, budget: Decimal) -> Self {
        self.state().fill_budget = Some(budget);
        self
    }

    pub fn set_fill_rule(&self, rule: FillRule) {
        self.state().fill_rule = rule;
    }

    pub fn fail_next(&self, calls: u32) {
        self.state().transport_failures = calls;
    }

    pub fn reject_next(&self, placements: u32) {
        self.state().forced_rejections = placements;
    }

    pub fn lose_next_acks(&self, placements: u32) {
        self.state().lost_acks = placements;
    }

    /// Rest an order nobody tracks, as a crashed run would leave behind.
    pub fn seed_stray_order(&self, side: OrderSide, price: Decimal, quantity: Decimal) -> String {
        let mut state = self.state();
        state.next_order_id += 1;
        let order_id = state.next_order_id.to_string();
        state.orders.insert(
            order_id.clone(),
            SimOrder {
                request: OrderRequest {
                    symbol: SYMBOL.to_string(),
                    side,
                    price,
                    quantity,
                    post_only: true,
                    reduce_only: false,
                    client_order_id: format!("stray-{order_id}"),
                },
                status: OrderStatus::New,
                executed: Decimal::ZERO,
            },
        );
        order_id
    }

    pub fn is_live(&self, order_id: &str) -> bool {
        self.state().orders.get(order_id).is_some_and(SimOrder::is_live)
    }

    pub fn sweeps(&self) -> Vec<String> {
        self.state().sweeps.clone()
    }

    pub fn position(&self) -> Decimal {
        self.state().position
    }

    pub fn placements(&self) -> Vec<OrderRequest> {
        self.state().placements.clone()
    }

    pub fn cancels(&self) -> Vec<String> {
        self.state().cancels.clone()
    }

    pub fn violations(&self) -> Vec<String> {
        self.state().violations.clone()
    }

    pub fn live_orders(&self) -> usize {
        self.state().orders.values().filter(|o| o.is_live()).count()
    }
}

impl SimState {
    fn book(&self) -> BookTicker {
        self.books[self.book_index.min(self.books.len() - 1)]
    }

    fn take_transport_failure(&mut self) -> Result<(), GatewayError> {
        if self.transport_failures > 0 {
            self.transport_failures -= 1;
            return Err(GatewayError::Transport("connection reset".into()));
        }
        Ok(())
    }

    fn try_fill(&mut self, order_id: &str) {
        let at_final = self.book_index + 1 >= self.books.len();
        let book = self.book();
        let rule = self.fill_rule;
        let budget = self.fill_budget;

        let Some(order) = self.orders.get_mut(order_id) else {
            return;
        };
        if !order.is_live() {
            return;
        }

        let eligible = match rule {
            FillRule::Never => false,
            FillRule::Immediately => true,
            FillRule::AtFinalTouch => {
                let touch = match order.request.side {
                    OrderSide::Buy => book.bid,
                    OrderSide::Sell => book.ask,
                };
                at_final && order.request.price == touch
            }
        };
        if !eligible {
            return;
        }

        let remaining = order.request.quantity - order.executed;
        let fill = budget.map_or(remaining, |b| remaining.min(b));
        if fill <= Decimal::ZERO {
            return;
        }

        order.executed += fill;
        order.status = if order.executed == order.request.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        let signed = order.request.side.sign() * fill;

        if let Some(b) = self.fill_budget.as_mut() {
            *b -= fill;
        }
        self.position += signed;
    }
}

#[async_trait]
impl OrderGateway for SimExchange {
    async fn place_order(&self, request: &OrderRequest) -> Result<PlaceOutcome, GatewayError> {
        let mut state = self.state();
        state.take_transport_failure()?;

        let existing = state
            .orders
            .iter()
            .find(|(_, order)| order.request.client_order_id == request.client_order_id)
            .map(|(order_id, _)| order_id.clone());
        if let Some(order_id) = existing {
            return Ok(PlaceOutcome::Placed(OrderHandle {
                order_id,
                client_order_id: request.client_order_id.clone(),
            }));
        }

        let book = state.book();
        if !request.post_only {
            state.violations.push(format!("order without post-only: {request:?}"));
        }
        if crosses(request.side, request.price, &book) {
            state
                .violations
                .push(format!("crossing price {} against {book:?}", request.price));
            return Ok(PlaceOutcome::Rejected {
                reason: "post-only would take".into(),
            });
        }
        if state.forced_rejections > 0 {
            state.forced_rejections -= 1;
            return Ok(PlaceOutcome::Rejected {
                reason: "post-only would take".into(),
            });
        }

        let position = state.position;
        if request.reduce_only {
            let shrinks = position * request.side.sign() < Decimal::ZERO;
            if !shrinks || request.quantity > position.abs() {
                state.violations.push(format!(
                    "reduce-only {} {} against position {position}",
                    request.side, request.quantity
                ));
                return Err(GatewayError::Exchange {
                    code: -2022,
                    msg: "ReduceOnly Order is rejected.".into(),
                });
            }
        } else if position * request.side.sign() < Decimal::ZERO {
            state.violations.push(format!(
                "opening {} {} while holding {position}",
                request.side, request.quantity
            ));
        }

        state.next_order_id += 1;
        let order_id = state.next_order_id.to_string();
        state.placements.push(request.clone());
        state.orders.insert(
            order_id.clone(),
            SimOrder {
                request: request.clone(),
                status: OrderStatus::New,
                executed: Decimal::ZERO,
            },
        );

        if state.lost_acks > 0 {
            state.lost_acks -= 1;
            return Err(GatewayError::Transport("response lost".into()));
        }

        Ok(PlaceOutcome::Placed(OrderHandle {
            order_id,
            client_order_id: request.client_order_id.clone(),
        }))
    }

    async fn cancel_all(&self, symbol: &str) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.take_transport_failure()?;
        state.sweeps.push(symbol.to_string());

        let live: Vec<String> = state
            .orders
            .iter()
            .filter(|(_, order)| order.is_live() && order.request.symbol == symbol)
            .map(|(order_id, _)| order_id.clone())
            .collect();
        for order_id in live {
            if let Some(order) = state.orders.get_mut(&order_id) {
                order.status = OrderStatus::Canceled;
            }
            state.cancels.push(order_id);
        }
        Ok(())
    }

    async fn cancel_order(
        &self,
        _symbol: &str,
        order_id: &str,
    ) -> Result<CancelOutcome, GatewayError> {
        let mut state = self.state();
        state.take_transport_failure()?;
        state.cancels.push(order_id.to_string());

        match state.orders.get_mut(order_id) {
            Some(order) if order.is_live() => {
                order.status = OrderStatus::Canceled;
                Ok(CancelOutcome::Canceled(order.snapshot(order_id)))
            }
            _ => Ok(CancelOutcome::AlreadyGone),
        }
    }

    async fn get_order(&self, _symbol: &str, order_id: &str) -> Result<OrderSnapshot, GatewayError> {
        let mut state = self.state();
        state.take_transport_failure()?;

        if state.book_index + 1 < state.books.len() {
            state.book_index += 1;
        }
        state.try_fill(order_id);

        state
            .orders
            .get(order_id)
            .map(|order| order.snapshot(order_id))
            .ok_or_else(|| GatewayError::UnknownOrder(order_id.to_string()))
    }

    async fn get_position(&self, symbol: &str) -> Result<Position, GatewayError> {
        let mut state = self.state();
        state.take_transport_failure()?;
        Ok(Position::from_signed_amount(symbol, state.position))
    }
}

#[async_trait]
impl MarketData for SimExchange {
    async fn best_bid_ask(&self, _symbol: &str) -> Result<BookTicker, GatewayError> {
        let mut state = self.state();
        state.take_transport_failure()?;
        Ok(state.book())
    }

    async fn last_price(&self, _symbol: &str) -> Result<Decimal, GatewayError> {
        Ok(self.state().book().mid())
    }

    async fn symbol_filters(&self, _symbol: &str) -> Result<SymbolFilters, GatewayError> {
        Ok(self.state().filters)
    }
}

pub const fn book(bid: Decimal, ask: Decimal) -> BookTicker {
    BookTicker::new(bid, ask)
}

/// Fast cadence with age-based replacement disabled.
pub fn engine_config() -> RepriceConfig {
    RepriceConfig {
        poll_interval: Duration::from_millis(200),
        reprice_interval: Duration::from_millis(200),
        max_order_age: None,
        price_tolerance_ticks: 0,
        retry: RetryPolicy {
            retries: 3,
            delay: Duration::from_millis(50),
        },
    }
}

pub fn guard() -> ConcurrencyGuard {
    ConcurrencyGuard::new()
}
