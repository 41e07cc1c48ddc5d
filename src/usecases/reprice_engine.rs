//! Reprice Engine - Single Working Order Lifecycle
//!
//! Drives one post-only order from submission to a terminal outcome:
//! - Quotes at the touch (or `offset` ticks behind it), never crossing
//! - Polls the order on a fixed cadence, at most one query per cycle
//! - Cancels and replaces when the book drifts or the order ages out
//! - Treats post-only rejections as "reprice next cycle", never fatal
//! - Accounts partial fills and only ever requests the remainder
//!
//! Terminal outcomes: `Filled`, `TimedOut` (with whatever filled) and
//! `Aborted` (fatal error or cancellation, with whatever filled). On
//! every exit path the working order is cancelled best-effort.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::ExecutionConfig;
use crate::domain::filters::SymbolFilters;
use crate::domain::pricing::{BookTicker, has_drifted, maker_price};
use crate::domain::trade::{OrderSide, OrderStatus, Symbol, WorkingOrder};
use crate::error::{ExecutionError, GatewayError};
use crate::ports::gateway::{CancelOutcome, OrderGateway, OrderRequest, PlaceOutcome};
use crate::ports::market_data::MarketData;
use crate::usecases::retry::RetryPolicy;

/// Engine tuning shared by every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepriceConfig {
  /// Order status poll cadence.
  pub poll_interval: Duration,
  /// Minimum time between drift checks on a resting order.
  pub reprice_interval: Duration,
  /// Replace a resting order this old even without drift.
  pub max_order_age: Option<Duration>,
  /// Drift in ticks tolerated before a reprice.
  pub price_tolerance_ticks: u32,
  /// Silent retry policy for gateway calls.
  pub retry: RetryPolicy,
}

impl Default for RepriceConfig {
  fn default() -> Self {
    Self::from(&ExecutionConfig::default())
  }
}

impl From<&ExecutionConfig> for RepriceConfig {
  fn from(config: &ExecutionConfig) -> Self {
    Self {
      poll_interval: config.poll_interval(),
      reprice_interval: config.reprice_interval(),
      max_order_age: config.max_order_age(),
      price_tolerance_ticks: config.price_tolerance_ticks,
      retry: RetryPolicy {
        retries: config.transport_retries,
        delay: config.transport_retry_delay(),
      },
    }
  }
}

/// One engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepriceRequest {
  pub symbol: Symbol,
  pub side: OrderSide,
  /// Total quantity to execute.
  pub quantity: Decimal,
  pub reduce_only: bool,
  /// Ticks behind the touch to quote.
  pub price_offset_ticks: u32,
  /// Ceiling for the whole run.
  pub timeout: Duration,
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum TerminalOutcome {
  /// Requested quantity fully executed.
  Filled { quantity: Decimal },
  /// Deadline reached; partial fills are valid.
  TimedOut { filled: Decimal },
  /// Fatal error or cancellation.
  Aborted { filled: Decimal, error: ExecutionError },
}

impl TerminalOutcome {
  /// Quantity executed during the run, whatever the outcome.
  pub const fn filled(&self) -> Decimal {
    match self {
      Self::Filled { quantity } => *quantity,
      Self::TimedOut { filled } | Self::Aborted { filled, .. } => *filled,
    }
  }

  pub const fn is_filled(&self) -> bool {
    matches!(self, Self::Filled { .. })
  }
}

/// Outcome plus per-run counters.
#[derive(Debug, Clone)]
pub struct RepriceReport {
  pub outcome: TerminalOutcome,
  /// Orders accepted by the exchange.
  pub placements: u32,
  /// Cancel-and-replace cycles.
  pub reprices: u32,
  /// Post-only rejections (including immediate expiry).
  pub rejections: u32,
}

struct Tracked {
  order: WorkingOrder,
  placed_at: Instant,
  last_check: Instant,
}

struct RunState {
  target: Decimal,
  filled: Decimal,
  working: Option<Tracked>,
  placements: u32,
  reprices: u32,
  rejections: u32,
}

impl RunState {
  const fn new(target: Decimal) -> Self {
    Self {
      target,
      filled: Decimal::ZERO,
      working: None,
      placements: 0,
      reprices: 0,
      rejections: 0,
    }
  }

  /// Drop the working order and book whatever it executed.
  fn settle(&mut self) {
    if let Some(tracked) = self.working.take() {
      self.filled += tracked.order.executed();
    }
  }

  fn remaining(&self, filters: &SymbolFilters) -> Decimal {
    filters.floor_quantity(self.target - self.filled)
  }

  fn report(self, outcome: TerminalOutcome) -> RepriceReport {
    RepriceReport {
      outcome,
      placements: self.placements,
      reprices: self.reprices,
      rejections: self.rejections,
    }
  }
}

/// Owns the lifecycle of one working order at a time.
pub struct RepriceEngine<G: OrderGateway, M: MarketData> {
  gateway: Arc<G>,
  market: Arc<M>,
  config: RepriceConfig,
}

impl<G: OrderGateway, M: MarketData> RepriceEngine<G, M> {
  pub const fn new(gateway: Arc<G>, market: Arc<M>, config: RepriceConfig) -> Self {
    Self {
      gateway,
      market,
      config,
    }
  }

  pub const fn config(&self) -> &RepriceConfig {
    &self.config
  }

  /// Run until filled, timed out or aborted.
  ///
  /// `cancel` is honoured between cycles for opening runs only; a
  /// reduce-only run always finishes flattening.
  #[instrument(
    skip_all,
    fields(
      symbol = %request.symbol,
      side = %request.side,
      qty = %request.quantity,
      reduce_only = request.reduce_only
    )
  )]
  pub async fn run(&self, request: &RepriceRequest, cancel: &CancellationToken) -> RepriceReport {
    let mut state = RunState::new(request.quantity);

    let filters = match self
      .config
      .retry
      .run("symbol_filters", || self.market.symbol_filters(&request.symbol))
      .await
    {
      Ok(filters) => filters,
      Err(e) => return self.abort(state, request, e.into()).await,
    };

    if filters.is_dust(request.quantity) {
      let error = ExecutionError::InvalidQuantity(format!(
        "{} is below step {}",
        request.quantity, filters.step_size
      ));
      return state.report(TerminalOutcome::Aborted {
        filled: Decimal::ZERO,
        error,
      });
    }
    state.target = filters.floor_quantity(request.quantity);

    let deadline = Instant::now() + request.timeout;
    let honours_cancel = !request.reduce_only;

    loop {
      if Instant::now() >= deadline {
        return self.time_out(state, request, &filters).await;
      }
      if honours_cancel && cancel.is_cancelled() {
        info!("Run cancelled");
        return self.abort(state, request, ExecutionError::Cancelled).await;
      }

      match self.cycle(&mut state, request, &filters).await {
        Ok(true) => {
          info!(
            filled = %state.filled,
            placements = state.placements,
            reprices = state.reprices,
            "Run filled"
          );
          let quantity = state.filled;
          return state.report(TerminalOutcome::Filled { quantity });
        }
        Ok(false) => {}
        Err(e) => return self.abort(state, request, e).await,
      }

      let nap = self
        .config
        .poll_interval
        .min(deadline.saturating_duration_since(Instant::now()));
      if honours_cancel {
        tokio::select! {
          () = tokio::time::sleep(nap) => {}
          () = cancel.cancelled() => {}
        }
      } else {
        tokio::time::sleep(nap).await;
      }
    }
  }

  /// One poll cycle. Returns `true` once nothing is left to execute.
  async fn cycle(
    &self,
    state: &mut RunState,
    request: &RepriceRequest,
    filters: &SymbolFilters,
  ) -> Result<bool, ExecutionError> {
    let mut book = None;

    if let Some(tracked) = state.working.as_mut() {
      let order_id = tracked.order.order_id.clone();
      let queried = self
        .config
        .retry
        .run("get_order", || self.gateway.get_order(&request.symbol, &order_id))
        .await;

      let snapshot = match queried {
        Ok(snapshot) => Some(snapshot),
        Err(GatewayError::UnknownOrder(_)) => {
          debug!(order_id = %order_id, "Order not visible yet");
          None
        }
        Err(e) => return Err(e.into()),
      };

      if let Some(snapshot) = snapshot {
        tracked.order.apply(&snapshot);
        match snapshot.status {
          OrderStatus::Filled => {
            debug!(order_id = %order_id, "Order filled");
            state.settle();
          }
          OrderStatus::Canceled | OrderStatus::Expired | OrderStatus::Rejected => {
            warn!(
              order_id = %order_id,
              status = ?snapshot.status,
              executed = %snapshot.executed_quantity,
              "Order left the book unexpectedly"
            );
            if snapshot.status != OrderStatus::Canceled {
              state.rejections += 1;
            }
            state.settle();
          }
          OrderStatus::New | OrderStatus::PartiallyFilled => {
            self.maybe_reprice(state, request, filters, &mut book).await?;
          }
        }
      }
    }

    if state.working.is_some() {
      return Ok(false);
    }

    let remaining = state.remaining(filters);
    if remaining <= Decimal::ZERO {
      return Ok(true);
    }

    let book = match book {
      Some(book) => book,
      None => self.book(&request.symbol).await?,
    };
    self.place(state, request, filters, &book, remaining).await?;
    Ok(false)
  }

  /// Drift/age check on a resting order; cancels it when stale.
  async fn maybe_reprice(
    &self,
    state: &mut RunState,
    request: &RepriceRequest,
    filters: &SymbolFilters,
    book_cache: &mut Option<BookTicker>,
  ) -> Result<(), ExecutionError> {
    let Some(tracked) = state.working.as_mut() else {
      return Ok(());
    };

    let now = Instant::now();
    let aged = self
      .config
      .max_order_age
      .is_some_and(|age| now.duration_since(tracked.placed_at) >= age);
    if !aged && now.duration_since(tracked.last_check) < self.config.reprice_interval {
      return Ok(());
    }
    tracked.last_check = now;

    let book = self.book(&request.symbol).await?;
    *book_cache = Some(book);

    let Some(fresh) = maker_price(request.side, &book, filters, request.price_offset_ticks) else {
      debug!(bid = %book.bid, ask = %book.ask, "Book unusable, keeping resting order");
      return Ok(());
    };

    let drifted = has_drifted(
      tracked.order.price,
      fresh,
      self.config.price_tolerance_ticks,
      filters,
    );
    if !drifted && !aged {
      return Ok(());
    }

    let order_id = tracked.order.order_id.clone();
    let cancelled = self
      .config
      .retry
      .run("cancel_order", || self.gateway.cancel_order(&request.symbol, &order_id))
      .await?;

    match cancelled {
      CancelOutcome::Canceled(snapshot) => {
        tracked.order.apply(&snapshot);
        info!(
          order_id = %order_id,
          resting = %tracked.order.price,
          fresh = %fresh,
          aged,
          executed = %snapshot.executed_quantity,
          "Repricing order"
        );
        state.reprices += 1;
        state.settle();
      }
      CancelOutcome::AlreadyGone => {
        debug!(order_id = %order_id, "Cancel found order gone, resolving on next poll");
      }
    }
    Ok(())
  }

  async fn place(
    &self,
    state: &mut RunState,
    request: &RepriceRequest,
    filters: &SymbolFilters,
    book: &BookTicker,
    quantity: Decimal,
  ) -> Result<(), ExecutionError> {
    let Some(price) = maker_price(request.side, book, filters, request.price_offset_ticks) else {
      debug!(bid = %book.bid, ask = %book.ask, "Book unusable, skipping placement");
      return Ok(());
    };
    // Reduce-only orders are exempt from the notional floor.
    if !request.reduce_only && !filters.meets_min_notional(price, quantity) {
      return Err(ExecutionError::InvalidQuantity(format!(
        "{quantity} at {price} is below min notional {}",
        filters.min_notional
      )));
    }

    let order = OrderRequest {
      symbol: request.symbol.clone(),
      side: request.side,
      price,
      quantity,
      post_only: true,
      reduce_only: request.reduce_only,
      client_order_id: client_order_id(request.reduce_only),
    };

    let placed = self
      .config
      .retry
      .run("place_order", || self.gateway.place_order(&order))
      .await?;

    match placed {
      PlaceOutcome::Placed(handle) => {
        info!(order_id = %handle.order_id, price = %price, qty = %quantity, "Order placed");
        let now = Instant::now();
        state.placements += 1;
        state.working = Some(Tracked {
          order: WorkingOrder {
            order_id: handle.order_id,
            client_order_id: handle.client_order_id,
            symbol: order.symbol,
            side: order.side,
            price,
            quantity,
            remaining_quantity: quantity,
            reduce_only: order.reduce_only,
            status: OrderStatus::New,
          },
          placed_at: now,
          last_check: now,
        });
      }
      PlaceOutcome::Rejected { reason } => {
        state.rejections += 1;
        info!(price = %price, reason = %reason, "Post-only rejection, repricing next cycle");
      }
    }
    Ok(())
  }

  async fn book(&self, symbol: &str) -> Result<BookTicker, ExecutionError> {
    Ok(
      self
        .config
        .retry
        .run("best_bid_ask", || self.market.best_bid_ask(symbol))
        .await?,
    )
  }

  /// Cancel the working order and fold in its final fill.
  async fn finalize(&self, state: &mut RunState, symbol: &str) -> Result<(), GatewayError> {
    let Some(tracked) = state.working.as_mut() else {
      return Ok(());
    };
    let order_id = tracked.order.order_id.clone();

    let cancelled = self
      .config
      .retry
      .run("cancel_order", || self.gateway.cancel_order(symbol, &order_id))
      .await;

    match cancelled {
      Ok(CancelOutcome::Canceled(snapshot)) => tracked.order.apply(&snapshot),
      Ok(CancelOutcome::AlreadyGone) => {
        match self
          .config
          .retry
          .run("get_order", || self.gateway.get_order(symbol, &order_id))
          .await
        {
          Ok(snapshot) => tracked.order.apply(&snapshot),
          Err(e) => warn!(order_id = %order_id, error = %e, "Final order query failed"),
        }
      }
      Err(e) => {
        warn!(order_id = %order_id, error = %e, "Final cancel failed, order may still rest");
        state.settle();
        return Err(e);
      }
    }

    state.settle();
    Ok(())
  }

  async fn time_out(
    &self,
    mut state: RunState,
    request: &RepriceRequest,
    filters: &SymbolFilters,
  ) -> RepriceReport {
    if let Err(e) = self.finalize(&mut state, &request.symbol).await {
      let filled = state.filled;
      return state.report(TerminalOutcome::Aborted {
        filled,
        error: e.into(),
      });
    }

    let filled = state.filled;
    if state.remaining(filters) <= Decimal::ZERO {
      info!(filled = %filled, "Filled at deadline");
      return state.report(TerminalOutcome::Filled { quantity: filled });
    }

    warn!(filled = %filled, target = %state.target, "Run timed out");
    state.report(TerminalOutcome::TimedOut { filled })
  }

  async fn abort(
    &self,
    mut state: RunState,
    request: &RepriceRequest,
    error: ExecutionError,
  ) -> RepriceReport {
    // Best-effort; the original error is what gets reported.
    let _ = self.finalize(&mut state, &request.symbol).await;

    let filled = state.filled;
    warn!(filled = %filled, error = %error, "Run aborted");
    state.report(TerminalOutcome::Aborted { filled, error })
  }
}

/// `open-<10 hex>` / `close-<10 hex>`, well under the 36 char limit.
fn client_order_id(reduce_only: bool) -> String {
  let prefix = if reduce_only { "close" } else { "open" };
  let id = Uuid::new_v4().simple().to_string();
  format!("{prefix}-{}", &id[..10])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_client_order_id_shape() {
    let open = client_order_id(false);
    assert!(open.starts_with("open-"));
    assert_eq!(open.len(), 15);

    let close = client_order_id(true);
    assert!(close.starts_with("close-"));
    assert!(close.len() <= 36);
    assert!(close[6..].chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn test_outcome_filled_quantity() {
    use rust_decimal_macros::dec;

    assert_eq!(TerminalOutcome::Filled { quantity: dec!(0.02) }.filled(), dec!(0.02));
    assert_eq!(TerminalOutcome::TimedOut { filled: dec!(0.01) }.filled(), dec!(0.01));
    let aborted = TerminalOutcome::Aborted {
      filled: Decimal::ZERO,
      error: ExecutionError::Cancelled,
    };
    assert_eq!(aborted.filled(), Decimal::ZERO);
    assert!(!aborted.is_filled());
  }

  #[test]
  fn test_config_from_execution_section() {
    let config = RepriceConfig::default();
    assert_eq!(config.poll_interval, Duration::from_millis(200));
    assert_eq!(config.max_order_age, Some(Duration::from_millis(400)));
    assert_eq!(config.retry.retries, 3);
  }
}
