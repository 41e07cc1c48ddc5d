//! Position Transition - Close-then-Open Orchestrator
//!
//! Moves a symbol from whatever the exchange holds to the desired side:
//!
//! ```text
//! START ──► CLOSING (reduce-only, opposite side) ──► OPENING ──► DONE
//!   │            │ exhausted / aborted                │ exhausted / aborted
//!   └──────────► OPENING (no opposing exposure)       └──► FAILED
//! ```
//!
//! Every transition first sweeps the symbol's open orders, so an order
//! orphaned by an earlier run cannot keep trading behind the new one.
//! Both phases delegate order handling to the `RepriceEngine`. Closing
//! re-reads the position after every run and never sizes an attempt
//! above the opposing quantity read at phase start. Opening only begins
//! once the exchange reports zero opposing quantity, and its retries
//! only ever request the residual computed from reported fills.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::config::ExecutionConfig;
use crate::domain::filters::SymbolFilters;
use crate::domain::trade::{
  Position, PositionSide, Signal, TransitionOutcome, TransitionPhase, TransitionResult,
};
use crate::error::ExecutionError;
use crate::ports::gateway::OrderGateway;
use crate::ports::market_data::MarketData;
use crate::usecases::guard::{ConcurrencyGuard, Lease};
use crate::usecases::reprice_engine::{
  RepriceConfig, RepriceEngine, RepriceRequest, TerminalOutcome,
};
use crate::usecases::retry::RetryPolicy;

/// Phase ceilings and bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionConfig {
  /// Ceiling for one CLOSING engine run.
  pub close_timeout: Duration,
  /// Ceiling for one OPENING engine run.
  pub open_timeout: Duration,
  pub max_close_attempts: u32,
  pub max_open_attempts: u32,
  /// Ticks behind the touch to quote.
  pub price_offset_ticks: u32,
  /// Target size when a signal carries none.
  pub default_quantity: Decimal,
}

impl TransitionConfig {
  pub fn new(execution: &ExecutionConfig, default_quantity: Decimal) -> Self {
    Self {
      close_timeout: execution.close_timeout(),
      open_timeout: execution.open_timeout(),
      max_close_attempts: execution.max_close_attempts,
      max_open_attempts: execution.max_open_attempts,
      price_offset_ticks: execution.price_offset_ticks,
      default_quantity,
    }
  }
}

/// Running totals for one transition.
#[derive(Debug, Default)]
struct Progress {
  /// Signed position read at start, `None` until that read succeeds.
  start_amount: Option<Decimal>,
  closed: Decimal,
  opened: Decimal,
  reprices: u32,
}

/// Sequences CLOSING then OPENING for one symbol at a time.
pub struct PositionTransitioner<G: OrderGateway, M: MarketData> {
  engine: RepriceEngine<G, M>,
  gateway: Arc<G>,
  market: Arc<M>,
  guard: ConcurrencyGuard,
  config: TransitionConfig,
  retry: RetryPolicy,
}

impl<G: OrderGateway, M: MarketData> PositionTransitioner<G, M> {
  pub fn new(
    gateway: Arc<G>,
    market: Arc<M>,
    guard: ConcurrencyGuard,
    engine_config: RepriceConfig,
    config: TransitionConfig,
  ) -> Self {
    Self {
      engine: RepriceEngine::new(Arc::clone(&gateway), Arc::clone(&market), engine_config),
      gateway,
      market,
      guard,
      config,
      retry: engine_config.retry,
    }
  }

  pub const fn guard(&self) -> &ConcurrencyGuard {
    &self.guard
  }

  pub const fn config(&self) -> &TransitionConfig {
    &self.config
  }

  /// Best-effort account setup before trading a symbol.
  pub async fn prepare(&self, symbol: &str) {
    if let Err(e) = self.gateway.prepare_symbol(symbol).await {
      warn!(symbol, error = %e, "Symbol preparation failed, continuing");
    }
  }

  /// Admit the signal and run it to a terminal state, or report BUSY.
  pub async fn execute(&self, signal: &Signal) -> TransitionResult {
    let quantity = signal.quantity.unwrap_or(self.config.default_quantity);

    match self.guard.admit(&signal.symbol, signal.side) {
      Ok(lease) => self.transition(&lease, signal.side, quantity).await,
      Err(busy) => {
        warn!(symbol = %busy.symbol, side = %signal.side, "Signal rejected, symbol busy");
        TransitionResult::busy(&signal.symbol, signal.side)
      }
    }
  }

  /// Drive the symbol held by `lease` to `quantity` on `desired_side`.
  #[instrument(
    skip_all,
    fields(symbol = %lease.symbol(), side = %desired_side, qty = %quantity)
  )]
  pub async fn transition(
    &self,
    lease: &Lease,
    desired_side: PositionSide,
    quantity: Decimal,
  ) -> TransitionResult {
    let mut progress = Progress::default();
    let outcome = self.run_phases(lease, desired_side, quantity, &mut progress).await;

    let (phase, error) = match outcome {
      Ok(()) => (TransitionPhase::Done, None),
      Err(e) => (TransitionPhase::Failed, Some(e)),
    };
    lease.set_phase(phase);

    self.report(lease.symbol(), desired_side, &progress, error).await
  }

  async fn run_phases(
    &self,
    lease: &Lease,
    desired_side: PositionSide,
    quantity: Decimal,
    progress: &mut Progress,
  ) -> Result<(), ExecutionError> {
    let symbol = lease.symbol();
    let filters = self
      .retry
      .run("symbol_filters", || self.market.symbol_filters(symbol))
      .await?;

    let target = filters.floor_quantity(quantity);
    if target <= Decimal::ZERO {
      return Err(ExecutionError::InvalidQuantity(format!(
        "{quantity} is below step {}",
        filters.step_size
      )));
    }

    self.sweep_open_orders(symbol).await;

    let position = self.read_position(symbol).await?;
    progress.start_amount = Some(position.signed_amount());
    info!(
      held_side = ?position.side,
      held_qty = %position.quantity,
      target = %target,
      "Transition started"
    );

    let held = self.close(lease, desired_side, &position, progress).await?;

    if lease.is_cancelled() {
      info!("Cancelled after closing, not opening");
      return Err(ExecutionError::Cancelled);
    }

    self.open(lease, desired_side, target, held, &filters, progress).await
  }

  /// CLOSING phase. Returns the aligned quantity held once flat on the
  /// opposing side.
  async fn close(
    &self,
    lease: &Lease,
    desired_side: PositionSide,
    position: &Position,
    progress: &mut Progress,
  ) -> Result<Decimal, ExecutionError> {
    let symbol = lease.symbol();
    let opposing_side = desired_side.opposite();
    let initial = position.quantity_on(opposing_side);
    let mut opposing = initial;
    let mut held = position.quantity_on(desired_side);

    if opposing <= Decimal::ZERO {
      return Ok(held);
    }

    lease.set_phase(TransitionPhase::Closing);
    let mut attempts = 0;

    while opposing > Decimal::ZERO {
      if attempts >= self.config.max_close_attempts {
        warn!(attempts, residual = %opposing, "Closing attempts exhausted");
        return Err(ExecutionError::ClosingExhausted {
          attempts,
          residual: opposing,
        });
      }
      attempts += 1;

      let request = RepriceRequest {
        symbol: symbol.to_string(),
        side: opposing_side.exit_side(),
        quantity: opposing.min(initial),
        reduce_only: true,
        price_offset_ticks: self.config.price_offset_ticks,
        timeout: self.config.close_timeout,
      };
      info!(phase = "CLOSING", attempt = attempts, qty = %request.quantity, "Closing opposing position");

      let report = self.engine.run(&request, lease.cancel_token()).await;
      progress.closed += report.outcome.filled();
      progress.reprices += report.reprices;

      if let TerminalOutcome::Aborted { error, .. } = report.outcome {
        return Err(error);
      }

      let fresh = self.read_position(symbol).await?;
      opposing = fresh.quantity_on(opposing_side);
      held = fresh.quantity_on(desired_side);
    }

    info!(closed = %progress.closed, attempts, "Opposing position flat");
    Ok(held)
  }

  /// OPENING phase for `target - held`.
  async fn open(
    &self,
    lease: &Lease,
    desired_side: PositionSide,
    target: Decimal,
    held: Decimal,
    filters: &SymbolFilters,
    progress: &mut Progress,
  ) -> Result<(), ExecutionError> {
    lease.set_phase(TransitionPhase::Opening);

    let mut residual = filters.floor_quantity(target - held);
    if residual <= Decimal::ZERO {
      info!(held = %held, "Already at target");
      return Ok(());
    }

    let mut attempts = 0;
    while residual > Decimal::ZERO {
      if attempts >= self.config.max_open_attempts {
        warn!(attempts, residual = %residual, "Opening attempts exhausted");
        return Err(ExecutionError::OpeningExhausted { attempts, residual });
      }
      attempts += 1;

      let request = RepriceRequest {
        symbol: lease.symbol().to_string(),
        side: desired_side.entry_side(),
        quantity: residual,
        reduce_only: false,
        price_offset_ticks: self.config.price_offset_ticks,
        timeout: self.config.open_timeout,
      };
      info!(phase = "OPENING", attempt = attempts, qty = %residual, "Opening position");

      let report = self.engine.run(&request, lease.cancel_token()).await;
      let filled = report.outcome.filled();
      progress.opened += filled;
      progress.reprices += report.reprices;

      if let TerminalOutcome::Aborted { error, .. } = report.outcome {
        return Err(error);
      }
      residual = filters.floor_quantity(residual - filled);
    }

    Ok(())
  }

  /// Best-effort cancel of anything resting on the symbol. The lease
  /// guarantees none of it belongs to a live transition.
  async fn sweep_open_orders(&self, symbol: &str) {
    match self
      .retry
      .run("cancel_all", || self.gateway.cancel_all(symbol))
      .await
    {
      Ok(()) => debug!("Open orders swept"),
      Err(e) => warn!(error = %e, "Open order sweep failed, continuing"),
    }
  }

  async fn read_position(&self, symbol: &str) -> Result<Position, ExecutionError> {
    Ok(
      self
        .retry
        .run("get_position", || self.gateway.get_position(symbol))
        .await?,
    )
  }

  /// Build the result from a final position read, falling back to the
  /// locally tracked estimate. With no successful read at all the
  /// position is reported unknown.
  async fn report(
    &self,
    symbol: &str,
    desired_side: PositionSide,
    progress: &Progress,
    error: Option<ExecutionError>,
  ) -> TransitionResult {
    let outcome = if error.is_some() {
      TransitionOutcome::Failed
    } else {
      TransitionOutcome::Done
    };
    let mut error = error.map(|e| e.to_string());

    let achieved = match (self.read_position(symbol).await, progress.start_amount) {
      (Ok(position), _) => Some(position),
      (Err(e), Some(start_amount)) => {
        // Closing and opening orders both trade on the desired entry side.
        let estimate =
          start_amount + desired_side.entry_side().sign() * (progress.closed + progress.opened);
        warn!(error = %e, estimate = %estimate, "Final position read failed, reporting estimate");
        Some(Position::from_signed_amount(symbol, estimate))
      }
      (Err(e), None) => {
        warn!(error = %e, "Position unknown, no read succeeded");
        let unknown = format!("position unknown: {e}");
        error = Some(match error {
          Some(err) => format!("{err}; {unknown}"),
          None => unknown,
        });
        None
      }
    };
    let achieved_side = achieved.as_ref().and_then(|p| p.side);
    let achieved_quantity = achieved.as_ref().map_or(Decimal::ZERO, |p| p.quantity);

    match &error {
      None => info!(
        achieved_side = ?achieved_side,
        achieved_qty = %achieved_quantity,
        reprices = progress.reprices,
        "Transition done"
      ),
      Some(e) => warn!(
        achieved_side = ?achieved_side,
        achieved_qty = %achieved_quantity,
        error = %e,
        "Transition failed"
      ),
    }

    TransitionResult {
      symbol: symbol.to_string(),
      desired_side,
      outcome,
      achieved_side,
      achieved_quantity,
      closed_quantity: progress.closed,
      opened_quantity: progress.opened,
      reprices: progress.reprices,
      error,
      completed_at: Utc::now(),
    }
  }
}
