//! Concurrency Guard - One Transition per Symbol
//!
//! Admits at most one in-flight transition per symbol. A second signal
//! for a busy symbol is rejected outright, never queued.
//!
//! - `admit` atomically inserts into the lease table or fails with `Busy`
//! - The returned `Lease` removes its entry on drop, exactly once
//! - Each lease owns a cancellation token for cooperative cancel
//! - `wait_idle` resolves once no lease is held (shutdown drain)

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::trade::{PositionSide, Symbol, TransitionPhase, TransitionTask};

/// Returned by `admit` when a transition is already active for the symbol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transition already active for {symbol}")]
pub struct Busy {
  /// The contended symbol.
  pub symbol: Symbol,
}

struct LeaseEntry {
  task: TransitionTask,
  cancel: CancellationToken,
  id: u64,
}

#[derive(Default)]
struct LeaseTable {
  entries: HashMap<Symbol, LeaseEntry>,
  next_id: u64,
}

/// Shared lease table. Cheap to clone.
#[derive(Clone, Default)]
pub struct ConcurrencyGuard {
  table: Arc<Mutex<LeaseTable>>,
  /// Parent for every lease token; cancelling it stops all transitions.
  root: CancellationToken,
  /// Signalled when the last lease is released.
  idle: Arc<Notify>,
}

impl ConcurrencyGuard {
  /// Guard with its own root token.
  pub fn new() -> Self {
    Self::default()
  }

  /// Guard whose leases are children of `root` (process shutdown).
  pub fn with_root(root: CancellationToken) -> Self {
    Self {
      table: Arc::default(),
      root,
      idle: Arc::default(),
    }
  }

  /// Try to start a transition for `symbol`.
  pub fn admit(&self, symbol: &str, desired_side: PositionSide) -> Result<Lease, Busy> {
    let mut table = self.lock();
    if table.entries.contains_key(symbol) {
      debug!(symbol, "Admission rejected, symbol busy");
      return Err(Busy {
        symbol: symbol.to_string(),
      });
    }

    table.next_id += 1;
    let id = table.next_id;
    let cancel = self.root.child_token();
    table.entries.insert(
      symbol.to_string(),
      LeaseEntry {
        task: TransitionTask {
          symbol: symbol.to_string(),
          desired_side,
          phase: TransitionPhase::Closing,
        },
        cancel: cancel.clone(),
        id,
      },
    );

    info!(symbol, side = %desired_side, "Transition admitted");
    Ok(Lease {
      table: Arc::clone(&self.table),
      idle: Arc::clone(&self.idle),
      symbol: symbol.to_string(),
      cancel,
      id,
    })
  }

  /// Request cooperative cancellation of the active transition.
  /// Returns `false` when nothing is running for the symbol.
  pub fn cancel(&self, symbol: &str) -> bool {
    let table = self.lock();
    match table.entries.get(symbol) {
      Some(entry) => {
        entry.cancel.cancel();
        info!(symbol, phase = ?entry.task.phase, "Transition cancellation requested");
        true
      }
      None => false,
    }
  }

  /// Snapshot of all active tasks, sorted by symbol.
  pub fn active(&self) -> Vec<TransitionTask> {
    let mut tasks: Vec<_> = self
      .lock()
      .entries
      .values()
      .map(|entry| entry.task.clone())
      .collect();
    tasks.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    tasks
  }

  pub fn is_active(&self, symbol: &str) -> bool {
    self.lock().entries.contains_key(symbol)
  }

  /// Wait until every lease has been released.
  pub async fn wait_idle(&self) {
    loop {
      let released = self.idle.notified();
      if self.lock().entries.is_empty() {
        return;
      }
      released.await;
    }
  }

  fn lock(&self) -> MutexGuard<'_, LeaseTable> {
    self.table.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Exclusive right to run a transition for one symbol.
pub struct Lease {
  table: Arc<Mutex<LeaseTable>>,
  idle: Arc<Notify>,
  symbol: Symbol,
  cancel: CancellationToken,
  id: u64,
}

impl Lease {
  pub fn symbol(&self) -> &str {
    &self.symbol
  }

  /// Token cancelled by `ConcurrencyGuard::cancel` or process shutdown.
  pub const fn cancel_token(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  /// Publish the task's current phase.
  pub fn set_phase(&self, phase: TransitionPhase) {
    let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(entry) = table.entries.get_mut(&self.symbol) {
      if entry.id == self.id {
        entry.task.phase = phase;
      }
    }
  }
}

impl Drop for Lease {
  fn drop(&mut self) {
    let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
    if table
      .entries
      .get(&self.symbol)
      .is_some_and(|entry| entry.id == self.id)
    {
      table.entries.remove(&self.symbol);
      debug!(symbol = %self.symbol, "Lease released");
      if table.entries.is_empty() {
        self.idle.notify_waiters();
      }
    }
  }
}

impl std::fmt::Debug for Lease {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Lease")
      .field("symbol", &self.symbol)
      .field("cancelled", &self.cancel.is_cancelled())
      .finish()
  }
}
