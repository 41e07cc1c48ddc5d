//! Core trading domain types.
//!
//! Signals, positions, working orders and transition bookkeeping.
//! These types are the inner ring of the hexagonal layout: no I/O,
//! no async, serializable and testable in isolation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────
// Identifiers used at the ports boundary
// ────────────────────────────────────────────

/// Exchange symbol, e.g. `ETHUSDT`.
pub type Symbol = String;

/// Exchange-assigned order identifier.
pub type OrderId = String;

// ────────────────────────────────────────────
// Sides
// ────────────────────────────────────────────

/// Order side as sent to the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The side that offsets this one.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Signed direction: +1 for buys, -1 for sells.
    pub fn sign(self) -> Decimal {
        match self {
            Self::Buy => Decimal::ONE,
            Self::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Directional exposure requested by a signal or held on the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Order side that increases this exposure.
    pub const fn entry_side(self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Buy,
            Self::Short => OrderSide::Sell,
        }
    }

    /// Order side that reduces this exposure.
    pub const fn exit_side(self) -> OrderSide {
        self.entry_side().opposite()
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// Raised when a signal carries a side other than long/short/buy/sell.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("side must be 'long' or 'short', got '{0}'")]
pub struct InvalidSide(pub String);

impl FromStr for PositionSide {
    type Err = InvalidSide;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" | "buy" => Ok(Self::Long),
            "short" | "sell" => Ok(Self::Short),
            _ => Err(InvalidSide(s.to_string())),
        }
    }
}

// ────────────────────────────────────────────
// Signal and position
// ────────────────────────────────────────────

/// A trading intent delivered by the webhook or a manual call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: Symbol,
    pub side: PositionSide,
    /// Target quantity. `None` means "use the configured default".
    pub quantity: Option<Decimal>,
}

impl Signal {
    pub fn new(symbol: impl Into<Symbol>, side: PositionSide, quantity: Option<Decimal>) -> Self {
        Self {
            symbol: symbol.into().to_ascii_uppercase(),
            side,
            quantity,
        }
    }
}

/// Transient read of the exchange's holding for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    /// `None` when flat.
    pub side: Option<PositionSide>,
    /// Absolute size; zero when flat.
    pub quantity: Decimal,
}

impl Position {
    pub fn flat(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            side: None,
            quantity: Decimal::ZERO,
        }
    }

    /// Build from a signed exchange amount (positive = long).
    pub fn from_signed_amount(symbol: impl Into<Symbol>, amount: Decimal) -> Self {
        let side = if amount > Decimal::ZERO {
            Some(PositionSide::Long)
        } else if amount < Decimal::ZERO {
            Some(PositionSide::Short)
        } else {
            None
        };
        Self {
            symbol: symbol.into(),
            side,
            quantity: amount.abs(),
        }
    }

    /// Signed amount (positive = long).
    pub fn signed_amount(&self) -> Decimal {
        match self.side {
            Some(PositionSide::Long) => self.quantity,
            Some(PositionSide::Short) => -self.quantity,
            None => Decimal::ZERO,
        }
    }

    /// Quantity held on the given side, zero otherwise.
    pub fn quantity_on(&self, side: PositionSide) -> Decimal {
        if self.side == Some(side) {
            self.quantity
        } else {
            Decimal::ZERO
        }
    }
}

// ────────────────────────────────────────────
// Orders
// ────────────────────────────────────────────

/// Exchange lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// Terminal statuses never change again on the exchange.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired
        )
    }
}

/// Normalized order state returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub price: Decimal,
    pub quantity: Decimal,
    pub executed_quantity: Decimal,
}

/// The single resting order owned by one reprice run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingOrder {
    pub order_id: OrderId,
    pub client_order_id: String,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub reduce_only: bool,
    pub status: OrderStatus,
}

impl WorkingOrder {
    /// Quantity executed so far on this order.
    pub fn executed(&self) -> Decimal {
        self.quantity - self.remaining_quantity
    }

    /// Fold a fresh exchange snapshot into the local copy.
    pub fn apply(&mut self, snapshot: &OrderSnapshot) {
        self.status = snapshot.status;
        let executed = snapshot.executed_quantity.min(self.quantity);
        self.remaining_quantity = self.quantity - executed;
    }
}

// ────────────────────────────────────────────
// Transition bookkeeping
// ────────────────────────────────────────────

/// Phase of a per-symbol position transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionPhase {
    Closing,
    Opening,
    Done,
    Failed,
}

impl TransitionPhase {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// An in-flight transition as seen by the concurrency guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTask {
    pub symbol: Symbol,
    pub desired_side: PositionSide,
    pub phase: TransitionPhase,
}

/// Final disposition reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionOutcome {
    Done,
    Failed,
    Busy,
}

/// What a transition actually achieved on the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionResult {
    pub symbol: Symbol,
    pub desired_side: PositionSide,
    pub outcome: TransitionOutcome,
    /// Side held after the transition, `None` when flat or unknown.
    pub achieved_side: Option<PositionSide>,
    /// Quantity held after the transition.
    pub achieved_quantity: Decimal,
    /// Quantity closed by reduce-only orders.
    pub closed_quantity: Decimal,
    /// Quantity opened by this transition.
    pub opened_quantity: Decimal,
    /// Cancel/replace cycles across both phases.
    pub reprices: u32,
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl TransitionResult {
    /// Result for a signal rejected because the symbol is busy.
    pub fn busy(symbol: impl Into<Symbol>, desired_side: PositionSide) -> Self {
        Self {
            symbol: symbol.into(),
            desired_side,
            outcome: TransitionOutcome::Busy,
            achieved_side: None,
            achieved_quantity: Decimal::ZERO,
            closed_quantity: Decimal::ZERO,
            opened_quantity: Decimal::ZERO,
            reprices: 0,
            error: Some("another transition is active for this symbol".to_string()),
            completed_at: Utc::now(),
        }
    }
}
