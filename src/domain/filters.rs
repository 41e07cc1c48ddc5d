//! Symbol trading filters and step rounding.
//!
//! Exchanges only accept prices on the tick grid and quantities on the
//! lot-step grid. Rounding direction matters: quantities always round
//! down (never trade more than intended) and maker prices round away
//! from the opposite side of the book.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::trade::OrderSide;

/// Price/quantity grid for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFilters {
    /// Minimum price increment.
    pub tick_size: Decimal,
    /// Minimum quantity increment.
    pub step_size: Decimal,
    /// Minimum order notional (price × quantity).
    pub min_notional: Decimal,
}

impl Default for SymbolFilters {
    /// Fallbacks used when the exchange omits a filter.
    fn default() -> Self {
        Self {
            tick_size: Decimal::new(1, 2),
            step_size: Decimal::new(1, 3),
            min_notional: Decimal::new(5, 0),
        }
    }
}

impl SymbolFilters {
    /// Round a quantity down to the lot step.
    pub fn floor_quantity(&self, quantity: Decimal) -> Decimal {
        floor_to_step(quantity, self.step_size)
    }

    /// True when the quantity rounds to nothing tradable.
    pub fn is_dust(&self, quantity: Decimal) -> bool {
        self.floor_quantity(quantity) <= Decimal::ZERO
    }

    /// Round a maker price onto the tick grid without moving it toward
    /// the opposite side: buys round down, sells round up.
    pub fn round_price(&self, side: OrderSide, price: Decimal) -> Decimal {
        match side {
            OrderSide::Buy => floor_to_step(price, self.tick_size),
            OrderSide::Sell => ceil_to_step(price, self.tick_size),
        }
    }

    /// Whether an order of this size clears the notional floor.
    pub fn meets_min_notional(&self, price: Decimal, quantity: Decimal) -> bool {
        price * quantity >= self.min_notional
    }
}

/// Round down to a multiple of `step`. A zero step leaves the value as is.
pub fn floor_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    ((value / step).floor() * step).normalize()
}

/// Round up to a multiple of `step`. A zero step leaves the value as is.
pub fn ceil_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    ((value / step).ceil() * step).normalize()
}
