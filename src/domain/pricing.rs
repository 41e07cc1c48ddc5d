//! Maker price selection.
//!
//! A post-only order must rest on its own side of the book. Buys are
//! quoted at (or behind) the best bid, sells at (or behind) the best ask,
//! and the result is always strictly inside the resting side so the
//! exchange never matches it on entry.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::filters::SymbolFilters;
use super::trade::OrderSide;

/// Top of book for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookTicker {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl BookTicker {
    pub const fn new(bid: Decimal, ask: Decimal) -> Self {
        Self { bid, ask }
    }

    /// A book we can quote against: positive prices, not locked or crossed.
    pub fn is_usable(&self) -> bool {
        self.bid > Decimal::ZERO && self.ask > self.bid
    }

    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

/// Compute the resting price for a post-only order.
///
/// `offset_ticks` moves the quote further behind the touch. Returns `None`
/// when the book is unusable or the quote would be non-positive.
pub fn maker_price(
    side: OrderSide,
    book: &BookTicker,
    filters: &SymbolFilters,
    offset_ticks: u32,
) -> Option<Decimal> {
    if !book.is_usable() {
        return None;
    }

    let tick = filters.tick_size;
    let offset = tick * Decimal::from(offset_ticks);

    let price = match side {
        OrderSide::Buy => {
            let mut target = filters.round_price(side, book.bid - offset);
            if target >= book.ask {
                target = filters.round_price(side, book.ask - tick);
            }
            target
        }
        OrderSide::Sell => {
            let mut target = filters.round_price(side, book.ask + offset);
            if target <= book.bid {
                target = filters.round_price(side, book.bid + tick);
            }
            target
        }
    };

    (price > Decimal::ZERO && !crosses(side, price, book)).then_some(price)
}

/// Whether a price at this side would take liquidity against `book`.
pub fn crosses(side: OrderSide, price: Decimal, book: &BookTicker) -> bool {
    match side {
        OrderSide::Buy => price >= book.ask,
        OrderSide::Sell => price <= book.bid,
    }
}

/// Whether the resting price is further than `tolerance_ticks` from the
/// freshly computed quote.
pub fn has_drifted(
    resting: Decimal,
    fresh: Decimal,
    tolerance_ticks: u32,
    filters: &SymbolFilters,
) -> bool {
    let tolerance = filters.tick_size * Decimal::from(tolerance_ticks);
    (fresh - resting).abs() > tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn filters() -> SymbolFilters {
        SymbolFilters {
            tick_size: dec!(0.01),
            step_size: dec!(0.001),
            min_notional: dec!(20),
        }
    }

    #[test]
    fn test_buy_quotes_best_bid() {
        let book = BookTicker::new(dec!(2500.10), dec!(2500.11));
        assert_eq!(
            maker_price(OrderSide::Buy, &book, &filters(), 0),
            Some(dec!(2500.10))
        );
    }

    #[test]
    fn test_sell_quotes_best_ask() {
        let book = BookTicker::new(dec!(2500.10), dec!(2500.11));
        assert_eq!(
            maker_price(OrderSide::Sell, &book, &filters(), 0),
            Some(dec!(2500.11))
        );
    }

    #[test]
    fn test_offset_moves_behind_touch() {
        let book = BookTicker::new(dec!(2500.10), dec!(2500.11));
        assert_eq!(
            maker_price(OrderSide::Buy, &book, &filters(), 2),
            Some(dec!(2500.08))
        );
        assert_eq!(
            maker_price(OrderSide::Sell, &book, &filters(), 2),
            Some(dec!(2500.13))
        );
    }

    #[test]
    fn test_off_grid_book_never_crosses() {
        // Bid and ask closer than a tick: rounding must not land on the ask.
        let book = BookTicker::new(dec!(2500.105), dec!(2500.109));
        let buy = maker_price(OrderSide::Buy, &book, &filters(), 0).unwrap();
        assert!(buy < book.ask);
        let sell = maker_price(OrderSide::Sell, &book, &filters(), 0).unwrap();
        assert!(sell > book.bid);
    }

    #[test]
    fn test_unusable_books() {
        let locked = BookTicker::new(dec!(10), dec!(10));
        assert_eq!(maker_price(OrderSide::Buy, &locked, &filters(), 0), None);
        let empty = BookTicker::new(Decimal::ZERO, dec!(10));
        assert_eq!(maker_price(OrderSide::Sell, &empty, &filters(), 0), None);
    }

    #[test]
    fn test_drift_tolerance() {
        let f = filters();
        assert!(!has_drifted(dec!(100.00), dec!(100.00), 0, &f));
        assert!(has_drifted(dec!(100.00), dec!(100.01), 0, &f));
        assert!(!has_drifted(dec!(100.00), dec!(100.01), 1, &f));
        assert!(has_drifted(dec!(100.00), dec!(99.98), 1, &f));
    }

    #[test]
    fn test_book_mid() {
        let book = BookTicker::new(dec!(100), dec!(102));
        assert_eq!(book.mid(), dec!(101));
    }
}
