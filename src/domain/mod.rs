//! Domain layer - Core business types and pure pricing rules.
//!
//! No I/O here (hexagonal architecture inner ring). Everything is
//! synchronous, serializable and testable in isolation.

pub mod filters;
pub mod pricing;
pub mod trade;

// Re-export core types for convenience
pub use filters::SymbolFilters;
pub use pricing::{BookTicker, maker_price};
pub use trade::{
    OrderId, OrderSide, OrderSnapshot, OrderStatus, Position, PositionSide, Signal, Symbol,
    TransitionOutcome, TransitionPhase, TransitionResult, TransitionTask, WorkingOrder,
};
