//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use cases require from the
//! exchange. Adapters implement these traits.
//!
//! Port categories:
//! - `MarketData`: Top-of-book, last price and symbol filters
//! - `OrderGateway`: Post-only order placement, cancel, query, positions

pub mod gateway;
pub mod market_data;

pub use gateway::{CancelOutcome, OrderGateway, OrderHandle, OrderRequest, PlaceOutcome};
pub use market_data::MarketData;
