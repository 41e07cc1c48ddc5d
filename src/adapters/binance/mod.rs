//! Binance USD-M Futures Adapter
//!
//! Implements the exchange ports against the Binance futures REST API.
//!
//! Sub-modules:
//! - `auth`: HMAC-SHA256 query signing
//! - `client`: HTTP client with concurrency and rate limiting
//! - `gateway`: `OrderGateway` + `MarketData` implementations
//! - `types`: API request/response type definitions

pub mod auth;
pub mod client;
pub mod gateway;
pub mod types;

pub use auth::BinanceAuth;
pub use client::{BinanceClient, BinanceClientConfig};
pub use gateway::BinanceFutures;
