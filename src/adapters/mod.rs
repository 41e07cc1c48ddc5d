//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, HTTP server, metrics).
//! Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `binance`: Binance USD-M futures REST client, auth and port impls
//! - `metrics`: Prometheus metrics registry
//! - `server`: Webhook, manual trade, health and metrics routes

pub mod binance;
pub mod metrics;
pub mod server;
