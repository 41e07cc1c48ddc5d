//! Metrics Adapter
//!
//! Prometheus registry for transition outcomes and reprice churn,
//! exposed by the HTTP server on `/metrics`.

pub mod prometheus;

pub use self::prometheus::MetricsRegistry;
