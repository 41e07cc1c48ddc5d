//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the executor's core workflows.
//!
//! Use cases:
//! - `RepriceEngine`: One post-only working order, submit to terminal state
//! - `PositionTransitioner`: Close-opposite then open-new sequencing
//! - `ConcurrencyGuard`: One in-flight transition per symbol
//! - `RetryPolicy`: Silent bounded retry of transient gateway failures

pub mod guard;
pub mod reprice_engine;
pub mod retry;
pub mod transition;

pub use guard::{Busy, ConcurrencyGuard, Lease};
pub use reprice_engine::{RepriceConfig, RepriceEngine, RepriceReport, RepriceRequest, TerminalOutcome};
pub use retry::RetryPolicy;
pub use transition::{PositionTransitioner, TransitionConfig};
