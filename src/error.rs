//! Error taxonomy shared by ports and use cases.
//!
//! `GatewayError` is what an exchange adapter may return; `ExecutionError`
//! is what the reprice engine and the transition orchestrator surface.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors returned by the exchange-facing ports.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Network failure, timeout, throttling or 5xx. Safe to retry.
    #[error("transport error: {0}")]
    Transport(String),

    /// The exchange does not (yet) know the order. Seen right after
    /// placement on eventually consistent endpoints.
    #[error("unknown order: {0}")]
    UnknownOrder(String),

    /// The exchange answered with a business error.
    #[error("exchange error {code}: {msg}")]
    Exchange { code: i64, msg: String },

    /// The response could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Whether the call may be retried without changing its meaning.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::UnknownOrder(_))
    }
}

/// Errors surfaced by the reprice engine and the orchestrator.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("transition cancelled")]
    Cancelled,

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("opposing position still open after {attempts} close attempts (residual {residual})")]
    ClosingExhausted { attempts: u32, residual: Decimal },

    #[error("target not reached after {attempts} open attempts (residual {residual})")]
    OpeningExhausted { attempts: u32, residual: Decimal },
}
