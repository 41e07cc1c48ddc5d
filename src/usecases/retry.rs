//! Transport Retry - Bounded Retry for Gateway Calls
//!
//! Transient gateway failures (network, 429/5xx, unknown-order right
//! after placement) are retried silently with a fixed delay. Anything
//! else surfaces immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::GatewayError;

/// Retry policy for a single gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Retries after the first attempt.
  pub retries: u32,
  /// Pause between attempts.
  pub delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      retries: 3,
      delay: Duration::from_millis(100),
    }
  }
}

impl RetryPolicy {
  /// Run `call` until it succeeds, fails non-transiently, or the retry
  /// budget is spent. The last error is returned.
  pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, GatewayError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
  {
    let mut attempt = 0;

    loop {
      match call().await {
        Ok(value) => return Ok(value),
        Err(e) if e.is_transient() && attempt < self.retries => {
          attempt += 1;
          warn!(
            operation,
            attempt,
            max_retries = self.retries,
            error = %e,
            "Transient gateway error, retrying"
          );
          tokio::time::sleep(self.delay).await;
        }
        Err(e) => return Err(e),
      }
    }
  }
}
