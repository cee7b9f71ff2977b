//! Per-operation context
//!
//! Every lifecycle operation runs against a deadline (the orchestrator's
//! timeout budget) and a cancellation token. Remote calls, lock waits and the
//! replication poll loop all go through [`OperationContext::run`].

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::{CredentialError, Result};

/// Deadline and cancellation for one lifecycle operation
///
/// # Examples
///
/// ```
/// use azuread_credential::core::OperationContext;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let token = CancellationToken::new();
/// let ctx = OperationContext::new(Duration::from_secs(300))
///     .with_cancellation(token.child_token());
/// assert!(!ctx.is_cancelled());
/// token.cancel();
/// assert!(ctx.is_cancelled());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OperationContext {
    deadline: Instant,
    budget: Duration,
    cancellation: CancellationToken,
}

impl OperationContext {
    /// Create a context whose deadline is `timeout` from now
    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            budget: timeout,
            cancellation: CancellationToken::new(),
        }
    }

    /// Replace the default cancellation token with the provided one
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Absolute deadline of the operation
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Total timeout budget the context was created with
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancellation token of the operation
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Drive `future` to completion unless the deadline passes or the
    /// operation is cancelled first
    ///
    /// The future is dropped on timeout or cancellation, which releases
    /// anything it holds (lock guards, in-flight requests).
    pub async fn run<F, T>(&self, operation: &'static str, future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => {
                tracing::debug!(operation, "operation cancelled");
                Err(CredentialError::Cancelled { operation })
            }
            result = tokio::time::timeout_at(self.deadline, future) => {
                result.map_err(|_| {
                    tracing::warn!(operation, budget = ?self.budget, "operation timed out");
                    CredentialError::Timeout {
                        operation,
                        duration: self.budget,
                    }
                })
            }
        }
    }

    /// Drive `future` to completion unless the operation is cancelled first
    ///
    /// For futures that enforce the deadline themselves and report their own
    /// timeout error.
    pub async fn run_cancellable<F, T>(&self, operation: &'static str, future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => {
                tracing::debug!(operation, "operation cancelled");
                Err(CredentialError::Cancelled { operation })
            }
            value = future => Ok(value),
        }
    }
}
