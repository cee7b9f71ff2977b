//! Waiting for eventually consistent credential writes
//!
//! A successful update of a parent's credential list may not be reflected by
//! the next read. [`wait_for_visibility`] re-reads the list on an exponential
//! backoff schedule until the new key shows up or the deadline passes.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ConfigError;
use crate::core::{Credential, ReplicationError};
use crate::reconcile::find_by_key_id;

/// Poll schedule for the replication waiter
///
/// # Example
///
/// ```rust
/// use azuread_credential::reconcile::ReplicationPolicy;
/// use std::time::Duration;
///
/// let policy = ReplicationPolicy {
///     initial_interval: Duration::from_millis(500),
///     ..Default::default()
/// };
/// assert!(policy.validate().is_ok());
/// assert_eq!(policy.calculate_delay(0), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationPolicy {
    /// Delay after the first unsuccessful poll
    #[serde(with = "humantime_serde")]
    pub initial_interval: Duration,

    /// Cap for exponential growth
    #[serde(with = "humantime_serde")]
    pub max_interval: Duration,

    /// Backoff multiplier, 1.0 for a fixed interval
    pub multiplier: f64,

    /// Add ±25% randomness to delays
    pub jitter: bool,

    /// Consecutive polls that must show the key before it counts as replicated
    pub confirmations: u32,
}

impl Default for ReplicationPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: false,
            confirmations: 1,
        }
    }
}

impl ReplicationPolicy {
    /// Validate policy parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "replication.initial_interval".into(),
                reason: "must be greater than zero".into(),
            });
        }

        if self.max_interval < self.initial_interval {
            return Err(ConfigError::InvalidValue {
                field: "replication.max_interval".into(),
                reason: format!(
                    "must be >= initial_interval ({:?}), got {:?}",
                    self.initial_interval, self.max_interval
                ),
            });
        }

        if !(1.0..=10.0).contains(&self.multiplier) {
            return Err(ConfigError::InvalidValue {
                field: "replication.multiplier".into(),
                reason: format!("must be between 1.0 and 10.0, got {}", self.multiplier),
            });
        }

        if self.confirmations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "replication.confirmations".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(())
    }

    /// Delay before the poll following `attempt` (0-based), capped at `max_interval`
    ///
    /// Never panics, even for a policy that fails [`validate`](Self::validate):
    /// multipliers below 1.0 (or NaN) are treated as 1.0.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let multiplier = self.multiplier.max(1.0);
        let delay = self.initial_interval.as_secs_f64() * multiplier.powi(exponent);
        let cap = self.max_interval.as_secs_f64();
        if delay.is_nan() || delay > cap {
            self.max_interval
        } else {
            Duration::from_secs_f64(delay)
        }
    }

    /// Apply ±25% jitter to a delay if enabled
    pub fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }
        let factor = 0.75 + fastrand::f64() * 0.5;
        delay.mul_f64(factor)
    }
}

/// Poll until `key_id` is visible or `deadline` passes
///
/// `poll` fetches the parent's current credential list. Poll errors are
/// logged and retried; they never end the wait before the deadline. Each
/// poll is itself bounded by the deadline, and sleeps between polls are
/// clamped so the final poll happens at the deadline at the latest.
///
/// Returns the visible credential as soon as it has been observed
/// `policy.confirmations` times in a row.
///
/// # Errors
///
/// [`ReplicationError::Timeout`] once the deadline elapses without the key
/// being confirmed, never earlier.
pub async fn wait_for_visibility<F, Fut, E>(
    key_id: &str,
    deadline: Instant,
    policy: &ReplicationPolicy,
    mut poll: F,
) -> Result<Credential, ReplicationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<Credential>, E>>,
    E: Display,
{
    let required = policy.confirmations.max(1);
    let mut attempts: u32 = 0;
    let mut seen: u32 = 0;
    let mut last_error: Option<String> = None;

    loop {
        attempts += 1;
        match tokio::time::timeout_at(deadline, poll()).await {
            Ok(Ok(list)) => {
                last_error = None;
                if let Some(credential) = find_by_key_id(&list, key_id) {
                    seen += 1;
                    if seen >= required {
                        if attempts > 1 {
                            tracing::debug!(key_id, attempts, "credential replicated");
                        }
                        return Ok(credential.clone());
                    }
                } else {
                    seen = 0;
                    tracing::debug!(key_id, attempts, "credential not yet visible");
                }
            }
            Ok(Err(err)) => {
                seen = 0;
                tracing::warn!(
                    key_id,
                    attempts,
                    error = %err,
                    "polling for credential failed, retrying"
                );
                last_error = Some(err.to_string());
            }
            Err(_) => break,
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let delay = policy
            .apply_jitter(policy.calculate_delay(attempts - 1))
            .min(deadline - now);
        tokio::time::sleep(delay).await;
    }

    tracing::error!(key_id, attempts, "credential was not replicated before the deadline");
    Err(ReplicationError::Timeout {
        key_id: key_id.to_string(),
        attempts,
        last_error,
    })
}
