//! Retry with exponential backoff for transient driver failures.
//!
//! The retry loop is an explicit state machine:
//!
//! ```text
//! Idle -> Attempting -> Backoff -> Attempting -> ... -> Done | Exhausted
//! ```
//!
//! Transitions are pure ([`RetryState::after_attempt`]) and the waiting is
//! delegated to a [`Sleeper`], so tests drive the same logic with a recording
//! clock instead of wall-clock sleeps.

use crate::constants::{MAX_RETRIES, RETRY_BASE_DELAY};
use crate::error::DriverError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: RETRY_BASE_DELAY,
        }
    }
}

impl RetryConfig {
    /// Upper bound on total attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Backoff before retry number `retry` (1-based): `2^(retry-1) * base_delay`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Scheduler-agnostic delay primitive.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    Succeeded,
    Transient,
    Fatal,
}

/// Position of a retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Nothing attempted yet.
    Idle,
    /// Running attempt `retry + 1`.
    Attempting { retry: u32 },
    /// Waiting `delay` before retry number `retry`.
    Backoff { retry: u32, delay: Duration },
    /// Stopped after a success or a fatal failure.
    Done { attempts: u32 },
    /// Stopped because every allowed attempt failed transiently.
    Exhausted { attempts: u32 },
}

impl RetryState {
    /// Leave `Idle` and begin the first attempt.
    pub fn start(self) -> Self {
        match self {
            RetryState::Idle => RetryState::Attempting { retry: 0 },
            other => other,
        }
    }

    /// Transition out of `Attempting` given how the attempt ended.
    pub fn after_attempt(self, result: AttemptResult, config: &RetryConfig) -> Self {
        let RetryState::Attempting { retry } = self else {
            return self;
        };
        let attempts = retry + 1;

        match result {
            AttemptResult::Succeeded | AttemptResult::Fatal => RetryState::Done { attempts },
            AttemptResult::Transient if retry < config.max_retries => RetryState::Backoff {
                retry: retry + 1,
                delay: config.delay_for_retry(retry + 1),
            },
            AttemptResult::Transient => RetryState::Exhausted { attempts },
        }
    }

    /// Transition out of `Backoff` once the delay has elapsed.
    pub fn after_backoff(self) -> Self {
        match self {
            RetryState::Backoff { retry, .. } => RetryState::Attempting { retry },
            other => other,
        }
    }

    /// Whether the loop has stopped.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Done { .. } | RetryState::Exhausted { .. })
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub struct RetryResult<T> {
    /// The successful value or the last error.
    pub outcome: Result<T, DriverError>,
    /// Number of attempts made.
    pub attempts: u32,
    /// Whether the loop stopped because transient retries ran out.
    pub exhausted: bool,
    /// Total time spent in backoff.
    pub total_backoff: Duration,
}

impl<T> RetryResult<T> {
    /// Check if the operation succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Execute an async operation, retrying transient [`DriverError`]s.
///
/// `operation` receives the 1-based attempt number. Non-transient errors stop
/// the loop immediately.
pub async fn retry_async<F, Fut, T>(
    config: &RetryConfig,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> RetryResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DriverError>>,
{
    let mut state = RetryState::Idle.start();
    let mut total_backoff = Duration::ZERO;

    loop {
        match state {
            RetryState::Attempting { retry } => {
                let attempt = retry + 1;
                match operation(attempt).await {
                    Ok(value) => {
                        return RetryResult {
                            outcome: Ok(value),
                            attempts: attempt,
                            exhausted: false,
                            total_backoff,
                        };
                    }
                    Err(e) => {
                        let result = if e.is_transient() {
                            AttemptResult::Transient
                        } else {
                            AttemptResult::Fatal
                        };
                        state = state.after_attempt(result, config);

                        match state {
                            RetryState::Backoff { delay, .. } => {
                                warn!(
                                    "Transient error on attempt {}/{}: {} (retrying in {:?})",
                                    attempt,
                                    config.max_attempts(),
                                    e,
                                    delay
                                );
                            }
                            RetryState::Exhausted { attempts } => {
                                warn!("Transient error persisted after {} attempts: {}", attempts, e);
                                return RetryResult {
                                    outcome: Err(e),
                                    attempts,
                                    exhausted: true,
                                    total_backoff,
                                };
                            }
                            _ => {
                                debug!("Non-transient error, not retrying: {}", e);
                                return RetryResult {
                                    outcome: Err(e),
                                    attempts: attempt,
                                    exhausted: false,
                                    total_backoff,
                                };
                            }
                        }
                    }
                }
            }
            RetryState::Backoff { delay, .. } => {
                sleeper.sleep(delay).await;
                total_backoff += delay;
                state = state.after_backoff();
            }
            // `start` always yields Attempting and attempts never go back to Idle.
            RetryState::Idle | RetryState::Done { .. } | RetryState::Exhausted { .. } => {
                state = RetryState::Attempting { retry: 0 };
            }
        }
    }
}
