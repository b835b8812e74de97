//! Retry policy and the per-attempt decision the worker loop follows.

use std::time::Duration;

use crate::error::FailureKind;
use crate::ExecutionOutcome;

/// Exponential backoff between attempts of one task: `base * factor^retry`,
/// capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub factor: f64,
    pub max: Duration,
    /// Spread each delay by +/- 50%.
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::doubling(Duration::from_secs(2))
    }
}

impl Backoff {
    /// Doubling from `base`, capped at 60s, without jitter.
    pub fn doubling(base: Duration) -> Self {
        Self {
            base,
            factor: 2.0,
            max: Duration::from_secs(60),
            jitter: false,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let seconds = self.base.as_secs_f64() * self.factor.powi(exponent);
        let capped_seconds = seconds.min(self.max.as_secs_f64());
        let delay = Duration::from_secs_f64(capped_seconds.max(0.0));

        if !self.jitter {
            return delay;
        }
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let spread = millis / 2;
        let offset = fastrand::u64(0..=spread.saturating_mul(2));
        Duration::from_millis((millis - spread).saturating_add(offset))
    }
}

/// How a task is replayed after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt when a task asks for retrying.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// When off, a timeout ends the task after the current attempt.
    pub retry_on_timeout: bool,
    /// When off, a connection/transport failure ends the task after the
    /// current attempt.
    pub retry_on_transport: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
            retry_on_timeout: true,
            retry_on_transport: true,
        }
    }
}

/// Why a task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Succeeded,
    ValidationFailed,
    /// Every allowed attempt failed.
    Exhausted,
    /// The failure kind is excluded from retrying by configuration.
    NotRetryable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    Stop(StopReason),
    Backoff(Duration),
}

impl RetryConfig {
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Exponential backoff starting at `base`, doubling, without jitter.
    pub fn with_base_delay(self, base: Duration) -> Self {
        self.with_backoff(Backoff::doubling(base))
    }

    /// Attempt budget for a task: 1 without retrying, `max_retries + 1` with.
    pub fn attempts_for(&self, should_retry: bool) -> u32 {
        if should_retry {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }

    /// Wait after the 1-based `attempt` failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt.saturating_sub(1))
    }

    pub fn retries(&self, kind: FailureKind) -> bool {
        match kind {
            FailureKind::RequestValidation | FailureKind::ResponseValidation => false,
            FailureKind::Timeout => self.retry_on_timeout,
            FailureKind::Transport => self.retry_on_transport,
            FailureKind::BadStatus | FailureKind::Internal => true,
        }
    }

    /// Decide what follows the 1-based `attempt` out of `max_attempts`.
    pub fn decide(
        &self,
        outcome: &ExecutionOutcome,
        attempt: u32,
        max_attempts: u32,
    ) -> RetryDecision {
        if outcome.is_success() {
            return RetryDecision::Stop(StopReason::Succeeded);
        }
        if outcome.is_validation_error() {
            return RetryDecision::Stop(StopReason::ValidationFailed);
        }
        if attempt >= max_attempts {
            return RetryDecision::Stop(StopReason::Exhausted);
        }
        match outcome.failure_kind() {
            Some(kind) if !self.retries(kind) => RetryDecision::Stop(StopReason::NotRetryable),
            _ => RetryDecision::Backoff(self.delay_after(attempt)),
        }
    }
}
