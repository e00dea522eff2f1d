//! Exponential backoff with jitter for backend network calls.
//!
//! Every chunk upload, chunk fetch and URL resolution runs through
//! [`retry_with_backoff`]. Retryable failures (network, timeout, 5xx, rate
//! limit) sleep `min(base * multiplier^(attempt-1), cap)` ± jitter before the
//! next attempt; a rate limit carrying a "retry after" hint waits at least
//! that long. Non-retryable failures abort immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use teledrive_types::config::RetryConfig;
use teledrive_types::error::TransportError;

/// Backoff parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Jitter as a fraction of the computed delay.
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            jitter_fraction: config.jitter_fraction.clamp(0.0, 1.0),
        }
    }
}

impl RetryPolicy {
    /// Policy without delays, for callers that only want the attempt cap.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter_fraction: 0.0,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based),
    /// before jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Spread `delay` uniformly over `delay * (1 ± jitter_fraction)`.
    pub fn with_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_fraction <= 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = rand::thread_rng().gen_range(-self.jitter_fraction..=self.jitter_fraction);
        delay.mul_f64(1.0 + spread)
    }

    /// Full sleep before the next attempt, honoring a backend "retry after" hint.
    pub fn next_delay(&self, attempt: u32, error: &TransportError) -> Duration {
        let computed = self.with_jitter(self.backoff_delay(attempt));
        match error.retry_after() {
            Some(hint) => computed.max(hint),
            None => computed,
        }
    }
}

/// Run `operation` until it succeeds, fails non-retryably, or exhausts
/// `policy.max_attempts`.
///
/// `target` names the call in log events (e.g. `bot1:send_document#3`).
/// Exhaustion surfaces [`TransportError::RetriesExhausted`] wrapping the
/// last error.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    target: &str,
    operation: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    retry_with_cancel(policy, target, &CancellationToken::new(), operation).await
}

/// Same as [`retry_with_backoff`], but aborts with [`TransportError::Cancelled`]
/// as soon as `cancel` fires (between attempts or during a backoff sleep).
pub async fn retry_with_cancel<T, F, Fut>(
    policy: &RetryPolicy,
    target: &str,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let err = match operation().await {
            Ok(value) => {
                debug!(target_op = target, attempt, outcome = "success", "Backend call succeeded");
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            warn!(
                target_op = target,
                attempt,
                outcome = "aborted",
                error = %err,
                "Non-retryable backend error"
            );
            return Err(err);
        }

        if attempt >= max_attempts {
            error!(
                target_op = target,
                attempt,
                outcome = "exhausted",
                error = %err,
                "Backend call failed on every attempt"
            );
            return Err(TransportError::RetriesExhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }

        let delay = policy.next_delay(attempt, &err);
        warn!(
            target_op = target,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            outcome = "retrying",
            error = %err,
            "Backend call failed, backing off"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
