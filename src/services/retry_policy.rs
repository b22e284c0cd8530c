use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::RetrySettings;
use crate::error::{Result, RouterError};

/// Extra multiplier applied when a backend declared itself unavailable
const UNAVAILABLE_FACTOR: u32 = 4;

/// Classification and exponential backoff for dispatch failures
///
/// Only retryable categories are retried. The delay doubles per attempt
/// (`base, 2*base, 4*base, ...`), is multiplied by 4 for
/// `ServiceUnavailable`, and never exceeds `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(settings.max_attempts, settings.base_delay, settings.max_delay)
    }

    /// Never retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt `attempt + 1`, or `None` when no retry should happen
    ///
    /// `attempt` is 1-based: the delay after the first failure is `delay_for(1, ..)`.
    pub fn delay_for(&self, attempt: u32, error: &RouterError) -> Option<Duration> {
        if !error.is_retryable() || attempt >= self.max_attempts {
            return None;
        }

        let exponent = attempt.saturating_sub(1).min(16);
        let mut delay = self.base_delay.saturating_mul(2u32.pow(exponent));
        if matches!(error, RouterError::ServiceUnavailable(_)) {
            delay = delay.saturating_mul(UNAVAILABLE_FACTOR);
        }
        Some(delay.min(self.max_delay))
    }

    /// Runs `operation` until it succeeds, fails permanently, or attempts run out
    ///
    /// `operation` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => match self.delay_for(attempt, &error) {
                    Some(delay) => {
                        tracing::warn!(
                            operation = %label,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Retrying after failure"
                        );
                        sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        if error.is_retryable() {
                            tracing::warn!(operation = %label, attempts = attempt, error = %error, "Giving up");
                        }
                        return Err(error);
                    }
                },
            }
        }
    }
}
