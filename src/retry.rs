// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Exponential backoff for fallible async operations
//!
//! The delay before retry `n` (1-based) is
//!
//! ```text
//! delay = min(initial_delay * factor^(n - 1), max_delay)
//! ```
//!
//! Retrying stops when `max_retries` retries have been used or when sleeping
//! for the next delay would push total elapsed time past `max_retry_time`.
//! Every failed attempt emits a structured `tracing` event carrying the
//! operation name, attempt number and remaining retries.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::config::constants::backoff::{
    RETRY_BACKOFF_FACTOR_DEFAULT, RETRY_BACKOFF_MAX_TIMEOUT_DEFAULT, RETRY_INITIAL_DELAY_DEFAULT,
    RETRY_MAX_RETRIES_DEFAULT,
};
use crate::errors::ConfigError;

/// Configuration for exponential backoff.
///
/// # Example
///
/// ```rust
/// use chainshield::BackoffConfig;
/// use std::time::Duration;
///
/// let config = BackoffConfig::builder()
///     .factor(2.0)
///     .initial_delay(Duration::from_millis(100))
///     .max_retry_time(Duration::from_secs(5))
///     .build();
///
/// assert_eq!(config.delay_for(3), Duration::from_millis(400));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffConfig {
    /// Growth factor applied per retry. Must be at least 1.
    pub factor: f64,
    /// Ceiling on total elapsed time across all attempts.
    pub max_retry_time: Duration,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum number of retries (not including the initial attempt).
    pub max_retries: u32,
    /// Optional cap on a single delay.
    pub max_delay: Option<Duration>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            factor: RETRY_BACKOFF_FACTOR_DEFAULT,
            max_retry_time: RETRY_BACKOFF_MAX_TIMEOUT_DEFAULT,
            initial_delay: RETRY_INITIAL_DELAY_DEFAULT,
            max_retries: RETRY_MAX_RETRIES_DEFAULT,
            max_delay: None,
        }
    }
}

impl BackoffConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> BackoffConfigBuilder {
        BackoffConfigBuilder::default()
    }

    /// A configuration that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay to sleep before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.factor.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);

        match self.max_delay {
            Some(max_delay) => delay.min(max_delay),
            None => delay,
        }
    }

    /// Checks the configuration for values that would make backoff meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `factor` is below 1 or not
    /// finite, or if `max_retry_time` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(ConfigError::invalid(
                "backoff.factor",
                format!("must be a finite number >= 1, got {}", self.factor),
            ));
        }
        if self.max_retry_time.is_zero() {
            return Err(ConfigError::invalid(
                "backoff.max_retry_time",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Builder for [`BackoffConfig`].
#[derive(Clone, Debug, Default)]
pub struct BackoffConfigBuilder {
    config: BackoffConfig,
}

impl BackoffConfigBuilder {
    /// Sets the growth factor.
    pub fn factor(mut self, factor: f64) -> Self {
        self.config.factor = factor;
        self
    }

    /// Sets the total retry time ceiling.
    pub fn max_retry_time(mut self, max_retry_time: Duration) -> Self {
        self.config.max_retry_time = max_retry_time;
        self
    }

    /// Sets the delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.initial_delay = delay;
        self
    }

    /// Sets the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Caps each individual delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = Some(delay);
        self
    }

    /// Builds the configured [`BackoffConfig`].
    pub fn build(self) -> BackoffConfig {
        self.config
    }
}

/// The last error of an operation that ran out of retries.
#[derive(Debug)]
pub struct RetriesExhausted<E> {
    /// Total attempts made, including the first
    pub attempts: u32,
    /// Time elapsed from the first attempt until giving up
    pub elapsed: Duration,
    /// Error returned by the final attempt
    pub last_error: E,
}

/// Runs `attempt` until it succeeds or the backoff budget is spent.
///
/// # Errors
///
/// Returns [`RetriesExhausted`] wrapping the final attempt's error.
pub async fn retry_with_backoff<T, E, F, Fut>(
    operation: &str,
    config: &BackoffConfig,
    attempt: F,
) -> Result<T, RetriesExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_with_backoff_if(operation, config, |_| true, attempt).await
}

/// Like [`retry_with_backoff`], but stops at the first error `is_retryable` rejects.
///
/// # Errors
///
/// Returns [`RetriesExhausted`] wrapping the final attempt's error, which is
/// either the first non-retryable error or the last error within the budget.
pub async fn retry_with_backoff_if<T, E, F, Fut, R>(
    operation: &str,
    config: &BackoffConfig,
    is_retryable: R,
    mut attempt: F,
) -> Result<T, RetriesExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let started = Instant::now();
    let mut attempt_number = 0u32;

    loop {
        attempt_number += 1;

        let error = match attempt().await {
            Ok(value) => {
                if attempt_number > 1 {
                    debug!(
                        operation = operation,
                        attempt = attempt_number,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !is_retryable(&error) {
            debug!(
                operation = operation,
                attempt = attempt_number,
                error = %error,
                "Non-retryable error, not retrying"
            );
            return Err(RetriesExhausted {
                attempts: attempt_number,
                elapsed: started.elapsed(),
                last_error: error,
            });
        }

        let retries_left = (config.max_retries + 1).saturating_sub(attempt_number);
        let delay = config.delay_for(attempt_number);
        let elapsed = started.elapsed();
        let over_budget = elapsed.saturating_add(delay) > config.max_retry_time;

        if retries_left == 0 || over_budget {
            error!(
                operation = operation,
                attempt = attempt_number,
                retries_left = retries_left,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %error,
                action = "giving up",
                "{operation}: attempt {attempt_number} failed, giving up"
            );
            return Err(RetriesExhausted {
                attempts: attempt_number,
                elapsed,
                last_error: error,
            });
        }

        warn!(
            operation = operation,
            attempt = attempt_number,
            retries_left = retries_left,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            action = "retrying",
            "{operation}: attempt {attempt_number} failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
