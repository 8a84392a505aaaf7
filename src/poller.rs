// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Epoch-driven cache invalidation
//!
//! Some cached values (total supply, active stake) are only valid for the
//! epoch they were computed in. [`EpochPoller`] periodically fetches the
//! current position from a [`PositionSource`] and, when it has moved past the
//! position stored in the cache, records the new position and invalidates the
//! position-scoped keys.
//!
//! The stored position never decreases: equal or lower observations leave
//! the cache untouched.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn, Instrument};

use crate::cache::{CacheTtl, InMemoryCache, NetworkInfoCacheKey};
use crate::config::constants::poller::DEFAULT_POLL_INTERVAL;
use crate::errors::{BoxError, ConfigError};
use crate::spans;

/// Source of the monotonic position marker (the current epoch)
///
/// Implemented for closures returning a future of `Result<u64, E>`.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Fetches the current position
    async fn current_position(&self) -> Result<u64, BoxError>;
}

#[async_trait]
impl<F, Fut, E> PositionSource for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<u64, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    async fn current_position(&self) -> Result<u64, BoxError> {
        (self)().await.map_err(Into::into)
    }
}

/// Poller settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Time between ticks; the first tick happens one interval after start
    pub interval: Duration,
    /// Cache key holding the current position
    pub position_key: String,
    /// Keys dropped whenever the position advances
    pub invalidation_keys: Vec<String>,
}

impl PollerConfig {
    /// Creates a config with the default interval
    pub fn new<I>(position_key: impl Into<String>, invalidation_keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            position_key: position_key.into(),
            invalidation_keys: invalidation_keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Sets the tick interval
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Rejects a zero interval
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::invalid(
                "poller.interval",
                "must be greater than zero",
            ));
        }
        if self.position_key.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "poller.position_key",
            });
        }
        Ok(())
    }
}

impl Default for PollerConfig {
    /// Tracks [`NetworkInfoCacheKey::CurrentEpoch`] and invalidates the
    /// epoch-scoped network info keys
    fn default() -> Self {
        Self::new(
            NetworkInfoCacheKey::CurrentEpoch,
            NetworkInfoCacheKey::epoch_scoped_keys(),
        )
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// No position was cached; the observed one was stored
    Initialized {
        /// The stored position
        position: u64,
    },
    /// The position moved forward and scoped keys were invalidated
    Advanced {
        /// Previously cached position
        from: u64,
        /// Newly stored position
        to: u64,
    },
    /// The observed position equals the cached one
    Unchanged {
        /// The cached position
        position: u64,
    },
    /// The observed position is behind the cached one and was ignored
    Regressed {
        /// The cached position
        cached: u64,
        /// The lower observed position
        observed: u64,
    },
    /// The position could not be fetched
    Failed,
}

struct PollerInner {
    cache: InMemoryCache,
    source: Box<dyn PositionSource>,
    config: PollerConfig,
    /// Held from fetch to store so concurrent ticks cannot move the position backwards
    tick_lock: tokio::sync::Mutex<()>,
}

impl PollerInner {
    async fn tick(&self) -> TickOutcome {
        let _serialized = self.tick_lock.lock().await;
        let key = &self.config.position_key;

        let observed = match self.source.current_position().await {
            Ok(position) => position,
            Err(error) => {
                warn!(
                    position_key = %key,
                    error = %error,
                    "Failed to fetch current position, keeping cached state"
                );
                return TickOutcome::Failed;
            }
        };

        match self.cache.get_val::<u64>(key) {
            None => {
                self.cache.set_with_ttl(key.clone(), observed, CacheTtl::Unlimited);
                info!(position_key = %key, position = observed, "Initialized position");
                TickOutcome::Initialized { position: observed }
            }
            Some(cached) if observed > cached => {
                self.cache.set_with_ttl(key.clone(), observed, CacheTtl::Unlimited);
                self.cache.invalidate(&self.config.invalidation_keys);
                info!(
                    position_key = %key,
                    from = cached,
                    to = observed,
                    invalidated = self.config.invalidation_keys.len(),
                    "Position advanced, invalidated scoped entries"
                );
                TickOutcome::Advanced {
                    from: cached,
                    to: observed,
                }
            }
            Some(cached) if observed == cached => {
                debug!(position_key = %key, position = cached, "Position unchanged");
                TickOutcome::Unchanged { position: cached }
            }
            Some(cached) => {
                warn!(
                    position_key = %key,
                    cached = cached,
                    observed = observed,
                    "Observed position is behind the cached one, ignoring"
                );
                TickOutcome::Regressed { cached, observed }
            }
        }
    }
}

/// Background task that invalidates position-scoped cache entries
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use chainshield::{CacheTtl, EpochPoller, InMemoryCache, PollerConfig, TickOutcome};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = InMemoryCache::new(CacheTtl::Unlimited);
/// let poller = EpochPoller::new(
///     cache.clone(),
///     || async { Ok::<u64, std::io::Error>(205) },
///     PollerConfig::new("current_epoch", ["total_supply"]).with_interval(Duration::from_secs(10)),
/// );
///
/// assert_eq!(poller.poll_once().await, TickOutcome::Initialized { position: 205 });
/// assert_eq!(cache.get_val::<u64>("current_epoch"), Some(205));
/// # }
/// ```
pub struct EpochPoller {
    inner: Arc<PollerInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EpochPoller {
    /// Creates an idle poller
    pub fn new(
        cache: InMemoryCache,
        source: impl PositionSource + 'static,
        config: PollerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                cache,
                source: Box::new(source),
                config,
                tick_lock: tokio::sync::Mutex::new(()),
            }),
            task: Mutex::new(None),
        }
    }

    /// The poller's settings
    pub fn config(&self) -> &PollerConfig {
        &self.inner.config
    }

    /// Starts ticking every `interval`, first tick one interval from now
    ///
    /// Does nothing if already running or if the interval is zero.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) {
        let interval = self.inner.config.interval;
        if interval.is_zero() {
            warn!("Ignoring epoch poller with zero interval");
            return;
        }

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                inner
                    .tick()
                    .instrument(spans::poll_tick(&inner.config.position_key))
                    .await;
            }
        }));

        info!(
            position_key = %self.inner.config.position_key,
            interval_ms = interval.as_millis() as u64,
            "Epoch poller started"
        );
    }

    /// Whether the background task is running
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Runs a single tick now
    ///
    /// Ticks never overlap: this waits for a background tick in progress.
    pub async fn poll_once(&self) -> TickOutcome {
        self.inner
            .tick()
            .instrument(spans::poll_tick(&self.inner.config.position_key))
            .await
    }

    /// Stops the background task and waits for it to finish
    ///
    /// Idempotent. No tick runs after this returns; a tick interrupted
    /// mid-fetch leaves the cache untouched.
    pub async fn shutdown(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            info!(
                position_key = %self.inner.config.position_key,
                "Epoch poller stopped"
            );
        }
    }
}

impl fmt::Debug for EpochPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpochPoller")
            .field("config", &self.inner.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for EpochPoller {
    fn drop(&mut self) {
        if let Some(handle) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
