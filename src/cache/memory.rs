// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory TTL cache with in-flight computation deduplication

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

use super::stats::CacheStats;
use super::ttl::{CacheTtl, Expiry};
use crate::errors::CacheError;
use crate::spans;

type CachedValue = Arc<dyn Any + Send + Sync>;
type Computation = Shared<BoxFuture<'static, Result<CachedValue, CacheError>>>;

struct StoredValue {
    value: CachedValue,
    expiry: Expiry,
}

struct InFlight {
    /// Identifies the computation so a superseded one cannot write its result
    generation: u64,
    computation: Computation,
}

/// Per-key state: a stored value, a pending computation, or both while a
/// `set` races a computation
#[derive(Default)]
struct Slot {
    stored: Option<StoredValue>,
    in_flight: Option<InFlight>,
}

impl Slot {
    fn is_vacant(&self) -> bool {
        self.stored.is_none() && self.in_flight.is_none()
    }
}

#[derive(Default)]
struct CacheState {
    slots: HashMap<String, Slot>,
    stats: CacheStats,
    next_generation: u64,
    closed: bool,
}

impl CacheState {
    /// Returns the live value for `key`, dropping it first if it has expired
    fn live_value(&mut self, key: &str, now: Instant) -> Option<CachedValue> {
        match self.slots.get(key).and_then(|slot| slot.stored.as_ref()) {
            None => return None,
            Some(stored) if !stored.expiry.is_expired(now) => {
                return Some(Arc::clone(&stored.value));
            }
            Some(_) => {}
        }

        debug!(key = %key, "Cache entry expired");
        self.expire(key);
        None
    }

    fn expire(&mut self, key: &str) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.stored = None;
            let vacant = slot.is_vacant();
            if vacant {
                self.slots.remove(key);
            }
            self.stats.expirations += 1;
        }
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| {
                slot.stored
                    .as_ref()
                    .is_some_and(|stored| stored.expiry.is_expired(now))
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.expire(key);
        }
        expired.len()
    }

    fn live_keys(&self, now: Instant) -> Vec<String> {
        let mut keys: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| {
                slot.stored
                    .as_ref()
                    .is_some_and(|stored| !stored.expiry.is_expired(now))
            })
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

struct CacheInner {
    default_ttl: CacheTtl,
    state: Mutex<CacheState>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl CacheInner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the outcome of computation `generation` for `key`.
    ///
    /// Runs inside the shared future, so it happens exactly once no matter
    /// which waiter drives the computation to completion.
    fn complete(
        &self,
        key: &str,
        generation: u64,
        result: &Result<CachedValue, CacheError>,
        ttl: CacheTtl,
    ) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.closed {
            return;
        }

        let Some(slot) = state.slots.get_mut(key) else {
            debug!(key = %key, "Computation finished after invalidation, result not stored");
            return;
        };
        if !slot
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            debug!(key = %key, "Computation superseded, result not stored");
            return;
        }

        slot.in_flight = None;
        let failed = match result {
            Ok(value) => {
                slot.stored = ttl.expiry_from(Instant::now()).map(|expiry| StoredValue {
                    value: Arc::clone(value),
                    expiry,
                });
                false
            }
            Err(_) => true,
        };

        let vacant = slot.is_vacant();
        if vacant {
            state.slots.remove(key);
        }
        if failed {
            state.stats.failures += 1;
        }
    }
}

/// In-memory key/value cache with per-entry TTL and in-flight deduplication
///
/// The cache is a cheap handle (`Arc` inside): construct it once and clone it
/// into every component that reads or invalidates entries. Values are stored
/// type-erased so one instance can hold epoch numbers, aggregates and
/// resolved addresses side by side; reads name the type they expect.
///
/// # Concurrency
///
/// For any key at most one computation runs at a time. Concurrent
/// [`get`](Self::get) calls on a missing or expired key share the single
/// pending computation and all receive its result, success or failure.
/// Failures are never cached.
///
/// # Examples
///
/// ```rust
/// use chainshield::{CacheTtl, InMemoryCache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), chainshield::CacheError> {
/// let cache = InMemoryCache::new(CacheTtl::from_secs(60));
///
/// let stake: u64 = cache
///     .get("stake", || async { Ok::<_, std::io::Error>(42u64) })
///     .await?;
/// assert_eq!(stake, 42);
/// assert_eq!(cache.get_val::<u64>("stake"), Some(42));
///
/// cache.invalidate(["stake"]);
/// assert_eq!(cache.get_val::<u64>("stake"), None);
///
/// cache.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryCache {
    inner: Arc<CacheInner>,
}

impl InMemoryCache {
    /// Creates an empty cache whose entries default to `default_ttl`
    pub fn new(default_ttl: CacheTtl) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                default_ttl,
                state: Mutex::new(CacheState::default()),
                sweeper: Mutex::new(None),
            }),
        }
    }

    /// The TTL used by [`get`](Self::get) and [`set`](Self::set)
    pub fn default_ttl(&self) -> CacheTtl {
        self.inner.default_ttl
    }

    /// Returns the cached value for `key`, computing it with the default TTL on a miss
    ///
    /// See [`get_with_ttl`](Self::get_with_ttl).
    pub async fn get<T, F, Fut, E>(&self, key: impl Into<String>, compute: F) -> Result<T, CacheError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.get_with_ttl(key, compute, self.inner.default_ttl).await
    }

    /// Returns the cached value for `key`, computing it on a miss
    ///
    /// - A live entry is returned without calling `compute`.
    /// - If a computation for `key` is already running, its result is awaited.
    /// - Otherwise `compute` runs exactly once. On success the value is stored
    ///   with `ttl`; on failure nothing is stored and every waiter receives
    ///   [`CacheError::Compute`].
    ///
    /// # Errors
    ///
    /// - [`CacheError::Compute`] if the computation failed
    /// - [`CacheError::ComputePanicked`] if the computation panicked
    /// - [`CacheError::TypeMismatch`] if `key` holds a value of another type
    /// - [`CacheError::Closed`] after [`shutdown`](Self::shutdown)
    pub async fn get_with_ttl<T, F, Fut, E>(
        &self,
        key: impl Into<String>,
        compute: F,
        ttl: CacheTtl,
    ) -> Result<T, CacheError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let key = key.into();

        let computation = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            if state.closed {
                return Err(CacheError::Closed);
            }

            if let Some(value) = state.live_value(&key, Instant::now()) {
                state.stats.hits += 1;
                debug!(key = %key, "Cache hit");
                return downcast(&key, &value);
            }

            match state.slots.get(&key).and_then(|slot| slot.in_flight.as_ref()) {
                Some(in_flight) => {
                    state.stats.deduplicated += 1;
                    debug!(key = %key, "Joining in-flight computation");
                    in_flight.computation.clone()
                }
                None => {
                    state.stats.misses += 1;
                    let generation = state.next_generation;
                    state.next_generation += 1;

                    debug!(key = %key, ttl = %ttl, "Cache miss, computing");
                    let computation = self.computation(key.clone(), generation, compute, ttl);
                    state.slots.entry(key.clone()).or_default().in_flight = Some(InFlight {
                        generation,
                        computation: computation.clone(),
                    });
                    computation
                }
            }
        };

        let value = computation.await?;
        downcast(&key, &value)
    }

    fn computation<T, F, Fut, E>(
        &self,
        key: String,
        generation: u64,
        compute: F,
        ttl: CacheTtl,
    ) -> Computation
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let inner = Arc::downgrade(&self.inner);
        let span = spans::cache_compute(&key, ttl);

        async move {
            // Panics become errors so `complete` always clears the in-flight marker
            let outcome = AssertUnwindSafe(async move { compute().await })
                .catch_unwind()
                .await;

            let result = match outcome {
                Ok(Ok(value)) => Ok(Arc::new(value) as CachedValue),
                Ok(Err(error)) => {
                    warn!(key = %key, error = %error, "Computation failed, not caching");
                    Err(CacheError::compute(key.clone(), error))
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(key = %key, panic = %message, "Computation panicked, not caching");
                    Err(CacheError::ComputePanicked {
                        key: key.clone(),
                        message,
                    })
                }
            };

            if let Some(inner) = inner.upgrade() {
                inner.complete(&key, generation, &result, ttl);
            }
            result
        }
        .instrument(span)
        .boxed()
        .shared()
    }

    /// Synchronously reads a live entry without triggering a computation
    ///
    /// Returns `None` when the key is missing, expired, holds another type,
    /// or the cache has been shut down.
    pub fn get_val<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        let mut state = self.inner.lock();
        if state.closed {
            return None;
        }
        let value = state.live_value(key, Instant::now())?;
        (*value).downcast_ref::<T>().cloned()
    }

    /// Stores `value` under `key` with the default TTL, replacing any entry
    pub fn set<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        self.set_with_ttl(key, value, self.inner.default_ttl);
    }

    /// Stores `value` under `key` with `ttl`, replacing any entry
    ///
    /// A computation already in flight for `key` keeps serving its current
    /// waiters but will not overwrite this value. After shutdown this is a no-op.
    pub fn set_with_ttl<T: Send + Sync + 'static>(
        &self,
        key: impl Into<String>,
        value: T,
        ttl: CacheTtl,
    ) {
        let key = key.into();
        let mut state = self.inner.lock();
        if state.closed {
            debug!(key = %key, "Ignoring set on a shut down cache");
            return;
        }

        match ttl.expiry_from(Instant::now()) {
            Some(expiry) => {
                let slot = state.slots.entry(key).or_default();
                slot.in_flight = None;
                slot.stored = Some(StoredValue {
                    value: Arc::new(value),
                    expiry,
                });
            }
            None => {
                state.slots.remove(&key);
            }
        }
    }

    /// Removes the named entries regardless of TTL or expiry
    ///
    /// Any `get` that starts after this returns recomputes the value.
    pub fn invalidate<I>(&self, keys: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut state = self.inner.lock();
        if state.closed {
            return;
        }

        let mut removed = 0usize;
        for key in keys {
            if state.slots.remove(key.as_ref()).is_some() {
                removed += 1;
            }
        }
        debug!(removed = removed, "Invalidated cache entries");
    }

    /// Removes every entry
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        if state.closed {
            return;
        }
        debug!(entries = state.slots.len(), "Clearing cache");
        state.slots.clear();
    }

    /// Keys of all live (unexpired) entries, sorted
    pub fn keys(&self) -> Vec<String> {
        let state = self.inner.lock();
        if state.closed {
            return Vec::new();
        }
        state.live_keys(Instant::now())
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    /// Whether there are no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns current cache statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.inner.lock();
        let mut stats = state.stats.clone();
        stats.entries = if state.closed {
            0
        } else {
            state.live_keys(Instant::now()).len()
        };
        stats
    }

    /// Spawns a background task that drops expired entries every `interval`
    ///
    /// Expired entries are never returned even without a sweeper; it only
    /// bounds memory held by keys that are no longer read. Calling this twice,
    /// or after shutdown, has no effect. The task is cancelled by
    /// [`shutdown`](Self::shutdown).
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start_sweeper(&self, interval: Duration) {
        if interval.is_zero() {
            warn!("Ignoring cache sweeper with zero interval");
            return;
        }

        let mut sweeper = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if sweeper.is_some() || self.inner.lock().closed {
            return;
        }

        let inner = Arc::downgrade(&self.inner);
        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };

                let mut state = inner.lock();
                if state.closed {
                    break;
                }
                let purged = state.purge_expired(Instant::now());
                if purged > 0 {
                    debug!(purged = purged, "Swept expired cache entries");
                }
            }
        }));
        debug!(interval_ms = interval.as_millis() as u64, "Cache sweeper started");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Shuts the cache down
    ///
    /// Cancels the sweeper and waits for it to stop, drops all entries, and
    /// turns further mutation into a no-op (`get` returns
    /// [`CacheError::Closed`]). Idempotent. Once this returns no scheduled
    /// callback of the cache runs again.
    pub async fn shutdown(&self) {
        let dropped = {
            let mut state = self.inner.lock();
            if state.closed {
                None
            } else {
                state.closed = true;
                let entries = state.slots.len();
                state.slots.clear();
                Some(entries)
            }
        };

        if let Some(entries) = dropped {
            info!(entries = entries, "Cache shut down");
        }

        if let Some(handle) = self.take_sweeper() {
            handle.abort();
            let _ = handle.await;
        }
    }

    fn take_sweeper(&self) -> Option<JoinHandle<()>> {
        self.inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl fmt::Debug for InMemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("InMemoryCache")
            .field("default_ttl", &self.inner.default_ttl)
            .field("slots", &state.slots.len())
            .field("closed", &state.closed)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn downcast<T: Clone + 'static>(key: &str, value: &CachedValue) -> Result<T, CacheError> {
    (**value)
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| CacheError::TypeMismatch {
            key: key.to_string(),
            expected: type_name::<T>(),
        })
}
