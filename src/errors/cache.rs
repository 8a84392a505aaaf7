// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the in-memory TTL cache.

use std::sync::Arc;

/// Shared error type produced by a failed compute function.
///
/// The error is reference counted because every caller that joined the same
/// in-flight computation receives the identical failure.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when reading through the cache.
///
/// # Examples
///
/// ```rust
/// use chainshield::{CacheError, CacheTtl, InMemoryCache};
///
/// # async fn example() {
/// let cache = InMemoryCache::new(CacheTtl::Unlimited);
/// let result: Result<u64, CacheError> = cache
///     .get("stake", || async { Err::<u64, _>(std::io::Error::other("db down")) })
///     .await;
///
/// match result {
///     Err(CacheError::Compute { key, source }) => eprintln!("{key}: {source}"),
///     Err(e) => eprintln!("other: {e}"),
///     Ok(value) => println!("{value}"),
/// }
/// # }
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The compute function for `key` failed. Nothing was cached.
    #[error("Computation for cache key '{key}' failed: {source}")]
    Compute {
        /// The key whose computation failed
        key: String,
        /// The error returned by the compute function
        #[source]
        source: SharedError,
    },

    /// The compute function for `key` panicked. Nothing was cached.
    #[error("Computation for cache key '{key}' panicked: {message}")]
    ComputePanicked {
        /// The key whose computation panicked
        key: String,
        /// The panic payload, when it was a string
        message: String,
    },

    /// The cached (or in-flight) value for `key` has a different type than requested.
    #[error("Cache key '{key}' does not hold a value of type {expected}")]
    TypeMismatch {
        /// The key that was read
        key: String,
        /// Name of the type the caller asked for
        expected: &'static str,
    },

    /// The cache has been shut down and no longer serves reads.
    #[error("Cache has been shut down")]
    Closed,
}

impl CacheError {
    /// Helper to wrap a compute failure for `key`.
    pub fn compute(key: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        CacheError::Compute {
            key: key.into(),
            source: Arc::new(source),
        }
    }

    /// Whether calling `get` again can succeed.
    ///
    /// Compute failures and panics are never cached, so a retry recomputes.
    /// A type conflict or a shut down cache stays that way.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CacheError::Compute { .. } | CacheError::ComputePanicked { .. }
        )
    }

    /// Attempts to view the compute failure as a concrete error type.
    ///
    /// Returns `None` for non-compute errors or when the source is another type.
    pub fn compute_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            CacheError::Compute { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}
