// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Time-to-live values for cache entries

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// How long a cache entry stays live.
///
/// `Unlimited` is a distinguished variant rather than a very large duration:
/// unlimited entries never expire by time and are removed only by
/// [`invalidate`](crate::InMemoryCache::invalidate) or
/// [`clear`](crate::InMemoryCache::clear).
///
/// A finite TTL of zero means "never reuse": the computed value is handed to
/// every caller waiting on that computation but is not stored.
///
/// # Examples
///
/// ```rust
/// use chainshield::CacheTtl;
/// use std::time::Duration;
///
/// let ttl = CacheTtl::from_secs(120);
/// assert_eq!(ttl, CacheTtl::Finite(Duration::from_secs(120)));
/// assert!(CacheTtl::Unlimited.is_unlimited());
/// assert!(CacheTtl::ZERO.is_zero());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTtl {
    /// Never expires by time.
    Unlimited,
    /// Expires this long after being stored.
    Finite(Duration),
}

/// Convenience constant for [`CacheTtl::Unlimited`].
pub const UNLIMITED_CACHE_TTL: CacheTtl = CacheTtl::Unlimited;

impl CacheTtl {
    /// A TTL that is never reused.
    pub const ZERO: CacheTtl = CacheTtl::Finite(Duration::ZERO);

    /// Finite TTL in seconds.
    pub const fn from_secs(secs: u64) -> Self {
        CacheTtl::Finite(Duration::from_secs(secs))
    }

    /// Finite TTL in milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        CacheTtl::Finite(Duration::from_millis(millis))
    }

    /// Whether this is the unlimited sentinel.
    pub const fn is_unlimited(&self) -> bool {
        matches!(self, CacheTtl::Unlimited)
    }

    /// Whether values stored with this TTL are never reused.
    pub fn is_zero(&self) -> bool {
        matches!(self, CacheTtl::Finite(d) if d.is_zero())
    }

    /// The finite duration, or `None` when unlimited.
    pub const fn as_duration(&self) -> Option<Duration> {
        match self {
            CacheTtl::Unlimited => None,
            CacheTtl::Finite(d) => Some(*d),
        }
    }

    /// Expiry for a value stored at `now`, or `None` if it must not be stored.
    pub(crate) fn expiry_from(&self, now: Instant) -> Option<Expiry> {
        match self {
            CacheTtl::Unlimited => Some(Expiry::Never),
            CacheTtl::Finite(d) if d.is_zero() => None,
            CacheTtl::Finite(d) => Some(Expiry::At(now + *d)),
        }
    }
}

impl From<Duration> for CacheTtl {
    fn from(duration: Duration) -> Self {
        CacheTtl::Finite(duration)
    }
}

impl fmt::Display for CacheTtl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheTtl::Unlimited => f.write_str("unlimited"),
            CacheTtl::Finite(d) => write!(f, "{d:?}"),
        }
    }
}

/// Point in time after which a stored value is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expiry {
    Never,
    At(Instant),
}

impl Expiry {
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(deadline) => now >= *deadline,
        }
    }
}
