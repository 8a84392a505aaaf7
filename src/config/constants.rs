// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Default values and accepted ranges
//!
//! Centralizes the tuning constants of the cache, backoff and poller so they
//! are discoverable in one place.

use std::time::Duration;

/// Cache TTL defaults and bounds
pub mod cache {
    use super::*;

    /// Default TTL of cache entries (2 hours)
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

    /// Shortest finite TTL accepted by configuration (1 minute)
    pub const MIN_CACHE_TTL: Duration = Duration::from_secs(60);

    /// Longest finite TTL accepted by configuration (48 hours)
    pub const MAX_CACHE_TTL: Duration = Duration::from_secs(48 * 60 * 60);
}

/// Exponential backoff defaults for service address resolution
pub mod backoff {
    use super::*;

    /// Growth factor applied to the delay after each failed attempt
    pub const RETRY_BACKOFF_FACTOR_DEFAULT: f64 = 1.1;

    /// Ceiling on total time spent retrying (60 seconds)
    pub const RETRY_BACKOFF_MAX_TIMEOUT_DEFAULT: Duration = Duration::from_secs(60);

    /// Delay before the first retry
    pub const RETRY_INITIAL_DELAY_DEFAULT: Duration = Duration::from_secs(1);

    /// Maximum number of retries after the first attempt
    pub const RETRY_MAX_RETRIES_DEFAULT: u32 = 10;
}

/// Epoch poller defaults
pub mod poller {
    use super::*;

    /// Interval between position checks (10 seconds)
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
}

/// Namespace prefix for resolved service addresses stored in the cache
pub const DEFAULT_RESOLVER_NAMESPACE: &str = "service-address";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttl_within_bounds() {
        assert!(cache::DEFAULT_CACHE_TTL >= cache::MIN_CACHE_TTL);
        assert!(cache::DEFAULT_CACHE_TTL <= cache::MAX_CACHE_TTL);
    }

    #[test]
    fn test_backoff_defaults() {
        assert_eq!(backoff::RETRY_BACKOFF_FACTOR_DEFAULT, 1.1);
        assert_eq!(
            backoff::RETRY_BACKOFF_MAX_TIMEOUT_DEFAULT,
            Duration::from_secs(60)
        );
    }
}
