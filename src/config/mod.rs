//! Configuration for chainshield components
//!
//! [`ShieldConfig`] gathers the tunables of the cache, the resolver backoff
//! and the epoch poller, and knows how to build those components from them.
//!
//! # Example: Using defaults
//!
//! ```rust
//! use chainshield::ShieldConfig;
//!
//! // 2h cache TTL, backoff factor 1.1 capped at 60s, 10s poll interval
//! let config = ShieldConfig::default();
//! ```
//!
//! # Example: Custom configuration
//!
//! ```rust
//! use chainshield::{CacheTtl, ShieldConfigBuilder};
//! use std::time::Duration;
//!
//! let config = ShieldConfigBuilder::with_defaults()
//!     .cache_ttl(CacheTtl::from_secs(15 * 60))
//!     .poll_interval(Duration::from_secs(30))
//!     .backoff_factor(2.0)
//!     .build()
//!     .expect("valid configuration");
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheTtl, InMemoryCache};
use crate::discovery::ServiceDiscovery;
use crate::errors::ConfigError;
use crate::poller::{EpochPoller, PollerConfig, PositionSource};
use crate::resolver::ServiceResolver;
use crate::retry::BackoffConfig;

pub mod constants;

use constants::cache::{DEFAULT_CACHE_TTL, MAX_CACHE_TTL, MIN_CACHE_TTL};
use constants::DEFAULT_RESOLVER_NAMESPACE;

/// Configuration for the cache, resolver and poller
///
/// Use [`ShieldConfigBuilder`] for a validated, fluent construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ShieldConfig {
    /// Default TTL of cache entries
    /// Default: 2 hours
    pub cache_ttl: CacheTtl,

    /// Backoff for service address resolution
    /// Default: factor 1.1, at most 60 seconds of retrying
    pub backoff: BackoffConfig,

    /// Epoch poller settings
    /// Default: every 10 seconds, network info epoch keys
    pub poller: PollerConfig,

    /// Interval of the background sweep of expired entries
    /// Default: None (expired entries are dropped lazily on read)
    pub sweep_interval: Option<Duration>,

    /// Cache key namespace of resolved service addresses
    pub resolver_namespace: String,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            cache_ttl: CacheTtl::Finite(DEFAULT_CACHE_TTL),
            backoff: BackoffConfig::default(),
            poller: PollerConfig::default(),
            sweep_interval: None,
            resolver_namespace: DEFAULT_RESOLVER_NAMESPACE.to_string(),
        }
    }
}

impl ShieldConfig {
    /// Checks every field
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_cache_ttl(self.cache_ttl)?;
        self.backoff.validate()?;
        self.poller.validate()?;

        if self.sweep_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::invalid(
                "sweep_interval",
                "must be greater than zero",
            ));
        }
        if self.resolver_namespace.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "resolver_namespace",
            });
        }
        Ok(())
    }

    /// Creates a cache with the configured TTL, starting the sweeper if one is configured
    ///
    /// # Panics
    ///
    /// Panics outside a Tokio runtime when a sweep interval is set.
    pub fn build_cache(&self) -> InMemoryCache {
        let cache = InMemoryCache::new(self.cache_ttl);
        if let Some(interval) = self.sweep_interval {
            cache.start_sweeper(interval);
        }
        cache
    }

    /// Creates a resolver storing addresses in `cache`
    pub fn build_resolver(
        &self,
        cache: InMemoryCache,
        discovery: Arc<dyn ServiceDiscovery>,
    ) -> ServiceResolver {
        ServiceResolver::new(cache, discovery, self.backoff.clone())
            .with_namespace(self.resolver_namespace.clone())
    }

    /// Creates an idle poller invalidating entries of `cache`
    pub fn build_poller(
        &self,
        cache: InMemoryCache,
        source: impl PositionSource + 'static,
    ) -> EpochPoller {
        EpochPoller::new(cache, source, self.poller.clone())
    }
}

/// Accepts unlimited, or a finite TTL between 1 minute and 48 hours
pub fn validate_cache_ttl(ttl: CacheTtl) -> Result<(), ConfigError> {
    match ttl {
        CacheTtl::Unlimited => Ok(()),
        CacheTtl::Finite(duration) if (MIN_CACHE_TTL..=MAX_CACHE_TTL).contains(&duration) => Ok(()),
        CacheTtl::Finite(duration) => Err(ConfigError::invalid(
            "cache_ttl",
            format!(
                "{duration:?} is outside {MIN_CACHE_TTL:?}..={MAX_CACHE_TTL:?}"
            ),
        )),
    }
}

/// Builder for [`ShieldConfig`]
///
/// # Example
///
/// ```rust
/// use chainshield::ShieldConfigBuilder;
/// use std::time::Duration;
///
/// let config = ShieldConfigBuilder::new()
///     .max_retry_time(Duration::from_secs(30))
///     .sweep_interval(Duration::from_secs(60))
///     .build()
///     .unwrap();
/// assert_eq!(config.backoff.max_retry_time, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShieldConfigBuilder {
    config: ShieldConfig,
}

impl ShieldConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with defaults
    ///
    /// Same as [`new`](Self::new); reads better at call sites that override
    /// only a few fields.
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Set the default cache TTL
    pub fn cache_ttl(mut self, ttl: CacheTtl) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Set the whole backoff configuration
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Set the backoff growth factor
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.config.backoff.factor = factor;
        self
    }

    /// Set the ceiling on total retry time
    pub fn max_retry_time(mut self, max_retry_time: Duration) -> Self {
        self.config.backoff.max_retry_time = max_retry_time;
        self
    }

    /// Set the whole poller configuration
    pub fn poller(mut self, poller: PollerConfig) -> Self {
        self.config.poller = poller;
        self
    }

    /// Set the poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poller.interval = interval;
        self
    }

    /// Enable the background sweep of expired entries
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = Some(interval);
        self
    }

    /// Set the resolver's cache key namespace
    pub fn resolver_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.resolver_namespace = namespace.into();
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any field is out of range.
    pub fn build(self) -> Result<ShieldConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// How a component reaches its backing service
///
/// A fixed connection string and a discovery-based service name are mutually
/// exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// Connect to a fixed address
    Direct {
        /// The connection string
        connection_string: String,
    },
    /// Resolve the address through service discovery
    Discovery {
        /// The logical service name
        service_name: String,
    },
}

impl ConnectionTarget {
    /// Picks the target from the two optional settings
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ConflictingOptions`] if both are set
    /// - [`ConfigError::MissingValue`] if neither is set
    pub fn from_options(
        connection_string: Option<&str>,
        service_name: Option<&str>,
    ) -> Result<Self, ConfigError> {
        match (connection_string, service_name) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingOptions {
                first: "connection_string",
                second: "service_name",
            }),
            (Some(connection_string), None) => Ok(ConnectionTarget::Direct {
                connection_string: connection_string.to_string(),
            }),
            (None, Some(service_name)) => Ok(ConnectionTarget::Discovery {
                service_name: service_name.to_string(),
            }),
            (None, None) => Err(ConfigError::MissingValue {
                field: "connection_string",
            }),
        }
    }

    /// The service name, when discovery is used
    pub fn service_name(&self) -> Option<&str> {
        match self {
            ConnectionTarget::Discovery { service_name } => Some(service_name),
            ConnectionTarget::Direct { .. } => None,
        }
    }

    /// Whether the target is discovery based and so benefits from a resilient client
    pub fn uses_discovery(&self) -> bool {
        matches!(self, ConnectionTarget::Discovery { .. })
    }
}
