// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Sticky service address resolution with backoff
//!
//! [`ServiceResolver::resolve`] reads the address through the shared
//! [`InMemoryCache`] with an unlimited TTL, so the first successful lookup is
//! reused by every caller until the entry is invalidated. Failed lookups are
//! not cached and are retried with exponential backoff.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, Instrument};

use crate::cache::{CacheTtl, InMemoryCache};
use crate::config::constants::DEFAULT_RESOLVER_NAMESPACE;
use crate::discovery::{ResolvedAddress, ServiceDiscovery};
use crate::errors::{CacheError, ResolutionError};
use crate::retry::{retry_with_backoff_if, BackoffConfig};
use crate::spans;

/// Resolves logical service names to sticky network addresses
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use chainshield::{BackoffConfig, CacheTtl, InMemoryCache, ServiceResolver, StaticDiscovery};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), chainshield::ResolutionError> {
/// let cache = InMemoryCache::new(CacheTtl::from_secs(60));
/// let discovery = Arc::new(StaticDiscovery::new().with_endpoint("node", "10.0.0.7", 8545));
/// let resolver = ServiceResolver::new(cache, discovery, BackoffConfig::default());
///
/// let address = resolver.resolve("node").await?;
/// assert_eq!(address.authority(), "10.0.0.7:8545");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ServiceResolver {
    cache: InMemoryCache,
    discovery: Arc<dyn ServiceDiscovery>,
    backoff: BackoffConfig,
    namespace: String,
}

impl ServiceResolver {
    /// Creates a resolver storing addresses in `cache` under the default namespace
    pub fn new(
        cache: InMemoryCache,
        discovery: Arc<dyn ServiceDiscovery>,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            cache,
            discovery,
            backoff,
            namespace: DEFAULT_RESOLVER_NAMESPACE.to_string(),
        }
    }

    /// Sets the cache key namespace
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// The cache key holding the sticky address of `service_name`
    pub fn cache_key(&self, service_name: &str) -> String {
        format!("{}:{}", self.namespace, service_name)
    }

    /// The cache addresses are stored in
    pub fn cache(&self) -> &InMemoryCache {
        &self.cache
    }

    /// The backoff applied to failed lookups
    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    /// Resolves `service_name`, reusing the sticky address if one is cached
    ///
    /// Concurrent calls for the same service share one lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::RetriesExhausted`] once the backoff budget
    /// is spent, or [`ResolutionError::Cache`] right away when the cache is
    /// shut down or the key holds another type. Callers treat either as fatal
    /// for the component that needed the connection.
    pub async fn resolve(&self, service_name: &str) -> Result<ResolvedAddress, ResolutionError> {
        let key = self.cache_key(service_name);
        let operation = format!("resolve({service_name})");
        let cache = &self.cache;

        let result = retry_with_backoff_if(
            &operation,
            &self.backoff,
            CacheError::is_transient,
            move || {
                let discovery = Arc::clone(&self.discovery);
                let service = service_name.to_string();
                cache.get_with_ttl(
                    key.clone(),
                    move || async move { discovery.lookup(&service).await },
                    CacheTtl::Unlimited,
                )
            },
        )
        .instrument(spans::resolve(service_name, self.discovery.name()))
        .await;

        match result {
            Ok(address) => {
                debug!(service = %service_name, address = %address.authority(), "Service resolved");
                Ok(address)
            }
            Err(exhausted) if !exhausted.last_error.is_transient() => {
                Err(ResolutionError::Cache {
                    service: service_name.to_string(),
                    source: exhausted.last_error,
                })
            }
            Err(exhausted) => Err(ResolutionError::RetriesExhausted {
                service: service_name.to_string(),
                attempts: exhausted.attempts,
                elapsed: exhausted.elapsed,
                source: exhausted.last_error,
            }),
        }
    }

    /// Drops the sticky address so the next resolve performs a fresh lookup
    pub fn invalidate(&self, service_name: &str) {
        debug!(service = %service_name, "Invalidating sticky service address");
        self.cache.invalidate([self.cache_key(service_name)]);
    }

    /// Invalidates and resolves again
    pub async fn refresh(&self, service_name: &str) -> Result<ResolvedAddress, ResolutionError> {
        self.invalidate(service_name);
        self.resolve(service_name).await
    }
}

impl fmt::Debug for ServiceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceResolver")
            .field("discovery", &self.discovery.name())
            .field("namespace", &self.namespace)
            .field("backoff", &self.backoff)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::StaticDiscovery;

    fn resolver(discovery: Arc<StaticDiscovery>) -> ServiceResolver {
        ServiceResolver::new(
            InMemoryCache::new(CacheTtl::from_secs(60)),
            discovery,
            BackoffConfig::no_retry(),
        )
    }

    #[test]
    fn test_cache_key() {
        let resolver = resolver(Arc::new(StaticDiscovery::new()));
        assert_eq!(resolver.cache_key("db"), "service-address:db");

        let resolver = resolver.with_namespace("srv");
        assert_eq!(resolver.cache_key("db"), "srv:db");
    }

    #[tokio::test]
    async fn test_resolve_is_sticky_until_refresh() {
        let discovery = Arc::new(StaticDiscovery::new().with_endpoint("db", "db-1", 5432));
        let resolver = resolver(discovery.clone());

        assert_eq!(resolver.resolve("db").await.unwrap().host, "db-1");

        discovery.replace("db", "db-2", 5432);
        assert_eq!(resolver.resolve("db").await.unwrap().host, "db-1");

        assert_eq!(resolver.refresh("db").await.unwrap().host, "db-2");
        assert_eq!(
            resolver
                .cache()
                .get_val::<ResolvedAddress>("service-address:db")
                .map(|address| address.host),
            Some("db-2".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_failure_is_typed() {
        let resolver = resolver(Arc::new(StaticDiscovery::new()));
        let error = resolver.resolve("missing").await.unwrap_err();

        assert_eq!(error.service(), "missing");
        assert!(matches!(
            error.discovery_error(),
            Some(crate::errors::DiscoveryError::UnknownService { .. })
        ));
        assert!(resolver.cache().keys().is_empty());
    }
}
