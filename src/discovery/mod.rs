// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Service discovery backends
//!
//! A [`ServiceDiscovery`] turns a logical service name into a concrete
//! [`ResolvedAddress`]. Discovery itself is never cached here; the
//! [`ServiceResolver`](crate::ServiceResolver) layers memoization and backoff
//! on top of any backend.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DiscoveryError;

mod dns;
mod srv;
mod static_table;

pub use dns::DnsDiscovery;
pub use srv::SrvDiscovery;
pub use static_table::StaticDiscovery;

/// A concrete network endpoint selected for a logical service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    /// The logical service name that was looked up
    pub service_name: String,
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// When the lookup produced this address
    pub resolved_at: DateTime<Utc>,
}

impl ResolvedAddress {
    /// Creates an address resolved now
    pub fn new(service_name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            service_name: service_name.into(),
            host: host.into(),
            port,
            resolved_at: Utc::now(),
        }
    }

    /// `host:port`, with IPv6 hosts bracketed so the result can be used in URLs
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Whether two addresses point at the same endpoint, ignoring resolution time
    pub fn same_endpoint(&self, other: &ResolvedAddress) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.service_name, self.authority())
    }
}

/// Trait for service discovery backends
///
/// Implementations must be thread-safe; one instance is shared by every
/// resolver and facade that needs it.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Looks up a single endpoint for `service_name`
    ///
    /// Each call performs a fresh lookup.
    async fn lookup(&self, service_name: &str) -> Result<ResolvedAddress, DiscoveryError>;

    /// Returns a human-readable name for this backend
    ///
    /// Used for logging and debugging.
    fn name(&self) -> &'static str;
}
