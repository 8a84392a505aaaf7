// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Discovery through DNS SRV records

use std::fmt;
use std::io;

use async_trait::async_trait;
use hickory_resolver::proto::rr::rdata::SRV;
use hickory_resolver::TokioResolver;
use tracing::debug;

use super::{ResolvedAddress, ServiceDiscovery};
use crate::errors::DiscoveryError;

/// Resolves service names such as `_postgres._tcp.db.local` to the target
/// host and port of an SRV record
///
/// Both host and port come from the record, so a service that moves to a new
/// port is followed on the next lookup. Among the returned records the one
/// with the lowest priority value wins; ties keep the order the resolver
/// returned them in.
#[derive(Clone)]
pub struct SrvDiscovery {
    resolver: TokioResolver,
}

impl SrvDiscovery {
    /// Uses the system resolver configuration (`/etc/resolv.conf` on Unix)
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Lookup`] if the system configuration cannot be read.
    pub fn from_system_conf() -> Result<Self, DiscoveryError> {
        let builder = TokioResolver::builder_tokio().map_err(|source| DiscoveryError::Lookup {
            service: String::new(),
            source: io::Error::other(source),
        })?;
        Ok(Self::with_resolver(builder.build()))
    }

    /// Uses an already configured resolver
    pub fn with_resolver(resolver: TokioResolver) -> Self {
        Self { resolver }
    }
}

impl fmt::Debug for SrvDiscovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrvDiscovery").finish_non_exhaustive()
    }
}

#[async_trait]
impl ServiceDiscovery for SrvDiscovery {
    async fn lookup(&self, service_name: &str) -> Result<ResolvedAddress, DiscoveryError> {
        let lookup = self
            .resolver
            .srv_lookup(service_name)
            .await
            .map_err(|source| DiscoveryError::Lookup {
                service: service_name.to_string(),
                source: io::Error::other(source),
            })?;

        let address = select_record(service_name, lookup.iter())?;
        debug!(
            service = %service_name,
            address = %address.authority(),
            "Resolved service through SRV"
        );
        Ok(address)
    }

    fn name(&self) -> &'static str {
        "srv"
    }
}

/// Picks the preferred record and maps it to an address
fn select_record<'a>(
    service_name: &str,
    records: impl IntoIterator<Item = &'a SRV>,
) -> Result<ResolvedAddress, DiscoveryError> {
    let record = records
        .into_iter()
        .reduce(|best, record| {
            if record.priority() < best.priority() {
                record
            } else {
                best
            }
        })
        .ok_or_else(|| DiscoveryError::NoRecords {
            service: service_name.to_string(),
        })?;

    let target = record.target().to_utf8();
    let host = target.trim_end_matches('.');
    if host.is_empty() {
        // A target of "." means the service is decidedly not available
        return Err(DiscoveryError::NoRecords {
            service: service_name.to_string(),
        });
    }

    Ok(ResolvedAddress::new(service_name, host, record.port()))
}
