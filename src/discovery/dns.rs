// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Discovery through the system resolver

use async_trait::async_trait;
use tracing::debug;

use super::{ResolvedAddress, ServiceDiscovery};
use crate::errors::DiscoveryError;

/// Resolves service names through the operating system's resolver
///
/// Service names take the form `host` or `host:port` (IPv6 literals as
/// `[addr]:port`). When no port is given the configured default port is used.
/// The first record returned is selected.
#[derive(Debug, Clone)]
pub struct DnsDiscovery {
    default_port: u16,
}

impl DnsDiscovery {
    /// Creates a DNS backend that falls back to `default_port`
    pub fn new(default_port: u16) -> Self {
        Self { default_port }
    }

    fn split_target(&self, service_name: &str) -> Result<(String, u16), DiscoveryError> {
        let invalid = |reason: &str| DiscoveryError::InvalidServiceName {
            service: service_name.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = service_name.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty service name"));
        }

        let (host, port) = if let Some(rest) = trimmed.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
            match after.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if after.is_empty() => (host, None),
                None => return Err(invalid("unexpected characters after IPv6 literal")),
            }
        } else {
            match trimmed.split_once(':') {
                // More than one colon is a bare IPv6 literal
                Some((_, rest)) if rest.contains(':') => (trimmed, None),
                Some((host, port)) => (host, Some(port)),
                None => (trimmed, None),
            }
        };

        if host.is_empty() {
            return Err(invalid("empty host"));
        }

        let port = match port {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| invalid("port is not a valid u16"))?,
            None => self.default_port,
        };

        Ok((host.to_string(), port))
    }
}

#[async_trait]
impl ServiceDiscovery for DnsDiscovery {
    async fn lookup(&self, service_name: &str) -> Result<ResolvedAddress, DiscoveryError> {
        let (host, port) = self.split_target(service_name)?;

        let mut records = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|source| DiscoveryError::Lookup {
                service: service_name.to_string(),
                source,
            })?;

        let record = records.next().ok_or_else(|| DiscoveryError::NoRecords {
            service: service_name.to_string(),
        })?;

        debug!(service = %service_name, address = %record, "Resolved service through DNS");
        Ok(ResolvedAddress::new(
            service_name,
            record.ip().to_string(),
            record.port(),
        ))
    }

    fn name(&self) -> &'static str {
        "dns"
    }
}
