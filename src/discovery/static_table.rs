// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory discovery table

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{ResolvedAddress, ServiceDiscovery};
use crate::errors::DiscoveryError;

/// Discovery backed by a fixed table of service name → endpoints
///
/// Each lookup returns the first endpoint registered for the service.
/// [`replace`](Self::replace) swaps a service's endpoints at runtime, which
/// is how address churn is simulated in tests and local setups.
#[derive(Debug, Default)]
pub struct StaticDiscovery {
    table: RwLock<HashMap<String, Vec<(String, u16)>>>,
}

impl StaticDiscovery {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an endpoint for `service_name` (builder style)
    #[must_use]
    pub fn with_endpoint(self, service_name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        self.insert(service_name, host, port);
        self
    }

    /// Appends an endpoint for `service_name`
    pub fn insert(&self, service_name: impl Into<String>, host: impl Into<String>, port: u16) {
        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(service_name.into())
            .or_default()
            .push((host.into(), port));
    }

    /// Replaces every endpoint of `service_name`
    pub fn replace(&self, service_name: impl Into<String>, host: impl Into<String>, port: u16) {
        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(service_name.into(), vec![(host.into(), port)]);
    }

    /// Removes `service_name` from the table
    pub fn remove(&self, service_name: &str) {
        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(service_name);
    }
}

#[async_trait]
impl ServiceDiscovery for StaticDiscovery {
    async fn lookup(&self, service_name: &str) -> Result<ResolvedAddress, DiscoveryError> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let endpoints = table
            .get(service_name)
            .ok_or_else(|| DiscoveryError::UnknownService {
                service: service_name.to_string(),
            })?;
        let (host, port) = endpoints.first().ok_or_else(|| DiscoveryError::NoRecords {
            service: service_name.to_string(),
        })?;

        Ok(ResolvedAddress::new(service_name, host.clone(), *port))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
