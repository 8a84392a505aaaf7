// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for service discovery lookups and address resolution.

use std::time::Duration;

use super::CacheError;

/// Errors returned by a single service discovery lookup.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The lookup succeeded but returned no usable records.
    #[error("No records found for service '{service}'")]
    NoRecords {
        /// The logical service name that was looked up
        service: String,
    },

    /// The discovery backend does not know this service.
    #[error("Unknown service '{service}'")]
    UnknownService {
        /// The logical service name that was looked up
        service: String,
    },

    /// The service name could not be turned into a lookup target.
    #[error("Invalid service name '{service}': {reason}")]
    InvalidServiceName {
        /// The offending service name
        service: String,
        /// Why it was rejected
        reason: String,
    },

    /// The underlying resolver failed.
    #[error("Lookup for service '{service}' failed")]
    Lookup {
        /// The logical service name that was looked up
        service: String,
        /// The resolver error
        #[source]
        source: std::io::Error,
    },
}

/// Errors returned by [`ServiceResolver`](crate::ServiceResolver).
///
/// Exhausting the retry budget is fatal to the component requesting a
/// connection. The library reports it here and leaves the decision to stop
/// the process to the embedding application.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    /// Every attempt within the backoff budget failed.
    #[error("Resolving service '{service}' failed after {attempts} attempts over {elapsed:?}")]
    RetriesExhausted {
        /// The logical service name
        service: String,
        /// Number of attempts made, including the first
        attempts: u32,
        /// Total time spent across attempts and delays
        elapsed: Duration,
        /// The error from the last attempt
        #[source]
        source: CacheError,
    },

    /// The cache refused the lookup (shut down, or the key holds another type).
    /// Not retried.
    #[error("Resolving service '{service}' failed in the address cache")]
    Cache {
        /// The logical service name
        service: String,
        /// The cache error
        #[source]
        source: CacheError,
    },
}

impl ResolutionError {
    /// The service whose resolution failed.
    pub fn service(&self) -> &str {
        match self {
            ResolutionError::RetriesExhausted { service, .. }
            | ResolutionError::Cache { service, .. } => service,
        }
    }

    /// The discovery error from the final attempt, if it was a discovery failure.
    pub fn discovery_error(&self) -> Option<&DiscoveryError> {
        match self {
            ResolutionError::RetriesExhausted { source, .. } => source.compute_source(),
            ResolutionError::Cache { .. } => None,
        }
    }
}
