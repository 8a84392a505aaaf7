// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the chainshield library.
//!
//! Each component has its own error type so callers can react precisely:
//!
//! - [`CacheError`] - compute failures, type mismatches and use after shutdown
//! - [`DiscoveryError`] - a single failed service discovery lookup
//! - [`ResolutionError`] - resolution that exhausted its backoff budget (fatal)
//! - [`ReconnectError`] - failures of the facade's intercepted operation
//! - [`ConfigError`] - invalid or conflicting construction parameters
//! - [`NodeRpcError`] - JSON-RPC node calls made through a resilient client
//!
//! [`ShieldError`] unifies the non-generic ones for callers that just want `?`.
//!
//! Nothing in this crate swallows an error or terminates the process: errors
//! are either recovered from transparently (a reconnect) or returned as-is.
//!
//! # Examples
//!
//! ```rust,ignore
//! use chainshield::{ResolutionError, ServiceResolver};
//!
//! match resolver.resolve("_postgres._tcp.db.local").await {
//!     Ok(address) => println!("{}:{}", address.host, address.port),
//!     Err(ResolutionError::RetriesExhausted { attempts, .. }) => {
//!         eprintln!("giving up after {attempts} attempts");
//!         std::process::exit(1);
//!     }
//!     Err(other) => return Err(other.into()),
//! }
//! ```

mod cache;
mod config;
mod connection;
mod discovery;
mod rpc;

pub use cache::{CacheError, SharedError};
pub use config::ConfigError;
pub use connection::{BoxError, ConnectionErrorKind, ReconnectError};
pub use discovery::{DiscoveryError, ResolutionError};
pub use rpc::NodeRpcError;

/// Unified error type for chainshield operations.
///
/// All non-generic error types convert into `ShieldError` via `From`, so `?`
/// works across component boundaries.
#[derive(Debug, thiserror::Error)]
pub enum ShieldError {
    /// Error from the TTL cache.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Error from a discovery lookup.
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Fatal address resolution error.
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// JSON-RPC node error.
    #[error("Node RPC error: {0}")]
    NodeRpc(#[from] NodeRpcError),

    /// Failure of a managed client operation or its recovery.
    #[error("Connection error: {0}")]
    Connection(#[source] BoxError),
}

impl<E> From<ReconnectError<E>> for ShieldError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: ReconnectError<E>) -> Self {
        match err {
            ReconnectError::Resolution(e) => ShieldError::Resolution(e),
            other => ShieldError::Connection(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_error() {
        let err: ShieldError = ConfigError::MissingValue {
            field: "service_name",
        }
        .into();
        assert!(matches!(err, ShieldError::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required option 'service_name'"
        );
    }

    #[test]
    fn test_from_reconnect_error_keeps_operation_message() {
        let err: ShieldError =
            ReconnectError::Operation(std::io::Error::other("relation does not exist")).into();
        assert!(matches!(err, ShieldError::Connection(_)));
        assert!(err.to_string().contains("relation does not exist"));
    }
}
