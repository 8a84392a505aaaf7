// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Resilient connection facade
//!
//! A [`ResilientClient`] wraps a network client whose backing address comes
//! from service discovery. The client's one risky operation
//! ([`ManagedClient::call`]) is intercepted: when it fails with a
//! connection-class error the facade re-resolves the address, rebuilds the
//! client, swaps it in and retries the operation exactly once. Everything
//! else is reached through [`ResilientClient::current`] and is forwarded to
//! the live client untouched.
//!
//! # Example
//!
//! ```rust,ignore
//! use chainshield::connection::rpc::{NodeRpcFactory, RpcCall};
//! use chainshield::{ReconnectPolicy, ResilientClient};
//!
//! let node = ResilientClient::connect(
//!     "ethereum-node",
//!     resolver.clone(),
//!     NodeRpcFactory::http(),
//!     ReconnectPolicy::default(),
//! )
//! .await?;
//!
//! let head = node.call(&RpcCall::without_params("eth_blockNumber")).await?;
//! ```

use std::collections::HashSet;

use async_trait::async_trait;

use crate::discovery::ResolvedAddress;
use crate::errors::{BoxError, ConnectionErrorKind};

mod classify;
mod resilient;
pub mod rpc;

pub use classify::classify_error;
pub use resilient::ResilientClient;

/// A network client with one connection-sensitive operation
///
/// Implemented by the clients a [`ResilientClient`] manages (database pool,
/// JSON-RPC node, broker publisher). Only [`call`](Self::call) is guarded;
/// any other method of the client is used through
/// [`ResilientClient::current`].
#[async_trait]
pub trait ManagedClient: Send + Sync + 'static {
    /// Input of the risky operation
    type Request: Send + Sync;
    /// Output of the risky operation
    type Response: Send;
    /// Error of the risky operation
    type Error: std::error::Error + Send + Sync + 'static;

    /// Name of the risky operation, for logs
    const OPERATION: &'static str;

    /// Runs the risky operation
    async fn call(&self, request: &Self::Request) -> Result<Self::Response, Self::Error>;

    /// Decides whether `error` is connection-class
    ///
    /// The default walks the error's source chain with [`classify_error`].
    fn classify(error: &Self::Error) -> Option<ConnectionErrorKind> {
        classify_error(error)
    }
}

/// Builds a client for a resolved address
///
/// Implemented for any `Fn(&ResolvedAddress) -> Result<C, E>`.
pub trait ClientFactory<C>: Send + Sync {
    /// Builds a fresh client connected to `address`
    fn build(&self, address: &ResolvedAddress) -> Result<C, BoxError>;
}

impl<C, F, E> ClientFactory<C> for F
where
    F: Fn(&ResolvedAddress) -> Result<C, E> + Send + Sync,
    E: Into<BoxError>,
{
    fn build(&self, address: &ResolvedAddress) -> Result<C, BoxError> {
        self(address).map_err(Into::into)
    }
}

/// Which failures trigger a reconnect, and how the address is re-resolved
///
/// By default only [`ConnectionErrorKind::DEFAULT_RECONNECT_SET`] triggers
/// recovery, and the sticky cached address is invalidated before resolving
/// again so a moved service is actually found at its new address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    reconnect_on: HashSet<ConnectionErrorKind>,
    invalidate_address: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            reconnect_on: ConnectionErrorKind::DEFAULT_RECONNECT_SET
                .into_iter()
                .collect(),
            invalidate_address: true,
        }
    }
}

impl ReconnectPolicy {
    /// Replaces the set of error classes that trigger a reconnect
    #[must_use]
    pub fn reconnect_on(mut self, kinds: impl IntoIterator<Item = ConnectionErrorKind>) -> Self {
        self.reconnect_on = kinds.into_iter().collect();
        self
    }

    /// Adds one error class to the reconnect set
    #[must_use]
    pub fn also_reconnect_on(mut self, kind: ConnectionErrorKind) -> Self {
        self.reconnect_on.insert(kind);
        self
    }

    /// Re-resolves through the cache without dropping the sticky address
    ///
    /// A reconnect then reuses whatever address is cached. Only useful when
    /// something else invalidates the entry, e.g. a discovery watcher.
    #[must_use]
    pub fn reuse_cached_address(mut self) -> Self {
        self.invalidate_address = false;
        self
    }

    /// Whether `kind` triggers a reconnect
    pub fn should_reconnect(&self, kind: ConnectionErrorKind) -> bool {
        self.reconnect_on.contains(&kind)
    }

    /// Whether the sticky address is invalidated before re-resolving
    pub fn invalidates_address(&self) -> bool {
        self.invalidate_address
    }
}
