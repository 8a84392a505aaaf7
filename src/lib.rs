// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Resilient caching and connection recovery for blockchain data services
//!
//! - [`InMemoryCache`]: TTL cache where concurrent misses share one computation
//!   and failures are never cached
//! - [`ServiceResolver`]: sticky service address resolution with exponential backoff
//! - [`ResilientClient`]: wraps a client and reconnects once on connection errors
//! - [`EpochPoller`]: invalidates epoch-scoped cache entries when the epoch advances
//!
//! The library emits `tracing` events and spans but never installs a subscriber.

pub mod cache;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod errors;
pub mod poller;
pub mod resolver;
pub mod retry;
mod spans;

pub use cache::*;
pub use config::{ConnectionTarget, ShieldConfig, ShieldConfigBuilder};
pub use connection::{
    classify_error, ClientFactory, ManagedClient, ReconnectPolicy, ResilientClient,
};
pub use discovery::{
    DnsDiscovery, ResolvedAddress, ServiceDiscovery, SrvDiscovery, StaticDiscovery,
};
pub use errors::*;
pub use poller::{EpochPoller, PollerConfig, PositionSource, TickOutcome};
pub use resolver::ServiceResolver;
pub use retry::{
    retry_with_backoff, retry_with_backoff_if, BackoffConfig, BackoffConfigBuilder, RetriesExhausted,
};
