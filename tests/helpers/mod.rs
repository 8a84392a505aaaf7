// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Test helpers for chainshield integration tests
//!
//! Provides mock discovery backends and a scripted managed client so the
//! resolver and reconnect paths can be tested without real services.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chainshield::{
    ClientFactory, DiscoveryError, ManagedClient, ResolvedAddress, ServiceDiscovery,
};

/// Installs a test subscriber honouring `RUST_LOG`; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Discovery backend that counts lookups and can fail on demand
///
/// # Example
///
/// ```rust,ignore
/// let discovery = Arc::new(CountingDiscovery::new("db-1", 5432).failing_first(2));
/// // the first two lookups fail with NoRecords, the third returns db-1:5432
/// ```
pub struct CountingDiscovery {
    endpoint: Mutex<(String, u16)>,
    lookups: AtomicUsize,
    failures_remaining: AtomicUsize,
}

impl CountingDiscovery {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            endpoint: Mutex::new((host.to_string(), port)),
            lookups: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
        }
    }

    /// The next `n` lookups fail
    pub fn failing_first(self, n: usize) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Every lookup fails until [`set_endpoint`](Self::set_endpoint) is called
    pub fn always_failing(self) -> Self {
        self.failing_first(usize::MAX)
    }

    /// Every later lookup fails until [`set_endpoint`](Self::set_endpoint) is called
    pub fn fail_all(&self) {
        self.failures_remaining.store(usize::MAX, Ordering::SeqCst);
    }

    /// Moves the service to a new endpoint and stops failing
    pub fn set_endpoint(&self, host: &str, port: u16) {
        *self.endpoint.lock().unwrap() = (host.to_string(), port);
        self.failures_remaining.store(0, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceDiscovery for CountingDiscovery {
    async fn lookup(&self, service_name: &str) -> Result<ResolvedAddress, DiscoveryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DiscoveryError::NoRecords {
                service: service_name.to_string(),
            });
        }

        let (host, port) = self.endpoint.lock().unwrap().clone();
        Ok(ResolvedAddress::new(service_name, host, port))
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// A scripted failure returned by [`MockClient::call`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    /// `io::ErrorKind::ConnectionRefused`
    Refused,
    /// A resolver failure message, classified as host-not-found
    HostNotFound,
    /// `io::ErrorKind::ConnectionReset`, outside the default reconnect set
    Reset,
    /// An application-level failure
    Query(&'static str),
}

impl Scripted {
    fn into_error(self) -> io::Error {
        match self {
            Scripted::Refused => io::Error::from(io::ErrorKind::ConnectionRefused),
            Scripted::HostNotFound => {
                io::Error::other("failed to lookup address information: Name or service not known")
            }
            Scripted::Reset => io::Error::from(io::ErrorKind::ConnectionReset),
            Scripted::Query(message) => io::Error::other(message),
        }
    }
}

/// Shared state behind every [`MockClient`] a factory builds
#[derive(Default)]
pub struct MockBackend {
    script: Mutex<VecDeque<Scripted>>,
    down_hosts: Mutex<HashSet<String>>,
    calls: AtomicUsize,
    builds: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues failures returned by the next calls, regardless of host
    pub fn fail_next(&self, failures: impl IntoIterator<Item = Scripted>) {
        self.script.lock().unwrap().extend(failures);
    }

    /// Calls against `host` fail with connection refused
    pub fn take_down(&self, host: &str) {
        self.down_hosts.lock().unwrap().insert(host.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// A factory building clients bound to this backend
    pub fn factory(self: &Arc<Self>) -> impl ClientFactory<MockClient> + 'static {
        let backend = Arc::clone(self);
        move |address: &ResolvedAddress| -> Result<MockClient, io::Error> {
            backend.builds.fetch_add(1, Ordering::SeqCst);
            Ok(MockClient {
                host: address.host.clone(),
                backend: Arc::clone(&backend),
            })
        }
    }
}

/// Client whose risky operation is `query`
pub struct MockClient {
    host: String,
    backend: Arc<MockBackend>,
}

impl MockClient {
    /// A forwarded, non-risky accessor
    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl ManagedClient for MockClient {
    type Request = String;
    type Response = String;
    type Error = io::Error;

    const OPERATION: &'static str = "query";

    async fn call(&self, request: &String) -> Result<String, io::Error> {
        self.backend.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = self.backend.script.lock().unwrap().pop_front() {
            return Err(failure.into_error());
        }
        if self.backend.down_hosts.lock().unwrap().contains(&self.host) {
            return Err(Scripted::Refused.into_error());
        }
        Ok(format!("{request} via {}", self.host))
    }
}
