// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};

use tracing::{debug, info, warn, Instrument};

use super::{ClientFactory, ManagedClient, ReconnectPolicy};
use crate::discovery::ResolvedAddress;
use crate::errors::ReconnectError;
use crate::resolver::ServiceResolver;
use crate::spans;

/// The live client together with the address it was built for
struct Live<C> {
    client: Arc<C>,
    address: ResolvedAddress,
    /// Incremented on every rebuild
    generation: u64,
}

struct Inner<C> {
    service_name: String,
    resolver: ServiceResolver,
    factory: Box<dyn ClientFactory<C>>,
    policy: ReconnectPolicy,
    live: RwLock<Live<C>>,
    /// Serializes rebuilds
    rebuild: tokio::sync::Mutex<()>,
    reconnects: AtomicU64,
}

/// A managed client that transparently reconnects once on connection errors
///
/// Cloning is cheap and every clone shares the same live client, so a
/// reconnect triggered through one clone is seen by all of them.
///
/// Concurrent calls that fail against the same client generation trigger a
/// single rebuild; the others reuse the replacement.
pub struct ResilientClient<C: ManagedClient> {
    inner: Arc<Inner<C>>,
}

impl<C: ManagedClient> Clone for ResilientClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: ManagedClient> ResilientClient<C> {
    /// Resolves `service_name`, builds the first client and wraps it
    ///
    /// # Errors
    ///
    /// - [`ReconnectError::Resolution`] if the address cannot be resolved
    /// - [`ReconnectError::Build`] if the factory rejects the address
    pub async fn connect(
        service_name: impl Into<String>,
        resolver: ServiceResolver,
        factory: impl ClientFactory<C> + 'static,
        policy: ReconnectPolicy,
    ) -> Result<Self, ReconnectError<C::Error>> {
        let service_name = service_name.into();
        let address = resolver
            .resolve(&service_name)
            .await
            .map_err(ReconnectError::Resolution)?;
        let client = build_client(&service_name, &factory, &address)?;

        info!(
            service = %service_name,
            address = %address.authority(),
            operation = C::OPERATION,
            "Resilient client connected"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                service_name,
                resolver,
                factory: Box::new(factory),
                policy,
                live: RwLock::new(Live {
                    client: Arc::new(client),
                    address,
                    generation: 0,
                }),
                rebuild: tokio::sync::Mutex::new(()),
                reconnects: AtomicU64::new(0),
            }),
        })
    }

    /// Runs the risky operation, reconnecting and retrying once on a connection error
    ///
    /// Errors that are not connection-class, and a failure of the single
    /// retry, are returned as [`ReconnectError::Operation`] carrying the
    /// client's own error unchanged.
    ///
    /// # Errors
    ///
    /// - [`ReconnectError::Operation`] when the operation fails for good
    /// - [`ReconnectError::Resolution`] or [`ReconnectError::Build`] when recovery fails
    pub async fn call(&self, request: &C::Request) -> Result<C::Response, ReconnectError<C::Error>> {
        let (client, generation) = self.snapshot();

        let error = match client.call(request).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        let Some(kind) = C::classify(&error).filter(|kind| self.inner.policy.should_reconnect(*kind))
        else {
            return Err(ReconnectError::Operation(error));
        };

        warn!(
            service = %self.inner.service_name,
            operation = C::OPERATION,
            kind = %kind,
            error = %error,
            "Connection error, reconnecting"
        );
        drop(client);

        let client = self.reconnect_from(generation).await?;
        client.call(request).await.map_err(|error| {
            warn!(
                service = %self.inner.service_name,
                operation = C::OPERATION,
                error = %error,
                "Operation failed again after reconnect"
            );
            ReconnectError::Operation(error)
        })
    }

    /// The live client
    ///
    /// Use this for every operation other than the guarded one. The handle
    /// stays valid after a reconnect but then points at the replaced client,
    /// so fetch it per use rather than holding on to it.
    pub fn current(&self) -> Arc<C> {
        Arc::clone(&self.read_live().client)
    }

    /// The address the live client was built for
    pub fn address(&self) -> ResolvedAddress {
        self.read_live().address.clone()
    }

    /// Forces a rebuild of the client
    pub async fn reconnect(&self) -> Result<(), ReconnectError<C::Error>> {
        let (_, generation) = self.snapshot();
        self.reconnect_from(generation).await.map(|_| ())
    }

    /// Number of completed reconnects
    pub fn reconnect_count(&self) -> u64 {
        self.inner.reconnects.load(Ordering::Relaxed)
    }

    /// The logical service this client connects to
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// The active reconnect policy
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.inner.policy
    }

    fn read_live(&self) -> std::sync::RwLockReadGuard<'_, Live<C>> {
        self.inner.live.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> (Arc<C>, u64) {
        let live = self.read_live();
        (Arc::clone(&live.client), live.generation)
    }

    /// Replaces the client built at `failed_generation`, unless another caller already did
    async fn reconnect_from(&self, failed_generation: u64) -> Result<Arc<C>, ReconnectError<C::Error>> {
        let _rebuild = self.inner.rebuild.lock().await;

        let (client, generation) = self.snapshot();
        if generation != failed_generation {
            debug!(
                service = %self.inner.service_name,
                generation = generation,
                "Client already replaced, reusing it"
            );
            return Ok(client);
        }
        drop(client);

        self.rebuild(failed_generation)
            .instrument(spans::reconnect(
                &self.inner.service_name,
                C::OPERATION,
                failed_generation,
            ))
            .await
    }

    async fn rebuild(&self, failed_generation: u64) -> Result<Arc<C>, ReconnectError<C::Error>> {
        let inner = &self.inner;

        if inner.policy.invalidates_address() {
            inner.resolver.invalidate(&inner.service_name);
        }
        let address = inner
            .resolver
            .resolve(&inner.service_name)
            .await
            .map_err(ReconnectError::Resolution)?;
        let client = Arc::new(build_client(
            &inner.service_name,
            inner.factory.as_ref(),
            &address,
        )?);

        let previous = {
            let mut live = inner.live.write().unwrap_or_else(PoisonError::into_inner);
            let previous = live.address.authority();
            *live = Live {
                client: Arc::clone(&client),
                address: address.clone(),
                generation: failed_generation + 1,
            };
            previous
        };
        inner.reconnects.fetch_add(1, Ordering::Relaxed);

        info!(
            service = %inner.service_name,
            previous = %previous,
            address = %address.authority(),
            "Reconnected"
        );
        Ok(client)
    }
}

fn build_client<C: ManagedClient>(
    service_name: &str,
    factory: &(impl ClientFactory<C> + ?Sized),
    address: &ResolvedAddress,
) -> Result<C, ReconnectError<C::Error>> {
    factory
        .build(address)
        .map_err(|source| ReconnectError::Build {
            service: service_name.to_string(),
            source,
        })
}

impl<C: ManagedClient> fmt::Debug for ResilientClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = self.read_live();
        f.debug_struct("ResilientClient")
            .field("service_name", &self.inner.service_name)
            .field("operation", &C::OPERATION)
            .field("address", &live.address.authority())
            .field("generation", &live.generation)
            .finish()
    }
}

/// Tower adapter so the facade composes with tower middleware
///
/// Always ready; each call runs [`ResilientClient::call`] on a clone.
impl<C> tower::Service<C::Request> for ResilientClient<C>
where
    C: ManagedClient,
    C::Request: 'static,
    C::Response: 'static,
{
    type Response = C::Response;
    type Error = ReconnectError<C::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: C::Request) -> Self::Future {
        let client = self.clone();
        Box::pin(async move { client.call(&request).await })
    }
}
