//! Tracing span helpers for chainshield operations.
//!
//! Telemetry is kept out of business logic: each instrumented operation has
//! a span helper here, attached at the call site with
//! [`tracing::Instrument`].
//!
//! Usage pattern:
//! ```rust,ignore
//! async fn my_operation(&self, key: &str) -> Result<T> {
//!     inner_future.instrument(spans::my_operation(key)).await
//! }
//! ```

use tracing::{Level, Span};

use crate::cache::CacheTtl;

/// Create span for a cache computation.
///
/// Entered while the compute function of a missed key runs. Every caller
/// that joins the in-flight computation shares this span.
#[inline]
pub(crate) fn cache_compute(key: &str, ttl: CacheTtl) -> Span {
    tracing::debug_span!("chainshield.cache_compute", key = %key, ttl = %ttl)
}

/// Create span for resolving a service address, including all retries.
///
/// Children: cache_compute span of the lookup
#[inline]
pub(crate) fn resolve(service_name: &str, discovery: &'static str) -> Span {
    tracing::debug_span!(
        "chainshield.resolve",
        service = %service_name,
        discovery = discovery,
    )
}

/// Create span for a reconnect of a resilient client.
///
/// Children: resolve span
#[inline]
pub(crate) fn reconnect(service_name: &str, operation: &'static str, generation: u64) -> Span {
    tracing::span!(
        Level::INFO,
        "chainshield.reconnect",
        service = %service_name,
        operation = operation,
        generation = generation,
    )
}

/// Create span for a single epoch poller tick.
#[inline]
pub(crate) fn poll_tick(position_key: &str) -> Span {
    tracing::trace_span!("chainshield.poll_tick", position_key = %position_key)
}
