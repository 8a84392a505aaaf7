// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Process-local TTL cache
//!
//! [`InMemoryCache`] memoizes expensive async reads (aggregate queries, node
//! RPC calls, resolved service addresses) with a per-entry TTL. Concurrent
//! misses on the same key share one computation, failures are never cached,
//! and entries with [`CacheTtl::Unlimited`] only leave through
//! [`InMemoryCache::invalidate`] or [`InMemoryCache::clear`].

mod keys;
mod memory;
mod stats;
mod ttl;

pub use keys::NetworkInfoCacheKey;
pub use memory::InMemoryCache;
pub use stats::CacheStats;
pub use ttl::{CacheTtl, UNLIMITED_CACHE_TTL};
