// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Well-known cache keys of the network info provider

use std::fmt;

/// Keys under which network info aggregates are cached.
///
/// `CurrentEpoch` holds the position observed by the
/// [`EpochPoller`](crate::EpochPoller); the epoch-scoped keys are invalidated
/// whenever it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkInfoCacheKey {
    /// Latest epoch number seen by the poller
    CurrentEpoch,
    /// Total supply, fixed for the duration of an epoch
    TotalSupply,
    /// Active stake, fixed for the duration of an epoch
    ActiveStake,
    /// Circulating supply, cached with the default TTL
    CirculatingSupply,
    /// Live stake, cached with the default TTL
    LiveStake,
}

impl NetworkInfoCacheKey {
    /// Keys whose values are only valid within one epoch.
    pub const EPOCH_SCOPED: [NetworkInfoCacheKey; 2] =
        [NetworkInfoCacheKey::TotalSupply, NetworkInfoCacheKey::ActiveStake];

    /// The string key used in the cache.
    pub const fn as_str(&self) -> &'static str {
        match self {
            NetworkInfoCacheKey::CurrentEpoch => "NetworkInfo_current_epoch",
            NetworkInfoCacheKey::TotalSupply => "NetworkInfo_total_supply",
            NetworkInfoCacheKey::ActiveStake => "NetworkInfo_active_stake",
            NetworkInfoCacheKey::CirculatingSupply => "NetworkInfo_circulating_supply",
            NetworkInfoCacheKey::LiveStake => "NetworkInfo_live_stake",
        }
    }

    /// String keys of [`Self::EPOCH_SCOPED`].
    pub fn epoch_scoped_keys() -> Vec<String> {
        Self::EPOCH_SCOPED
            .iter()
            .map(|key| key.as_str().to_string())
            .collect()
    }
}

impl AsRef<str> for NetworkInfoCacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for NetworkInfoCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<NetworkInfoCacheKey> for String {
    fn from(key: NetworkInfoCacheKey) -> Self {
        key.as_str().to_string()
    }
}
