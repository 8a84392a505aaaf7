// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// Statistics about cache usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of `get` calls served from a live entry
    pub hits: u64,
    /// Number of `get` calls that started a new computation
    pub misses: u64,
    /// Number of `get` calls that joined an in-flight computation
    pub deduplicated: u64,
    /// Number of entries dropped because their TTL elapsed
    pub expirations: u64,
    /// Number of computations that failed (and were not cached)
    pub failures: u64,
    /// Current number of live entries
    pub entries: usize,
}

impl CacheStats {
    /// Calculates the hit rate as a percentage (0.0 to 100.0)
    ///
    /// Joins on an in-flight computation count as hits since they did not
    /// trigger a computation of their own.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.deduplicated;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            (served as f64 / total as f64) * 100.0
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={}, misses={}, deduplicated={}, expirations={}, failures={}, entries={}, hit_rate={:.1}%",
            self.hits,
            self.misses,
            self.deduplicated,
            self.expirations,
            self.failures,
            self.entries,
            self.hit_rate()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_empty() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_counts_joins() {
        let stats = CacheStats {
            hits: 2,
            misses: 1,
            deduplicated: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 75.0);
        assert!(stats.to_string().contains("hit_rate=75.0%"));
    }
}
