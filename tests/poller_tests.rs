// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for epoch-driven invalidation

mod helpers;

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chainshield::{
    CacheTtl, EpochPoller, InMemoryCache, NetworkInfoCacheKey, PollerConfig, PositionSource,
    TickOutcome,
};
use futures::future::{ready, Ready};

const EPOCH_KEY: &str = "current_epoch";

/// Returns the scripted epochs in order; an exhausted script fails
#[derive(Clone, Default)]
struct ScriptedEpochs {
    epochs: Arc<Mutex<VecDeque<Option<u64>>>>,
    fetches: Arc<AtomicUsize>,
}

impl ScriptedEpochs {
    fn new(epochs: impl IntoIterator<Item = Option<u64>>) -> Self {
        Self {
            epochs: Arc::new(Mutex::new(epochs.into_iter().collect())),
            fetches: Arc::default(),
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn source(&self) -> impl PositionSource + 'static {
        let script = self.clone();
        move || -> Ready<Result<u64, io::Error>> {
            script.fetches.fetch_add(1, Ordering::SeqCst);
            let next = script.epochs.lock().unwrap().pop_front().flatten();
            ready(next.ok_or_else(|| io::Error::other("epoch unavailable")))
        }
    }
}

fn seeded_cache() -> InMemoryCache {
    let cache = InMemoryCache::new(CacheTtl::Unlimited);
    cache.set("total_supply", 1_000_000u64);
    cache.set("total_stake", 400_000u64);
    cache.set("token_price", 3u64);
    cache
}

fn config() -> PollerConfig {
    PollerConfig::new(EPOCH_KEY, ["total_supply", "total_stake"])
        .with_interval(Duration::from_secs(10))
}

#[tokio::test]
async fn test_unchanged_epoch_invalidates_nothing() {
    helpers::init_tracing();
    let cache = seeded_cache();
    let epochs = ScriptedEpochs::new([Some(205), Some(205), Some(205)]);
    let poller = EpochPoller::new(cache.clone(), epochs.source(), config());

    assert_eq!(
        poller.poll_once().await,
        TickOutcome::Initialized { position: 205 }
    );
    assert_eq!(
        poller.poll_once().await,
        TickOutcome::Unchanged { position: 205 }
    );
    assert_eq!(
        poller.poll_once().await,
        TickOutcome::Unchanged { position: 205 }
    );

    assert_eq!(cache.get_val::<u64>("total_supply"), Some(1_000_000));
    assert_eq!(cache.get_val::<u64>("total_stake"), Some(400_000));
}

#[tokio::test]
async fn test_epoch_advance_invalidates_scoped_keys_once() {
    let cache = seeded_cache();
    let epochs = ScriptedEpochs::new([Some(205), Some(255), Some(255)]);
    let poller = EpochPoller::new(cache.clone(), epochs.source(), config());

    poller.poll_once().await;
    assert_eq!(
        poller.poll_once().await,
        TickOutcome::Advanced { from: 205, to: 255 }
    );
    cache.set("total_supply", 2_000_000u64);
    assert_eq!(
        poller.poll_once().await,
        TickOutcome::Unchanged { position: 255 }
    );

    assert_eq!(cache.get_val::<u64>(EPOCH_KEY), Some(255));
    assert_eq!(cache.get_val::<u64>("total_supply"), Some(2_000_000));
    assert_eq!(cache.get_val::<u64>("total_stake"), None);
    assert_eq!(cache.get_val::<u64>("token_price"), Some(3));
}

#[tokio::test]
async fn test_first_observation_does_not_invalidate() {
    let cache = seeded_cache();
    let epochs = ScriptedEpochs::new([Some(205)]);
    let poller = EpochPoller::new(cache.clone(), epochs.source(), config());

    poller.poll_once().await;

    assert_eq!(cache.get_val::<u64>("total_supply"), Some(1_000_000));
}

#[tokio::test]
async fn test_fetch_failure_leaves_cache_untouched() {
    let cache = seeded_cache();
    let epochs = ScriptedEpochs::new([Some(205), None]);
    let poller = EpochPoller::new(cache.clone(), epochs.source(), config());

    poller.poll_once().await;
    let before = cache.keys();

    assert_eq!(poller.poll_once().await, TickOutcome::Failed);
    assert_eq!(cache.keys(), before);
    assert_eq!(cache.get_val::<u64>(EPOCH_KEY), Some(205));
}

#[tokio::test]
async fn test_regressed_epoch_is_ignored() {
    let cache = seeded_cache();
    let epochs = ScriptedEpochs::new([Some(255), Some(205)]);
    let poller = EpochPoller::new(cache.clone(), epochs.source(), config());

    poller.poll_once().await;

    assert_eq!(
        poller.poll_once().await,
        TickOutcome::Regressed {
            cached: 255,
            observed: 205
        }
    );
    assert_eq!(cache.get_val::<u64>(EPOCH_KEY), Some(255));
    assert_eq!(cache.get_val::<u64>("total_stake"), Some(400_000));
}

#[tokio::test]
async fn test_computed_values_are_recomputed_after_advance() {
    let cache = InMemoryCache::new(CacheTtl::Unlimited);
    let epochs = ScriptedEpochs::new([Some(1), Some(2)]);
    let poller = EpochPoller::new(cache.clone(), epochs.source(), config());
    let computations = Arc::new(AtomicUsize::new(0));

    let supply = |value: u64| {
        let computations = Arc::clone(&computations);
        move || async move {
            computations.fetch_add(1, Ordering::SeqCst);
            Ok::<_, io::Error>(value)
        }
    };

    poller.poll_once().await;
    assert_eq!(cache.get("total_supply", supply(10)).await.unwrap(), 10);
    assert_eq!(cache.get("total_supply", supply(20)).await.unwrap(), 10);

    poller.poll_once().await;
    assert_eq!(cache.get("total_supply", supply(20)).await.unwrap(), 20);
    assert_eq!(computations.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_default_config_tracks_network_epoch() {
    let config = PollerConfig::default();

    assert_eq!(config.position_key, String::from(NetworkInfoCacheKey::CurrentEpoch));
    assert!(!config.invalidation_keys.is_empty());
    assert!(!config.invalidation_keys.contains(&config.position_key));
}

#[tokio::test(start_paused = true)]
async fn test_background_ticks_stop_after_shutdown() {
    let cache = seeded_cache();
    let epochs = ScriptedEpochs::new((200..300).map(Some));
    let poller = EpochPoller::new(cache.clone(), epochs.source(), config());

    poller.start();
    assert!(poller.is_running());
    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(epochs.fetches(), 3);
    assert_eq!(cache.get_val::<u64>(EPOCH_KEY), Some(202));

    poller.shutdown().await;
    assert!(!poller.is_running());
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(epochs.fetches(), 3);

    poller.shutdown().await;
}

#[derive(Default)]
struct FetchTracker {
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overlapping_ticks_never_move_the_epoch_back() {
    let cache = seeded_cache();
    cache.set(EPOCH_KEY, 205u64);
    let tracker = Arc::new(FetchTracker::default());

    // The first fetch is slow and sees 207, the second is fast and sees 206
    let source = {
        let tracker = Arc::clone(&tracker);
        move || {
            let tracker = Arc::clone(&tracker);
            async move {
                let call = tracker.calls.fetch_add(1, Ordering::SeqCst);
                let active = tracker.active.fetch_add(1, Ordering::SeqCst) + 1;
                tracker.max_active.fetch_max(active, Ordering::SeqCst);
                if call == 0 {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                tracker.active.fetch_sub(1, Ordering::SeqCst);
                Ok::<u64, io::Error>(if call == 0 { 207 } else { 206 })
            }
        }
    };
    let poller = EpochPoller::new(cache.clone(), source, config());

    let (first, second) = tokio::join!(poller.poll_once(), poller.poll_once());

    assert_eq!(first, TickOutcome::Advanced { from: 205, to: 207 });
    assert_eq!(
        second,
        TickOutcome::Regressed {
            cached: 207,
            observed: 206
        }
    );
    assert_eq!(tracker.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get_val::<u64>(EPOCH_KEY), Some(207));
    assert_eq!(cache.get_val::<u64>("total_stake"), None);
}
