mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::*;
use fleet_autopilot::cache::AutoPriceCache;
use fleet_autopilot::{CapacityClass, GameApi, ResourceOracle, RoutePrices, Vessel};

fn cache() -> AutoPriceCache {
    AutoPriceCache::new(chrono::Duration::hours(4), 5, Duration::ZERO)
}

fn oracle(game: &Arc<FakeGame>) -> ResourceOracle {
    let api: Arc<dyn GameApi> = game.clone();
    ResourceOracle::new(api, instant_retry())
}

fn fleet(count: u64) -> Vec<Vessel> {
    (1..=count).map(|id| vessel(id, 100.0, 1000)).collect()
}

fn dry(price: f64) -> RoutePrices {
    RoutePrices {
        dry: Some(price),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_refresh_fetches_in_batches_of_five() {
    let game = FakeGame::new(bunker(1000.0, 1000.0, 2_000_000), 700.0, 20.0);
    let cache = cache();

    let refreshed = cache.refresh(&oracle(&game), &fleet(12)).await;

    assert_eq!(refreshed, 12);
    assert_eq!(game.auto_price_calls(), 12);
    assert_eq!(game.auto_price_peak(), 5);
    assert_eq!(cache.len(), 12);
    assert_eq!(cache.get(3, CapacityClass::Container), Some(dry(3.0)));
}

#[tokio::test]
async fn test_fresh_entries_are_not_refetched() {
    let game = FakeGame::new(bunker(1000.0, 1000.0, 2_000_000), 700.0, 20.0);
    let cache = cache();
    let now = Utc::now();
    cache.insert(1, CapacityClass::Container, dry(999.0), now);
    cache.insert(2, CapacityClass::Container, dry(998.0), now - chrono::Duration::hours(1));
    cache.insert(3, CapacityClass::Container, dry(997.0), now - chrono::Duration::hours(5));

    let refreshed = cache.refresh(&oracle(&game), &fleet(4)).await;

    assert_eq!(refreshed, 2);
    assert_eq!(game.auto_price_calls(), 2);
    assert_eq!(cache.get(1, CapacityClass::Container), Some(dry(999.0)));
    assert_eq!(cache.get(3, CapacityClass::Container), Some(dry(3.0)));
}

#[tokio::test]
async fn test_overlapping_refresh_is_skipped() {
    let game = FakeGame::new(bunker(1000.0, 1000.0, 2_000_000), 700.0, 20.0);
    let cache = Arc::new(cache());
    let oracle = Arc::new(oracle(&game));
    game.gate_auto_prices();

    let first = {
        let cache = cache.clone();
        let oracle = oracle.clone();
        tokio::spawn(async move { cache.refresh(&oracle, &fleet(3)).await })
    };
    while game.auto_price_calls() < 3 {
        tokio::task::yield_now().await;
    }

    assert_eq!(cache.refresh(&oracle, &fleet(3)).await, 0);

    game.release_auto_prices();
    assert_eq!(first.await.unwrap(), 3);
    assert_eq!(game.auto_price_calls(), 3);

    // Everything is fresh now, so a later refresh has nothing to do
    assert_eq!(cache.refresh(&oracle, &fleet(3)).await, 0);
    assert_eq!(game.auto_price_calls(), 3);
}
