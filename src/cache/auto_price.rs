// Auto-Price Cache - fair freight prices per route and vessel type
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::client::ResourceOracle;
use crate::models::{CapacityClass, RoutePrices, Vessel};

pub const AUTO_PRICE_TTL_HOURS: i64 = 4;
pub const REFRESH_BATCH_SIZE: usize = 5;
pub const REFRESH_BATCH_DELAY: std::time::Duration = std::time::Duration::from_millis(500);

pub type RouteKey = (u64, CapacityClass);

#[derive(Debug, Clone)]
struct CachedPrices {
    prices: RoutePrices,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct AutoPriceCache {
    entries: Mutex<HashMap<RouteKey, CachedPrices>>,
    ttl: Duration,
    batch_size: usize,
    batch_delay: std::time::Duration,
    refreshing: AtomicBool,
}

impl Default for AutoPriceCache {
    fn default() -> Self {
        Self::new(Duration::hours(AUTO_PRICE_TTL_HOURS), REFRESH_BATCH_SIZE, REFRESH_BATCH_DELAY)
    }
}

impl AutoPriceCache {
    pub fn new(ttl: Duration, batch_size: usize, batch_delay: std::time::Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            batch_size: batch_size.max(1),
            batch_delay,
            refreshing: AtomicBool::new(false),
        }
    }

    /// Cached fair prices, if present and younger than the TTL. Never calls out.
    pub fn get(&self, route_id: u64, class: CapacityClass) -> Option<RoutePrices> {
        self.get_at(route_id, class, Utc::now())
    }

    fn get_at(&self, route_id: u64, class: CapacityClass, now: DateTime<Utc>) -> Option<RoutePrices> {
        let entries = self.entries.lock();
        entries
            .get(&(route_id, class))
            .filter(|cached| now.signed_duration_since(cached.fetched_at) <= self.ttl)
            .map(|cached| cached.prices.clone())
    }

    pub fn insert(&self, route_id: u64, class: CapacityClass, prices: RoutePrices, fetched_at: DateTime<Utc>) {
        self.entries
            .lock()
            .insert((route_id, class), CachedPrices { prices, fetched_at });
    }

    /// Routes in `vessels` whose entry is missing or expired, deduplicated.
    pub fn stale_routes(&self, vessels: &[Vessel], now: DateTime<Utc>) -> Vec<RouteKey> {
        let entries = self.entries.lock();
        let mut seen = HashSet::new();
        vessels
            .iter()
            .filter_map(|v| {
                let route_id = v.route.as_ref()?.route_id?;
                Some((route_id, v.capacity_class))
            })
            .filter(|key| seen.insert(*key))
            .filter(|key| match entries.get(key) {
                Some(cached) => now.signed_duration_since(cached.fetched_at) > self.ttl,
                None => true,
            })
            .collect()
    }

    /// Fetch every stale route, `batch_size` at a time with a pause between
    /// batches. Returns how many entries were refreshed; a refresh already in
    /// progress makes this a no-op.
    pub async fn refresh(&self, oracle: &ResourceOracle, vessels: &[Vessel]) -> usize {
        if self.refreshing.swap(true, Ordering::AcqRel) {
            debug!("auto-price refresh already running");
            return 0;
        }

        let stale = self.stale_routes(vessels, Utc::now());
        let mut refreshed = 0;

        for (index, batch) in stale.chunks(self.batch_size).enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            let results = join_all(batch.iter().map(|(route_id, class)| async move {
                (*route_id, *class, oracle.auto_price(*route_id, *class).await)
            }))
            .await;

            let now = Utc::now();
            for (route_id, class, prices) in results {
                if let Some(prices) = prices {
                    self.insert(route_id, class, prices, now);
                    refreshed += 1;
                }
            }
        }

        if refreshed > 0 {
            info!(refreshed, stale = stale.len(), "auto-price cache refreshed");
        }
        self.refreshing.store(false, Ordering::Release);
        refreshed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
