// Resource Oracle - retried reads of the account, prices and fleet
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::client::GameApi;
use crate::error::ApiError;
use crate::models::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Attempt `n` waits `n * backoff` before the next try.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Read side of the game. Every query degrades to `None` after the retry
/// budget is spent, so a cycle step can no-op instead of failing.
pub struct ResourceOracle {
    api: Arc<dyn GameApi>,
    retry: RetryPolicy,
}

impl ResourceOracle {
    pub fn new(api: Arc<dyn GameApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    pub fn api(&self) -> &Arc<dyn GameApi> {
        &self.api
    }

    pub async fn bunker(&self) -> Option<Bunker> {
        self.with_retry("bunker", || self.api.get_bunker()).await
    }

    /// Price in effect for the current 30-minute UTC slot.
    pub async fn prices(&self) -> Option<PriceQuote> {
        let table = self.with_retry("prices", || self.api.get_price_table()).await?;
        let now = Utc::now();
        let quote = table.quote_at(now);
        if quote.is_none() {
            warn!(slot = %PriceTable::slot_key(now), "price table has no entry for the current slot");
        }
        quote
    }

    pub async fn vessels(&self) -> Option<Vec<Vessel>> {
        self.with_retry("vessels", || self.api.get_vessels()).await
    }

    pub async fn port_demand(&self, port: &str) -> Option<PortDemand> {
        self.with_retry("port demand", || self.api.get_port_demand(port)).await
    }

    pub async fn auto_price(&self, route_id: u64, class: CapacityClass) -> Option<RoutePrices> {
        self.with_retry("auto price", || self.api.get_auto_price(route_id, class)).await
    }

    async fn with_retry<T, F, Fut>(&self, what: &str, mut call: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            match call().await {
                Ok(value) => return Some(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let wait = self.retry.backoff * attempt;
                    debug!(what, attempt, error = %e, wait_ms = wait.as_millis() as u64, "retrying");
                    sleep(wait).await;
                }
                Err(e) => {
                    warn!(what, attempt, error = %e, "unavailable");
                    return None;
                }
            }
        }
        None
    }
}
