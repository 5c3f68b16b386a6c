// Request hooks layered around a GameApi
//
// Each hook is a decorator: it forwards every call to the inner API and adds
// one behaviour around a single endpoint.
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::HijackingRiskCache;
use crate::client::GameApi;
use crate::error::ApiError;
use crate::models::*;
use crate::storage::SharedPendingSettings;

/// Apply a stored intent for `id` right before it departs. Returns the
/// speed and guard count the departure should use.
pub async fn apply_pending_before_departure(
    api: &dyn GameApi,
    pending: &SharedPendingSettings,
    id: VesselId,
    speed: u32,
    guards: u32,
) -> (u32, u32) {
    let Some(entry) = pending.lock().get(id).cloned() else {
        return (speed, guards);
    };

    match api.update_route_settings(id, &entry.intent).await {
        Ok(_) => {
            info!(vessel = %id, speed = entry.intent.speed, guards = entry.intent.guards, "applied pending route settings before departure");
            if let Err(e) = pending.lock().delete(id) {
                warn!(vessel = %id, error = %e, "could not persist removal of applied settings");
            }
            (entry.intent.speed, entry.intent.guards)
        }
        Err(e) => {
            // Keep the intent; reconciliation retries it on a later cycle.
            warn!(vessel = %id, error = %e, "failed to apply pending route settings before departure");
            (speed, guards)
        }
    }
}

/// Feed the hijacking-risk cache from a roster response.
pub fn snapshot_hijacking_risk(cache: &HijackingRiskCache, vessels: &[Vessel]) -> usize {
    cache.snapshot_from(vessels)
}

pub struct PendingSettingsHook {
    inner: Arc<dyn GameApi>,
    pending: SharedPendingSettings,
}

impl PendingSettingsHook {
    pub fn new(inner: Arc<dyn GameApi>, pending: SharedPendingSettings) -> Self {
        Self { inner, pending }
    }
}

#[async_trait]
impl GameApi for PendingSettingsHook {
    async fn get_bunker(&self) -> Result<Bunker, ApiError> {
        self.inner.get_bunker().await
    }

    async fn get_price_table(&self) -> Result<PriceTable, ApiError> {
        self.inner.get_price_table().await
    }

    async fn purchase(&self, commodity: Commodity, tons: u64) -> Result<Bunker, ApiError> {
        self.inner.purchase(commodity, tons).await
    }

    async fn get_vessels(&self) -> Result<Vec<Vessel>, ApiError> {
        self.inner.get_vessels().await
    }

    async fn depart_vessel(&self, id: VesselId, speed: u32, guards: u32) -> Result<DepartureReceipt, ApiError> {
        let (speed, guards) =
            apply_pending_before_departure(self.inner.as_ref(), &self.pending, id, speed, guards).await;
        self.inner.depart_vessel(id, speed, guards).await
    }

    async fn update_route_settings(&self, id: VesselId, intent: &RouteIntent) -> Result<Vessel, ApiError> {
        self.inner.update_route_settings(id, intent).await
    }

    async fn get_port_demand(&self, port: &str) -> Result<PortDemand, ApiError> {
        self.inner.get_port_demand(port).await
    }

    async fn get_auto_price(&self, route_id: u64, class: CapacityClass) -> Result<RoutePrices, ApiError> {
        self.inner.get_auto_price(route_id, class).await
    }
}

pub struct RiskSnapshotHook {
    inner: Arc<dyn GameApi>,
    risks: Arc<HijackingRiskCache>,
}

impl RiskSnapshotHook {
    pub fn new(inner: Arc<dyn GameApi>, risks: Arc<HijackingRiskCache>) -> Self {
        Self { inner, risks }
    }
}

#[async_trait]
impl GameApi for RiskSnapshotHook {
    async fn get_bunker(&self) -> Result<Bunker, ApiError> {
        self.inner.get_bunker().await
    }

    async fn get_price_table(&self) -> Result<PriceTable, ApiError> {
        self.inner.get_price_table().await
    }

    async fn purchase(&self, commodity: Commodity, tons: u64) -> Result<Bunker, ApiError> {
        self.inner.purchase(commodity, tons).await
    }

    async fn get_vessels(&self) -> Result<Vec<Vessel>, ApiError> {
        let vessels = self.inner.get_vessels().await?;
        snapshot_hijacking_risk(&self.risks, &vessels);
        Ok(vessels)
    }

    async fn depart_vessel(&self, id: VesselId, speed: u32, guards: u32) -> Result<DepartureReceipt, ApiError> {
        self.inner.depart_vessel(id, speed, guards).await
    }

    async fn update_route_settings(&self, id: VesselId, intent: &RouteIntent) -> Result<Vessel, ApiError> {
        self.inner.update_route_settings(id, intent).await
    }

    async fn get_port_demand(&self, port: &str) -> Result<PortDemand, ApiError> {
        self.inner.get_port_demand(port).await
    }

    async fn get_auto_price(&self, route_id: u64, class: CapacityClass) -> Result<RoutePrices, ApiError> {
        self.inner.get_auto_price(route_id, class).await
    }
}

/// The standard stack: pending-settings application and risk snapshots
/// around the raw API.
pub fn layer(
    api: Arc<dyn GameApi>,
    pending: SharedPendingSettings,
    risks: Arc<HijackingRiskCache>,
) -> Arc<dyn GameApi> {
    let with_pending: Arc<dyn GameApi> = Arc::new(PendingSettingsHook::new(api, pending));
    Arc::new(RiskSnapshotHook::new(with_pending, risks))
}
