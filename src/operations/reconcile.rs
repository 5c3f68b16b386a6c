// Pending route-settings reconciliation
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::client::GameApi;
use crate::error::SettingsRequestError;
use crate::models::*;
use crate::storage::SharedPendingSettings;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub collected: usize,
    pub applied: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSettingsOutcome {
    /// Sent to the game right away
    Applied,
    /// Stored until the vessel can receive it
    Deferred,
}

/// Drop entries whose vessel left the fleet, lost its route, or already
/// carries the requested values.
pub fn garbage_collect(pending: &SharedPendingSettings, vessels: &[Vessel]) -> usize {
    let by_id: HashMap<VesselId, &Vessel> = vessels.iter().map(|v| (v.id, v)).collect();
    let result = pending.lock().retain(|entry| match by_id.get(&entry.vessel_id) {
        Some(vessel) => vessel.has_active_route() && !vessel.matches_intent(&entry.intent),
        None => false,
    });
    match result {
        Ok(removed) => {
            if removed > 0 {
                info!(removed, "garbage-collected pending route settings");
            }
            removed
        }
        Err(e) => {
            warn!(error = %e, "failed to persist pending settings cleanup");
            0
        }
    }
}

/// Apply every pending intent whose vessel is in port and not moored.
pub async fn reconcile(api: &dyn GameApi, pending: &SharedPendingSettings, vessels: &[Vessel]) -> ReconcileReport {
    let mut report = ReconcileReport {
        collected: garbage_collect(pending, vessels),
        ..Default::default()
    };

    let by_id: HashMap<VesselId, &Vessel> = vessels.iter().map(|v| (v.id, v)).collect();
    let entries = pending.lock().entries();

    for entry in entries {
        let Some(vessel) = by_id.get(&entry.vessel_id) else {
            continue;
        };
        if !vessel.accepts_settings() {
            debug!(vessel = %entry.vessel_id, status = ?vessel.status, moored = vessel.moored, "pending settings wait");
            continue;
        }

        match api.update_route_settings(entry.vessel_id, &entry.intent).await {
            Ok(_) => {
                info!(vessel = %entry.vessel_id, speed = entry.intent.speed, guards = entry.intent.guards, "applied pending route settings");
                if let Err(e) = pending.lock().delete(entry.vessel_id) {
                    warn!(vessel = %entry.vessel_id, error = %e, "could not persist removal of applied settings");
                }
                report.applied += 1;
            }
            Err(e) => {
                warn!(vessel = %entry.vessel_id, error = %e, "failed to apply pending route settings");
                report.failed += 1;
            }
        }
    }

    report
}

/// Apply `intent` now if the vessel can take it, otherwise keep it for later.
pub async fn request_route_settings(
    api: &dyn GameApi,
    pending: &SharedPendingSettings,
    vessels: &[Vessel],
    id: VesselId,
    intent: RouteIntent,
) -> Result<RouteSettingsOutcome, SettingsRequestError> {
    let vessel = vessels
        .iter()
        .find(|v| v.id == id)
        .ok_or(SettingsRequestError::UnknownVessel(id))?;

    if vessel.accepts_settings() {
        api.update_route_settings(id, &intent).await?;
        // An older stored intent is superseded by this one.
        pending.lock().delete(id)?;
        info!(vessel = %id, speed = intent.speed, guards = intent.guards, "route settings applied");
        return Ok(RouteSettingsOutcome::Applied);
    }

    pending.lock().save(id, intent)?;
    Ok(RouteSettingsOutcome::Deferred)
}
