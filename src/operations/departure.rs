// Departure scheduler - dispatches ready vessels within the bunker budget
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::ResourceOracle;
use crate::config::{RebuyMode, Settings};
use crate::models::*;
use crate::notify::Notification;
use crate::operations::consumption::{co2_needed, fuel_needed};
use crate::operations::rebuy::{
    affordable, basic_price_ok, price_allows, space, PurchaseKind, Purchaser, RebuyEngine,
};
use crate::storage::SharedPendingSettings;

/// Buy/depart alternations per cycle.
pub const MAX_PHASE_ITERATIONS: usize = 3;
/// Successful departures per summary notification.
pub const SUMMARY_BATCH: usize = 10;
/// Extra fuel bought on top of a pre-flight shortfall.
pub const FUEL_HEADROOM_TONS: f64 = 50.0;
pub const DEFAULT_VESSEL_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    LowUtilization { utilization: f64, threshold: f64 },
    InsufficientFuel { needed: f64, available: f64 },
    /// An earlier departure ran the bunker dry
    FuelHalted,
    BunkerUnavailable,
    DepartFailed(String),
}

/// Outcome of one pass over the ready vessels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepartureRun {
    pub departed: Vec<VesselId>,
    pub skipped: Vec<(VesselId, SkipReason)>,
    pub income: f64,
    pub fuel_used: f64,
    pub co2_used: f64,
    pub fuel_bought: u64,
    pub co2_bought: u64,
    pub fuel_halted: bool,
}

impl DepartureRun {
    pub fn skip_reason(&self, id: VesselId) -> Option<&SkipReason> {
        self.skipped.iter().find(|(v, _)| *v == id).map(|(_, r)| r)
    }
}

#[derive(Debug, Default)]
struct SummaryBatch {
    departed: usize,
    income: f64,
    fuel_used: f64,
    co2_used: f64,
}

impl SummaryBatch {
    fn take(&mut self) -> Option<Notification> {
        if self.departed == 0 {
            return None;
        }
        let batch = std::mem::take(self);
        Some(Notification::DepartureSummary {
            departed: batch.departed,
            income: batch.income,
            fuel_used: batch.fuel_used,
            co2_used: batch.co2_used,
        })
    }
}

/// Ready vessels, cheapest first.
pub fn ready_by_fuel_need(vessels: &[Vessel]) -> Vec<Vessel> {
    let mut ready: Vec<Vessel> = vessels.iter().filter(|v| v.is_ready()).cloned().collect();
    ready.sort_by(|a, b| fuel_needed(a).total_cmp(&fuel_needed(b)));
    ready
}

/// Percentage of the vessel's capacity the destination can absorb, capped at 100.
pub fn utilization(available: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        return 100.0;
    }
    (available as f64 / capacity as f64 * 100.0).min(100.0)
}

pub struct DepartureScheduler<'a> {
    oracle: &'a ResourceOracle,
    purchaser: &'a Purchaser,
    pending: &'a SharedPendingSettings,
    settings: &'a Settings,
    vessel_delay: Duration,
}

impl<'a> DepartureScheduler<'a> {
    pub fn new(
        oracle: &'a ResourceOracle,
        purchaser: &'a Purchaser,
        pending: &'a SharedPendingSettings,
        settings: &'a Settings,
        vessel_delay: Duration,
    ) -> Self {
        Self {
            oracle,
            purchaser,
            pending,
            settings,
            vessel_delay,
        }
    }

    /// Dispatch every ready vessel in `vessels` the bunker can carry.
    ///
    /// Needs are computed for the route as it will be sailed, so a stored
    /// intent that changes speed is checked before the depart call applies it.
    pub async fn run(&self, vessels: &[Vessel]) -> DepartureRun {
        let ready = ready_by_fuel_need(&self.with_pending_intents(vessels));
        let mut run = DepartureRun::default();
        let mut batch = SummaryBatch::default();

        info!(ready = ready.len(), "departure pass starting");

        for (index, vessel) in ready.iter().enumerate() {
            if run.fuel_halted {
                run.skipped.push((vessel.id, SkipReason::FuelHalted));
                continue;
            }
            if index > 0 && !self.vessel_delay.is_zero() {
                tokio::time::sleep(self.vessel_delay).await;
            }

            if let Some(reason) = self.utilization_gate(vessel).await {
                info!(vessel = %vessel.id, name = %vessel.name, ?reason, "skipping vessel");
                run.skipped.push((vessel.id, reason));
                continue;
            }

            let fuel_need = fuel_needed(vessel);
            let bunker = match self.fuel_preflight(vessel, fuel_need, &mut run).await {
                Ok(bunker) => bunker,
                Err(reason) => {
                    info!(vessel = %vessel.id, name = %vessel.name, ?reason, "skipping vessel");
                    run.skipped.push((vessel.id, reason));
                    continue;
                }
            };

            let deficit = self.co2_preflight(vessel, &bunker, &mut run).await;

            match self
                .oracle
                .api()
                .depart_vessel(vessel.id, vessel.route_speed(), vessel.guards())
                .await
            {
                Ok(receipt) => {
                    info!(
                        vessel = %vessel.id,
                        name = %vessel.name,
                        income = receipt.income,
                        fuel_used = receipt.fuel_used,
                        co2_used = receipt.co2_used,
                        "departed"
                    );
                    run.departed.push(vessel.id);
                    run.income += receipt.income;
                    run.fuel_used += receipt.fuel_used;
                    run.co2_used += receipt.co2_used;
                    batch.departed += 1;
                    batch.income += receipt.income;
                    batch.fuel_used += receipt.fuel_used;
                    batch.co2_used += receipt.co2_used;

                    if deficit > 0.0 {
                        run.co2_bought += self.buy_back_co2(vessel.id, deficit).await;
                    }
                    if batch.departed >= SUMMARY_BATCH {
                        self.flush(&mut batch);
                    }
                }
                Err(e) if e.is_fuel_insufficient() => {
                    let remaining = ready.len() - index - 1;
                    warn!(vessel = %vessel.id, error = %e, remaining, "out of fuel, halting departures");
                    run.fuel_halted = true;
                    run.skipped.push((vessel.id, SkipReason::DepartFailed(e.to_string())));
                    self.purchaser
                        .notifier()
                        .notify(Notification::FuelHalted { remaining });
                }
                Err(e) => {
                    warn!(vessel = %vessel.id, error = %e, "departure failed");
                    run.skipped.push((vessel.id, SkipReason::DepartFailed(e.to_string())));
                    self.purchaser.notifier().notify(Notification::DepartureFailed {
                        vessel: vessel.id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.flush(&mut batch);

        if !run.departed.is_empty() {
            let engine = RebuyEngine::new(self.oracle, self.purchaser, self.settings);
            run.co2_bought += engine
                .top_up_co2_buffer(self.settings.departure.co2_buffer_tons)
                .await;
            run.fuel_bought += engine.fill_to_max(Commodity::Fuel).await;
            run.co2_bought += engine.fill_to_max(Commodity::Co2).await;
        }

        info!(
            departed = run.departed.len(),
            skipped = run.skipped.len(),
            income = run.income,
            "departure pass finished"
        );
        run
    }

    fn with_pending_intents(&self, vessels: &[Vessel]) -> Vec<Vessel> {
        let pending = self.pending.lock();
        vessels
            .iter()
            .map(|vessel| match pending.get(vessel.id) {
                Some(entry) => vessel.with_intent(&entry.intent),
                None => vessel.clone(),
            })
            .collect()
    }

    async fn utilization_gate(&self, vessel: &Vessel) -> Option<SkipReason> {
        let departure = &self.settings.departure;
        if !departure.min_utilization_enabled {
            return None;
        }
        let destination = vessel.destination()?;
        let Some(demand) = self.oracle.port_demand(destination).await else {
            debug!(vessel = %vessel.id, port = destination, "no demand data, letting vessel through");
            return None;
        };

        let utilization = utilization(demand.available_for(vessel.capacity_class), vessel.total_capacity());
        if utilization < departure.min_utilization_threshold {
            return Some(SkipReason::LowUtilization {
                utilization,
                threshold: departure.min_utilization_threshold,
            });
        }
        None
    }

    /// Make sure the bunker covers `needed`, topping up once if the price allows.
    async fn fuel_preflight(&self, vessel: &Vessel, needed: f64, run: &mut DepartureRun) -> Result<Bunker, SkipReason> {
        let bunker = self.oracle.bunker().await.ok_or(SkipReason::BunkerUnavailable)?;
        if bunker.fuel >= needed {
            return Ok(bunker);
        }

        let policy = &self.settings.fuel;
        if let Some(quote) = self.oracle.prices().await {
            let price = quote.fuel_price;
            if price_allows(policy, price) {
                let tons = ((needed - bunker.fuel + FUEL_HEADROOM_TONS).ceil() as u64)
                    .min(space(&bunker, Commodity::Fuel))
                    .min(affordable(bunker.cash, policy.min_cash, price));
                if tons > 0 {
                    debug!(vessel = %vessel.id, tons, price, "pre-flight fuel top-up");
                    run.fuel_bought += self
                        .purchaser
                        .buy(Commodity::Fuel, tons, price, PurchaseKind::Targeted)
                        .await
                        .tons();
                }
            }
        }

        let bunker = self.oracle.bunker().await.ok_or(SkipReason::BunkerUnavailable)?;
        if bunker.fuel < needed {
            return Err(SkipReason::InsufficientFuel {
                needed,
                available: bunker.fuel,
            });
        }
        Ok(bunker)
    }

    /// Top CO2 up for this departure when cheap enough. Returns the part of the
    /// need the bunker cannot hold, to be bought back after departure.
    async fn co2_preflight(&self, vessel: &Vessel, bunker: &Bunker, run: &mut DepartureRun) -> f64 {
        let needed = co2_needed(vessel);
        if bunker.co2 >= needed {
            return 0.0;
        }

        let policy = &self.settings.co2;
        if let Some(quote) = self.oracle.prices().await {
            let price = quote.co2_price;
            if basic_price_ok(policy, price) {
                let tons = ((needed - bunker.co2).ceil() as u64)
                    .min(space(bunker, Commodity::Co2))
                    .min(affordable(bunker.cash, policy.min_cash, price));
                if tons > 0 {
                    debug!(vessel = %vessel.id, tons, price, "pre-flight CO2 top-up");
                    run.co2_bought += self
                        .purchaser
                        .buy(Commodity::Co2, tons, price, PurchaseKind::Targeted)
                        .await
                        .tons();
                }
            }
        }

        (needed - bunker.max_co2).max(0.0)
    }

    async fn buy_back_co2(&self, id: VesselId, deficit: f64) -> u64 {
        let policy = &self.settings.co2;
        if policy.mode == RebuyMode::Off {
            return 0;
        }
        let (Some(bunker), Some(quote)) = (self.oracle.bunker().await, self.oracle.prices().await) else {
            warn!(vessel = %id, deficit, "CO2 buy-back skipped: bunker or prices unavailable");
            return 0;
        };
        let price = quote.co2_price;
        let tons = (deficit.ceil() as u64).min(affordable(bunker.cash, policy.min_cash, price));
        info!(vessel = %id, tons, deficit, "buying back CO2 deficit");
        self.purchaser
            .buy(Commodity::Co2, tons, price, PurchaseKind::Targeted)
            .await
            .tons()
    }

    fn flush(&self, batch: &mut SummaryBatch) {
        if let Some(notification) = batch.take() {
            self.purchaser.notifier().notify(notification);
        }
    }
}
