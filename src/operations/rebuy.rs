// Rebuy policy engine - when and how much fuel and CO2 to buy
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::{GameApi, ResourceOracle};
use crate::config::{RebuyMode, ResourcePolicy, Settings};
use crate::models::*;
use crate::notify::{Notification, Notifier};
use crate::operations::consumption::total_fuel_needed;
use crate::storage::PurchaseCooldown;

/// What a policy evaluation concluded for one commodity.
#[derive(Debug, Clone, PartialEq)]
pub enum RebuyDecision {
    Buy { tons: u64, rule: RebuyRule },
    Hold(HoldReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuyRule {
    Basic,
    Intelligent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    ModeOff,
    PriceTooHigh,
    BunkerFull,
    CashReserve,
    AboveLevel,
    TooFewVessels,
    NoShortfall,
    /// CO2 in intelligent mode only buys as a departure correction
    AwaitingDepartures,
}

/// Tons that fit into the bunker.
pub fn space(bunker: &Bunker, commodity: Commodity) -> u64 {
    let free = bunker.capacity(commodity) - bunker.level(commodity);
    if free <= 0.0 { 0 } else { free.ceil() as u64 }
}

/// Tons purchasable without dipping below `min_cash`.
pub fn affordable(cash: i64, min_cash: i64, price: f64) -> u64 {
    if price <= 0.0 || cash <= min_cash {
        return 0;
    }
    ((cash - min_cash) as f64 / price).floor() as u64
}

pub fn basic_amount(bunker: &Bunker, commodity: Commodity, price: f64, policy: &ResourcePolicy) -> u64 {
    space(bunker, commodity).min(affordable(bunker.cash, policy.min_cash, price))
}

pub fn basic_price_ok(policy: &ResourcePolicy, price: f64) -> bool {
    policy.mode != RebuyMode::Off && price <= policy.price_threshold
}

pub fn intelligent_price_ok(policy: &ResourcePolicy, price: f64) -> bool {
    policy.mode == RebuyMode::Intelligent && price <= policy.intelligent_max_price
}

/// Price gate for targeted top-ups: the basic condition, or the intelligent
/// one when that mode is active.
pub fn price_allows(policy: &ResourcePolicy, price: f64) -> bool {
    basic_price_ok(policy, price) || intelligent_price_ok(policy, price)
}

fn basic_decision(bunker: &Bunker, commodity: Commodity, price: f64, policy: &ResourcePolicy) -> RebuyDecision {
    if space(bunker, commodity) == 0 {
        return RebuyDecision::Hold(HoldReason::BunkerFull);
    }
    match basic_amount(bunker, commodity, price, policy) {
        0 => RebuyDecision::Hold(HoldReason::CashReserve),
        tons => RebuyDecision::Buy { tons, rule: RebuyRule::Basic },
    }
}

/// Fuel policy. `ready` are the vessels about to depart, `in_port` counts
/// every vessel currently in port.
pub fn decide_fuel(
    policy: &ResourcePolicy,
    bunker: &Bunker,
    price: f64,
    ready: &[Vessel],
    in_port: usize,
) -> RebuyDecision {
    if policy.mode == RebuyMode::Off {
        return RebuyDecision::Hold(HoldReason::ModeOff);
    }
    if basic_price_ok(policy, price) {
        return basic_decision(bunker, Commodity::Fuel, price, policy);
    }
    if policy.mode != RebuyMode::Intelligent || price > policy.intelligent_max_price {
        return RebuyDecision::Hold(HoldReason::PriceTooHigh);
    }
    if policy.intelligent_below_enabled && bunker.fuel >= policy.intelligent_below {
        return RebuyDecision::Hold(HoldReason::AboveLevel);
    }
    if policy.intelligent_ships_enabled && in_port < policy.intelligent_ships {
        return RebuyDecision::Hold(HoldReason::TooFewVessels);
    }

    let shortfall = total_fuel_needed(ready).ceil() - bunker.fuel;
    if shortfall <= 0.0 {
        return RebuyDecision::Hold(HoldReason::NoShortfall);
    }
    let tons = (shortfall.ceil() as u64)
        .min(space(bunker, Commodity::Fuel))
        .min(affordable(bunker.cash, policy.min_cash, price));
    if tons == 0 {
        return RebuyDecision::Hold(HoldReason::CashReserve);
    }
    RebuyDecision::Buy { tons, rule: RebuyRule::Intelligent }
}

pub fn decide_co2(policy: &ResourcePolicy, bunker: &Bunker, price: f64) -> RebuyDecision {
    match policy.mode {
        RebuyMode::Off => RebuyDecision::Hold(HoldReason::ModeOff),
        _ if basic_price_ok(policy, price) => basic_decision(bunker, Commodity::Co2, price, policy),
        RebuyMode::Intelligent => RebuyDecision::Hold(HoldReason::AwaitingDepartures),
        RebuyMode::Basic => RebuyDecision::Hold(HoldReason::PriceTooHigh),
    }
}

/// Whether a purchase goes through the per-commodity debounce.
///
/// Only policy passes are debounced. Targeted purchases are an intentional
/// exception to "every purchase is guarded": a top-up or buy-back tied to one
/// departure must not be dropped because a policy buy landed a moment
/// earlier. They still restart the window, so a policy pass right after one
/// is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseKind {
    /// Triggered by a policy pass; dropped while the cooldown is open
    Policy,
    /// A top-up or correction for a specific departure; always placed
    Targeted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    Bought(u64),
    Cooldown,
    Failed,
}

impl PurchaseOutcome {
    pub fn tons(&self) -> u64 {
        match self {
            PurchaseOutcome::Bought(tons) => *tons,
            _ => 0,
        }
    }
}

/// Places purchases and reports them.
pub struct Purchaser {
    api: Arc<dyn GameApi>,
    cooldown: Arc<PurchaseCooldown>,
    notifier: Arc<dyn Notifier>,
}

impl Purchaser {
    pub fn new(api: Arc<dyn GameApi>, cooldown: Arc<PurchaseCooldown>, notifier: Arc<dyn Notifier>) -> Self {
        Self { api, cooldown, notifier }
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub async fn buy(&self, commodity: Commodity, tons: u64, price: f64, kind: PurchaseKind) -> PurchaseOutcome {
        if tons == 0 {
            return PurchaseOutcome::Bought(0);
        }
        match kind {
            PurchaseKind::Policy => {
                if !self.cooldown.try_acquire(commodity) {
                    info!(%commodity, tons, "purchase skipped: cooldown");
                    return PurchaseOutcome::Cooldown;
                }
            }
            PurchaseKind::Targeted => self.cooldown.record(commodity),
        }

        match self.api.purchase(commodity, tons).await {
            Ok(bunker) => {
                info!(%commodity, tons, price, level = bunker.level(commodity), "purchase complete");
                self.notifier.notify(Notification::Purchased {
                    commodity,
                    tons,
                    price,
                    cost: tons as f64 * price,
                });
                PurchaseOutcome::Bought(tons)
            }
            Err(e) => {
                warn!(%commodity, tons, error = %e, "purchase failed");
                self.notifier.notify(Notification::PurchaseFailed {
                    commodity,
                    reason: e.to_string(),
                });
                PurchaseOutcome::Failed
            }
        }
    }
}

/// Policy passes over the bunker, each on a fresh snapshot.
pub struct RebuyEngine<'a> {
    oracle: &'a ResourceOracle,
    purchaser: &'a Purchaser,
    settings: &'a Settings,
}

impl<'a> RebuyEngine<'a> {
    pub fn new(oracle: &'a ResourceOracle, purchaser: &'a Purchaser, settings: &'a Settings) -> Self {
        Self { oracle, purchaser, settings }
    }

    /// One rebuy pass for `commodity`. Returns the tons bought.
    pub async fn rebuy(&self, commodity: Commodity, vessels: &[Vessel]) -> u64 {
        let policy = self.settings.policy(commodity);
        if policy.mode == RebuyMode::Off {
            return 0;
        }
        let (Some(bunker), Some(quote)) = (self.oracle.bunker().await, self.oracle.prices().await) else {
            warn!(%commodity, "rebuy skipped: bunker or prices unavailable");
            return 0;
        };
        let price = quote.price(commodity);

        let decision = match commodity {
            Commodity::Fuel => {
                let ready: Vec<Vessel> = vessels.iter().filter(|v| v.is_ready()).cloned().collect();
                let in_port = vessels.iter().filter(|v| v.status == VesselStatus::Port).count();
                decide_fuel(policy, &bunker, price, &ready, in_port)
            }
            Commodity::Co2 => decide_co2(policy, &bunker, price),
        };

        match decision {
            RebuyDecision::Buy { tons, rule } => {
                info!(%commodity, tons, price, ?rule, "rebuy");
                self.purchaser.buy(commodity, tons, price, PurchaseKind::Policy).await.tons()
            }
            RebuyDecision::Hold(reason) => {
                debug!(%commodity, price, ?reason, "no rebuy");
                0
            }
        }
    }

    /// Fill to capacity while the price still satisfies the basic threshold.
    pub async fn fill_to_max(&self, commodity: Commodity) -> u64 {
        let policy = self.settings.policy(commodity);
        if policy.mode == RebuyMode::Off {
            return 0;
        }
        let (Some(bunker), Some(quote)) = (self.oracle.bunker().await, self.oracle.prices().await) else {
            return 0;
        };
        let price = quote.price(commodity);
        if !basic_price_ok(policy, price) {
            return 0;
        }
        let tons = basic_amount(&bunker, commodity, price, policy);
        if tons == 0 {
            return 0;
        }
        info!(%commodity, tons, price, "final fill");
        self.purchaser.buy(commodity, tons, price, PurchaseKind::Policy).await.tons()
    }

    /// Bring the CO2 balance back up to `buffer` tons after departures.
    ///
    /// Intelligent mode only, and only while the price passes the intelligent
    /// condition. Without `avoid_negative_co2` the top-up waits until the
    /// balance has gone negative; with it, any balance below the buffer
    /// triggers one.
    pub async fn top_up_co2_buffer(&self, buffer: f64) -> u64 {
        let policy = &self.settings.co2;
        if policy.mode != RebuyMode::Intelligent {
            return 0;
        }
        let Some(bunker) = self.oracle.bunker().await else {
            return 0;
        };
        let trigger = if self.settings.departure.avoid_negative_co2 { buffer } else { 0.0 };
        if bunker.co2 >= trigger {
            return 0;
        }
        let Some(quote) = self.oracle.prices().await else {
            return 0;
        };
        let price = quote.co2_price;
        if !intelligent_price_ok(policy, price) {
            debug!(co2 = bunker.co2, price, "CO2 below buffer, price above intelligent maximum");
            return 0;
        }

        let tons = ((buffer - bunker.co2).ceil() as u64)
            .min(space(&bunker, Commodity::Co2))
            .min(affordable(bunker.cash, policy.min_cash, price));
        if tons == 0 {
            return 0;
        }
        info!(tons, price, co2 = bunker.co2, buffer, "restoring CO2 buffer");
        self.purchaser.buy(Commodity::Co2, tons, price, PurchaseKind::Targeted).await.tons()
    }
}
