// Notifications surfaced to the operator (or a companion UI) after purchases
// and departure batches.
use std::fmt;
use tracing::{info, warn};

use crate::models::{Commodity, VesselId};

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Purchased {
        commodity: Commodity,
        tons: u64,
        price: f64,
        cost: f64,
    },
    PurchaseFailed {
        commodity: Commodity,
        reason: String,
    },
    /// Running totals for a batch of successful departures
    DepartureSummary {
        departed: usize,
        income: f64,
        fuel_used: f64,
        co2_used: f64,
    },
    DepartureFailed {
        vessel: VesselId,
        reason: String,
    },
    /// The bunker ran dry mid-loop; no more departures this cycle
    FuelHalted {
        remaining: usize,
    },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Purchased { commodity, tons, price, cost } => {
                write!(f, "⛽ Bought {}t {} at ${:.0}/t (${:.0})", tons, commodity, price, cost)
            }
            Notification::PurchaseFailed { commodity, reason } => {
                write!(f, "❌ {} purchase failed: {}", commodity, reason)
            }
            Notification::DepartureSummary { departed, income, fuel_used, co2_used } => write!(
                f,
                "🚢 {} vessel(s) departed: income ${:.0}, fuel {:.1}t, CO2 {:.1}t",
                departed, income, fuel_used, co2_used
            ),
            Notification::DepartureFailed { vessel, reason } => {
                write!(f, "⚠️ Vessel {} failed to depart: {}", vessel, reason)
            }
            Notification::FuelHalted { remaining } => {
                write!(f, "🛑 Out of fuel, {} vessel(s) left in port", remaining)
            }
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::PurchaseFailed { .. }
            | Notification::DepartureFailed { .. }
            | Notification::FuelHalted { .. } => warn!("{}", notification),
            _ => info!("{}", notification),
        }
    }
}
