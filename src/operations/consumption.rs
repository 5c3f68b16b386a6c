// Per-vessel fuel and CO2 consumption estimates
use crate::models::Vessel;

/// Safety margin on fuel estimates.
pub const FUEL_MARGIN: f64 = 1.02;

/// Fuel in tons the vessel needs for its current route.
///
/// The service-reported requirement wins when present. Otherwise the estimate is
/// `capacity * distance * sqrt(speed) * fuel_factor / 40` kg.
pub fn fuel_needed(vessel: &Vessel) -> f64 {
    if let Some(required) = vessel.fuel_required.filter(|r| *r > 0.0) {
        return required * FUEL_MARGIN;
    }
    let capacity = vessel.total_capacity() as f64;
    let speed = vessel.route_speed() as f64;
    let kg = capacity * vessel.route_distance() * speed.sqrt() * vessel.fuel_factor / 40.0;
    kg / 1000.0 * FUEL_MARGIN
}

/// CO2 allowance in tons the vessel burns on its current route. No margin.
pub fn co2_needed(vessel: &Vessel) -> f64 {
    let capacity = vessel.total_capacity() as f64;
    (2.0 - capacity / 15000.0) * vessel.co2_factor * capacity * vessel.route_distance() / 1000.0
}

pub fn total_fuel_needed(vessels: &[Vessel]) -> f64 {
    vessels.iter().map(fuel_needed).sum()
}
