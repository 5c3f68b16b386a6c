use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VesselId(pub u64);

impl fmt::Display for VesselId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VesselStatus {
    Port,
    Enroute,
    Anchor,
    Maintenance,
    Drydock,
    Loading,
    Unloading,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityClass {
    Container,
    Tanker,
}

impl CapacityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityClass::Container => "container",
            CapacityClass::Tanker => "tanker",
        }
    }
}

/// Maximum load per cargo type. Containers use `dry`/`refrigerated`,
/// tankers use `fuel`/`crude_oil`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CargoCapacity {
    #[serde(default)]
    pub dry: u64,
    #[serde(default)]
    pub refrigerated: u64,
    #[serde(default)]
    pub fuel: u64,
    #[serde(default)]
    pub crude_oil: u64,
}

/// Per-cargo freight prices of a route. Absent fields are not applicable
/// to the vessel's class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutePrices {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refrigerated: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crude_oil: Option<f64>,
}

impl RoutePrices {
    /// Field-wise equality with a cent of tolerance.
    pub fn matches(&self, other: &RoutePrices) -> bool {
        fn same(a: Option<f64>, b: Option<f64>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => (a - b).abs() < 0.005,
                (None, None) => true,
                _ => false,
            }
        }
        same(self.dry, other.dry)
            && same(self.refrigerated, other.refrigerated)
            && same(self.fuel, other.fuel)
            && same(self.crude_oil, other.crude_oil)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselRoute {
    #[serde(default)]
    pub route_id: Option<u64>,
    pub origin: String,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub speed: u32,
    #[serde(default)]
    pub guards: u32,
    #[serde(default)]
    pub prices: RoutePrices,
    /// Piracy risk of this port pair in percent, when the roster carries it.
    #[serde(default)]
    pub hijacking_risk: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    pub id: VesselId,
    pub name: String,
    pub status: VesselStatus,
    #[serde(default)]
    pub moored: bool,
    #[serde(default)]
    pub route: Option<VesselRoute>,
    #[serde(rename = "capacity_type")]
    pub capacity_class: CapacityClass,
    #[serde(rename = "capacity_max", default)]
    pub capacity: CargoCapacity,
    #[serde(default = "default_factor")]
    pub fuel_factor: f64,
    #[serde(default = "default_factor")]
    pub co2_factor: f64,
    /// Fuel (tons) the service says the current route needs.
    #[serde(default)]
    pub fuel_required: Option<f64>,
}

fn default_factor() -> f64 {
    1.0
}

impl Vessel {
    pub fn total_capacity(&self) -> u64 {
        match self.capacity_class {
            CapacityClass::Container => self.capacity.dry + self.capacity.refrigerated,
            CapacityClass::Tanker => self.capacity.fuel + self.capacity.crude_oil,
        }
    }

    pub fn destination(&self) -> Option<&str> {
        self.route
            .as_ref()
            .and_then(|r| r.destination.as_deref())
            .filter(|d| !d.is_empty())
    }

    pub fn route_distance(&self) -> f64 {
        self.route.as_ref().map(|r| r.distance).unwrap_or(0.0)
    }

    pub fn route_speed(&self) -> u32 {
        self.route.as_ref().map(|r| r.speed).unwrap_or(0)
    }

    pub fn guards(&self) -> u32 {
        self.route.as_ref().map(|r| r.guards).unwrap_or(0)
    }

    /// This vessel as it sails once `intent` is applied. A reported fuel
    /// requirement belongs to the old speed and is dropped when speed changes.
    pub fn with_intent(&self, intent: &RouteIntent) -> Vessel {
        let mut planned = self.clone();
        if let Some(route) = planned.route.as_mut() {
            if route.speed != intent.speed {
                planned.fuel_required = None;
            }
            route.speed = intent.speed;
            route.guards = intent.guards;
            route.prices = intent.prices.clone();
        }
        planned
    }

    /// Docked and free to receive new route settings.
    pub fn accepts_settings(&self) -> bool {
        self.status == VesselStatus::Port && !self.moored
    }

    /// An active route means a destination and a positive distance.
    pub fn has_active_route(&self) -> bool {
        self.destination().is_some() && self.route_distance() > 0.0
    }

    /// In port, not moored, with somewhere to go.
    pub fn is_ready(&self) -> bool {
        self.accepts_settings() && self.has_active_route()
    }

    /// True when the live route already carries every value of `intent`.
    pub fn matches_intent(&self, intent: &RouteIntent) -> bool {
        match &self.route {
            Some(route) => {
                route.speed == intent.speed
                    && route.guards == intent.guards
                    && route.prices.matches(&intent.prices)
            }
            None => false,
        }
    }
}

/// Route settings a user wants on a vessel: speed, guard count and freight prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteIntent {
    pub speed: u32,
    pub guards: u32,
    #[serde(default)]
    pub prices: RoutePrices,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vessel(status: VesselStatus, moored: bool, destination: Option<&str>) -> Vessel {
        Vessel {
            id: VesselId(7),
            name: "Northern Star".into(),
            status,
            moored,
            route: Some(VesselRoute {
                route_id: Some(11),
                origin: "hamburg".into(),
                destination: destination.map(String::from),
                distance: 1200.0,
                speed: 14,
                guards: 0,
                prices: RoutePrices { dry: Some(520.0), refrigerated: Some(610.0), ..Default::default() },
                hijacking_risk: None,
            }),
            capacity_class: CapacityClass::Container,
            capacity: CargoCapacity { dry: 4000, refrigerated: 1000, ..Default::default() },
            fuel_factor: 1.0,
            co2_factor: 1.0,
            fuel_required: None,
        }
    }

    #[test]
    fn readiness_requires_unmoored_port_vessel_with_destination() {
        assert!(vessel(VesselStatus::Port, false, Some("rotterdam")).is_ready());
        assert!(!vessel(VesselStatus::Port, true, Some("rotterdam")).is_ready());
        assert!(!vessel(VesselStatus::Enroute, false, Some("rotterdam")).is_ready());
        assert!(!vessel(VesselStatus::Port, false, None).is_ready());
        assert!(!vessel(VesselStatus::Port, false, Some("")).is_ready());
    }

    #[test]
    fn intent_with_new_speed_drops_reported_fuel() {
        let mut v = vessel(VesselStatus::Port, false, Some("rotterdam"));
        v.fuel_required = Some(300.0);
        let faster = RouteIntent { speed: 20, guards: 2, prices: RoutePrices::default() };
        let planned = v.with_intent(&faster);
        assert_eq!((planned.route_speed(), planned.guards()), (20, 2));
        assert_eq!(planned.fuel_required, None);

        let same_speed = RouteIntent { speed: 14, guards: 1, prices: RoutePrices::default() };
        assert_eq!(v.with_intent(&same_speed).fuel_required, Some(300.0));
    }

    #[test]
    fn unknown_status_decodes_as_other() {
        let status: VesselStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, VesselStatus::Other);
    }

    #[test]
    fn intent_match_compares_every_field() {
        let v = vessel(VesselStatus::Port, false, Some("rotterdam"));
        let mut intent = RouteIntent {
            speed: 14,
            guards: 0,
            prices: RoutePrices { dry: Some(520.0), refrigerated: Some(610.0), ..Default::default() },
        };
        assert!(v.matches_intent(&intent));
        intent.prices.refrigerated = Some(615.0);
        assert!(!v.matches_intent(&intent));
        intent.prices.refrigerated = Some(610.0);
        intent.guards = 2;
        assert!(!v.matches_intent(&intent));
    }

    #[test]
    fn capacity_follows_class() {
        let mut v = vessel(VesselStatus::Port, false, Some("rotterdam"));
        assert_eq!(v.total_capacity(), 5000);
        v.capacity_class = CapacityClass::Tanker;
        v.capacity.fuel = 3000;
        v.capacity.crude_oil = 9000;
        assert_eq!(v.total_capacity(), 12000);
    }
}
