// Shared test fixtures: an in-memory game implementing GameApi
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use fleet_autopilot::client::RetryPolicy;
use fleet_autopilot::config::TimingConfig;
use fleet_autopilot::models::*;
use fleet_autopilot::notify::{Notification, Notifier};
use fleet_autopilot::operations::co2_needed;
use fleet_autopilot::{ApiError, GameApi};

pub const INCOME_PER_DEPARTURE: f64 = 10_000.0;

struct GameState {
    bunker: Bunker,
    fuel_price: f64,
    co2_price: f64,
    vessels: Vec<Vessel>,
    demand: HashMap<String, u64>,
    purchases: Vec<(Commodity, u64)>,
    departures: Vec<(VesselId, u32, u32)>,
    route_updates: Vec<(VesselId, RouteIntent)>,
    depart_rejections: HashMap<VesselId, String>,
    vessel_failures: VecDeque<ApiError>,
    vessel_calls: usize,
    auto_price_calls: usize,
    auto_price_in_flight: usize,
    auto_price_peak: usize,
}

/// In-memory game. Departures burn the vessel's reported fuel requirement and
/// its CO2 estimate; purchases add to the bunker and charge cash.
pub struct FakeGame {
    state: Mutex<GameState>,
    vessel_gate: Mutex<Option<Arc<Notify>>>,
    auto_price_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeGame {
    pub fn new(bunker: Bunker, fuel_price: f64, co2_price: f64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(GameState {
                bunker,
                fuel_price,
                co2_price,
                vessels: Vec::new(),
                demand: HashMap::new(),
                purchases: Vec::new(),
                departures: Vec::new(),
                route_updates: Vec::new(),
                depart_rejections: HashMap::new(),
                vessel_failures: VecDeque::new(),
                vessel_calls: 0,
                auto_price_calls: 0,
                auto_price_in_flight: 0,
                auto_price_peak: 0,
            }),
            vessel_gate: Mutex::new(None),
            auto_price_gate: Mutex::new(None),
        })
    }

    pub fn add_vessel(&self, vessel: Vessel) {
        self.state.lock().vessels.push(vessel);
    }

    pub fn set_status(&self, id: VesselId, status: VesselStatus, moored: bool) {
        let mut state = self.state.lock();
        if let Some(v) = state.vessels.iter_mut().find(|v| v.id == id) {
            v.status = status;
            v.moored = moored;
        }
    }

    pub fn remove_vessel(&self, id: VesselId) {
        self.state.lock().vessels.retain(|v| v.id != id);
    }

    pub fn set_demand(&self, port: &str, available: u64) {
        self.state.lock().demand.insert(port.to_string(), available);
    }

    pub fn reject_departure(&self, id: VesselId, message: &str) {
        self.state.lock().depart_rejections.insert(id, message.to_string());
    }

    /// The next roster requests fail with `errors`, in order.
    pub fn fail_vessel_requests(&self, errors: Vec<ApiError>) {
        self.state.lock().vessel_failures.extend(errors);
    }

    /// Hold every roster request until `release_vessels` is called.
    pub fn gate_vessels(&self) {
        *self.vessel_gate.lock() = Some(Arc::new(Notify::new()));
    }

    pub fn release_vessels(&self) {
        if let Some(gate) = self.vessel_gate.lock().take() {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    /// Hold every auto-price request until `release_auto_prices` is called.
    pub fn gate_auto_prices(&self) {
        *self.auto_price_gate.lock() = Some(Arc::new(Notify::new()));
    }

    pub fn release_auto_prices(&self) {
        if let Some(gate) = self.auto_price_gate.lock().take() {
            gate.notify_waiters();
        }
    }

    pub fn bunker(&self) -> Bunker {
        self.state.lock().bunker.clone()
    }

    pub fn purchases(&self) -> Vec<(Commodity, u64)> {
        self.state.lock().purchases.clone()
    }

    pub fn departures(&self) -> Vec<(VesselId, u32, u32)> {
        self.state.lock().departures.clone()
    }

    pub fn departed_ids(&self) -> Vec<VesselId> {
        self.state.lock().departures.iter().map(|(id, _, _)| *id).collect()
    }

    pub fn route_updates(&self) -> Vec<(VesselId, RouteIntent)> {
        self.state.lock().route_updates.clone()
    }

    pub fn vessel_calls(&self) -> usize {
        self.state.lock().vessel_calls
    }

    pub fn auto_price_calls(&self) -> usize {
        self.state.lock().auto_price_calls
    }

    /// Most auto-price requests seen in flight at once.
    pub fn auto_price_peak(&self) -> usize {
        self.state.lock().auto_price_peak
    }

    pub fn vessel(&self, id: VesselId) -> Option<Vessel> {
        self.state.lock().vessels.iter().find(|v| v.id == id).cloned()
    }
}

fn rejected(message: &str) -> ApiError {
    ApiError::Rejected(message.to_string())
}

#[async_trait]
impl GameApi for FakeGame {
    async fn get_bunker(&self) -> Result<Bunker, ApiError> {
        Ok(self.state.lock().bunker.clone())
    }

    async fn get_price_table(&self) -> Result<PriceTable, ApiError> {
        let state = self.state.lock();
        let prices = (0..48)
            .map(|slot| PriceSlot {
                time: format!("{:02}:{:02}", slot / 2, (slot % 2) * 30),
                fuel_price: state.fuel_price,
                co2_price: state.co2_price,
            })
            .collect();
        Ok(PriceTable {
            prices,
            discounted_fuel: None,
            discounted_co2: None,
        })
    }

    async fn purchase(&self, commodity: Commodity, tons: u64) -> Result<Bunker, ApiError> {
        let mut state = self.state.lock();
        let price = match commodity {
            Commodity::Fuel => state.fuel_price,
            Commodity::Co2 => state.co2_price,
        };
        let cost = (tons as f64 * price).round() as i64;
        if cost > state.bunker.cash {
            return Err(rejected("not enough cash"));
        }
        state.bunker.cash -= cost;
        match commodity {
            Commodity::Fuel => state.bunker.fuel += tons as f64,
            Commodity::Co2 => state.bunker.co2 += tons as f64,
        }
        state.purchases.push((commodity, tons));
        Ok(state.bunker.clone())
    }

    async fn get_vessels(&self) -> Result<Vec<Vessel>, ApiError> {
        let gate = self.vessel_gate.lock().clone();
        {
            let mut state = self.state.lock();
            state.vessel_calls += 1;
            if let Some(error) = state.vessel_failures.pop_front() {
                return Err(error);
            }
        }
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self.state.lock().vessels.clone())
    }

    async fn depart_vessel(&self, id: VesselId, speed: u32, guards: u32) -> Result<DepartureReceipt, ApiError> {
        let mut state = self.state.lock();
        if let Some(message) = state.depart_rejections.get(&id).cloned() {
            return Err(rejected(&message));
        }
        let vessel = state
            .vessels
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or_else(|| rejected("unknown vessel"))?;
        if !vessel.is_ready() {
            return Err(rejected("vessel is not ready to depart"));
        }
        let fuel_used = vessel.fuel_required.unwrap_or(0.0);
        if state.bunker.fuel < fuel_used {
            return Err(rejected("Not enough fuel in bunker"));
        }
        let co2_used = co2_needed(&vessel);

        state.bunker.fuel -= fuel_used;
        state.bunker.co2 -= co2_used;
        state.bunker.cash += INCOME_PER_DEPARTURE as i64;
        if let Some(v) = state.vessels.iter_mut().find(|v| v.id == id) {
            v.status = VesselStatus::Enroute;
        }
        state.departures.push((id, speed, guards));

        Ok(DepartureReceipt {
            income: INCOME_PER_DEPARTURE,
            harbor_fee: 0.0,
            fuel_used,
            co2_used,
        })
    }

    async fn update_route_settings(&self, id: VesselId, intent: &RouteIntent) -> Result<Vessel, ApiError> {
        let mut state = self.state.lock();
        let vessel = state
            .vessels
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| rejected("unknown vessel"))?;
        if !vessel.accepts_settings() {
            return Err(rejected("vessel must be in port"));
        }
        if let Some(route) = vessel.route.as_mut() {
            route.speed = intent.speed;
            route.guards = intent.guards;
            route.prices = intent.prices.clone();
        }
        let updated = vessel.clone();
        state.route_updates.push((id, intent.clone()));
        Ok(updated)
    }

    async fn get_port_demand(&self, port: &str) -> Result<PortDemand, ApiError> {
        let state = self.state.lock();
        let available = state.demand.get(port).copied().ok_or_else(|| ApiError::Status {
            status: 404,
            body: "unknown port".into(),
        })?;
        Ok(PortDemand {
            code: port.to_string(),
            dry: CargoDemand {
                demand: available,
                consumed: 0,
            },
            ..Default::default()
        })
    }

    async fn get_auto_price(&self, route_id: u64, _class: CapacityClass) -> Result<RoutePrices, ApiError> {
        let gate = self.auto_price_gate.lock().clone();
        {
            let mut state = self.state.lock();
            state.auto_price_calls += 1;
            state.auto_price_in_flight += 1;
            state.auto_price_peak = state.auto_price_peak.max(state.auto_price_in_flight);
        }
        // Stay pending for at least one poll so concurrent requests overlap
        match gate {
            Some(gate) => gate.notified().await,
            None => tokio::task::yield_now().await,
        }
        self.state.lock().auto_price_in_flight -= 1;
        Ok(RoutePrices {
            dry: Some(route_id as f64),
            ..Default::default()
        })
    }
}

/// Collects notifications for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }

    pub fn summaries(&self) -> Vec<usize> {
        self.seen
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::DepartureSummary { departed, .. } => Some(*departed),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}

pub fn bunker(fuel: f64, co2: f64, cash: i64) -> Bunker {
    Bunker {
        fuel,
        co2,
        cash,
        max_fuel: 1000.0,
        max_co2: 1000.0,
    }
}

/// Container vessel in port with a 100-unit route to `destination`.
/// CO2 need is 1.5 * 7500 * 100 / 1000 = 1125t at capacity 7500.
pub fn vessel(id: u64, fuel_required: f64, capacity: u64) -> Vessel {
    Vessel {
        id: VesselId(id),
        name: format!("Vessel {}", id),
        status: VesselStatus::Port,
        moored: false,
        route: Some(VesselRoute {
            route_id: Some(id),
            origin: "hamburg".into(),
            destination: Some("rotterdam".into()),
            distance: 100.0,
            speed: 10,
            guards: 0,
            prices: RoutePrices::default(),
            hijacking_risk: Some(2.5),
        }),
        capacity_class: CapacityClass::Container,
        capacity: CargoCapacity {
            dry: capacity,
            ..Default::default()
        },
        fuel_factor: 1.0,
        co2_factor: 1.0,
        fuel_required: Some(fuel_required),
    }
}

pub fn no_delay_timing() -> TimingConfig {
    TimingConfig {
        vessel_delay_ms: 0,
        ..TimingConfig::default()
    }
}

pub fn instant_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        backoff: Duration::ZERO,
    }
}
