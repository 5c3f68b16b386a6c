// Controller - periodic bunker and departure cycle orchestration
use chrono::Utc;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::cache::{AutoPriceCache, HijackingRiskCache};
use crate::client::{hooks, GameApi, HttpGameApi, ResourceOracle, RetryPolicy};
use crate::config::{AutopilotConfig, ConfigManager, Settings, TimingConfig};
use crate::error::{SettingsRequestError, SetupError};
use crate::models::*;
use crate::notify::{LogNotifier, Notifier};
use crate::operations::{
    self, DepartureScheduler, Purchaser, RebuyEngine, RouteSettingsOutcome, MAX_PHASE_ITERATIONS,
};
use crate::storage::{
    CompanionMirror, CycleMarker, PendingSettingsStore, PurchaseCooldown, SharedPendingSettings,
    CYCLE_MARKER_FILE, PENDING_SETTINGS_FILE,
};

/// Everything the controller talks to, injected so tests can swap any of it.
pub struct Collaborators {
    pub api: Arc<dyn GameApi>,
    pub pending: SharedPendingSettings,
    pub auto_prices: Arc<AutoPriceCache>,
    pub risk: Arc<HijackingRiskCache>,
    pub notifier: Arc<dyn Notifier>,
    pub marker: Arc<CycleMarker>,
}

impl Collaborators {
    /// In-memory stores and caches around `api`, logging notifications.
    pub fn in_memory(api: Arc<dyn GameApi>) -> Self {
        Self {
            api,
            pending: PendingSettingsStore::in_memory().shared(),
            auto_prices: Arc::new(AutoPriceCache::default()),
            risk: Arc::new(HijackingRiskCache::new()),
            notifier: Arc::new(LogNotifier),
            marker: Arc::new(CycleMarker::in_memory()),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub vessels_seen: usize,
    pub pending_applied: usize,
    pub pending_collected: usize,
    pub fuel_bought: u64,
    pub co2_bought: u64,
    pub departed: Vec<VesselId>,
    pub skipped: usize,
    pub income: f64,
    pub iterations: usize,
    pub fuel_halted: bool,
}

pub struct Controller {
    api: Arc<dyn GameApi>,
    oracle: Arc<ResourceOracle>,
    purchaser: Purchaser,
    pending: SharedPendingSettings,
    auto_prices: Arc<AutoPriceCache>,
    marker: Arc<CycleMarker>,
    settings: RwLock<Settings>,
    timing: TimingConfig,
    running: AtomicBool,
}

/// Clears the single-flight flag however the cycle ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Controller {
    pub fn new(collab: Collaborators, settings: Settings, timing: TimingConfig, retry: RetryPolicy) -> Self {
        let api = hooks::layer(collab.api, collab.pending.clone(), collab.risk);
        let oracle = Arc::new(ResourceOracle::new(api.clone(), retry));
        let purchaser = Purchaser::new(api.clone(), Arc::new(PurchaseCooldown::default()), collab.notifier);

        Self {
            api,
            oracle,
            purchaser,
            pending: collab.pending,
            auto_prices: collab.auto_prices,
            marker: collab.marker,
            settings: RwLock::new(settings),
            timing,
            running: AtomicBool::new(false),
        }
    }

    /// Build the production controller: HTTP client, on-disk stores, log notifications.
    pub fn from_config(config: &AutopilotConfig) -> Result<Self, SetupError> {
        let token = config.api.load_token()?;
        let api = HttpGameApi::new(
            &config.api.base_url,
            &token,
            Duration::from_secs(config.api.request_timeout_seconds),
        )?;

        let data_dir = &config.storage.data_dir;
        let mirror = CompanionMirror::new(config.storage.companion_dir.clone());
        let collab = Collaborators {
            api: Arc::new(api),
            pending: PendingSettingsStore::new(data_dir.join(PENDING_SETTINGS_FILE), mirror.clone()).shared(),
            auto_prices: Arc::new(AutoPriceCache::default()),
            risk: Arc::new(HijackingRiskCache::new()),
            notifier: Arc::new(LogNotifier),
            marker: Arc::new(CycleMarker::new(data_dir.join(CYCLE_MARKER_FILE), mirror)),
        };

        Ok(Self::new(
            collab,
            config.policy.clone(),
            config.timing.clone(),
            config.api.retry_policy(),
        ))
    }

    pub fn oracle(&self) -> &ResourceOracle {
        &self.oracle
    }

    pub fn pending(&self) -> &SharedPendingSettings {
        &self.pending
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn replace_settings(&self, settings: Settings) {
        *self.settings.write() = settings;
        info!("settings replaced");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// One full cycle. Returns `None` when another cycle is still running.
    pub async fn run_cycle(&self) -> Option<CycleReport> {
        if self.running.swap(true, Ordering::AcqRel) {
            info!("cycle already running, trigger dropped");
            return None;
        }
        let _guard = CycleGuard(&self.running);

        let settings = self.settings();
        let mut report = CycleReport::default();
        let engine = RebuyEngine::new(&self.oracle, &self.purchaser, &settings);

        // Without a roster only the rebuy passes have their data
        let Some(mut vessels) = self.oracle.vessels().await else {
            warn!("fleet roster unavailable, running rebuy only");
            report.iterations = 1;
            report.fuel_bought = engine.rebuy(Commodity::Fuel, &[]).await;
            report.co2_bought = engine.rebuy(Commodity::Co2, &[]).await;
            self.mark_cycle();
            return Some(report);
        };
        report.vessels_seen = vessels.len();

        let reconciled = operations::reconcile(self.api.as_ref(), &self.pending, &vessels).await;
        report.pending_applied = reconciled.applied;
        report.pending_collected = reconciled.collected;

        self.spawn_auto_price_refresh(vessels.clone());

        let scheduler = DepartureScheduler::new(
            &self.oracle,
            &self.purchaser,
            &self.pending,
            &settings,
            Duration::from_millis(self.timing.vessel_delay_ms),
        );

        for iteration in 0..MAX_PHASE_ITERATIONS {
            if iteration > 0 {
                match self.oracle.vessels().await {
                    Some(fresh) => vessels = fresh,
                    None => break,
                }
                if !vessels.iter().any(|v| v.is_ready()) {
                    break;
                }
            }
            report.iterations += 1;

            report.fuel_bought += engine.rebuy(Commodity::Fuel, &vessels).await;
            report.co2_bought += engine.rebuy(Commodity::Co2, &vessels).await;

            if !settings.departure.auto_depart_enabled {
                break;
            }

            let run = scheduler.run(&vessels).await;
            report.fuel_bought += run.fuel_bought;
            report.co2_bought += run.co2_bought;
            report.skipped += run.skipped.len();
            report.income += run.income;
            let departed_any = !run.departed.is_empty();
            report.departed.extend(run.departed);

            if run.fuel_halted {
                report.fuel_halted = true;
                break;
            }
            if !departed_any {
                break;
            }
        }

        self.mark_cycle();
        info!(
            vessels = report.vessels_seen,
            departed = report.departed.len(),
            fuel_bought = report.fuel_bought,
            co2_bought = report.co2_bought,
            income = report.income,
            iterations = report.iterations,
            "cycle complete"
        );
        Some(report)
    }

    /// Run cycles on the configured interval until `shutdown` resolves.
    ///
    /// The catch-up cycle and every tick run as spawned tasks, so shutdown is
    /// seen immediately and a tick that lands while a cycle is still running
    /// is dropped by the single-flight guard.
    pub async fn run_forever<F>(self: Arc<Self>, mut config: Option<ConfigManager>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let period = Duration::from_secs(self.timing.cycle_interval_seconds.max(1));
        let catch_up = chrono::Duration::seconds(self.timing.catch_up_threshold_seconds as i64);

        if self.marker.needs_catch_up(Utc::now(), catch_up) {
            info!(last_cycle = ?self.marker.last_cycle(), "missed interval, running catch-up cycle");
            self.spawn_cycle();
        }

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(interval_s = period.as_secs(), "autopilot running");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    if let Some(manager) = config.as_mut() {
                        if manager.check_and_reload() {
                            self.replace_settings(manager.config().policy.clone());
                        }
                    }
                    self.spawn_cycle();
                }
            }
        }
    }

    fn spawn_cycle(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.run_cycle().await;
        });
    }

    /// Apply route settings now, or store them until the vessel is back in port.
    pub async fn request_route_settings(
        &self,
        id: VesselId,
        intent: RouteIntent,
    ) -> Result<RouteSettingsOutcome, SettingsRequestError> {
        let vessels = self
            .oracle
            .vessels()
            .await
            .ok_or(SettingsRequestError::RosterUnavailable)?;
        operations::request_route_settings(self.api.as_ref(), &self.pending, &vessels, id, intent).await
    }

    fn spawn_auto_price_refresh(&self, vessels: Vec<Vessel>) {
        let cache = Arc::clone(&self.auto_prices);
        let oracle = Arc::clone(&self.oracle);
        tokio::spawn(async move {
            cache.refresh(&oracle, &vessels).await;
        });
    }

    fn mark_cycle(&self) {
        if let Err(e) = self.marker.store(Utc::now()) {
            error!(error = %e, "failed to persist last cycle time");
        }
    }
}
