use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::models::Commodity;
use crate::storage::CompanionMirror;

/// Name of the policy document handed to the companion process.
pub const SETTINGS_MIRROR_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutopilotConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub policy: Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// File holding the session token
    pub token_file: PathBuf,
    pub request_timeout_seconds: u64,
    /// Attempts per read before giving up for this cycle
    pub retry_attempts: u32,
    /// Linear backoff step between attempts
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub cycle_interval_seconds: u64,
    /// A gap longer than this since the last cycle triggers an immediate one on start
    pub catch_up_threshold_seconds: u64,
    /// Pause between two departures
    pub vessel_delay_ms: u64,
    pub config_reload_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Directory a companion process reads; mirroring is off when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub companion_dir: Option<PathBuf>,
}

/// Purchase policy for one commodity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuyMode {
    Off,
    Basic,
    Intelligent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourcePolicy {
    pub mode: RebuyMode,
    /// Fill to capacity at or below this price
    pub price_threshold: f64,
    /// Cash that purchases never touch
    pub min_cash: i64,
    pub intelligent_max_price: f64,
    pub intelligent_below_enabled: bool,
    /// Only buy intelligently while the bunker holds less than this (tons)
    pub intelligent_below: f64,
    pub intelligent_ships_enabled: bool,
    /// Only buy intelligently with at least this many vessels in port
    pub intelligent_ships: usize,
}

impl ResourcePolicy {
    pub fn fuel_defaults() -> Self {
        Self {
            mode: RebuyMode::Off,
            price_threshold: 500.0,
            min_cash: 1_000_000,
            intelligent_max_price: 600.0,
            intelligent_below_enabled: false,
            intelligent_below: 500.0,
            intelligent_ships_enabled: false,
            intelligent_ships: 5,
        }
    }

    pub fn co2_defaults() -> Self {
        Self {
            price_threshold: 10.0,
            intelligent_max_price: 12.0,
            ..Self::fuel_defaults()
        }
    }
}

/// A policy section as written in the file. Missing keys fall back to the
/// commodity's own defaults.
#[derive(Deserialize)]
struct PolicyOverrides {
    mode: Option<RebuyMode>,
    price_threshold: Option<f64>,
    min_cash: Option<i64>,
    intelligent_max_price: Option<f64>,
    intelligent_below_enabled: Option<bool>,
    intelligent_below: Option<f64>,
    intelligent_ships_enabled: Option<bool>,
    intelligent_ships: Option<usize>,
}

impl PolicyOverrides {
    fn over(self, base: ResourcePolicy) -> ResourcePolicy {
        ResourcePolicy {
            mode: self.mode.unwrap_or(base.mode),
            price_threshold: self.price_threshold.unwrap_or(base.price_threshold),
            min_cash: self.min_cash.unwrap_or(base.min_cash),
            intelligent_max_price: self.intelligent_max_price.unwrap_or(base.intelligent_max_price),
            intelligent_below_enabled: self.intelligent_below_enabled.unwrap_or(base.intelligent_below_enabled),
            intelligent_below: self.intelligent_below.unwrap_or(base.intelligent_below),
            intelligent_ships_enabled: self.intelligent_ships_enabled.unwrap_or(base.intelligent_ships_enabled),
            intelligent_ships: self.intelligent_ships.unwrap_or(base.intelligent_ships),
        }
    }
}

fn fuel_policy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ResourcePolicy, D::Error> {
    Ok(PolicyOverrides::deserialize(deserializer)?.over(ResourcePolicy::fuel_defaults()))
}

fn co2_policy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ResourcePolicy, D::Error> {
    Ok(PolicyOverrides::deserialize(deserializer)?.over(ResourcePolicy::co2_defaults()))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DepartureSettings {
    pub auto_depart_enabled: bool,
    pub min_utilization_enabled: bool,
    /// Percent of vessel capacity the destination must be able to absorb
    pub min_utilization_threshold: f64,
    /// Intelligent CO2 mode refills the buffer as soon as the balance drops
    /// below it, instead of waiting for it to go negative
    pub avoid_negative_co2: bool,
    /// Positive CO2 balance (tons) restored after a departure batch
    pub co2_buffer_tons: f64,
}

impl Default for DepartureSettings {
    fn default() -> Self {
        Self {
            auto_depart_enabled: false,
            min_utilization_enabled: false,
            min_utilization_threshold: 50.0,
            avoid_negative_co2: false,
            co2_buffer_tons: 100.0,
        }
    }
}

/// Policy configuration shared by every cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "ResourcePolicy::fuel_defaults", deserialize_with = "fuel_policy")]
    pub fuel: ResourcePolicy,
    #[serde(default = "ResourcePolicy::co2_defaults", deserialize_with = "co2_policy")]
    pub co2: ResourcePolicy,
    #[serde(default)]
    pub departure: DepartureSettings,
}

impl Settings {
    pub fn policy(&self, commodity: Commodity) -> &ResourcePolicy {
        match commodity {
            Commodity::Fuel => &self.fuel,
            Commodity::Co2 => &self.co2,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fuel: ResourcePolicy::fuel_defaults(),
            co2: ResourcePolicy::co2_defaults(),
            departure: DepartureSettings::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: crate::DEFAULT_API_BASE_URL.to_string(),
            token_file: PathBuf::from(crate::SESSION_TOKEN_FILE),
            request_timeout_seconds: 30,
            retry_attempts: 3,
            retry_backoff_ms: 1000,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cycle_interval_seconds: 60,
            catch_up_threshold_seconds: 120,
            vessel_delay_ms: 300,
            config_reload_interval_seconds: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("storage"),
            companion_dir: None,
        }
    }
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            timing: TimingConfig::default(),
            storage: StorageConfig::default(),
            policy: Settings::default(),
        }
    }
}

impl ApiConfig {
    pub fn load_token(&self) -> Result<String, ConfigError> {
        let token = fs::read_to_string(&self.token_file)?.trim().to_string();
        if token.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{} is empty",
                self.token_file.display()
            )));
        }
        Ok(token)
    }

    pub fn retry_policy(&self) -> crate::client::RetryPolicy {
        crate::client::RetryPolicy {
            attempts: self.retry_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

impl AutopilotConfig {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create(config_path: &Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            info!(path = %config_path.display(), "loading configuration");
            let config_str = fs::read_to_string(config_path)?;
            let config: AutopilotConfig = toml::from_str(&config_str)?;
            Ok(config)
        } else {
            info!(path = %config_path.display(), "creating default configuration");
            let config = AutopilotConfig::default();
            config.save(config_path)?;
            Ok(config)
        }
    }

    /// Persist the configuration; the only way settings change besides editing the file.
    pub fn save(&self, config_path: &Path) -> Result<(), ConfigError> {
        let config_str = toml::to_string_pretty(self)?;
        crate::storage::write_atomic(config_path, &config_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, policy) in [("fuel", &self.policy.fuel), ("co2", &self.policy.co2)] {
            if policy.price_threshold < 0.0 || policy.intelligent_max_price < 0.0 {
                return Err(ConfigError::Invalid(format!("{} prices must not be negative", name)));
            }
            if policy.min_cash < 0 {
                return Err(ConfigError::Invalid(format!("{}.min_cash must not be negative", name)));
            }
            if policy.intelligent_below < 0.0 {
                return Err(ConfigError::Invalid(format!("{}.intelligent_below must not be negative", name)));
            }
        }

        let threshold = self.policy.departure.min_utilization_threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(ConfigError::Invalid(
                "min_utilization_threshold must be between 0 and 100".to_string(),
            ));
        }
        if self.policy.departure.co2_buffer_tons < 0.0 {
            return Err(ConfigError::Invalid("co2_buffer_tons must not be negative".to_string()));
        }
        if self.timing.cycle_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "cycle_interval_seconds must be greater than 0".to_string(),
            ));
        }
        if self.api.retry_attempts == 0 {
            return Err(ConfigError::Invalid("retry_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn print_summary(&self) {
        let policy = &self.policy;
        info!(
            mode = ?policy.fuel.mode,
            threshold = policy.fuel.price_threshold,
            max_price = policy.fuel.intelligent_max_price,
            "fuel policy"
        );
        info!(
            mode = ?policy.co2.mode,
            threshold = policy.co2.price_threshold,
            max_price = policy.co2.intelligent_max_price,
            "co2 policy"
        );
        info!(
            auto_depart = policy.departure.auto_depart_enabled,
            min_utilization = policy.departure.min_utilization_enabled.then_some(policy.departure.min_utilization_threshold),
            interval_s = self.timing.cycle_interval_seconds,
            "departure policy"
        );
    }
}

/// Hot-reloadable configuration manager
#[derive(Debug)]
pub struct ConfigManager {
    config: AutopilotConfig,
    config_path: PathBuf,
    last_modified: Option<SystemTime>,
    last_reload_check: SystemTime,
    mirror: CompanionMirror,
}

impl ConfigManager {
    pub fn new(config_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = config_path.into();
        let config = AutopilotConfig::load_or_create(&config_path)?;
        config.validate()?;
        config.print_summary();

        let last_modified = fs::metadata(&config_path).and_then(|m| m.modified()).ok();
        let mirror = CompanionMirror::new(config.storage.companion_dir.clone());

        let manager = Self {
            config,
            config_path,
            last_modified,
            last_reload_check: SystemTime::now(),
            mirror,
        };
        manager.publish_policy();
        Ok(manager)
    }

    pub fn config(&self) -> &AutopilotConfig {
        &self.config
    }

    /// Check if config should be reloaded and do so if needed
    pub fn check_and_reload(&mut self) -> bool {
        let now = SystemTime::now();
        let reload_interval = Duration::from_secs(self.config.timing.config_reload_interval_seconds);

        if now.duration_since(self.last_reload_check).unwrap_or_default() < reload_interval {
            return false;
        }
        self.last_reload_check = now;

        match fs::metadata(&self.config_path).and_then(|m| m.modified()) {
            Ok(modified) if Some(modified) != self.last_modified => self.reload_config(modified),
            _ => false,
        }
    }

    /// Replace the policy and write it out.
    pub fn save_policy(&mut self, policy: Settings) -> Result<(), ConfigError> {
        let mut updated = self.config.clone();
        updated.policy = policy;
        updated.validate()?;
        updated.save(&self.config_path)?;
        self.config = updated;
        self.last_modified = fs::metadata(&self.config_path).and_then(|m| m.modified()).ok();
        self.publish_policy();
        Ok(())
    }

    /// Hand the current policy to the companion process, if one is configured.
    fn publish_policy(&self) {
        if !self.mirror.is_enabled() {
            return;
        }
        match serde_json::to_string_pretty(&self.config.policy) {
            Ok(json) => self.mirror.mirror(SETTINGS_MIRROR_FILE, &json),
            Err(e) => warn!(error = %e, "could not serialize policy for companion"),
        }
    }

    fn reload_config(&mut self, new_modified_time: SystemTime) -> bool {
        let loaded = AutopilotConfig::load_or_create(&self.config_path)
            .and_then(|config| config.validate().map(|_| config));

        match loaded {
            Ok(new_config) => {
                let policy_changed = new_config.policy != self.config.policy;
                self.mirror = CompanionMirror::new(new_config.storage.companion_dir.clone());
                self.config = new_config;
                self.last_modified = Some(new_modified_time);
                info!(policy_changed, "configuration reloaded");
                if policy_changed {
                    self.publish_policy();
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "invalid configuration, keeping current config");
                self.last_modified = Some(new_modified_time);
                false
            }
        }
    }
}
