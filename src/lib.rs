// Fleet Autopilot Library
// Bunker management and departure automation for a shipping fleet

pub mod models;
pub mod client;
pub mod cache;
pub mod storage;
pub mod operations;
pub mod controller;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;

// Re-export commonly used types
pub use models::{
    bunker::{Bunker, Commodity, PriceQuote, PriceTable},
    vessel::{CapacityClass, RouteIntent, RoutePrices, Vessel, VesselId, VesselStatus},
};

pub use client::{GameApi, HttpGameApi, ResourceOracle};
pub use controller::{Collaborators, Controller, CycleReport};
pub use config::{AutopilotConfig, ConfigManager, Settings};
pub use error::{ApiError, ConfigError, StoreError};

// Constants
pub const DEFAULT_API_BASE_URL: &str = "https://shippingmanager.cc/api";
pub const DEFAULT_CONFIG_PATH: &str = "fleet_autopilot.toml";
pub const SESSION_TOKEN_FILE: &str = "SESSION_TOKEN";
