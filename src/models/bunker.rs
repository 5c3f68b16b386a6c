use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account-wide reserve of fuel and CO2 allowance, in tons, plus cash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bunker {
    pub fuel: f64,
    /// May be negative: the game lets CO2 allowance run into debt.
    pub co2: f64,
    pub cash: i64,
    pub max_fuel: f64,
    pub max_co2: f64,
}

impl Bunker {
    pub fn level(&self, commodity: Commodity) -> f64 {
        match commodity {
            Commodity::Fuel => self.fuel,
            Commodity::Co2 => self.co2,
        }
    }

    pub fn capacity(&self, commodity: Commodity) -> f64 {
        match commodity {
            Commodity::Fuel => self.max_fuel,
            Commodity::Co2 => self.max_co2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commodity {
    Fuel,
    Co2,
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Commodity::Fuel => write!(f, "fuel"),
            Commodity::Co2 => write!(f, "CO2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub fuel_price: f64,
    pub co2_price: f64,
}

impl PriceQuote {
    pub fn price(&self, commodity: Commodity) -> f64 {
        match commodity {
            Commodity::Fuel => self.fuel_price,
            Commodity::Co2 => self.co2_price,
        }
    }
}

/// One 30-minute UTC slot, keyed by its start time ("HH:MM").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSlot {
    pub time: String,
    pub fuel_price: f64,
    pub co2_price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    #[serde(default)]
    pub prices: Vec<PriceSlot>,
    #[serde(default)]
    pub discounted_fuel: Option<f64>,
    #[serde(default)]
    pub discounted_co2: Option<f64>,
}

impl PriceTable {
    pub fn slot_key(at: DateTime<Utc>) -> String {
        let minute = if at.minute() < 30 { 0 } else { 30 };
        format!("{:02}:{:02}", at.hour(), minute)
    }

    /// Price in effect at `at`. Discount fields override the slot price of
    /// their commodity; with both discounts present no slot is needed.
    pub fn quote_at(&self, at: DateTime<Utc>) -> Option<PriceQuote> {
        let key = Self::slot_key(at);
        let slot = self.prices.iter().find(|s| s.time == key);

        let fuel_price = self.discounted_fuel.or(slot.map(|s| s.fuel_price))?;
        let co2_price = self.discounted_co2.or(slot.map(|s| s.co2_price))?;
        Some(PriceQuote { fuel_price, co2_price })
    }
}
