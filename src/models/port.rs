use serde::{Deserialize, Serialize};

use crate::models::vessel::CapacityClass;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CargoDemand {
    #[serde(default)]
    pub demand: u64,
    #[serde(default)]
    pub consumed: u64,
}

impl CargoDemand {
    pub fn available(&self) -> u64 {
        self.demand.saturating_sub(self.consumed)
    }
}

/// Open demand at a destination port, per cargo type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortDemand {
    pub code: String,
    #[serde(default)]
    pub dry: CargoDemand,
    #[serde(default)]
    pub refrigerated: CargoDemand,
    #[serde(default)]
    pub fuel: CargoDemand,
    #[serde(default)]
    pub crude_oil: CargoDemand,
}

impl PortDemand {
    pub fn available_for(&self, class: CapacityClass) -> u64 {
        match class {
            CapacityClass::Container => self.dry.available() + self.refrigerated.available(),
            CapacityClass::Tanker => self.fuel.available() + self.crude_oil.available(),
        }
    }
}
