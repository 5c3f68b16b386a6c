use serde::Deserialize;

/// Every endpoint wraps its payload in `data`; refusals come back as `error`,
/// sometimes with a 200 status.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VesselsData {
    pub vessels: Vec<crate::models::Vessel>,
}

#[derive(Debug, Deserialize)]
pub struct VesselData {
    pub vessel: crate::models::Vessel,
}

#[derive(Debug, Deserialize)]
pub struct AutoPriceData {
    pub prices: crate::models::RoutePrices,
}

/// What a successful departure earned and burned.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DepartureReceipt {
    #[serde(default)]
    pub income: f64,
    #[serde(default)]
    pub harbor_fee: f64,
    #[serde(default)]
    pub fuel_used: f64,
    #[serde(default)]
    pub co2_used: f64,
}
