use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::ApiError;
use crate::models::*;

/// Tons to the kilogram unit the purchase endpoints expect.
const KG_PER_TON: u64 = 1000;

/// Raw remote calls consumed by the autopilot. One method per endpoint, no
/// retries: retry policy lives in [`crate::client::ResourceOracle`].
#[async_trait]
pub trait GameApi: Send + Sync {
    async fn get_bunker(&self) -> Result<Bunker, ApiError>;

    async fn get_price_table(&self) -> Result<PriceTable, ApiError>;

    /// Buy `tons` of `commodity`; answers with the updated account snapshot.
    async fn purchase(&self, commodity: Commodity, tons: u64) -> Result<Bunker, ApiError>;

    async fn get_vessels(&self) -> Result<Vec<Vessel>, ApiError>;

    async fn depart_vessel(&self, id: VesselId, speed: u32, guards: u32) -> Result<DepartureReceipt, ApiError>;

    async fn update_route_settings(&self, id: VesselId, intent: &RouteIntent) -> Result<Vessel, ApiError>;

    async fn get_port_demand(&self, port: &str) -> Result<PortDemand, ApiError>;

    async fn get_auto_price(&self, route_id: u64, class: CapacityClass) -> Result<RoutePrices, ApiError>;
}

#[derive(Clone)]
pub struct HttpGameApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGameApi {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ApiError::Setup(format!("session token is not a valid header: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        trace!(method = "GET", %url, "api call");
        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = self.url(path);
        trace!(method = "POST", %url, "api call");
        let response = self.client.post(&url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(status = status.as_u16(), body = %truncate(&body), "api error response");
            // Refusals carry a readable message; keep it so callers can classify.
            let refusal = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.error);
            if let Some(message) = refusal {
                if status.is_client_error() && status.as_u16() != 429 {
                    return Err(ApiError::Rejected(message));
                }
            }
            return Err(ApiError::Status { status: status.as_u16(), body });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        match (envelope.data, envelope.error) {
            (_, Some(message)) => Err(ApiError::Rejected(message)),
            (Some(data), None) => Ok(data),
            (None, None) => Err(ApiError::Rejected("response carried no data".to_string())),
        }
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    async fn get_bunker(&self) -> Result<Bunker, ApiError> {
        self.get("/account").await
    }

    async fn get_price_table(&self) -> Result<PriceTable, ApiError> {
        self.get("/bunker/prices").await
    }

    async fn purchase(&self, commodity: Commodity, tons: u64) -> Result<Bunker, ApiError> {
        let path = match commodity {
            Commodity::Fuel => "/bunker/fuel",
            Commodity::Co2 => "/bunker/co2",
        };
        let payload = serde_json::json!({ "amount": tons * KG_PER_TON });
        self.post(path, &payload).await
    }

    async fn get_vessels(&self) -> Result<Vec<Vessel>, ApiError> {
        let data: VesselsData = self.get("/vessels?include_routes=true").await?;
        Ok(data.vessels)
    }

    async fn depart_vessel(&self, id: VesselId, speed: u32, guards: u32) -> Result<DepartureReceipt, ApiError> {
        let payload = serde_json::json!({ "speed": speed, "guards": guards });
        self.post(&format!("/vessels/{}/depart", id), &payload).await
    }

    async fn update_route_settings(&self, id: VesselId, intent: &RouteIntent) -> Result<Vessel, ApiError> {
        let data: VesselData = self.post(&format!("/vessels/{}/route-settings", id), intent).await?;
        Ok(data.vessel)
    }

    async fn get_port_demand(&self, port: &str) -> Result<PortDemand, ApiError> {
        self.get(&format!("/ports/{}/demand", port)).await
    }

    async fn get_auto_price(&self, route_id: u64, class: CapacityClass) -> Result<RoutePrices, ApiError> {
        let data: AutoPriceData = self
            .get(&format!("/routes/{}/auto-price?vessel_type={}", route_id, class.as_str()))
            .await?;
        Ok(data.prices)
    }
}
