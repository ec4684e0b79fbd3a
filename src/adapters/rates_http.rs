use crate::domain::model::CarrierQuote;
use crate::domain::ports::{RateProvider, RateRequest};
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Rate provider that POSTs the manifest and destination to a remote rates
/// endpoint and expects `{ "quotes": [...] }` back. The engine retries and
/// falls back to cache around this, so the provider itself stays thin.
pub struct HttpRateProvider {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    quotes: Vec<CarrierQuote>,
}

impl HttpRateProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn fetch_rates(&self, request: &RateRequest) -> Result<Vec<CarrierQuote>> {
        tracing::debug!(
            "Requesting rates for {} parcels ({:.2} kg billable)",
            request.manifest.parcel_count,
            request.manifest.billable_weight_kg
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        let body: RatesResponse = response.json().await?;
        Ok(body.quotes)
    }
}
