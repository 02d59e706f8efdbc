//! Reverse geocoding. Lookups never fail the caller: any error yields "".

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> String;
}

/// Used when no geocoding key is configured.
pub struct DisabledGeocoder;

#[async_trait]
impl ReverseGeocoder for DisabledGeocoder {
    async fn reverse_geocode(&self, _lat: f64, _lon: f64) -> String {
        String::new()
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
}

pub struct GoogleGeocoder {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(api_base: &str, api_key: &str, request_timeout_ms: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create geocoding client")?;
        Ok(Self {
            http,
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    async fn lookup(&self, lat: f64, lon: f64) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/maps/api/geocode/json", self.api_base))
            .query(&[
                ("latlng", format!("{lat},{lon}")),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await
            .context("geocoding request failed")?
            .error_for_status()
            .context("geocoding request rejected")?;
        let parsed = response
            .json::<GeocodeResponse>()
            .await
            .context("failed to decode geocoding response")?;
        Ok(parsed
            .results
            .into_iter()
            .next()
            .map(|result| result.formatted_address)
            .unwrap_or_default())
    }
}

#[async_trait]
impl ReverseGeocoder for GoogleGeocoder {
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> String {
        match self.lookup(lat, lon).await {
            Ok(address) => address,
            Err(error) => {
                tracing::debug!(lat, lon, "reverse geocode failed: {error:#}");
                String::new()
            }
        }
    }
}
