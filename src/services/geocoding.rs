// Reverse geocoding through a Google Geocoding compatible HTTP API

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GeocodingConfig;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("reverse geocoding is not configured")]
    NotConfigured,

    #[error("no address found")]
    NoResult,

    #[error("geocoding service returned {0}")]
    Upstream(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub formatted_address: String,
    pub province: Option<String>,
    pub district: Option<String>,
    pub sub_district: Option<String>,
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Address, GeocodeError>;
}

pub struct HttpGeocoder {
    client: reqwest::Client,
    config: GeocodingConfig,
}

impl HttpGeocoder {
    pub fn new(config: GeocodingConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ReverseGeocoder for HttpGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Address, GeocodeError> {
        if self.config.api_key.is_empty() {
            return Err(GeocodeError::NotConfigured);
        }

        let latlng = format!("{},{}", latitude, longitude);
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("latlng", latlng.as_str()),
                ("key", self.config.api_key.as_str()),
                ("language", self.config.language.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeocodeError::Upstream(format!("HTTP {}", response.status())));
        }

        let body: GeocodeResponse = response.json().await?;
        tracing::debug!("Geocoded {} -> status {}", latlng, body.status);
        body.into_address()
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

impl GeocodeResponse {
    fn into_address(self) -> Result<Address, GeocodeError> {
        match self.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => return Err(GeocodeError::NoResult),
            other => {
                let detail = self.error_message.unwrap_or_default();
                return Err(GeocodeError::Upstream(format!("{} {}", other, detail).trim().to_string()));
            }
        }

        let first = self.results.into_iter().next().ok_or(GeocodeError::NoResult)?;
        let component = |kinds: &[&str]| {
            kinds.iter().find_map(|kind| {
                first
                    .address_components
                    .iter()
                    .find(|c| c.types.iter().any(|t| t == kind))
                    .map(|c| c.long_name.clone())
            })
        };

        Ok(Address {
            province: component(&["administrative_area_level_1"]),
            district: component(&["administrative_area_level_2", "sublocality_level_1"]),
            sub_district: component(&["locality", "sublocality_level_2"]),
            formatted_address: first.formatted_address.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: serde_json::Value) -> Result<Address, GeocodeError> {
        serde_json::from_value::<GeocodeResponse>(body).unwrap().into_address()
    }

    #[test]
    fn extracts_administrative_levels() {
        let address = parse(serde_json::json!({
            "status": "OK",
            "results": [{
                "formatted_address": "ถนนพระรามที่ 1 แขวงปทุมวัน เขตปทุมวัน กรุงเทพมหานคร",
                "address_components": [
                    { "long_name": "แขวงปทุมวัน", "types": ["sublocality_level_2", "sublocality"] },
                    { "long_name": "เขตปทุมวัน", "types": ["sublocality_level_1", "sublocality"] },
                    { "long_name": "กรุงเทพมหานคร", "types": ["administrative_area_level_1"] }
                ]
            }]
        }))
        .unwrap();

        assert_eq!(address.province.as_deref(), Some("กรุงเทพมหานคร"));
        assert_eq!(address.district.as_deref(), Some("เขตปทุมวัน"));
        assert_eq!(address.sub_district.as_deref(), Some("แขวงปทุมวัน"));
    }

    #[test]
    fn zero_results_is_no_result() {
        let err = parse(serde_json::json!({ "status": "ZERO_RESULTS", "results": [] })).unwrap_err();
        assert!(matches!(err, GeocodeError::NoResult));
    }

    #[test]
    fn denied_request_is_upstream_error() {
        let err = parse(serde_json::json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        }))
        .unwrap_err();
        match err {
            GeocodeError::Upstream(msg) => assert!(msg.starts_with("REQUEST_DENIED")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let geocoder = HttpGeocoder::new(GeocodingConfig::default()).unwrap();
        let err = geocoder.reverse(13.75, 100.5).await.unwrap_err();
        assert!(matches!(err, GeocodeError::NotConfigured));
    }
}
