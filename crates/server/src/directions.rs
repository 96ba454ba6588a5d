use std::time::Duration;

use async_trait::async_trait;
use islandhop_core::{ApplicationError, RouteMetrics};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    async fn route_metrics(
        &self,
        pickup: &str,
        dropoff: &str,
    ) -> Result<RouteMetrics, ApplicationError>;
}

/// Driving directions from the Google Maps Directions API.
#[derive(Clone, Debug)]
pub struct GoogleDirectionsClient {
    client: Client,
    api_base: String,
    api_key: SecretString,
}

impl GoogleDirectionsClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_base: api_base.into(), api_key })
    }

    fn url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{base}/maps/api/directions/json")
        } else {
            format!("https://{base}/maps/api/directions/json")
        }
    }
}

#[async_trait]
impl DirectionsProvider for GoogleDirectionsClient {
    #[tracing::instrument(skip(self))]
    async fn route_metrics(
        &self,
        pickup: &str,
        dropoff: &str,
    ) -> Result<RouteMetrics, ApplicationError> {
        let response = self
            .client
            .get(self.url())
            .query(&[("origin", pickup), ("destination", dropoff), ("mode", "driving")])
            .query(&[("key", self.api_key.expose_secret())])
            .send()
            .await
            .map_err(|error| ApplicationError::Integration(format!("directions request: {error}")))?;

        let status_code = response.status();
        if status_code.is_client_error() {
            return Err(ApplicationError::Integration(format!(
                "directions request rejected with {status_code}"
            )));
        } else if !status_code.is_success() {
            return Err(ApplicationError::Integration(format!(
                "directions upstream responded with {status_code}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| ApplicationError::Integration(format!("directions payload: {error}")))?;

        Ok(RouteMetrics::from_directions_json(&payload)?)
    }
}
