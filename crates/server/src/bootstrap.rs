use std::sync::Arc;
use std::time::Duration;

use islandhop_core::config::{AppConfig, PricingSource};
use islandhop_core::{ApplicationError, DeterministicPricingEngine};
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{CachePolicy, InMemoryCacheStore};
use crate::directions::{DirectionsProvider, GoogleDirectionsClient};
use crate::health::HealthState;
use crate::origin::HttpTourOrigin;
use crate::proxy::ProxyState;
use crate::quote::QuoteState;

pub struct Application {
    pub config: AppConfig,
    pub proxy: ProxyState,
    pub quote: QuoteState,
    pub health: HealthState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let origin_url = config.proxy.origin_url.clone().ok_or_else(|| {
        ApplicationError::Configuration(
            "proxy.origin_url is required to serve the tour feed".to_string(),
        )
    })?;
    let origin = HttpTourOrigin::new(
        origin_url.clone(),
        Duration::from_secs(config.proxy.request_timeout_secs),
    )
    .map_err(BootstrapError::HttpClient)?;

    let store = Arc::new(InMemoryCacheStore::new(CachePolicy::from_secs(
        config.proxy.max_age_secs,
        config.proxy.stale_while_revalidate_secs,
    )));
    info!(
        event_name = "system.bootstrap.proxy_ready",
        correlation_id = "bootstrap",
        origin = %origin.url(),
        cache_control = %store.policy().header_value(),
        "tour feed proxy configured"
    );
    let proxy = ProxyState::new(
        store.clone(),
        Arc::new(origin),
        store.policy(),
        config.proxy.default_client.clone(),
    );

    let directions: Option<Arc<dyn DirectionsProvider>> = match config.maps.api_key.clone() {
        Some(api_key) => {
            let client: Arc<dyn DirectionsProvider> = Arc::new(
                GoogleDirectionsClient::new(
                    config.maps.api_base.clone(),
                    api_key,
                    Duration::from_secs(config.maps.timeout_secs),
                )
                .map_err(BootstrapError::HttpClient)?,
            );
            Some(client)
        }
        None => {
            warn!(
                event_name = "system.bootstrap.directions_disabled",
                correlation_id = "bootstrap",
                "maps.api_key is not set; quotes require an explicit distance"
            );
            None
        }
    };

    let engine = Arc::new(DeterministicPricingEngine::try_new(config.pricing.clone())?);
    let pricing_source = match &config.pricing_source {
        PricingSource::ConfigFile => "config_file".to_string(),
        PricingSource::LegacyFile(path) => path.display().to_string(),
        PricingSource::Default { fallback_reasons } => {
            for reason in fallback_reasons {
                warn!(
                    event_name = "system.bootstrap.pricing_fallback",
                    correlation_id = "bootstrap",
                    reason = %reason,
                    "pricing source skipped"
                );
            }
            "default".to_string()
        }
    };
    info!(
        event_name = "system.bootstrap.pricing_loaded",
        correlation_id = "bootstrap",
        pricing_source = %pricing_source,
        bands = config.pricing.bands.len(),
        "pricing table loaded"
    );

    Ok(Application {
        proxy,
        quote: QuoteState::new(engine, directions),
        health: HealthState::new(store, Some(origin_url)),
        config,
    })
}

#[cfg(test)]
mod tests {
    use islandhop_core::config::AppConfig;
    use islandhop_core::pricing::PricingConfigError;
    use islandhop_core::ApplicationError;

    use super::{bootstrap_with_config, BootstrapError};

    #[test]
    fn bootstrap_fails_fast_without_origin_url() {
        let result = bootstrap_with_config(AppConfig::default());

        assert!(matches!(
            result,
            Err(BootstrapError::Application(ApplicationError::Configuration(_)))
        ));
        let message = result.err().expect("error").to_string();
        assert!(message.contains("proxy.origin_url"));
    }

    #[test]
    fn bootstrap_rejects_an_invalid_pricing_table() {
        let mut config = AppConfig::default();
        config.proxy.origin_url = Some("https://script.example/macros/s/abc/exec".to_string());
        config.pricing.default_passengers = 0;

        let result = bootstrap_with_config(config);

        assert!(matches!(
            result,
            Err(BootstrapError::Application(ApplicationError::Pricing(
                PricingConfigError::ZeroDefaultPassengers
            )))
        ));
    }

    #[test]
    fn bootstrap_builds_application_from_valid_config() {
        let mut config = AppConfig::default();
        config.proxy.origin_url = Some("https://script.example/macros/s/abc/exec".to_string());
        config.maps.api_key = Some("maps-key".to_string().into());

        let app = bootstrap_with_config(config).expect("bootstrap should succeed");

        assert_eq!(app.config.proxy.default_client, "default");
        assert_eq!(app.config.pricing.bands.len(), 5);
    }
}
