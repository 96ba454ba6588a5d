//! Transfer price quotes.
//!
//! - `GET  /api/v1/quote?pickup=&dropoff=&passengers=&distance_miles=&duration_seconds=`
//! - `POST /api/v1/quote` with the same fields as a JSON body
//!
//! When `distance_miles` is omitted or unparseable the route is resolved
//! through the configured directions provider.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::get,
    Json, Router,
};
use islandhop_core::{
    parse_passengers, ApplicationError, PricingEngine, QuoteRequest, QuoteResult, RouteMetrics,
};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::directions::DirectionsProvider;
use crate::error::ApiError;

#[derive(Clone)]
pub struct QuoteState {
    engine: Arc<dyn PricingEngine>,
    directions: Option<Arc<dyn DirectionsProvider>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteParams {
    pub pickup: Option<String>,
    pub dropoff: Option<String>,
    pub passengers: Option<PassengerInput>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub distance_miles: Option<f64>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub duration_seconds: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberInput {
    Number(f64),
    Text(String),
    Ignored(IgnoredAny),
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = match Option::<NumberInput>::deserialize(deserializer)? {
        Some(NumberInput::Number(value)) => Some(value),
        Some(NumberInput::Text(text)) => text.trim().parse::<f64>().ok(),
        Some(NumberInput::Ignored(_)) | None => None,
    };
    Ok(number.filter(|value| value.is_finite()))
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.filter(|value| *value >= 0.0).map(|value| value as u64))
}

/// Passenger count as sent by widgets: a number, or text from a query string or form field.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PassengerInput {
    Count(i64),
    Fractional(f64),
    Text(String),
}

impl PassengerInput {
    fn raw_count(&self) -> Option<i64> {
        match self {
            Self::Count(count) => Some(*count),
            Self::Fractional(value) if value.is_finite() => Some(value.trunc() as i64),
            Self::Fractional(_) => None,
            Self::Text(text) => parse_passengers(text),
        }
    }
}

pub fn router(state: QuoteState) -> Router {
    Router::new()
        .route("/api/v1/quote", get(quote_from_query).post(quote_from_json))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl QuoteState {
    pub fn new(
        engine: Arc<dyn PricingEngine>,
        directions: Option<Arc<dyn DirectionsProvider>>,
    ) -> Self {
        Self { engine, directions }
    }

    async fn quote(&self, params: QuoteParams) -> Result<QuoteResult, ApplicationError> {
        let pickup = required(params.pickup, "pickup")?;
        let dropoff = required(params.dropoff, "dropoff")?;

        let metrics = match params.distance_miles {
            Some(distance_miles) => RouteMetrics {
                distance_miles,
                duration_seconds: params.duration_seconds.unwrap_or_default(),
            },
            None => {
                let directions = self.directions.as_ref().ok_or_else(|| {
                    ApplicationError::Integration(
                        "no directions provider is configured and no distance was supplied"
                            .to_string(),
                    )
                })?;
                directions.route_metrics(&pickup, &dropoff).await?
            }
        };

        let request = QuoteRequest {
            pickup_text: pickup,
            dropoff_text: dropoff,
            distance_miles: metrics.distance_miles,
            duration_seconds: metrics.duration_seconds,
            passenger_count: params.passengers.as_ref().and_then(PassengerInput::raw_count),
        };

        Ok(self.engine.price(&request))
    }
}

pub async fn quote_from_query(
    State(state): State<QuoteState>,
    params: Result<Query<QuoteParams>, QueryRejection>,
) -> Result<Json<QuoteResult>, ApiError> {
    let params = params
        .map(|Query(params)| params)
        .map_err(|rejection| ApplicationError::MissingInput(rejection.body_text()));
    respond(&state, params).await
}

pub async fn quote_from_json(
    State(state): State<QuoteState>,
    params: Result<Json<QuoteParams>, JsonRejection>,
) -> Result<Json<QuoteResult>, ApiError> {
    let params = params
        .map(|Json(params)| params)
        .map_err(|rejection| ApplicationError::MissingInput(rejection.body_text()));
    respond(&state, params).await
}

async fn respond(
    state: &QuoteState,
    params: Result<QuoteParams, ApplicationError>,
) -> Result<Json<QuoteResult>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();

    let outcome = match params {
        Ok(params) => state.quote(params).await,
        Err(error) => Err(error),
    };

    match outcome {
        Ok(result) => {
            info!(
                event_name = "quote.priced",
                correlation_id = %correlation_id,
                distance_miles = result.distance_miles,
                passengers = result.passenger_count,
                total_price = %result.total_price,
                remote_surcharge = result.remote_surcharge_applied,
                "quote computed"
            );
            Ok(Json(result))
        }
        Err(error) => {
            warn!(
                event_name = "quote.failed",
                correlation_id = %correlation_id,
                error = %error,
                "quote could not be computed"
            );
            Err(ApiError::from(error.into_interface(correlation_id)))
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ApplicationError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApplicationError::MissingInput(field.to_string()))
}
