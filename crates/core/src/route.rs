use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const METERS_PER_MILE: f64 = 1609.344;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub distance_miles: f64,
    pub duration_seconds: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("directions lookup returned status `{0}`")]
    Status(String),
    #[error("directions payload has no route leg")]
    MissingLeg,
    #[error("directions leg is missing `{0}`")]
    MissingField(&'static str),
}

impl RouteMetrics {
    pub fn from_meters(distance_meters: f64, duration_seconds: u64) -> Self {
        Self { distance_miles: distance_meters / METERS_PER_MILE, duration_seconds }
    }

    /// Reads `routes[0].legs[0]` from a Directions API payload.
    pub fn from_directions_json(payload: &Value) -> Result<Self, RouteError> {
        if let Some(status) = payload.get("status").and_then(Value::as_str) {
            if status != "OK" {
                return Err(RouteError::Status(status.to_string()));
            }
        }

        let leg = payload
            .get("routes")
            .and_then(|routes| routes.get(0))
            .and_then(|route| route.get("legs"))
            .and_then(|legs| legs.get(0))
            .ok_or(RouteError::MissingLeg)?;

        let meters = leg
            .pointer("/distance/value")
            .and_then(Value::as_f64)
            .ok_or(RouteError::MissingField("distance.value"))?;
        let seconds = leg
            .pointer("/duration/value")
            .and_then(Value::as_f64)
            .ok_or(RouteError::MissingField("duration.value"))?;

        Ok(Self::from_meters(meters, seconds.max(0.0).round() as u64))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{RouteError, RouteMetrics};

    #[test]
    fn meters_convert_to_statute_miles() {
        let metrics = RouteMetrics::from_meters(24_140.16, 1_500);
        assert!((metrics.distance_miles - 15.0).abs() < 1e-9);
        assert_eq!(metrics.duration_seconds, 1_500);
    }

    #[test]
    fn first_leg_of_first_route_is_used() {
        let payload = json!({
            "status": "OK",
            "routes": [
                { "legs": [
                    { "distance": { "value": 16093.44, "text": "10 mi" },
                      "duration": { "value": 960, "text": "16 mins" } },
                    { "distance": { "value": 1.0 }, "duration": { "value": 1 } }
                ] },
                { "legs": [ { "distance": { "value": 5.0 }, "duration": { "value": 5 } } ] }
            ]
        });

        let metrics = RouteMetrics::from_directions_json(&payload).expect("metrics");
        assert!((metrics.distance_miles - 10.0).abs() < 1e-9);
        assert_eq!(metrics.duration_seconds, 960);
    }

    #[test]
    fn non_ok_status_is_reported() {
        let payload = json!({ "status": "ZERO_RESULTS", "routes": [] });
        assert_eq!(
            RouteMetrics::from_directions_json(&payload),
            Err(RouteError::Status("ZERO_RESULTS".to_string()))
        );
    }

    #[test]
    fn missing_leg_is_reported() {
        let payload = json!({ "status": "OK", "routes": [ { "legs": [] } ] });
        assert_eq!(RouteMetrics::from_directions_json(&payload), Err(RouteError::MissingLeg));
    }
}
