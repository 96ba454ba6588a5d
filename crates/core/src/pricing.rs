use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::ApplicationError;

/// Distance band; `None` as the upper bound marks an open-ended band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingBand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_miles_exclusive: Option<f64>,
    pub price_per_person: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteSurchargeRule {
    pub keywords: Vec<String>,
    pub surcharge_per_person: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub bands: Vec<PricingBand>,
    pub min_price_per_person: Decimal,
    pub remote_surcharge: RemoteSurchargeRule,
    pub default_passengers: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PricingConfigError {
    #[error("pricing.bands must contain at least one band")]
    NoBands,
    #[error("pricing.bands[{index}] has an invalid upper bound")]
    InvalidBound { index: usize },
    #[error("pricing.bands[{index}] must have a larger upper bound than the band before it")]
    UnsortedBands { index: usize },
    #[error("pricing.bands[{index}] is open-ended but is not the last band")]
    OpenBandNotLast { index: usize },
    #[error("pricing amounts must not be negative (`{field}`)")]
    NegativeAmount { field: String },
    #[error("pricing.default_passengers must be greater than zero")]
    ZeroDefaultPassengers,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub pickup_text: String,
    pub dropoff_text: String,
    pub distance_miles: f64,
    pub duration_seconds: u64,
    /// Raw passenger count; anything non-positive falls back to the configured default.
    pub passenger_count: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PricingTrace {
    pub steps: Vec<PricingTraceStep>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteResult {
    #[serde(with = "rust_decimal::serde::float")]
    pub price_per_person: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub distance_miles: f64,
    pub duration_seconds: u64,
    pub passenger_count: u32,
    pub remote_surcharge_applied: bool,
    pub trace: PricingTrace,
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, request: &QuoteRequest) -> QuoteResult;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicPricingEngine {
    config: PricingConfig,
}

impl DeterministicPricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Rejects a table that fails [`PricingConfig::validate`].
    pub fn try_new(config: PricingConfig) -> Result<Self, ApplicationError> {
        config.validate()?;
        Ok(Self::new(config))
    }
}

impl PricingEngine for DeterministicPricingEngine {
    fn price(&self, request: &QuoteRequest) -> QuoteResult {
        compute_price(request, &self.config)
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        let band = |max: Option<f64>, price: i64| PricingBand {
            max_miles_exclusive: max,
            price_per_person: Decimal::from(price),
        };

        Self {
            bands: vec![
                band(Some(10.0), 30),
                band(Some(20.0), 40),
                band(Some(30.0), 50),
                band(Some(40.0), 60),
                band(None, 70),
            ],
            min_price_per_person: Decimal::from(30),
            remote_surcharge: RemoteSurchargeRule {
                keywords: [
                    "tryall",
                    "treasure beach",
                    "port antonio",
                    "bluefields",
                    "whitehouse",
                    "south coast",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
                surcharge_per_person: Decimal::from(5),
            },
            default_passengers: 1,
        }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<(), PricingConfigError> {
        if self.bands.is_empty() {
            return Err(PricingConfigError::NoBands);
        }

        let last = self.bands.len() - 1;
        let mut previous: Option<f64> = None;
        for (index, band) in self.bands.iter().enumerate() {
            if band.price_per_person.is_sign_negative() {
                return Err(PricingConfigError::NegativeAmount {
                    field: format!("pricing.bands[{index}].price_per_person"),
                });
            }

            match band.max_miles_exclusive {
                None if index != last => {
                    return Err(PricingConfigError::OpenBandNotLast { index });
                }
                None => {}
                Some(max) if !max.is_finite() && index != last => {
                    return Err(PricingConfigError::OpenBandNotLast { index });
                }
                Some(max) if max.is_nan() || max <= 0.0 => {
                    return Err(PricingConfigError::InvalidBound { index });
                }
                Some(max) => {
                    if previous.is_some_and(|prev| max <= prev) {
                        return Err(PricingConfigError::UnsortedBands { index });
                    }
                    previous = Some(max);
                }
            }
        }

        if self.min_price_per_person.is_sign_negative() {
            return Err(PricingConfigError::NegativeAmount {
                field: "pricing.min_price_per_person".to_string(),
            });
        }
        if self.remote_surcharge.surcharge_per_person.is_sign_negative() {
            return Err(PricingConfigError::NegativeAmount {
                field: "pricing.remote_surcharge_per_person".to_string(),
            });
        }
        if self.default_passengers == 0 {
            return Err(PricingConfigError::ZeroDefaultPassengers);
        }

        Ok(())
    }

    /// Price of the first band whose upper bound exceeds `distance_miles`, else the last band.
    pub fn band_price(&self, distance_miles: f64) -> Decimal {
        let distance = clamp_distance(distance_miles);
        self.bands
            .iter()
            .find(|band| band.max_miles_exclusive.map_or(true, |max| distance < max))
            .or_else(|| self.bands.last())
            .map(|band| band.price_per_person)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn resolve_passengers(&self, raw: Option<i64>) -> u32 {
        raw.filter(|count| *count > 0)
            .and_then(|count| u32::try_from(count).ok())
            .unwrap_or(self.default_passengers.max(1))
    }
}

impl RemoteSurchargeRule {
    /// Naive substring match on the lower-cased pickup and dropoff text.
    pub fn matches(&self, pickup_text: &str, dropoff_text: &str) -> bool {
        let haystack = format!("{pickup_text} {dropoff_text}").to_lowercase();
        self.keywords.iter().any(|keyword| {
            let needle = keyword.trim().to_lowercase();
            !needle.is_empty() && haystack.contains(&needle)
        })
    }
}

pub fn compute_price(request: &QuoteRequest, config: &PricingConfig) -> QuoteResult {
    let band_price = config.band_price(request.distance_miles);
    let mut steps = vec![PricingTraceStep {
        stage: "band".to_string(),
        detail: format!("distance {:.2}mi", clamp_distance(request.distance_miles)),
        amount: band_price,
    }];

    let remote = config.remote_surcharge.matches(&request.pickup_text, &request.dropoff_text);
    let surcharge =
        if remote { config.remote_surcharge.surcharge_per_person } else { Decimal::ZERO };
    if remote {
        steps.push(PricingTraceStep {
            stage: "remote_surcharge".to_string(),
            detail: "pickup or dropoff matched a remote-area keyword".to_string(),
            amount: surcharge,
        });
    }

    let subtotal = band_price + surcharge;
    let price_per_person = subtotal.max(config.min_price_per_person);
    if price_per_person != subtotal {
        steps.push(PricingTraceStep {
            stage: "floor".to_string(),
            detail: "raised to minimum price per person".to_string(),
            amount: price_per_person,
        });
    }

    let passenger_count = config.resolve_passengers(request.passenger_count);
    let total_price = (price_per_person * Decimal::from(passenger_count))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    steps.push(PricingTraceStep {
        stage: "total".to_string(),
        detail: format!("price_per_person * {passenger_count} passenger(s)"),
        amount: total_price,
    });

    QuoteResult {
        price_per_person,
        total_price,
        distance_miles: request.distance_miles,
        duration_seconds: request.duration_seconds,
        passenger_count,
        remote_surcharge_applied: remote,
        trace: PricingTrace { steps },
    }
}

/// Leading-integer parse for passenger counts taken from query strings or form state.
pub fn parse_passengers(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };

    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }

    digits.parse::<i64>().ok().map(|value| value * sign)
}

fn clamp_distance(distance_miles: f64) -> f64 {
    if distance_miles.is_finite() && distance_miles > 0.0 {
        distance_miles
    } else {
        0.0
    }
}
