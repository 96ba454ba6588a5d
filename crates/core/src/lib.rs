pub mod config;
pub mod errors;
pub mod fallback;
pub mod pricing;
pub mod route;
pub mod tours;

pub use errors::{ApplicationError, InterfaceError};
pub use fallback::{try_in_order, FallbackError};
pub use pricing::{
    compute_price, parse_passengers, DeterministicPricingEngine, PricingBand, PricingConfig,
    PricingEngine, QuoteRequest, QuoteResult, RemoteSurchargeRule,
};
pub use route::{RouteError, RouteMetrics, METERS_PER_MILE};
pub use tours::{carries_application_error, FilterMode, TourFeed};
