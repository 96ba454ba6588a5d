use thiserror::Error;

use crate::{pricing::PricingConfigError, route::RouteError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Pricing(#[from] PricingConfigError),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "Please enter both a pickup and a dropoff location to get a price."
            }
            Self::ServiceUnavailable { .. } => {
                "We couldn't calculate this route right now. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::MissingInput(message) => Self::BadRequest { message, correlation_id },
            ApplicationError::Route(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Pricing(error) => {
                Self::Internal { message: error.to_string(), correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, InterfaceError};
    use crate::route::RouteError;

    #[test]
    fn missing_input_maps_to_bad_request_with_correlation_id() {
        let interface =
            ApplicationError::MissingInput("pickup".to_owned()).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "Please enter both a pickup and a dropoff location to get a price."
        );
    }

    #[test]
    fn route_failures_map_to_service_unavailable() {
        let interface = ApplicationError::from(RouteError::Status("OVER_QUERY_LIMIT".to_owned()))
            .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::Configuration("maps.api_key is unset".to_owned())
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
