use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use islandhop_core::InterfaceError;
use serde::Serialize;

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: &'static str,
    correlation_id: &'a str,
}

impl From<InterfaceError> for ApiError {
    fn from(error: InterfaceError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.0 {
            InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "missing input"),
            InterfaceError::ServiceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "service unavailable")
            }
            InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        };

        let body = Json(ErrorBody {
            error,
            message: self.0.user_message(),
            correlation_id: self.0.correlation_id(),
        });

        let mut response = (status, body).into_response();
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        response
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use islandhop_core::ApplicationError;
    use serde_json::Value;

    use super::ApiError;

    #[tokio::test]
    async fn missing_input_renders_as_bad_request_json() {
        let error = ApiError(
            ApplicationError::MissingInput("dropoff".to_string()).into_interface("req-9"),
        );
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["error"], "missing input");
        assert_eq!(payload["correlation_id"], "req-9");
    }
}
