//! Error types for the gateway server.

use alertgate_core::AlertError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur in the gateway server.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(std::net::SocketAddr, std::io::Error),

    /// Startup configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// The request body is not valid JSON for the endpoint.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The request was understood but rejected.
    #[error(transparent)]
    Alert(#[from] AlertError),

    /// The alert store could not be reached or answered with an error.
    #[error("alert store error: {0}")]
    Store(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    result: &'static str,
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'static str>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            Self::InvalidJson(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    msg: "Invalid JSON".to_string(),
                    location: Some("body"),
                },
            ),
            Self::Alert(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    msg: self.to_string(),
                    location: Some("body"),
                },
            ),
            Self::Store(_) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail {
                    msg: self.to_string(),
                    location: None,
                },
            ),
            Self::BindFailed(_, _) | Self::Config(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    msg: self.to_string(),
                    location: None,
                },
            ),
        };

        let body = ErrorResponse {
            result: "error",
            errors: vec![detail],
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"result":"error","errors":[{"msg":"failed to serialize error"}]}"#.to_string()
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_json_response() {
        let response = GatewayError::InvalidJson("expected value at line 1".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(
            json,
            serde_json::json!({
                "result": "error",
                "errors": [{"msg": "Invalid JSON", "location": "body"}]
            })
        );
    }

    #[tokio::test]
    async fn test_alert_error_response() {
        let err = GatewayError::from(AlertError::MissingRequiredField {
            field: "name".to_string(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["errors"][0]["msg"], "missing required field: name");
    }

    #[tokio::test]
    async fn test_store_error_response() {
        let response = GatewayError::Store("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let json = body_json(response).await;
        assert_eq!(json["result"], "error");
        assert!(json["errors"][0].get("location").is_none());
    }

    #[tokio::test]
    async fn test_internal_error_response() {
        let response = GatewayError::Internal("something broke".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_display() {
        let err = GatewayError::Config("bad rules".to_string());
        assert_eq!(err.to_string(), "configuration error: bad rules");

        let err = GatewayError::Store("HTTP status 400".to_string());
        assert_eq!(err.to_string(), "alert store error: HTTP status 400");
    }
}
