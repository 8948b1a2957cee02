//! Proxy error types and response handling
//!
//! Every expected failure on the request path becomes an OpenAI-shaped JSON
//! error body: `{"error":{"message":"...","code":<status>}}`. Clients of the
//! proxy speak the OpenAI protocol, so errors must keep that shape too.

use axum::{
    body::Body,
    http::{header, Response, StatusCode},
    response::IntoResponse,
};
use serde_json::json;

/// Errors that can occur while handling a proxied request
#[derive(Debug)]
pub enum ProxyError {
    /// No API key configured in the local settings store
    NotConfigured,
    /// The request body was empty or blank
    MissingBody,
    /// The request body was not valid JSON
    InvalidBody,
    /// The upstream call failed before a response was available (buffered mode)
    Upstream(String),
    /// No route matched the request path
    UnknownEndpoint(String),
    /// Reading the inbound body or building the response failed
    Internal(String),
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            ProxyError::NotConfigured => StatusCode::UNAUTHORIZED,
            ProxyError::MissingBody | ProxyError::InvalidBody => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UnknownEndpoint(_) => StatusCode::NOT_FOUND,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ProxyError::NotConfigured => {
                "OpenRouter API key not configured. Please configure your API key in the settings."
                    .to_string()
            }
            ProxyError::MissingBody => "Request body is required".to_string(),
            ProxyError::InvalidBody => "Invalid JSON in request body".to_string(),
            ProxyError::Upstream(msg) => msg.clone(),
            ProxyError::UnknownEndpoint(path) => format!("Unknown endpoint: {}", path),
            ProxyError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response<Body> {
        let status = self.status();
        let message = self.message();

        tracing::debug!("Request failed: {} - {}", status, message);

        let body = json!({
            "error": {
                "message": message,
                "code": status.as_u16(),
            }
        });

        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_else(|_| Response::new(Body::from("Internal error building error response")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_configured_maps_to_401() {
        assert_eq!(ProxyError::NotConfigured.status(), StatusCode::UNAUTHORIZED);
        assert!(ProxyError::NotConfigured
            .message()
            .contains("OpenRouter API key not configured"));
    }

    #[test]
    fn test_body_errors_map_to_400() {
        assert_eq!(ProxyError::MissingBody.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::MissingBody.message(), "Request body is required");
        assert_eq!(ProxyError::InvalidBody.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unknown_endpoint_maps_to_404() {
        let err = ProxyError::UnknownEndpoint("/v2/nope".to_string());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.message().contains("/v2/nope"));
    }
}
