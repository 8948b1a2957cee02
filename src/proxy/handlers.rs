//! HTTP front door - the routes the proxy exposes
//!
//! Each chat completion request walks the same pipeline: resolve the local
//! API key, parse the body, translate to the OpenRouter shape, forward, then
//! relay the response in buffered or streaming mode. Every step short-circuits
//! into an OpenAI-shaped error response; nothing panics past this layer.

use axum::{
    body::Body,
    extract::State,
    http::{header, Response, Uri},
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use super::error::ProxyError;
use super::generate_request_id;
use super::request::parse_request_body;
use super::result::ApiResult;
use super::state::ProxyState;
use super::streaming::{map_upstream_error, StreamingResponseHandler};
use super::translation::translate_chat_completion_request;
use super::upstream::describe_transport_error;
use super::validate::validate_and_get_api_key;
use crate::config::VERSION;
use crate::settings::key_fingerprint;

/// GET / - identification string for anything probing the port
pub async fn root() -> &'static str {
    "OpenRouter AI Assistant Proxy"
}

/// GET /health - static liveness check
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "openrouter-proxy",
        "version": VERSION,
    }))
}

/// Catch-all for unknown paths
pub async fn fallback(uri: Uri) -> ProxyError {
    ProxyError::UnknownEndpoint(uri.path().to_string())
}

/// POST /v1/chat/completions
pub async fn chat_completions(State(state): State<ProxyState>, body: String) -> Response<Body> {
    let request_id = generate_request_id();

    match handle_chat_completion(state, &request_id, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle_chat_completion(
    state: ProxyState,
    request_id: &str,
    body: String,
) -> Result<Response<Body>, ProxyError> {
    // Only the locally configured key authenticates; the client's
    // Authorization header is intentionally never read
    let api_key = validate_and_get_api_key(state.settings.as_ref(), request_id)?;

    if body.trim().is_empty() {
        return Err(ProxyError::MissingBody);
    }

    let request = parse_request_body(&body, request_id).ok_or(ProxyError::InvalidBody)?;

    let stream = request.stream;
    let model = request.model.clone();

    tracing::debug!(
        request_id,
        model = %model,
        stream,
        key = %key_fingerprint(&api_key),
        "Forwarding chat completion to OpenRouter"
    );

    let translated = translate_chat_completion_request(request);

    match state.upstream.send(&translated, &api_key).await {
        ApiResult::Success { data, .. } => {
            if stream {
                Ok(StreamingResponseHandler::new(model, request_id)
                    .respond(data)
                    .await)
            } else {
                buffered_response(data).await
            }
        }
        ApiResult::Error { message, .. } => {
            if stream {
                // Streaming callers already hold an event-stream reader open,
                // so the failure goes out as an error chunk, not a status code
                Ok(StreamingResponseHandler::new(model, request_id)
                    .transport_error_response(&message))
            } else {
                Err(ProxyError::Upstream(message))
            }
        }
    }
}

/// Buffered mode: read the full upstream body and copy it through
///
/// Success bodies pass through verbatim with their original status. Error
/// bodies pass through too when they are already JSON; plain-text error
/// bodies are wrapped into the OpenAI error shape so callers always get
/// structured JSON.
async fn buffered_response(upstream: reqwest::Response) -> Result<Response<Body>, ProxyError> {
    let status = upstream.status();

    let bytes = upstream
        .bytes()
        .await
        .map_err(|err| ProxyError::Upstream(describe_transport_error(&err)))?;

    let body = if status.is_success() || serde_json::from_slice::<Value>(&bytes).is_ok() {
        Body::from(bytes)
    } else {
        let text = String::from_utf8_lossy(&bytes);
        let message = map_upstream_error(status.as_u16(), &text);
        Body::from(
            json!({
                "error": {
                    "message": message,
                    "code": status.as_u16(),
                }
            })
            .to_string(),
        )
    };

    Response::builder()
        .status(status.as_u16())
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .map_err(|err| ProxyError::Internal(err.to_string()))
}
