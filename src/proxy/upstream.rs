//! Outbound OpenRouter client
//!
//! A thin wrapper around reqwest that issues the translated chat completion
//! request with bearer auth and OpenRouter's attribution headers. The same
//! call path serves both modes: buffered callers read the full JSON body,
//! streaming callers consume `bytes_stream()` - the request's `stream` field
//! tells OpenRouter which kind of body to produce.
//!
//! Transport failures never surface as raw error types. They are categorized
//! into human-readable messages and returned as `ApiResult::Error`. A single
//! attempt is made per request; retry belongs to the caller of the proxy, not
//! here.

use std::time::Duration;

use anyhow::{Context, Result};

use super::result::ApiResult;
use super::translation::OpenRouterRequest;
use crate::config::Config;

/// HTTP client for the OpenRouter chat completions endpoint
#[derive(Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    http_referer: String,
    app_title: String,
}

impl OpenRouterClient {
    /// Build the client with the configured timeouts
    ///
    /// The request timeout bounds the whole exchange, so an unresponsive
    /// upstream cannot pin a serving task indefinitely - including stalled
    /// SSE streams.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_max_idle_per_host(10)
            // Force HTTP/1.1 to avoid HTTP/2 connection reset issues with some providers
            .http1_only()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            http_referer: config.http_referer.clone(),
            app_title: config.app_title.clone(),
        })
    }

    /// POST the translated request to OpenRouter
    ///
    /// Success carries the raw response even for non-2xx statuses; the caller
    /// decides how to relay upstream application errors. Only failures that
    /// produced no response at all (DNS, timeout, refused connection) land in
    /// the error arm.
    pub async fn send(
        &self,
        request: &OpenRouterRequest,
        api_key: &str,
    ) -> ApiResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let result = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.http_referer)
            .header("X-Title", &self.app_title)
            .json(request)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                ApiResult::success(response, status)
            }
            Err(err) => {
                let message = describe_transport_error(&err);
                tracing::warn!(error = %err, "Upstream call failed: {}", message);
                ApiResult::error(message, 502)
            }
        }
    }
}

/// Map a transport-level failure to a user-facing message category
///
/// Raw error type names must never reach the caller.
pub(crate) fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return "Request timed out".to_string();
    }

    if err.is_connect() {
        if is_connection_refused(err) {
            return "Connection refused".to_string();
        }
        return "Unable to reach OpenRouter (offline or DNS issue)".to_string();
    }

    "Unable to reach OpenRouter (offline or DNS issue)".to_string()
}

/// Walk the error source chain looking for ECONNREFUSED
fn is_connection_refused(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<std::io::Error>() {
            if io_err.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = inner.source();
    }
    false
}
