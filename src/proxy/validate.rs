//! Request validation: resolve the locally configured API key
//!
//! The proxy is single-tenant and forwards IDE-internal traffic, so the only
//! credential that matters is the one in the local settings store. Any
//! `Authorization` header sent by the client - absent, empty, garbage, or a
//! well-formed bearer token - is deliberately ignored and never inspected.

use super::error::ProxyError;
use crate::settings::SettingsStore;

/// Resolve the configured API key, or fail the request with a 401
///
/// On failure the caller must stop processing; nothing is forwarded upstream.
pub fn validate_and_get_api_key(
    settings: &dyn SettingsStore,
    request_id: &str,
) -> Result<String, ProxyError> {
    match settings.api_key() {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => {
            tracing::info!(request_id, "Rejecting request: no API key configured");
            Err(ProxyError::NotConfigured)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubSettings(Option<&'static str>);

    impl SettingsStore for StubSettings {
        fn api_key(&self) -> Option<String> {
            self.0.map(String::from)
        }
    }

    #[test]
    fn test_configured_key_is_returned() {
        let key = validate_and_get_api_key(&StubSettings(Some("sk-or-v1-abc")), "req-1");
        assert_eq!(key.unwrap(), "sk-or-v1-abc");
    }

    #[test]
    fn test_missing_key_fails() {
        assert!(validate_and_get_api_key(&StubSettings(None), "req-2").is_err());
    }

    #[test]
    fn test_blank_key_fails() {
        assert!(validate_and_get_api_key(&StubSettings(Some("  ")), "req-3").is_err());
    }
}
