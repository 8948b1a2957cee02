// Settings store - the credential collaborator for the proxy core
//
// The proxy never reads credentials itself; it asks an injected SettingsStore.
// The default implementation is backed by the loaded Config (env var or config
// file), but tests inject stubs. Explicit injection instead of a global
// service locator keeps every component independently constructible.

use sha2::{Digest, Sha256};

use crate::config::Config;

/// Narrow interface to locally stored credentials
pub trait SettingsStore: Send + Sync {
    /// The configured OpenRouter API key, if any
    fn api_key(&self) -> Option<String>;

    /// Whether a usable (non-blank) API key is configured
    fn is_configured(&self) -> bool {
        self.api_key().is_some_and(|key| !key.trim().is_empty())
    }
}

/// Settings store backed by the loaded configuration
pub struct ConfigSettings {
    api_key: Option<String>,
}

impl ConfigSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.api_key.clone(),
        }
    }
}

impl SettingsStore for ConfigSettings {
    fn api_key(&self) -> Option<String> {
        self.api_key.clone()
    }
}

/// Short SHA-256 fingerprint of an API key, safe for log lines
///
/// The actual key must never be logged.
pub fn key_fingerprint(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let hash = hasher.finalize();
    format!("{:x}", hash)[..16].to_string()
}
