//! Shared state for the proxy server
//!
//! One `ProxyState` is built per server start and cloned into every request
//! handler. It is a plain dependency container - settings store and upstream
//! client are injected by the caller, never reached through globals. Nothing
//! in it is request-scoped.

use std::sync::Arc;

use super::upstream::OpenRouterClient;
use crate::settings::SettingsStore;

#[derive(Clone)]
pub struct ProxyState {
    /// Local credential store (the only authentication source)
    pub settings: Arc<dyn SettingsStore>,
    /// Outbound OpenRouter client
    pub upstream: OpenRouterClient,
}

impl ProxyState {
    pub fn new(settings: Arc<dyn SettingsStore>, upstream: OpenRouterClient) -> Self {
        Self { settings, upstream }
    }
}
