// Proxy module - local HTTP server that forwards chat completions to OpenRouter
//
// The proxy accepts OpenAI-compatible requests on localhost, authenticates
// them against the locally configured API key, translates them to the
// OpenRouter request shape, and relays the response - buffered JSON straight
// through, SSE streams line by line with strict OpenAI framing.
//
// Request flow:
//   handlers -> validate -> request (parse) -> translation -> upstream
//            -> streaming relay | buffered passthrough
//
// All request/response state is per-request. The only long-lived pieces are
// the listening socket (owned by server::ProxyServer) and the injected
// collaborators in state::ProxyState.

pub mod error;
pub mod handlers;
pub mod request;
pub mod result;
pub mod server;
pub mod state;
pub mod streaming;
pub mod translation;
pub mod upstream;
pub mod validate;

pub use server::{ProxyServer, ProxyStatus};
pub use state::ProxyState;

/// Generate a unique ID for correlating a request across log lines and chunks
pub fn generate_request_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let count = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", chrono::Utc::now().timestamp_millis(), count)
}
