//! Request translation: OpenAI chat completion shape → OpenRouter shape
//!
//! OpenRouter exposes an OpenAI-compatible API, so the mapping is structural
//! rather than semantic: field-for-field, with message content moved across
//! verbatim. The translator is pure and holds no state.
//!
//! Model ids are not validated here. The proxy forwards whatever the caller
//! asked for; OpenRouter is the authority on which models exist.

use serde::Serialize;
use serde_json::{Map, Value};

use super::request::{ChatCompletionRequest, ChatMessage};

/// The request body sent to the OpenRouter chat completions endpoint
#[derive(Debug, Clone, Serialize)]
pub struct OpenRouterRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Value>,

    pub stream: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Translate an OpenAI-shaped request into the OpenRouter request shape
///
/// Message content is moved, not rebuilt: a scalar string stays a scalar
/// string and a parts array keeps its length and element types. Sampling
/// parameters, the stream flag, and unmodeled extra fields pass through
/// unchanged.
pub fn translate_chat_completion_request(request: ChatCompletionRequest) -> OpenRouterRequest {
    OpenRouterRequest {
        model: request.model,
        messages: request.messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        top_p: request.top_p,
        frequency_penalty: request.frequency_penalty,
        presence_penalty: request.presence_penalty,
        stop: request.stop,
        stream: request.stream,
        extra: request.extra,
    }
}
