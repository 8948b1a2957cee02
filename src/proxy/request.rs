// Chat completion request model and body parsing
//
// The proxy accepts OpenAI-shaped chat completion requests. Message content
// is either a plain string or an ordered array of typed parts (text,
// image_url, ...). The content shape is carried opaquely: a string stays a
// string, an N-part array stays an N-part array. Unknown top-level fields are
// kept in a flattened map so new sampling parameters pass through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An OpenAI-compatible chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Value>,

    #[serde(default)]
    pub stream: bool,

    /// Fields this proxy does not model explicitly (tools, response_format, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,

    /// Role-specific extras (name, tool_call_id, tool_calls, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Message author role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message content: a plain string or an ordered sequence of parts
///
/// Untagged so serde distinguishes the variants by JSON shape. Serialization
/// reproduces exactly the variant that was parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One element of a multimodal content array
///
/// Only the `type` discriminator is modeled; the payload (`text`,
/// `image_url`, or any future shape) rides along in the flattened map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub part_type: String,

    #[serde(flatten)]
    pub data: Map<String, Value>,
}

/// Parse an inbound request body into a structured chat completion request
///
/// Returns `None` on syntactically invalid JSON or a body that does not match
/// the chat completion shape. Parse failures are logged and never propagate;
/// the caller maps `None` to a 400 response. Stateless, so repeated calls on
/// the same input yield the same outcome.
pub fn parse_request_body(raw_body: &str, request_id: &str) -> Option<ChatCompletionRequest> {
    match serde_json::from_str::<ChatCompletionRequest>(raw_body) {
        Ok(request) => Some(request),
        Err(err) => {
            tracing::warn!(request_id, error = %err, "Failed to parse request body");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_request() {
        let body = r#"{"model":"openai/gpt-4-turbo","messages":[{"role":"user","content":"Hi"}]}"#;
        let request = parse_request_body(body, "req-1").expect("should parse");

        assert_eq!(request.model, "openai/gpt-4-turbo");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert!(!request.stream);
        match &request.messages[0].content {
            MessageContent::Text(text) => assert_eq!(text, "Hi"),
            MessageContent::Parts(_) => panic!("string content must stay a string"),
        }
    }

    #[test]
    fn test_parse_multimodal_content() {
        let body = r#"{
            "model": "openai/gpt-4o",
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "What is in this image?"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
                ]
            }],
            "stream": true
        }"#;
        let request = parse_request_body(body, "req-2").expect("should parse");

        assert!(request.stream);
        match &request.messages[0].content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0].part_type, "text");
                assert_eq!(parts[1].part_type, "image_url");
            }
            MessageContent::Text(_) => panic!("array content must stay an array"),
        }
    }

    #[test]
    fn test_unknown_fields_are_preserved() {
        let body = r#"{
            "model": "m",
            "messages": [{"role":"user","content":"x"}],
            "response_format": {"type": "json_object"},
            "seed": 7
        }"#;
        let request = parse_request_body(body, "req-3").expect("should parse");

        assert!(request.extra.contains_key("response_format"));
        assert_eq!(request.extra.get("seed"), Some(&Value::from(7)));
    }

    #[test]
    fn test_malformed_json_returns_none() {
        assert!(parse_request_body("{not json", "req-4").is_none());
        assert!(parse_request_body(r#"{"model": 42}"#, "req-5").is_none());
    }

    // Parsing is stateless: the same malformed input fails identically twice
    #[test]
    fn test_parse_failure_is_idempotent() {
        let bad = r#"{"model":"m","messages":"#;
        let first = parse_request_body(bad, "req-6").is_none();
        let second = parse_request_body(bad, "req-6").is_none();
        assert!(first && second);
    }

    #[test]
    fn test_sampling_params_parsed() {
        let body = r#"{
            "model": "m",
            "messages": [{"role":"system","content":"be brief"}],
            "temperature": 0.2,
            "max_tokens": 512,
            "top_p": 0.9
        }"#;
        let request = parse_request_body(body, "req-7").expect("should parse");

        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(request.top_p, Some(0.9));
        assert_eq!(request.messages[0].role, Role::System);
    }
}
