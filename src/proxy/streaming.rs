// Streaming response relay - upstream SSE in, strict OpenAI SSE out
//
// The relay consumes the upstream byte stream, reassembles it into lines
// (upstream chunk boundaries fall anywhere, including mid-line), and
// re-emits every data line in strict OpenAI framing:
//
//   data: <json>\n\n
//
// The blank separator line is a hard correctness requirement. Without it,
// OpenAI-compatible SSE parsers concatenate adjacent JSON objects and fail.
// Two data lines are never emitted without a blank line between them.
//
// Output guarantees, on every path:
// - the stream always terminates with `data: [DONE]\n\n`;
// - an empty upstream stream (no body, zero data lines, or only the [DONE]
//   marker) produces exactly one synthetic error chunk before the terminator;
// - a malformed JSON payload in one line is forwarded as-is and does not
//   abort the stream - only a read failure does, and that too ends with an
//   error chunk followed by the terminator.
//
// If the client disconnects, axum drops the relay stream, which drops the
// upstream response and releases its connection. A client disconnect and an
// upstream abort are both just "stream ended" here.

use std::convert::Infallible;

use axum::{
    body::Body,
    http::{header, Response, StatusCode},
    response::IntoResponse,
};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};

/// Terminal SSE event, emitted exactly once per stream
const DONE_EVENT: &str = "data: [DONE]\n\n";

/// Relays one upstream streaming response to the local caller
pub struct StreamingResponseHandler {
    model: String,
    request_id: String,
}

impl StreamingResponseHandler {
    pub fn new(model: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            request_id: request_id.into(),
        }
    }

    /// Turn the upstream response into the client-facing SSE response
    ///
    /// Non-2xx upstream statuses become a single mapped error chunk followed
    /// by the terminator; 2xx responses are relayed line by line.
    pub async fn respond(self, upstream: reqwest::Response) -> Response<Body> {
        let status = upstream.status();

        if !status.is_success() {
            let body = upstream.text().await.unwrap_or_default();
            let message = map_upstream_error(status.as_u16(), &body);
            tracing::info!(
                request_id = %self.request_id,
                status = status.as_u16(),
                "Upstream error on streaming request: {}",
                message
            );
            return sse_response(Body::from(error_stream_text(
                &self.model,
                &self.request_id,
                &message,
            )));
        }

        let stream = relay(upstream.bytes_stream(), self.model, self.request_id);
        sse_response(Body::from_stream(stream))
    }

    /// Respond when the upstream call produced no response at all
    /// (DNS failure, timeout, refused connection)
    pub fn transport_error_response(self, message: &str) -> Response<Body> {
        sse_response(Body::from(error_stream_text(
            &self.model,
            &self.request_id,
            message,
        )))
    }
}

/// Build the SSE response envelope: event-stream content type, no buffering
fn sse_response(body: Body) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// One parsed upstream SSE line
enum SseLine {
    /// A data line with its payload (possibly malformed JSON - forwarded anyway)
    Data(String),
    /// The upstream terminal marker
    Done,
    /// Comments, event names, blank lines - nothing to forward
    Other,
}

fn classify_line(line: &str) -> SseLine {
    let line = line.trim_end_matches('\r');
    let Some(payload) = line.strip_prefix("data:") else {
        return SseLine::Other;
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return SseLine::Other;
    }
    if payload == "[DONE]" {
        return SseLine::Done;
    }
    SseLine::Data(payload.to_string())
}

/// Remove and return the first complete line from the buffer
fn drain_line(buf: &mut String) -> Option<String> {
    let idx = buf.find('\n')?;
    let line = buf[..idx].to_string();
    buf.drain(..=idx);
    Some(line)
}

/// The relay state machine
///
/// Forwards data lines in upstream order, counts what was forwarded, and
/// closes out the stream with the invariants described in the module docs.
fn relay<S, E>(
    upstream: S,
    model: String,
    request_id: String,
) -> impl Stream<Item = Result<Bytes, Infallible>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display,
{
    async_stream::stream! {
        futures::pin_mut!(upstream);

        let mut buf = String::new();
        let mut forwarded = 0usize;
        let mut saw_done = false;
        let mut failed = false;

        while !saw_done && !failed {
            let Some(next) = upstream.next().await else {
                break;
            };

            match next {
                Ok(bytes) => {
                    buf.push_str(&String::from_utf8_lossy(&bytes));
                    while let Some(line) = drain_line(&mut buf) {
                        match classify_line(&line) {
                            SseLine::Data(payload) => {
                                forwarded += 1;
                                yield Ok(Bytes::from(format!("data: {}\n\n", payload)));
                            }
                            SseLine::Done => {
                                saw_done = true;
                                break;
                            }
                            SseLine::Other => {}
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(request_id = %request_id, error = %err, "Upstream stream failed mid-read");
                    yield Ok(Bytes::from(error_event(
                        &model,
                        &request_id,
                        "Stream interrupted while reading from OpenRouter",
                    )));
                    failed = true;
                }
            }
        }

        // A final line without a trailing newline is still a line
        if !saw_done && !failed && !buf.is_empty() {
            let rest = std::mem::take(&mut buf);
            if let SseLine::Data(payload) = classify_line(&rest) {
                forwarded += 1;
                yield Ok(Bytes::from(format!("data: {}\n\n", payload)));
            }
        }

        if forwarded == 0 && !failed {
            tracing::info!(request_id = %request_id, "Upstream stream had no content, emitting error chunk");
            yield Ok(Bytes::from(error_event(
                &model,
                &request_id,
                "No response received from OpenRouter",
            )));
        }

        yield Ok(Bytes::from(DONE_EVENT));
    }
}

/// A synthetic OpenAI-shaped terminal chunk carrying an error description
///
/// Emitted whole or not at all, always with `finish_reason: "stop"` so
/// downstream parsers treat it as a normal end of stream.
fn error_chunk(model: &str, request_id: &str, content: &str) -> Value {
    json!({
        "id": format!("chatcmpl-{}", request_id),
        "object": "chat.completion.chunk",
        "created": Utc::now().timestamp(),
        "model": model,
        "choices": [{
            "index": 0,
            "delta": {
                "role": "assistant",
                "content": content,
            },
            "finish_reason": "stop",
        }]
    })
}

/// One framed error event; serde_json escapes quotes and newlines in content
fn error_event(model: &str, request_id: &str, content: &str) -> String {
    format!("data: {}\n\n", error_chunk(model, request_id, content))
}

/// A complete error-only SSE body: one error chunk, then the terminator
fn error_stream_text(model: &str, request_id: &str, message: &str) -> String {
    format!(
        "{}{}",
        error_event(model, request_id, message),
        DONE_EVENT
    )
}

/// Map a non-2xx upstream status to a user-facing error message
///
/// Fixed categories for the statuses OpenRouter commonly returns; anything
/// else falls back to the body's `error.message` field when the body is
/// JSON, known plain-text patterns, the verbatim body, or a status-derived
/// message, in that order.
pub(crate) fn map_upstream_error(status: u16, body: &str) -> String {
    match status {
        401 => "Authentication failed".to_string(),
        402 => "Insufficient credits".to_string(),
        429 => "Rate limit exceeded".to_string(),
        500..=599 => "OpenRouter service error".to_string(),
        _ => {
            if let Ok(value) = serde_json::from_str::<Value>(body) {
                if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
                    return message.to_string();
                }
            }
            if let Some(friendly) = friendly_plain_text(body) {
                return friendly;
            }
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("OpenRouter returned status {}", status)
            } else {
                trimmed.to_string()
            }
        }
    }
}

/// Match known substrings in plain-text error bodies
fn friendly_plain_text(body: &str) -> Option<String> {
    let lower = body.to_lowercase();
    let message = if lower.contains("rate limit") {
        "Rate limit exceeded"
    } else if lower.contains("unauthorized") {
        "Authentication failed"
    } else if lower.contains("not found") {
        "Requested resource not found"
    } else if lower.contains("unavailable") {
        "OpenRouter is temporarily unavailable"
    } else if lower.contains("timeout") {
        "Request timed out"
    } else {
        return None;
    };
    Some(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    type ChunkResult = Result<Bytes, std::io::Error>;

    fn ok(text: &str) -> ChunkResult {
        Ok(Bytes::from(text.to_string()))
    }

    fn read_error() -> ChunkResult {
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ))
    }

    async fn run_relay(chunks: Vec<ChunkResult>) -> String {
        let output: Vec<Bytes> = relay(stream::iter(chunks), "test/model".into(), "req-t".into())
            .map(|item| item.unwrap())
            .collect()
            .await;
        output
            .iter()
            .map(|b| String::from_utf8_lossy(b).to_string())
            .collect()
    }

    fn data_lines(output: &str) -> Vec<&str> {
        output
            .lines()
            .filter(|l| l.starts_with("data: "))
            .collect()
    }

    /// Every data line is immediately followed by a blank line
    fn assert_sse_framing(output: &str) {
        let lines: Vec<&str> = output.split('\n').collect();
        for (i, line) in lines.iter().enumerate() {
            if line.starts_with("data: ") {
                assert_eq!(
                    lines.get(i + 1).copied(),
                    Some(""),
                    "data line not followed by blank line:\n{}",
                    output
                );
            }
        }
    }

    #[tokio::test]
    async fn test_two_chunks_then_done_relayed_in_order() {
        let output = run_relay(vec![ok(
            "data: {\"id\":\"a\",\"choices\":[]}\n\ndata: {\"id\":\"b\",\"choices\":[]}\n\ndata: [DONE]\n\n",
        )])
        .await;

        let lines = data_lines(&output);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"id\":\"a\""));
        assert!(lines[1].contains("\"id\":\"b\""));
        assert_eq!(lines[2], "data: [DONE]");
        assert_sse_framing(&output);
    }

    #[tokio::test]
    async fn test_stream_always_ends_with_done() {
        for chunks in [
            vec![ok("data: {\"x\":1}\n")],
            vec![ok("data: [DONE]\n")],
            vec![],
            vec![read_error()],
        ] {
            let output = run_relay(chunks).await;
            assert!(
                output.ends_with(DONE_EVENT),
                "missing terminator:\n{}",
                output
            );
        }
    }

    #[tokio::test]
    async fn test_empty_stream_synthesizes_one_error_chunk() {
        let output = run_relay(vec![]).await;
        let lines = data_lines(&output);

        assert_eq!(lines.len(), 2, "expected error chunk + [DONE]:\n{}", output);
        let chunk: Value = serde_json::from_str(lines[0].strip_prefix("data: ").unwrap()).unwrap();
        assert_eq!(chunk["object"], "chat.completion.chunk");
        assert_eq!(chunk["model"], "test/model");
        assert_eq!(chunk["choices"][0]["finish_reason"], "stop");
        assert!(chunk["choices"][0]["delta"]["content"]
            .as_str()
            .unwrap()
            .contains("No response received from OpenRouter"));
        assert_eq!(lines[1], "data: [DONE]");
        assert_sse_framing(&output);
    }

    #[tokio::test]
    async fn test_only_done_marker_synthesizes_error_chunk() {
        let output = run_relay(vec![ok("data: [DONE]\n\n")]).await;
        let lines = data_lines(&output);

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("No response received from OpenRouter"));
        assert_eq!(lines[1], "data: [DONE]");
    }

    #[tokio::test]
    async fn test_lines_split_across_chunk_boundaries() {
        let output = run_relay(vec![
            ok("data: {\"id\":\"a\",\"cho"),
            ok("ices\":[]}\n\ndata: {\"id\":"),
            ok("\"b\",\"choices\":[]}\n\ndata: [DONE]\n\n"),
        ])
        .await;

        let lines = data_lines(&output);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"id\":\"a\""));
        assert!(lines[1].contains("\"id\":\"b\""));
        assert_sse_framing(&output);
    }

    #[tokio::test]
    async fn test_malformed_chunk_is_forwarded_not_fatal() {
        let output = run_relay(vec![ok(
            "data: {not valid json\ndata: {\"id\":\"ok\",\"choices\":[]}\ndata: [DONE]\n",
        )])
        .await;

        let lines = data_lines(&output);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "data: {not valid json");
        assert!(lines[1].contains("\"id\":\"ok\""));
        assert_sse_framing(&output);
    }

    #[tokio::test]
    async fn test_read_failure_after_content_emits_error_then_done() {
        let output = run_relay(vec![ok("data: {\"id\":\"a\",\"choices\":[]}\n\n"), read_error()]).await;

        let lines = data_lines(&output);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"id\":\"a\""));
        assert!(lines[1].contains("Stream interrupted"));
        assert_eq!(lines[2], "data: [DONE]");
        assert_sse_framing(&output);
    }

    #[tokio::test]
    async fn test_read_failure_first_emits_single_error_chunk() {
        let output = run_relay(vec![read_error()]).await;
        let lines = data_lines(&output);

        // One error chunk, not an additional "no response" chunk
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Stream interrupted"));
    }

    #[tokio::test]
    async fn test_non_data_lines_are_not_forwarded() {
        let output = run_relay(vec![ok(
            ": comment\nevent: ping\n\ndata: {\"id\":\"a\",\"choices\":[]}\n\ndata: [DONE]\n\n",
        )])
        .await;

        let lines = data_lines(&output);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"id\":\"a\""));
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline_is_forwarded() {
        let output = run_relay(vec![ok("data: {\"id\":\"tail\",\"choices\":[]}")]).await;
        let lines = data_lines(&output);

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"id\":\"tail\""));
        assert_eq!(lines[1], "data: [DONE]");
    }

    #[tokio::test]
    async fn test_crlf_lines_are_handled() {
        let output =
            run_relay(vec![ok("data: {\"id\":\"a\",\"choices\":[]}\r\n\r\ndata: [DONE]\r\n")])
                .await;

        let lines = data_lines(&output);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"id\":\"a\""));
        assert!(!lines[0].contains('\r'));
    }

    /// Serialized output never concatenates two JSON objects without separator
    #[tokio::test]
    async fn test_no_adjacent_json_objects() {
        let output = run_relay(vec![ok(
            "data: {\"id\":\"a\",\"choices\":[{\"delta\":{}}]}\ndata: {\"id\":\"b\",\"choices\":[{\"delta\":{}}]}\ndata: [DONE]\n",
        )])
        .await;

        assert!(!output.contains("}{"));
        assert!(!output.contains("}data:"));
        assert_sse_framing(&output);
    }

    #[test]
    fn test_status_mapping_table() {
        assert_eq!(map_upstream_error(401, ""), "Authentication failed");
        assert_eq!(map_upstream_error(402, ""), "Insufficient credits");
        assert_eq!(map_upstream_error(429, ""), "Rate limit exceeded");
        assert_eq!(map_upstream_error(500, ""), "OpenRouter service error");
        assert_eq!(map_upstream_error(503, ""), "OpenRouter service error");
    }

    #[test]
    fn test_other_status_uses_json_error_message() {
        let message = map_upstream_error(404, r#"{"error":{"message":"Model not found"}}"#);
        assert_eq!(message, "Model not found");
    }

    #[test]
    fn test_plain_text_patterns_are_friendly() {
        assert_eq!(
            map_upstream_error(418, "you hit the rate limit"),
            "Rate limit exceeded"
        );
        assert_eq!(
            map_upstream_error(418, "Unauthorized request"),
            "Authentication failed"
        );
        assert_eq!(
            map_upstream_error(418, "backend unavailable right now"),
            "OpenRouter is temporarily unavailable"
        );
        assert_eq!(map_upstream_error(418, "gateway timeout"), "Request timed out");
    }

    #[test]
    fn test_unmatched_plain_text_forwarded_verbatim() {
        assert_eq!(
            map_upstream_error(418, "something very strange happened"),
            "something very strange happened"
        );
        assert_eq!(
            map_upstream_error(418, ""),
            "OpenRouter returned status 418"
        );
    }

    #[test]
    fn test_error_chunk_content_is_escaped() {
        let event = error_event("m", "req-1", "line one\nwith \"quotes\"");
        let payload = event
            .strip_prefix("data: ")
            .unwrap()
            .strip_suffix("\n\n")
            .unwrap();
        // Single line, parseable, content preserved
        assert!(!payload.contains('\n'));
        let chunk: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(
            chunk["choices"][0]["delta"]["content"],
            "line one\nwith \"quotes\""
        );
    }

    #[test]
    fn test_error_stream_text_shape() {
        let text = error_stream_text("test/model", "req-9", "Rate limit exceeded");
        let lines: Vec<&str> = text.lines().filter(|l| l.starts_with("data: ")).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Rate limit exceeded"));
        assert_eq!(lines[1], "data: [DONE]");
        assert_sse_framing(&text);
    }

    #[tokio::test]
    async fn test_scenario_rate_limited_streaming_call() {
        // Upstream 429 with a JSON error body maps to one rate-limit error
        // chunk followed by the terminator
        let message = map_upstream_error(429, r#"{"error":{"message":"Too many requests"}}"#);
        let text = error_stream_text("openai/gpt-4-turbo", "req-d", &message);

        let lines: Vec<&str> = text.lines().filter(|l| l.starts_with("data: ")).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].to_lowercase().contains("rate limit"));
        assert_eq!(lines[1], "data: [DONE]");
    }
}
