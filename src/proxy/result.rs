// Outcome type for outbound OpenRouter calls
//
// Expected failures (transport errors, upstream 4xx/5xx) are data, not
// exceptions. Every caller pattern-matches both arms; nothing on the request
// path unwinds past the HTTP boundary.

/// Result of an outbound API call
#[derive(Debug)]
pub enum ApiResult<T> {
    /// The call produced a response (the HTTP status may still be non-2xx)
    Success { data: T, status: u16 },
    /// The call failed before a response was available (DNS, timeout, refused)
    Error { message: String, status: u16 },
}

impl<T> ApiResult<T> {
    /// Build a success with the given HTTP status
    pub fn success(data: T, status: u16) -> Self {
        ApiResult::Success { data, status }
    }

    /// Build an error with a human-readable message
    pub fn error(message: impl Into<String>, status: u16) -> Self {
        ApiResult::Error {
            message: message.into(),
            status,
        }
    }

    /// The HTTP status associated with either arm
    #[allow(dead_code)]
    pub fn status(&self) -> u16 {
        match self {
            ApiResult::Success { status, .. } => *status,
            ApiResult::Error { status, .. } => *status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_arms_carry_status() {
        let ok: ApiResult<&str> = ApiResult::success("body", 200);
        let err: ApiResult<&str> = ApiResult::error("Request timed out", 502);
        assert_eq!(ok.status(), 200);
        assert_eq!(err.status(), 502);
        match err {
            ApiResult::Error { message, .. } => assert_eq!(message, "Request timed out"),
            ApiResult::Success { .. } => panic!("expected error arm"),
        }
    }
}
