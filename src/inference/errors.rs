//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Callers log them;
//! the variants only carry the context a log entry needs.

use thiserror::Error;

/// Errors that can occur during a model completion call.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the model endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// Non-2xx HTTP response from the model endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The endpoint answered 2xx but the body was not a usable completion.
    #[error("invalid completion response: {reason}")]
    ResponseError { reason: String },

    /// The HTTP client could not be constructed.
    #[error("client setup error: {reason}")]
    ClientSetup { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_status_and_body() {
        let err = InferenceError::HttpError {
            status: 402,
            body: "Insufficient Balance".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 402: Insufficient Balance");
    }
}
