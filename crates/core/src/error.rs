//! Error taxonomy for registry requests.

use thiserror::Error;

/// Failure of a single registry request.
///
/// Payloads are plain strings so the error can be cloned into the
/// `Failed` state of a [`RemoteData`](crate::remote::RemoteData) snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never completed (connect, timeout, body read).
    #[error("network error: {0}")]
    Transport(String),
    /// The registry answered with an `error`/`description` envelope.
    #[error("[{code}] {description}")]
    Api {
        /// Machine-readable reason tag, e.g. `no_permission`.
        code: String,
        /// Human-readable description supplied by the registry.
        description: String,
    },
    /// Non-success status without an error envelope.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// The body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
    /// A success envelope lacked the expected payload key.
    #[error("response is missing `{0}`")]
    MissingField(&'static str),
}

impl ApiError {
    /// Reason tag when this is an application-level envelope.
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// True when the registry reported that no user is logged in.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self.code(), Some("no_permission" | "user_not_found"))
            || matches!(self, ApiError::Status { status: 401, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// Convenience alias for registry results.
pub type ApiResult<T> = Result<T, ApiError>;
