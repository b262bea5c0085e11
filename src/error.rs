use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for request construction, signing and transport
#[derive(Debug, Error)]
pub enum RestError {
    /// Non-success HTTP status; the request reached the server and was rejected
    #[error("HTTP error {status}")]
    Http {
        status: StatusCode,
        /// Drained response body
        body: Vec<u8>,
    },

    /// Transport failure; the request never produced a response
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request building error
    #[error("failed to build request: {0}")]
    RequestBuild(String),

    /// Path cannot be sent as a literal request-line path.
    ///
    /// Raised whenever URL parsing would alter the path, including raw spaces,
    /// `?` or `#`, non-ASCII bytes and dot segments. Dot segments are removed
    /// even when pre-encoded as `%2E` or `%2E%2E`, so such paths are rejected
    /// too; `%2E` inside a longer segment (`a%2Eb`) passes unchanged.
    #[error("path {path:?} cannot be sent literally (would become {rewritten:?})")]
    InvalidPath { path: String, rewritten: String },

    /// Body is not valid application/x-www-form-urlencoded data
    #[error("invalid form body: {0}")]
    FormParse(String),

    /// OAuth signing failure
    #[error("signing failed: {0}")]
    Signing(String),

    /// Multipart assembly or parsing error
    #[error("multipart error: {0}")]
    Multipart(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for RestError {
    fn from(err: reqwest::Error) -> Self {
        RestError::Transport(Box::new(err))
    }
}

impl RestError {
    /// Create a new HTTP status error
    pub fn http(status: StatusCode, body: Vec<u8>) -> Self {
        RestError::Http { status, body }
    }

    /// Check if the request failed before any response arrived
    pub fn is_transport(&self) -> bool {
        matches!(self, RestError::Transport(_))
    }

    /// Check if the server answered with a non-success status
    pub fn is_status(&self) -> bool {
        matches!(self, RestError::Http { .. })
    }

    /// Check if this error is a not found error (404)
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(StatusCode::NOT_FOUND)
    }

    /// Get the HTTP status code if this is a status error
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            RestError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body carried by a status error
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            RestError::Http { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Result type for REST operations
pub type Result<T> = std::result::Result<T, RestError>;
