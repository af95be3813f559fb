//! Client error types.

use thiserror::Error;

/// Access token could not be turned into claims
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Token does not have the `header.payload.signature` shape
    #[error("Malformed token: expected three dot-separated segments")]
    Malformed,

    /// Payload is not valid base64url JSON with the expected claims
    #[error("Invalid token payload: {0}")]
    InvalidPayload(#[from] jsonwebtoken::errors::Error),
}

/// Persisted session state errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading or writing the session file failed
    #[error("Session storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session file contents could not be (de)serialized
    #[error("Session storage format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Errors surfaced by client operations
///
/// The request pipeline itself never produces these from its interception
/// step; they come from dispatching the request or reading its response.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request path could not be joined onto the base URL
    #[error("Invalid URL: {0}")]
    Url(String),

    /// Backend answered with a non-success status
    #[error("Request failed with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Session state could not be read or written
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Token returned by the backend could not be decoded
    #[error("Token error: {0}")]
    Decode(#[from] DecodeError),

    /// Registration passwords do not match
    #[error("Password fields didn't match")]
    PasswordMismatch,

    /// Operation needs a logged-in user
    #[error("Not authenticated")]
    NotAuthenticated,
}

impl ClientError {
    /// True when the backend rejected the request for lack of valid credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ClientError::Status { status, .. } if *status == reqwest::StatusCode::UNAUTHORIZED
        )
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
