//! Error taxonomy for the fetch boundary.

use std::fmt;

/// Failure of one request to the game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network or HTTP-level failure (connect, timeout, non-success status).
    Transport(String),
    /// The bearer token was rejected (HTTP 401).
    Unauthorized,
    /// The response body did not match the expected shape.
    MalformedSnapshot(String),
}

impl FetchError {
    pub fn transport(err: impl fmt::Display) -> Self {
        FetchError::Transport(err.to_string())
    }

    pub fn malformed(err: impl fmt::Display) -> Self {
        FetchError::MalformedSnapshot(err.to_string())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FetchError::Unauthorized)
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "transport error: {msg}"),
            FetchError::Unauthorized => write!(f, "unauthorized"),
            FetchError::MalformedSnapshot(msg) => write!(f, "malformed payload: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::malformed(err)
    }
}
