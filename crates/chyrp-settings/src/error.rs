//! Error types for settings operations.

use thiserror::Error;

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Errors that can occur while reading or writing settings.
///
/// The type is `Clone` so a single load outcome can be handed to every
/// caller that joined the same in-flight request.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    /// The request never reached the server or the connection failed.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// A write payload was rejected before it was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A 2xx response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings store has been disposed")]
    Disposed,
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        SettingsError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for SettingsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SettingsError::Timeout
        } else if err.is_decode() {
            SettingsError::Decode(err.to_string())
        } else {
            SettingsError::Network(err.to_string())
        }
    }
}

impl SettingsError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        SettingsError::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by an [`SettingsError::Api`] error.
    #[inline]
    pub fn status(&self) -> Option<u16> {
        match self {
            SettingsError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the request did not complete a round trip.
    #[inline]
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, SettingsError::Network(_) | SettingsError::Timeout)
    }

    /// Check if a user-initiated retry has a chance of succeeding.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SettingsError::Network(_) | SettingsError::Timeout => true,
            SettingsError::Api { status, .. } => {
                matches!(status, 408 | 425 | 429 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Check if this is an access denied error.
    #[inline]
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}
