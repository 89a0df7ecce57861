//! Error taxonomy for backend calls and dashboard operations.

use thiserror::Error;

/// Error returned by API, session and loader operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Credentials rejected at login
    #[error("{0}")]
    Auth(String),

    /// The backend rejected the bearer token, or no session exists
    #[error("Session expired. Please log in again.")]
    SessionExpired,

    /// A required field is missing or malformed
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// Non-success HTTP status other than 401
    #[error("Server error {status}{}", .message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Server { status: u16, message: Option<String> },

    /// Connection failure or timeout
    #[error("Request failed: {0}")]
    Network(String),

    /// Body did not match the expected shape
    #[error("Invalid response: {0}")]
    Decode(String),

    /// The session could not be written to durable storage
    #[error("Could not save the session: {0}")]
    Storage(String),

    /// Another reload or mutation is still running
    #[error("Another request is already in progress")]
    Busy,
}

impl ApiError {
    pub fn validation(field: &str, message: &str) -> Self {
        ApiError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    /// Message supplied by the server, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Server { message, .. } => message.as_deref(),
            ApiError::Auth(msg) => Some(msg.as_str()),
            _ => None,
        }
    }

    /// Banner text for this error.
    ///
    /// Validation and busy errors always describe themselves. Everything else
    /// uses `fallback`, unless `prefer_server` is set and the server said
    /// something more specific.
    pub fn user_message(&self, fallback: &str, prefer_server: bool) -> String {
        match self {
            ApiError::Validation { message, .. } => message.clone(),
            ApiError::Busy => self.to_string(),
            ApiError::SessionExpired | ApiError::Storage(_) => self.to_string(),
            ApiError::Auth(msg) => msg.clone(),
            _ if prefer_server => self
                .server_message()
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string()),
            _ => fallback.to_string(),
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
