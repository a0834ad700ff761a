//! # Gateway Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Gateway Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Backend answer      │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidUrl     │  │  Connection     │  │  Unauthorized/Forbidden │ │
//! │  │  ClientBuild    │  │  Timeout        │  │  NotFound / Rejected    │ │
//! │  │                 │  │                 │  │  Conflict / Server      │ │
//! │  │                 │  │                 │  │  InvalidResponse        │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Result type alias for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure of a call to the commerce backend.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Base URL or a derived endpoint URL is invalid.
    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Could not reach the backend.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The request exceeded the configured timeout.
    #[error("Request timed out")]
    Timeout,

    // =========================================================================
    // Backend Answers
    // =========================================================================
    /// Missing or expired API token.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend refused the input (400 / 422).
    #[error("Rejected by backend: {0}")]
    Rejected(String),

    /// The resource is in a state that does not allow the call, e.g. no
    /// edit session is open on the draft order (409).
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend error {status}: {message}")]
    Server { status: u16, message: String },

    /// The body did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else if err.is_builder() {
            GatewayError::InvalidUrl(err.to_string())
        } else {
            GatewayError::Connection(err.to_string())
        }
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        GatewayError::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::InvalidResponse(err.to_string())
    }
}

/// Error body the backend sends with non-2xx answers.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl GatewayError {
    /// Maps a non-success status and its body to an error.
    ///
    /// JSON bodies with a `message` field contribute just the message.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| body.trim().to_string());

        match status {
            StatusCode::UNAUTHORIZED => GatewayError::Unauthorized,
            StatusCode::FORBIDDEN => GatewayError::Forbidden(message),
            StatusCode::NOT_FOUND => GatewayError::NotFound(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                GatewayError::Rejected(message)
            }
            StatusCode::CONFLICT => GatewayError::Conflict(message),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => GatewayError::Timeout,
            other => GatewayError::Server {
                status: other.as_u16(),
                message,
            },
        }
    }

    // =========================================================================
    // Error Categorization
    // =========================================================================

    /// True when repeating the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Connection(_) | GatewayError::Timeout | GatewayError::Conflict(_) => {
                true
            }
            GatewayError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }

    /// True for credential problems the cashier cannot fix by retrying.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, GatewayError::Unauthorized | GatewayError::Forbidden(_))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_extracts_message() {
        let err = GatewayError::from_status(
            StatusCode::NOT_FOUND,
            r#"{"type":"not_found","message":"Draft order with id: dord_1 was not found"}"#,
        );
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Not found: Draft order with id: dord_1 was not found"
        );
    }

    #[test]
    fn test_from_status_plain_body() {
        let err = GatewayError::from_status(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert!(matches!(
            &err,
            GatewayError::Server { status: 502, message } if message == "upstream down"
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_categorization() {
        assert!(GatewayError::from_status(StatusCode::UNAUTHORIZED, "").is_auth_error());
        assert!(GatewayError::from_status(StatusCode::CONFLICT, "{}").is_retryable());
        assert!(!GatewayError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "{}").is_retryable());
        assert!(GatewayError::Timeout.is_retryable());
        assert!(!GatewayError::InvalidUrl("x".into()).is_retryable());
    }
}
