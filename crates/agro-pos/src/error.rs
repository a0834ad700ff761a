//! # POS Error Type
//!
//! What callers of the engine (the shell, a UI bridge) see when an operation
//! fails.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ValidationError ──► CoreError ──┐                                      │
//! │                                  ├──► PosError ──► ErrorReport {code,   │
//! │  reqwest / HTTP status ──► GatewayError ─┘              message}        │
//! │                                                                         │
//! │  Background failures (line sync, confirm) never reach a caller: they    │
//! │  are logged and sent through PosEventEmitter::emit_error instead.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use agro_core::{CoreError, ValidationError};
use agro_gateway::GatewayError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for engine operations.
pub type PosResult<T> = Result<T, PosError>;

#[derive(Debug, Error)]
pub enum PosError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// Region, sales channel or currency could not be resolved.
    #[error("Missing context value: {0}")]
    MissingContext(&'static str),

    // =========================================================================
    // Tab Errors
    // =========================================================================
    #[error("Tab not found: {0}")]
    TabNotFound(String),

    /// The tab is being deleted and accepts no further edits.
    #[error("Tab {0} is being deleted")]
    TabDeleting(String),

    #[error("No active tab")]
    NoActiveTab,

    /// No edit session could be opened for the tab.
    #[error("No edit session for tab {tab_id}: {reason}")]
    SessionUnavailable { tab_id: String, reason: String },

    // =========================================================================
    // Checkout Errors
    // =========================================================================
    #[error("Cannot check out an empty cart")]
    EmptyCart,

    /// Operation not allowed in the current checkout state.
    #[error("Checkout is {actual}, expected {expected}")]
    CheckoutState {
        expected: &'static str,
        actual: &'static str,
    },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for PosError {
    fn from(err: ValidationError) -> Self {
        PosError::Core(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for PosError {
    fn from(err: std::io::Error) -> Self {
        PosError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for PosError {
    fn from(err: toml::de::Error) -> Self {
        PosError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for PosError {
    fn from(err: toml::ser::Error) -> Self {
        PosError::ConfigSaveFailed(err.to_string())
    }
}

impl From<url::ParseError> for PosError {
    fn from(err: url::ParseError) -> Self {
        PosError::InvalidUrl(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

/// Machine-readable error category for front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    CartError,
    SessionError,
    CheckoutError,
    GatewayError,
    Unauthorized,
    ConfigError,
}

/// Serializable form of an error, as emitted to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl PosError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PosError::InvalidConfig(_)
            | PosError::InvalidUrl(_)
            | PosError::ConfigLoadFailed(_)
            | PosError::ConfigSaveFailed(_)
            | PosError::MissingContext(_) => ErrorCode::ConfigError,
            PosError::TabNotFound(_) | PosError::NoActiveTab => ErrorCode::NotFound,
            PosError::TabDeleting(_) | PosError::SessionUnavailable { .. } => {
                ErrorCode::SessionError
            }
            PosError::EmptyCart | PosError::CheckoutState { .. } => ErrorCode::CheckoutError,
            PosError::Core(CoreError::Validation(_)) => ErrorCode::ValidationError,
            PosError::Core(_) => ErrorCode::CartError,
            PosError::Gateway(e) if e.is_auth_error() => ErrorCode::Unauthorized,
            PosError::Gateway(e) if e.is_not_found() => ErrorCode::NotFound,
            PosError::Gateway(_) => ErrorCode::GatewayError,
        }
    }

    /// True when the cashier can simply try the same action again.
    pub fn is_retryable(&self) -> bool {
        match self {
            PosError::Gateway(e) => e.is_retryable(),
            PosError::SessionUnavailable { .. } => true,
            _ => false,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(PosError::NoActiveTab.code(), ErrorCode::NotFound);
        assert_eq!(
            PosError::from(ValidationError::Required {
                field: "phone".into()
            })
            .code(),
            ErrorCode::ValidationError
        );
        assert_eq!(
            PosError::from(CoreError::LineNotFound("p1/1L".into())).code(),
            ErrorCode::CartError
        );
        assert_eq!(
            PosError::from(GatewayError::Unauthorized).code(),
            ErrorCode::Unauthorized
        );
    }

    #[test]
    fn test_report_serialization() {
        let err = PosError::from(GatewayError::Timeout);
        let json = serde_json::to_value(err.report()).unwrap();
        assert_eq!(json["code"], "GATEWAY_ERROR");
        assert_eq!(json["message"], "Request timed out");
        assert_eq!(json["retryable"], true);
    }
}
