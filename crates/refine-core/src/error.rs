//! Error types for Refine.
//!
//! Two layers live here:
//! - [`RefineError`]: the typed error returned by local operations (capture,
//!   replacement, storage, protocol decoding).
//! - [`ErrorReport`]: the serializable payload forwarded between contexts,
//!   tagged with an [`ErrorType`] from the closed taxonomy.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Machine-readable error category carried in every [`ErrorReport`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorType {
    /// Bad, empty or over-length input. Never retried.
    Validation,
    /// Missing or rejected credential. Never retried.
    Auth,
    /// The remote service throttled the request.
    RateLimit,
    /// Any other remote status error.
    Api,
    /// Connection-level failure.
    Network,
    /// An attempt exceeded its time bound.
    Timeout,
    /// A success response that could not be decoded.
    Parse,
    /// A success response without any rewritten text.
    Empty,
    /// The user triggered an action without selecting text.
    EmptySelection,
    /// The document changed underneath an anchor.
    Dom,
    /// The page does not allow the extension to run.
    Permission,
    /// The call was superseded before it finished.
    Cancelled,
    /// Fallback.
    Unknown,
}

/// Serializable error payload that crosses context boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error_type: ErrorType,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ErrorReport {
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "[{}] {} (HTTP {})", self.error_type, self.message, code),
            None => write!(f, "[{}] {}", self.error_type, self.message),
        }
    }
}

impl std::error::Error for ErrorReport {}

/// A shared error type for the local (non-network) side of Refine.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefineError {
    /// No usable text selection
    #[error("No text selected")]
    EmptySelection,

    /// The page origin is off-limits
    #[error("Refine cannot run on {origin}")]
    Permission { origin: String },

    /// The document no longer contains the anchor
    #[error("DOM error: {0}")]
    Dom(String),

    /// Operation not allowed in the current overlay state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error (settings storage)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RefineError {
    pub fn dom(message: impl Into<String>) -> Self {
        Self::Dom(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_dom(&self) -> bool {
        matches!(self, Self::Dom(_))
    }

    /// Taxonomy tag used when this error is forwarded as an [`ErrorReport`].
    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::EmptySelection => ErrorType::EmptySelection,
            Self::Permission { .. } => ErrorType::Permission,
            Self::Dom(_) => ErrorType::Dom,
            Self::Serialization { .. } => ErrorType::Parse,
            Self::InvalidState(_)
            | Self::Io { .. }
            | Self::Config(_)
            | Self::Internal(_) => ErrorType::Unknown,
        }
    }
}

impl From<&RefineError> for ErrorReport {
    fn from(err: &RefineError) -> Self {
        ErrorReport::new(err.error_type(), err.to_string())
    }
}

impl From<RefineError> for ErrorReport {
    fn from(err: RefineError) -> Self {
        ErrorReport::from(&err)
    }
}

impl From<std::io::Error> for RefineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for RefineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for RefineError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, RefineError>`.
pub type Result<T> = std::result::Result<T, RefineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_renders_snake_case() {
        assert_eq!(ErrorType::RateLimit.to_string(), "rate_limit");
        assert_eq!(ErrorType::EmptySelection.as_ref(), "empty_selection");
        assert_eq!(
            serde_json::to_string(&ErrorType::Timeout).unwrap(),
            "\"timeout\""
        );
        assert_eq!("dom".parse::<ErrorType>().unwrap(), ErrorType::Dom);
    }

    #[test]
    fn test_report_from_refine_error() {
        let report = ErrorReport::from(RefineError::dom("range detached"));
        assert_eq!(report.error_type, ErrorType::Dom);
        assert!(report.message.contains("range detached"));
        assert_eq!(report.status_code, None);

        let report = ErrorReport::from(RefineError::EmptySelection);
        assert_eq!(report.error_type, ErrorType::EmptySelection);
    }

    #[test]
    fn test_report_wire_shape() {
        let report = ErrorReport::new(ErrorType::Api, "Bad gateway").with_status(502);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errorType"], "api");
        assert_eq!(json["statusCode"], 502);
        assert_eq!(report.to_string(), "[api] Bad gateway (HTTP 502)");
    }
}
