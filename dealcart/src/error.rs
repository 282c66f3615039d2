//! Unified error types for dealcart.
//!
//! Every component reports through the top-level [`Error`]. Transport,
//! storage and configuration failures have their own enums and convert into
//! it with `?`.

use std::fmt;

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for dealcart operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The remote service could not be reached or answered badly.
    #[error("api: {0}")]
    Api(#[from] ApiError),

    /// A cart read failed; the cached cart was left untouched.
    #[error("cart unavailable: {0}")]
    CartUnavailable(ApiError),

    /// Input was rejected before contacting the network.
    #[error("validation: {0}")]
    Validation(String),

    /// Assistant content could not be turned into display text.
    #[error("payload shape: {0}")]
    PayloadShape(String),

    /// The same operation is already in flight for this operand.
    #[error("busy: {0}")]
    Busy(String),

    /// Local storage error.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Create a validation error.
    #[inline]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a payload shape error.
    #[inline]
    pub fn payload_shape(msg: impl Into<String>) -> Self {
        Self::PayloadShape(msg.into())
    }

    /// Create a busy error for the given operand.
    #[inline]
    pub fn busy(operand: impl Into<String>) -> Self {
        Self::Busy(operand.into())
    }

    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Api(e) | Self::CartUnavailable(e) => e.is_retryable(),
            Self::Busy(_) => true,
            Self::Validation(_) | Self::PayloadShape(_) | Self::Storage(_) | Self::Config(_) => {
                false
            }
        }
    }

    /// The message the remote service attached to its failure, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api(e) | Self::CartUnavailable(e) => e.server_message(),
            _ => None,
        }
    }
}

/// Result type alias for dealcart operations.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Transport Errors
// ============================================================================

/// Error type for calls against the remote shopping service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request did not complete (connection, timeout, DNS).
    #[error("network: {0}")]
    Network(String),

    /// The service answered with a non-success status.
    #[error("status {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status {
        /// HTTP status code.
        status: u16,
        /// The `error` field of the response body, when present.
        message: Option<String>,
    },

    /// The service answered 2xx but the body could not be decoded.
    #[error("malformed body: {0}")]
    MalformedBody(String),

    /// The service answered 2xx with an `error` in the body.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The request could not be built.
    #[error("request: {0}")]
    Request(String),
}

impl ApiError {
    /// Create a network error.
    #[inline]
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a status error.
    #[inline]
    pub const fn status(status: u16, message: Option<String>) -> Self {
        Self::Status { status, message }
    }

    /// Create a malformed body error.
    #[inline]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedBody(msg.into())
    }

    /// Create a rejection carrying the body's error text.
    #[inline]
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Whether the failure is transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::MalformedBody(_) | Self::Rejected(_) | Self::Request(_) => false,
        }
    }

    /// Error text the service put in its response, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            Self::Rejected(message) => Some(message),
            Self::Network(_) | Self::MalformedBody(_) | Self::Request(_) => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedBody(err.to_string())
        } else if err.is_builder() {
            Self::Request(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                message: None,
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Result type for transport operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// Invalid value.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create an invalid value error.
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Storage Errors
// ============================================================================

/// Error type for durable local storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored entry belongs to another key.
    #[error("key mismatch: expected {expected}, found {found}")]
    KeyMismatch {
        /// Key that was requested.
        expected: String,
        /// Key recorded in the entry.
        found: String,
    },
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ============================================================================
// Display Helpers
// ============================================================================

/// A wrapper that displays errors in a user-friendly format.
#[derive(Debug)]
pub struct DisplayError<'a>(pub &'a Error);

impl fmt::Display for DisplayError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Error::Api(ApiError::Network(_)) | Error::CartUnavailable(ApiError::Network(_)) => {
                write!(f, "Could not reach the shopping service. Check your connection.")
            }
            Error::Api(e) => write!(f, "Shopping service error: {e}"),
            Error::CartUnavailable(_) => write!(f, "Cart unavailable, please try again."),
            Error::Validation(msg) => write!(f, "{msg}"),
            Error::PayloadShape(e) => write!(f, "Could not display response: {e}"),
            Error::Busy(_) => write!(f, "Still working on the previous request."),
            Error::Storage(e) => write!(f, "Storage error: {e}"),
            Error::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
