//! Error types for the update controller.
//!
//! Nothing in here escapes the controller's public operations: every
//! [`UpdateError`] is flattened into the `error` or `last_check_message`
//! state fields at the operation boundary.

use thiserror::Error;

/// A failure reported by the host update bridge.
///
/// Bridges are untrusted, so the only thing we keep is a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BridgeError {
    message: String,
}

impl BridgeError {
    /// Creates a bridge error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error used by default trait bodies for operations a bridge does not expose.
    #[must_use]
    pub fn missing(operation: &str) -> Self {
        Self::new(format!("bridge does not expose {operation}"))
    }

    /// The message as reported by the bridge.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for BridgeError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for BridgeError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("malformed bridge response: {err}"))
    }
}

/// Result type returned by bridge operations.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur inside the update controller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpdateError {
    /// No usable bridge in this runtime (absent, foreign brand, or incomplete).
    #[error("updates are not supported in this environment")]
    Unsupported,

    /// The bridge is usable but does not expose an optional operation.
    #[error("bridge does not expose {0}")]
    MissingOperation(&'static str),

    /// A bridge call rejected.
    #[error("bridge call failed: {0}")]
    Bridge(#[from] BridgeError),

    /// An event or response payload could not be interpreted.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Controller configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl UpdateError {
    /// Returns a user-friendly message suitable for display in the UI.
    ///
    /// Bridge failures surface the bridge's own message, since that is
    /// usually the most specific thing we can show.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unsupported => "Updates are only available in the desktop app.".to_string(),
            Self::MissingOperation(_) => "This build does not support that update action.".to_string(),
            Self::Bridge(err) if !err.message().trim().is_empty() => err.message().to_string(),
            Self::Bridge(_) => "The updater reported an unknown error.".to_string(),
            Self::InvalidPayload(_) | Self::Config(_) => "An unexpected error occurred.".to_string(),
        }
    }
}

impl From<toml::de::Error> for UpdateError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for controller internals.
pub type Result<T> = std::result::Result<T, UpdateError>;
