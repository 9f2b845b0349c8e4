//! Common error types for the PlayFab toolkit.

use thiserror::Error;

/// Top-level error type for toolkit operations.
///
/// Local failures (`InvalidInput`, `MissingEntity`, `NotAuthenticated`,
/// `NotFound`) are raised before or instead of a remote call. Remote
/// failures carry the backend's text through unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid input provided.
    #[error("{0}")]
    InvalidInput(String),

    /// A file operation was attempted before an entity key was set.
    #[error("Missing entity info.")]
    MissingEntity,

    /// A credential is required but no session is active.
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend rejected the request; holds its formatted error report.
    #[error("{0}")]
    Remote(String),

    /// Transport-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_messages() {
        assert_eq!(Error::MissingEntity.to_string(), "Missing entity info.");
        assert_eq!(
            Error::InvalidInput("Invalid input".to_string()).to_string(),
            "Invalid input"
        );
    }

    #[test]
    fn test_remote_report_passes_through() {
        let report = "/Client/LoginWithEmailAddress: User not found";
        assert_eq!(Error::Remote(report.to_string()).to_string(), report);
    }
}
