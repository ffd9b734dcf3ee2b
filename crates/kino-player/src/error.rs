//! Error types for Kino Player
//!
//! Only programmer-facing failures live here. Playback failures never
//! surface as `Err`; they travel as [`MediaError`](crate::MediaError)
//! payloads on the player's `error` event.

use thiserror::Error;

/// Result type alias for framework operations
pub type Result<T> = std::result::Result<T, Error>;

/// Framework error types
#[derive(Error, Debug)]
pub enum Error {
    // Registry errors
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("Unknown tech: {0}")]
    UnknownTech(String),

    #[error("Cannot re-register built-in {kind} \"{name}\"")]
    BuiltinConflict { kind: &'static str, name: String },

    // Configuration errors
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Invalid event descriptor: {0}")]
    InvalidEvent(String),

    #[error("Invalid MIME type: {0}")]
    InvalidMimeType(String),

    // Lifecycle errors
    #[error("Component has been disposed: {0}")]
    Disposed(String),

    #[error("Tech creation failed: {0}")]
    TechCreation(String),

    // Internal errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true for errors caused by how the framework was wired up
    /// (unknown names, bad option shapes) rather than by runtime state.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnknownComponent(_)
                | Error::UnknownTech(_)
                | Error::BuiltinConflict { .. }
                | Error::InvalidOptions(_)
                | Error::InvalidEvent(_)
                | Error::InvalidMimeType(_)
                | Error::Json(_)
        )
    }

    /// Returns the error code for logs and embedding code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::UnknownComponent(_) => "UNKNOWN_COMPONENT",
            Error::UnknownTech(_) => "UNKNOWN_TECH",
            Error::BuiltinConflict { .. } => "BUILTIN_CONFLICT",
            Error::InvalidOptions(_) => "INVALID_OPTIONS",
            Error::InvalidEvent(_) => "INVALID_EVENT",
            Error::InvalidMimeType(_) => "INVALID_MIME",
            Error::Disposed(_) => "DISPOSED",
            Error::TechCreation(_) => "TECH_CREATION",
            Error::Json(_) => "JSON",
            Error::Internal(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(Error::UnknownComponent("ControlBar".into()).is_configuration());
        assert!(Error::InvalidOptions("children".into()).is_configuration());
        assert!(!Error::Disposed("player_1".into()).is_configuration());
        assert!(!Error::TechCreation("no element".into()).is_configuration());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::UnknownTech("Flash".into()).error_code(), "UNKNOWN_TECH");
        let conflict = Error::BuiltinConflict {
            kind: "component",
            name: "Component".into(),
        };
        assert_eq!(conflict.error_code(), "BUILTIN_CONFLICT");
        assert_eq!(
            conflict.to_string(),
            "Cannot re-register built-in component \"Component\""
        );
    }
}
