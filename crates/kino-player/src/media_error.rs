//! Playback errors
//!
//! Mirrors the host media-error taxonomy. These values are never returned
//! as `Err`; they ride on the player's `error` event.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Media error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", from = "u16")]
pub enum MediaErrorCode {
    /// Player-defined error
    Custom,
    Aborted,
    Network,
    Decode,
    SrcNotSupported,
    Encrypted,
}

impl MediaErrorCode {
    pub fn code(&self) -> u16 {
        match self {
            MediaErrorCode::Custom => 0,
            MediaErrorCode::Aborted => 1,
            MediaErrorCode::Network => 2,
            MediaErrorCode::Decode => 3,
            MediaErrorCode::SrcNotSupported => 4,
            MediaErrorCode::Encrypted => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MediaErrorCode::Custom => "MEDIA_ERR_CUSTOM",
            MediaErrorCode::Aborted => "MEDIA_ERR_ABORTED",
            MediaErrorCode::Network => "MEDIA_ERR_NETWORK",
            MediaErrorCode::Decode => "MEDIA_ERR_DECODE",
            MediaErrorCode::SrcNotSupported => "MEDIA_ERR_SRC_NOT_SUPPORTED",
            MediaErrorCode::Encrypted => "MEDIA_ERR_ENCRYPTED",
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            MediaErrorCode::Custom => "",
            MediaErrorCode::Aborted => "You aborted the media playback",
            MediaErrorCode::Network => "A network error caused the media download to fail part-way.",
            MediaErrorCode::Decode => "The media playback was aborted due to a corruption problem or because the media used features your browser did not support.",
            MediaErrorCode::SrcNotSupported => "The media could not be loaded, either because the server or network failed or because the format is not supported.",
            MediaErrorCode::Encrypted => "The media is encrypted and we do not have the keys to decrypt it.",
        }
    }
}

impl From<u16> for MediaErrorCode {
    /// Unknown codes collapse to [`MediaErrorCode::Custom`]
    fn from(code: u16) -> Self {
        match code {
            1 => MediaErrorCode::Aborted,
            2 => MediaErrorCode::Network,
            3 => MediaErrorCode::Decode,
            4 => MediaErrorCode::SrcNotSupported,
            5 => MediaErrorCode::Encrypted,
            _ => MediaErrorCode::Custom,
        }
    }
}

impl From<MediaErrorCode> for u16 {
    fn from(code: MediaErrorCode) -> Self {
        code.code()
    }
}

impl fmt::Display for MediaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A normalized playback error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code} ({}): {message}", .code.code())]
pub struct MediaError {
    pub code: MediaErrorCode,
    pub message: String,
    /// Extra status from the backend (e.g. an HTTP status)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl MediaError {
    /// An error with the code's default message
    pub fn new(code: MediaErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            status: None,
        }
    }

    pub fn with_message(code: MediaErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code,
            message: if message.is_empty() {
                code.default_message().to_string()
            } else {
                message
            },
            status: None,
        }
    }

    /// A player-defined error
    pub fn custom(message: impl Into<String>) -> Self {
        Self::with_message(MediaErrorCode::Custom, message)
    }

    pub fn with_status(mut self, status: Value) -> Self {
        self.status = Some(status);
        self
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Read an error back from an `error` event payload
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

impl From<MediaErrorCode> for MediaError {
    fn from(code: MediaErrorCode) -> Self {
        MediaError::new(code)
    }
}
