//! Error types for the alertgate-core crate.

use thiserror::Error;

/// Errors that can occur while compiling rules or deciding on an alert.
///
/// Every variant is a pure failure: nothing has been persisted or sent when
/// one of these is returned.
#[derive(Debug, Error)]
pub enum AlertError {
    /// A compact duration string (`"1h30m"`) could not be parsed.
    #[error("invalid duration format '{input}': {reason}")]
    InvalidDurationFormat {
        /// The offending input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An inbound alert lacks a field the engine cannot work without.
    #[error("missing required field: {field}")]
    MissingRequiredField {
        /// Name of the missing field.
        field: String,
    },

    /// A day window is unparseable or does not satisfy `start < end`.
    #[error("malformed time window: {reason}")]
    MalformedTimeWindow {
        /// The reason the window is invalid.
        reason: String,
    },

    /// A timestamp field is present but not RFC 3339.
    #[error("invalid timestamp in {field}: {value:?}")]
    InvalidTimestamp {
        /// Name of the field.
        field: String,
        /// Raw value.
        value: String,
    },

    /// A state annotation (`lastNotification`, `lastIncident`, `count`) holds
    /// a value that cannot be interpreted.
    #[error("invalid annotation {key}={value:?}: {reason}")]
    InvalidAnnotation {
        /// Annotation key.
        key: String,
        /// Raw annotation value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl AlertError {
    pub(crate) fn duration(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDurationFormat {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(field: &str) -> Self {
        Self::MissingRequiredField {
            field: field.to_string(),
        }
    }
}

impl From<serde_json::Error> for AlertError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type for alertgate operations.
pub type Result<T> = std::result::Result<T, AlertError>;
