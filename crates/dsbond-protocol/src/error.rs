//! Error types for the intake protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes returned in failed submit responses.
///
/// These codes are stable and used for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The email address is not syntactically valid.
    InvalidEmail,
    /// The sequence contains something other than amino-acid letters.
    InvalidSequence,
    /// Both fields failed validation.
    InvalidBoth,
    /// Job storage could not be reached to reserve an identifier.
    StorageUnavailable,
    /// Job storage failed while recording the submission.
    StorageError,
    /// No free job identifier could be reserved; retry later.
    Busy,
    /// Malformed JSON or missing fields.
    InvalidRequest,
}

impl ErrorCode {
    /// Whether the submitter can fix the error by editing their input.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidEmail | Self::InvalidSequence | Self::InvalidBoth | Self::InvalidRequest
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEmail => write!(f, "INVALID_EMAIL"),
            Self::InvalidSequence => write!(f, "INVALID_SEQUENCE"),
            Self::InvalidBoth => write!(f, "INVALID_BOTH"),
            Self::StorageUnavailable => write!(f, "STORAGE_UNAVAILABLE"),
            Self::StorageError => write!(f, "STORAGE_ERROR"),
            Self::Busy => write!(f, "BUSY"),
            Self::InvalidRequest => write!(f, "INVALID_REQUEST"),
        }
    }
}

/// Submission field an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Email,
    Sequence,
}

/// A field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Which input field failed.
    pub field: Field,
    /// Human-readable reason, suitable for showing next to the field.
    pub reason: String,
}

impl FieldError {
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Error payload of a failed submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeFailure {
    /// Error code from the registry.
    pub code: ErrorCode,
    /// Human-readable, single-line error message.
    /// Must not contain filesystem paths or internal error chains.
    pub message: String,
    /// Per-field errors (validation failures only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl IntakeFailure {
    /// Create a failure without field details.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Create a validation failure from field errors.
    ///
    /// The code is derived from which fields failed.
    pub fn from_fields(fields: Vec<FieldError>) -> Self {
        let email = fields.iter().any(|f| f.field == Field::Email);
        let sequence = fields.iter().any(|f| f.field == Field::Sequence);
        let (code, message) = match (email, sequence) {
            (true, true) => (ErrorCode::InvalidBoth, "email and sequence are invalid"),
            (true, false) => (ErrorCode::InvalidEmail, "email is invalid"),
            (false, true) => (ErrorCode::InvalidSequence, "sequence is invalid"),
            (false, false) => (ErrorCode::InvalidRequest, "invalid request"),
        };
        Self {
            code,
            message: message.to_string(),
            fields,
        }
    }

    /// Create an INVALID_REQUEST failure.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Reason attached to a field, if that field failed.
    pub fn field_reason(&self, field: Field) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.reason.as_str())
    }
}

impl fmt::Display for IntakeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
