//! Intake response types.

use serde::{Deserialize, Serialize};

use crate::error::IntakeFailure;

/// Submit response envelope.
///
/// On success `email` and `sequence` hold the validated values that were
/// stored. On failure they echo the raw input so the submitter can correct
/// it without retyping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Correlation ID echoed from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Whether the submission was accepted.
    pub ok: bool,
    /// Assigned job identifier (present when ok=true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Validated (ok=true) or raw (ok=false) email.
    pub email: String,
    /// Validated (ok=true) or raw (ok=false) sequence.
    pub sequence: String,
    /// Error details (present when ok=false).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<IntakeFailure>,
}

impl SubmitResponse {
    /// Create a success response.
    pub fn accepted(
        request_id: Option<String>,
        job_id: impl Into<String>,
        email: impl Into<String>,
        sequence: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            ok: true,
            job_id: Some(job_id.into()),
            email: email.into(),
            sequence: sequence.into(),
            error: None,
        }
    }

    /// Create an error response echoing the raw input.
    pub fn rejected(
        request_id: Option<String>,
        email: impl Into<String>,
        sequence: impl Into<String>,
        error: IntakeFailure,
    ) -> Self {
        Self {
            request_id,
            ok: false,
            job_id: None,
            email: email.into(),
            sequence: sequence.into(),
            error: Some(error),
        }
    }
}
