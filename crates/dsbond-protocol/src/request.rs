//! Intake request types.

use serde::{Deserialize, Serialize};

/// Submission request as sent by a front end.
///
/// Both fields are raw user input; nothing is validated at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Optional correlation ID, echoed in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Requester email address.
    pub email: String,
    /// Protein sequence in one-letter amino-acid codes.
    pub sequence: String,
}

impl SubmitRequest {
    /// Create a request without a correlation ID.
    pub fn new(email: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            request_id: None,
            email: email.into(),
            sequence: sequence.into(),
        }
    }

    /// Attach a correlation ID.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}
