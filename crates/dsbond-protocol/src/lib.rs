//! dsbond Protocol Types
//!
//! Defines the JSON request/response shapes for the intake operation.
//! Front ends (CLI, line-delimited JSON over stdio, a web form bridge)
//! all speak these types.

pub mod error;
pub mod request;
pub mod response;

pub use error::{ErrorCode, Field, FieldError, IntakeFailure};
pub use request::SubmitRequest;
pub use response::SubmitResponse;
