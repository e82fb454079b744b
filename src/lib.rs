//! dsbond intake - job intake gate for the disulfide-bond prediction pipeline
//!
//! Accepts a protein sequence and a requester email address, validates and
//! normalizes them, claims a unique time-derived job ID, and writes the
//! two job artifacts into a directory the offline prediction pipeline
//! polls. Results are mailed back by the pipeline, not by this crate.

pub mod config;
pub mod intake;
pub mod job;
pub mod notify;
pub mod rpc;
pub mod store;
pub mod telemetry;
pub mod validate;

pub use config::{ConfigError, IntakeConfig};
pub use intake::{IntakeError, IntakeService, Receipt, SetupError};
pub use job::{ClaimedJob, Clock, JobId, JobIdAllocator, RetryPolicy};
pub use rpc::RpcHandler;
pub use store::{FsJobStore, JobStore, MemoryJobStore, StoreError};
pub use validate::{SubmissionRequest, ValidatedSubmission, ValidationError, Validator};
