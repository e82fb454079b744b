//! Job artifact storage
//!
//! A job is two artifacts keyed by the same [`JobId`]: the requester email
//! and the normalized sequence. The store also owns the claim namespace the
//! allocator uses, so "is this ID taken" and "take this ID" are one atomic
//! step on whatever backs the store.

mod fs_store;
mod memory;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::job::{ClaimedJob, JobId};
use crate::validate::ValidatedSubmission;

pub use fs_store::{FsJobStore, CLAIMS_DIR, EMAILS_DIR, SEQUENCES_DIR, STAGING_DIR};
pub use memory::MemoryJobStore;

/// Errors from job storage
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("store root is not usable: {0}")]
    NotWritable(PathBuf),

    #[error("artifacts for job {0} already exist")]
    AlreadyPersisted(JobId),

    /// Failure raised by a non-filesystem backend
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared job namespace
pub trait JobStore: Send + Sync {
    /// Atomically claim `id`.
    ///
    /// Returns `Ok(true)` if this call took the ID and `Ok(false)` if it was
    /// already claimed or has artifacts. Two concurrent callers never both
    /// get `Ok(true)` for the same ID. An `Err` means the namespace could not
    /// be checked and nothing was claimed.
    fn try_claim(&self, id: JobId) -> StoreResult<bool>;

    /// Write both artifacts for a claimed job.
    ///
    /// Each artifact becomes visible all at once. On error neither artifact
    /// is left visible.
    fn persist(&self, job: &ClaimedJob, submission: &ValidatedSubmission) -> StoreResult<()>;
}
