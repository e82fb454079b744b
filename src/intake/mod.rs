//! Submission intake
//!
//! Validate -> claim a job ID -> persist both artifacts -> notify -> return.
//! Nothing is claimed or written for a submission that fails validation,
//! and a job ID is only returned once both artifacts are durable.

use std::sync::Arc;

use dsbond_protocol::{ErrorCode, IntakeFailure};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use crate::config::{ConfigError, IntakeConfig};
use crate::job::{AllocError, Clock, JobId, JobIdAllocator, RetryPolicy, SystemClock};
use crate::notify::{JobNotice, Notifier, NullNotifier};
use crate::store::{FsJobStore, JobStore, StoreError};
use crate::validate::{SubmissionRequest, ValidationError, Validator};

/// Why a submission was not accepted.
///
/// `Display` for the storage variants is deliberately generic; the
/// underlying error (which may name paths) is only available as `source()`.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("{0}")]
    InvalidEmail(ValidationError),

    #[error("{0}")]
    InvalidSequence(ValidationError),

    #[error("{0}")]
    InvalidBoth(ValidationError),

    #[error("job storage is unavailable")]
    StorageUnavailable(#[source] StoreError),

    #[error("the job could not be recorded")]
    StorageError(#[source] StoreError),

    #[error("no free job slot after {attempts} attempts, try again later")]
    Busy { attempts: u32 },
}

impl IntakeError {
    fn from_validation(err: ValidationError) -> Self {
        match (err.email_valid(), err.sequence_valid()) {
            (false, false) => Self::InvalidBoth(err),
            (false, true) => Self::InvalidEmail(err),
            _ => Self::InvalidSequence(err),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidEmail(_) => ErrorCode::InvalidEmail,
            Self::InvalidSequence(_) => ErrorCode::InvalidSequence,
            Self::InvalidBoth(_) => ErrorCode::InvalidBoth,
            Self::StorageUnavailable(_) => ErrorCode::StorageUnavailable,
            Self::StorageError(_) => ErrorCode::StorageError,
            Self::Busy { .. } => ErrorCode::Busy,
        }
    }

    /// Field-level details, for validation failures
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::InvalidEmail(e) | Self::InvalidSequence(e) | Self::InvalidBoth(e) => Some(e),
            _ => None,
        }
    }

    /// Protocol form, safe to show to the submitter
    pub fn to_failure(&self) -> IntakeFailure {
        match self.validation() {
            Some(e) => e.to_failure(),
            None => IntakeFailure::new(self.code(), self.to_string()),
        }
    }
}

/// Errors building a service from configuration
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot open job store: {0}")]
    Store(#[from] StoreError),
}

/// Accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub job_id: JobId,
    /// Email as stored
    pub email: String,
    /// Normalized sequence as stored
    pub sequence: String,
}

/// Front door for submissions.
///
/// `Send + Sync`; share one instance across request handlers with `Arc`.
pub struct IntakeService {
    validator: Validator,
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    notifier: Box<dyn Notifier>,
}

impl IntakeService {
    /// Service over `store` with system time, default retry policy and
    /// validation limits, and notifications disabled.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            validator: Validator::default(),
            store,
            clock: Arc::new(SystemClock),
            policy: RetryPolicy::default(),
            notifier: Box::new(NullNotifier),
        }
    }

    /// Wire up a filesystem-backed service from configuration
    pub fn from_config(config: &IntakeConfig) -> Result<Self, SetupError> {
        config.validate()?;
        let store = FsJobStore::open(&config.storage.root)?;
        Ok(Self::new(Arc::new(store))
            .with_validator(Validator::new(config.validation.limits()))
            .with_retry_policy(config.allocator.retry_policy())
            .with_notifier(config.notify.notifier()?))
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Wait for background notifications before shutting down
    pub fn flush_notifications(&self) {
        self.notifier.flush();
    }

    fn allocator(&self) -> JobIdAllocator {
        JobIdAllocator::new(self.store.clone(), self.clock.clone(), self.policy)
    }

    /// Accept a submission.
    pub fn submit(&self, request: SubmissionRequest) -> Result<Receipt, IntakeError> {
        let span = info_span!("submit");
        let _enter = span.enter();

        let submission = self.validator.validate(request).map_err(|e| {
            debug!(error = %e, "submission rejected");
            IntakeError::from_validation(e)
        })?;

        let claimed = self.allocator().allocate().map_err(|e| match e {
            AllocError::StorageUnavailable(source) => {
                error!(error = %source, "job storage unavailable");
                IntakeError::StorageUnavailable(source)
            }
            AllocError::Exhausted { attempts } => {
                warn!(attempts, "no free job id");
                IntakeError::Busy { attempts }
            }
        })?;
        let job_id = claimed.id();

        if let Err(e) = self.store.persist(&claimed, &submission) {
            error!(%job_id, error = %e, "failed to persist job");
            return Err(IntakeError::StorageError(e));
        }

        let (email, sequence) = submission.into_parts();
        let notice = JobNotice::new(job_id, email.clone(), sequence.clone());
        if let Err(e) = self.notifier.notify(&notice) {
            warn!(%job_id, error = %e, "notification not sent");
        }

        info!(%job_id, residues = sequence.len(), attempts = claimed.attempts(), "job accepted");
        Ok(Receipt {
            job_id,
            email,
            sequence,
        })
    }
}
