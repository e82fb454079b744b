//! In-memory job store.
//!
//! Same claim semantics as the filesystem store, with knobs to seed taken
//! IDs and inject failures. Used to drive collision and error paths
//! deterministically.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{JobStore, StoreError, StoreResult};
use crate::job::{ClaimedJob, JobId};
use crate::validate::ValidatedSubmission;

#[derive(Debug, Default)]
struct MemoryState {
    claims: HashSet<JobId>,
    emails: HashMap<JobId, String>,
    sequences: HashMap<JobId, String>,
    fail_claims: bool,
    fail_persist: bool,
}

/// Thread-safe in-memory job store
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    inner: Mutex<MemoryState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `id` as taken, as if another submitter had claimed it
    pub fn seed_taken(&self, id: JobId) {
        self.state().claims.insert(id);
    }

    /// Make every `try_claim` fail with a backend error
    pub fn fail_claims(&self, fail: bool) {
        self.state().fail_claims = fail;
    }

    /// Make every `persist` fail with a backend error
    pub fn fail_persist(&self, fail: bool) {
        self.state().fail_persist = fail;
    }

    pub fn is_claimed(&self, id: JobId) -> bool {
        self.state().claims.contains(&id)
    }

    pub fn claimed_count(&self) -> usize {
        self.state().claims.len()
    }

    /// Number of jobs with both artifacts written
    pub fn job_count(&self) -> usize {
        self.state().emails.len()
    }

    pub fn email(&self, id: JobId) -> Option<String> {
        self.state().emails.get(&id).cloned()
    }

    pub fn sequence(&self, id: JobId) -> Option<String> {
        self.state().sequences.get(&id).cloned()
    }
}

impl JobStore for MemoryJobStore {
    fn try_claim(&self, id: JobId) -> StoreResult<bool> {
        let mut state = self.state();
        if state.fail_claims {
            return Err(StoreError::Backend("claim namespace unavailable".to_string()));
        }
        Ok(state.claims.insert(id))
    }

    fn persist(&self, job: &ClaimedJob, submission: &ValidatedSubmission) -> StoreResult<()> {
        let mut state = self.state();
        if state.fail_persist {
            return Err(StoreError::Backend("artifact write failed".to_string()));
        }

        let id = job.id();
        if state.emails.contains_key(&id) || state.sequences.contains_key(&id) {
            return Err(StoreError::AlreadyPersisted(id));
        }

        // Both inserts happen under one lock, so readers see both or neither
        state.sequences.insert(id, submission.sequence().to_string());
        state.emails.insert(id, submission.email().to_string());
        Ok(())
    }
}
