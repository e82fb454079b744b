//! Collision-free job ID allocation
//!
//! Candidates come from the clock at one-second resolution. Each candidate
//! is claimed through [`JobStore::try_claim`], which is a single atomic
//! operation on the storage layer (exclusive create for the filesystem
//! store). There is no separate existence check, so two submitters racing
//! for the same second cannot both win it, whether they share a process or
//! only the storage root.
//!
//! On collision the allocator waits one resolution unit plus random jitter
//! and moves to `max(now, previous + 1)`. Jitter spreads out submitters that
//! collided together; the `previous + 1` floor keeps the loop moving forward
//! when the clock has not advanced.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use super::clock::Clock;
use super::id::JobId;
use crate::store::{JobStore, StoreError};

/// Errors from job ID allocation
#[derive(Debug, Error)]
pub enum AllocError {
    /// The storage namespace could not be checked; no ID was claimed.
    #[error("job storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),

    #[error("no free job id after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// How the allocator waits between colliding candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Minimum wait after a collision (one ID slot)
    pub resolution: Duration,
    /// Upper bound of the random extra wait
    pub max_jitter: Duration,
    /// Candidates tried before giving up
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            resolution: Duration::from_secs(1),
            max_jitter: Duration::from_millis(250),
            max_attempts: 120,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> Duration {
        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return self.resolution;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.resolution + Duration::from_millis(extra)
    }
}

/// Proof that a job ID was claimed in the store.
///
/// Only [`JobIdAllocator::allocate`] creates one, and persistence requires
/// it, so artifacts can never be written under an unclaimed ID.
#[derive(Debug, PartialEq, Eq)]
pub struct ClaimedJob {
    id: JobId,
    attempts: u32,
}

impl ClaimedJob {
    pub(crate) fn new(id: JobId, attempts: u32) -> Self {
        Self { id, attempts }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Candidates tried before this one was won (1 = no collision)
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Mints unique job IDs against a shared store
pub struct JobIdAllocator {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl JobIdAllocator {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>, policy: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// Claim the next free job ID.
    ///
    /// Blocks while retrying on collisions. Never returns an ID that was not
    /// atomically claimed.
    pub fn allocate(&self) -> Result<ClaimedJob, AllocError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut candidate = JobId::from_timestamp(self.clock.now());

        for attempt in 1..=max_attempts {
            let claimed = self
                .store
                .try_claim(candidate)
                .map_err(AllocError::StorageUnavailable)?;

            if claimed {
                debug!(job_id = %candidate, attempt, "claimed job id");
                return Ok(ClaimedJob::new(candidate, attempt));
            }

            debug!(job_id = %candidate, attempt, "job id taken, retrying");
            if attempt == max_attempts {
                break;
            }

            self.clock.sleep(self.policy.backoff());
            let fresh = JobId::from_timestamp(self.clock.now());
            candidate = fresh.max(candidate.next());
        }

        warn!(attempts = max_attempts, "job id allocation exhausted");
        Err(AllocError::Exhausted {
            attempts: max_attempts,
        })
    }
}
