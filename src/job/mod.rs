//! Job identifiers and their allocation
//!
//! A job ID is the Unix second of the slot a submission claimed in the
//! shared store. See [`allocator`] for the claim protocol.

mod allocator;
mod clock;
mod id;

pub use allocator::{AllocError, ClaimedJob, JobIdAllocator, RetryPolicy};
pub use clock::{Clock, FrozenClock, ManualClock, SystemClock};
pub use id::{JobId, ParseJobIdError};
