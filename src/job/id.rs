//! Job identifier type

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Time-derived job identifier.
///
/// The value is the Unix second of the slot the job claimed. IDs are
/// rendered in decimal and compare in allocation-time order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct JobId(u64);

/// Error parsing a job ID from text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job id '{0}': expected a decimal number of seconds")]
pub struct ParseJobIdError(String);

impl JobId {
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Candidate ID for the second containing `at`.
    ///
    /// Instants before the epoch clamp to zero.
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(u64::try_from(at.timestamp()).unwrap_or(0))
    }

    pub const fn as_secs(&self) -> u64 {
        self.0
    }

    /// The following slot
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Wall-clock second this ID was derived from
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.0)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ParseJobIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // u64::from_str accepts a leading '+', which would give two spellings
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseJobIdError(s.to_string()));
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|_| ParseJobIdError(s.to_string()))
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for JobId {
    type Error = ParseJobIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
