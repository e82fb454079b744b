//! Submission validation and sequence normalization
//!
//! Checks the two user-supplied fields independently:
//! - email: syntactic address check (no DNS/MX lookups)
//! - sequence: whitespace stripped, ASCII-uppercased, letters only,
//!   ambiguous residue codes collapsed to `X`
//!
//! Everything here is pure. Both fields are always checked so a caller can
//! report every field-level problem in one round trip.

use std::fmt;
use std::sync::OnceLock;

use dsbond_protocol::{Field, FieldError, IntakeFailure, SubmitRequest};
use regex_lite::Regex;
use thiserror::Error;

/// Longest address accepted (RFC 5321 path limit minus the angle brackets)
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Longest local part accepted
pub const MAX_LOCAL_PART_LENGTH: usize = 64;

/// Default cap on residues per submission
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 10_000;

/// Ambiguous or non-standard one-letter codes rewritten to `X`
pub const AMBIGUOUS_RESIDUES: &[char] = &['B', 'J', 'O', 'U', 'X', 'Z'];

/// Placeholder for an unknown residue
pub const UNKNOWN_RESIDUE: char = 'X';

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*",
            r"@(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$",
        ))
        .unwrap()
    })
}

/// Raw, unvalidated submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub email: String,
    pub sequence: String,
}

impl SubmissionRequest {
    pub fn new(email: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            sequence: sequence.into(),
        }
    }
}

impl From<SubmitRequest> for SubmissionRequest {
    fn from(req: SubmitRequest) -> Self {
        Self {
            email: req.email,
            sequence: req.sequence,
        }
    }
}

/// Submission whose fields passed validation.
///
/// Only [`Validator::validate`] constructs one, so holding a value proves
/// the email is well formed and the sequence is normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSubmission {
    email: String,
    sequence: String,
}

impl ValidatedSubmission {
    /// Validated email address (surrounding whitespace trimmed)
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Normalized sequence (`A`-`Z` only)
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn into_parts(self) -> (String, String) {
        (self.email, self.sequence)
    }
}

/// Why an email address was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailError {
    #[error("email address is required")]
    Empty,

    #[error("email address is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("not a valid email address")]
    Malformed,
}

/// Why a sequence was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("sequence is required")]
    Empty,

    /// `position` is 1-based within the whitespace-stripped sequence.
    #[error("invalid character '{ch}' at position {position}; only amino-acid letters are allowed")]
    InvalidCharacter { ch: char, position: usize },

    #[error("sequence has {len} residues, limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// Per-field validation outcome with the raw input preserved for echoing.
///
/// At least one of `email` / `sequence` is `Some`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The input exactly as submitted
    pub request: SubmissionRequest,
    /// Email failure, `None` if the email passed
    pub email: Option<EmailError>,
    /// Sequence failure, `None` if the sequence passed
    pub sequence: Option<SequenceError>,
}

impl ValidationError {
    pub fn email_valid(&self) -> bool {
        self.email.is_none()
    }

    pub fn sequence_valid(&self) -> bool {
        self.sequence.is_none()
    }

    /// Field errors in protocol form
    pub fn field_errors(&self) -> Vec<FieldError> {
        let mut fields = Vec::new();
        if let Some(ref e) = self.email {
            fields.push(FieldError::new(Field::Email, e.to_string()));
        }
        if let Some(ref e) = self.sequence {
            fields.push(FieldError::new(Field::Sequence, e.to_string()));
        }
        fields
    }

    pub fn to_failure(&self) -> IntakeFailure {
        IntakeFailure::from_fields(self.field_errors())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.email, &self.sequence) {
            (Some(e), Some(s)) => write!(f, "invalid email ({}) and sequence ({})", e, s),
            (Some(e), None) => write!(f, "invalid email: {}", e),
            (None, Some(s)) => write!(f, "invalid sequence: {}", s),
            (None, None) => write!(f, "invalid submission"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Limits applied on top of the syntactic checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_sequence_length: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
        }
    }
}

/// Stateless submission validator
#[derive(Debug, Clone, Default)]
pub struct Validator {
    limits: ValidationLimits,
}

impl Validator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ValidationLimits {
        self.limits
    }

    /// Validate both fields of a submission.
    pub fn validate(
        &self,
        request: SubmissionRequest,
    ) -> Result<ValidatedSubmission, ValidationError> {
        let email = validate_email(&request.email);
        let sequence = normalize_sequence(&request.sequence).and_then(|seq| {
            let len = seq.len();
            if len > self.limits.max_sequence_length {
                Err(SequenceError::TooLong {
                    len,
                    max: self.limits.max_sequence_length,
                })
            } else {
                Ok(seq)
            }
        });

        match (email, sequence) {
            (Ok(email), Ok(sequence)) => Ok(ValidatedSubmission { email, sequence }),
            (email, sequence) => Err(ValidationError {
                request,
                email: email.err(),
                sequence: sequence.err(),
            }),
        }
    }
}

/// Check an email address, returning it with surrounding whitespace trimmed.
pub fn validate_email(raw: &str) -> Result<String, EmailError> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(EmailError::Empty);
    }

    let len = email.chars().count();
    if len > MAX_EMAIL_LENGTH {
        return Err(EmailError::TooLong {
            len,
            max: MAX_EMAIL_LENGTH,
        });
    }

    match email.rsplit_once('@') {
        Some((local, _)) if local.len() <= MAX_LOCAL_PART_LENGTH => {}
        _ => return Err(EmailError::Malformed),
    }

    if email_pattern().is_match(email) {
        Ok(email.to_string())
    } else {
        Err(EmailError::Malformed)
    }
}

/// Strip whitespace, uppercase, reject non-letters, collapse ambiguous codes.
///
/// Idempotent: normalizing an already-normalized sequence returns it
/// unchanged.
pub fn normalize_sequence(raw: &str) -> Result<String, SequenceError> {
    let mut out = String::with_capacity(raw.len());

    for ch in raw.chars().filter(|c| !c.is_whitespace()) {
        // ASCII-only so non-Latin letters survive and get rejected below
        let upper = ch.to_ascii_uppercase();
        if !upper.is_ascii_uppercase() {
            return Err(SequenceError::InvalidCharacter {
                ch,
                position: out.len() + 1,
            });
        }
        if AMBIGUOUS_RESIDUES.contains(&upper) {
            out.push(UNKNOWN_RESIDUE);
        } else {
            out.push(upper);
        }
    }

    if out.is_empty() {
        return Err(SequenceError::Empty);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(email: &str, sequence: &str) -> Result<ValidatedSubmission, ValidationError> {
        Validator::default().validate(SubmissionRequest::new(email, sequence))
    }

    #[test]
    fn test_normalize_strips_and_uppercases() {
        assert_eq!(normalize_sequence("ac dEfB\nj").unwrap(), "ACDEFXX");
    }

    #[test]
    fn test_normalize_all_whitespace_kinds() {
        assert_eq!(normalize_sequence(" m\tc\r\nk  r ").unwrap(), "MCKR");
    }

    #[test]
    fn test_ambiguous_codes_become_x() {
        let raw = "ABCJOUXZW";
        let normalized = normalize_sequence(raw).unwrap();
        assert_eq!(normalized, "AXCXXXXXW");
        assert_eq!(normalized.len(), raw.len());
    }

    #[test]
    fn test_normalize_idempotent() {
        for raw in ["ac dEfB\nj", "MCKR", "bjouxz", "ACDEFGHIKLMNPQRSTVWY"] {
            let once = normalize_sequence(raw).unwrap();
            let twice = normalize_sequence(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_digit_rejected() {
        let err = normalize_sequence("MCKR1").unwrap_err();
        assert_eq!(err, SequenceError::InvalidCharacter { ch: '1', position: 5 });
    }

    #[test]
    fn test_position_ignores_whitespace() {
        let err = normalize_sequence("M C-K").unwrap_err();
        assert_eq!(err, SequenceError::InvalidCharacter { ch: '-', position: 3 });
    }

    #[test]
    fn test_non_latin_letter_rejected() {
        assert!(matches!(
            normalize_sequence("MCKÄR"),
            Err(SequenceError::InvalidCharacter { ch: 'Ä', .. })
        ));
        // Unicode uppercasing would turn this into "SS"
        assert!(normalize_sequence("ß").is_err());
    }

    #[test]
    fn test_empty_sequence() {
        assert_eq!(normalize_sequence("").unwrap_err(), SequenceError::Empty);
        assert_eq!(normalize_sequence(" \n\t").unwrap_err(), SequenceError::Empty);
    }

    #[test]
    fn test_fasta_header_rejected() {
        assert!(normalize_sequence(">sp|P01308\nMALW").is_err());
    }

    #[test]
    fn test_valid_emails() {
        for email in [
            "a@b.com",
            "first.last@example.org",
            "user+tag@sub.domain.co.uk",
            "o'brien@example.ie",
            "x_y-z@a-b.example",
        ] {
            assert_eq!(validate_email(email).unwrap(), email, "{}", email);
        }
    }

    #[test]
    fn test_email_trimmed() {
        assert_eq!(validate_email("  a@b.com \n").unwrap(), "a@b.com");
    }

    #[test]
    fn test_invalid_emails() {
        for email in [
            "not-an-email",
            "a@b",
            "@b.com",
            "a@.com",
            "a@b..com",
            ".a@b.com",
            "a.@b.com",
            "a..b@c.com",
            "a@-b.com",
            "a@b-.com",
            "a@b.c",
            "a@b.c0m",
            "a b@c.com",
            "a@b@c.com",
        ] {
            assert_eq!(validate_email(email), Err(EmailError::Malformed), "{}", email);
        }
    }

    #[test]
    fn test_email_length_limits() {
        assert_eq!(validate_email(""), Err(EmailError::Empty));

        let long_local = format!("{}@example.com", "a".repeat(65));
        assert_eq!(validate_email(&long_local), Err(EmailError::Malformed));

        let long = format!("a@{}.com", "b".repeat(260));
        assert!(matches!(validate_email(&long), Err(EmailError::TooLong { .. })));
    }

    #[test]
    fn test_validate_success() {
        let v = validate("a@b.com", "cc kr").unwrap();
        assert_eq!(v.email(), "a@b.com");
        assert_eq!(v.sequence(), "CCKR");
    }

    #[test]
    fn test_invalid_email_keeps_raw_sequence() {
        let err = validate("not-an-email", "mckr").unwrap_err();
        assert_eq!(err.email, Some(EmailError::Malformed));
        assert!(err.sequence_valid());
        assert_eq!(err.request.sequence, "mckr");
        assert_eq!(err.to_failure().code, dsbond_protocol::ErrorCode::InvalidEmail);
    }

    #[test]
    fn test_both_fields_reported() {
        let err = validate("nope", "MCKR1").unwrap_err();
        assert!(!err.email_valid());
        assert!(!err.sequence_valid());
        assert_eq!(err.field_errors().len(), 2);
        assert_eq!(err.to_failure().code, dsbond_protocol::ErrorCode::InvalidBoth);
    }

    #[test]
    fn test_sequence_length_limit() {
        let validator = Validator::new(ValidationLimits { max_sequence_length: 4 });
        assert_eq!(validator.limits().max_sequence_length, 4);
        assert!(validator.validate(SubmissionRequest::new("a@b.com", "CCKR")).is_ok());

        let err = validator
            .validate(SubmissionRequest::new("a@b.com", "CCKRC"))
            .unwrap_err();
        assert_eq!(err.sequence, Some(SequenceError::TooLong { len: 5, max: 4 }));
    }
}
