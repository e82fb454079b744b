//! Operator notification for accepted jobs
//!
//! Notification is best-effort. The persisted artifacts are the record the
//! pipeline works from; a lost notice only delays an operator noticing the
//! job. Implementations must not block the submission on delivery.

use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use chrono::SecondsFormat;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::job::JobId;

/// Default operator mailbox
pub const DEFAULT_OPERATOR: &str = "dsbond-operator@localhost";

/// Residues per line in the notice body
const SEQUENCE_LINE_WIDTH: usize = 60;

/// Errors from notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to start notifier: {0}")]
    Spawn(#[source] io::Error),

    #[error("notifier command failed: {0}")]
    Command(String),
}

/// What the operator is told about a new job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNotice {
    pub job_id: JobId,
    pub email: String,
    pub sequence: String,
}

impl JobNotice {
    pub fn new(job_id: JobId, email: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            job_id,
            email: email.into(),
            sequence: sequence.into(),
        }
    }

    pub fn subject(&self) -> String {
        format!("[dsbond] new job {}", self.job_id)
    }

    /// Render as a mail message suitable for `sendmail -t`
    pub fn to_message(&self, operator: &str) -> String {
        let mut message = format!("To: {}\nSubject: {}\n\n", operator, self.subject());
        message.push_str(&format!("Job ID: {}\n", self.job_id));
        if let Some(at) = self.job_id.created_at() {
            message.push_str(&format!(
                "Submitted: {}\n",
                at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        message.push_str(&format!("Requester: {}\n", self.email));
        message.push_str(&format!("Residues: {}\n\n", self.sequence.len()));

        // Sequences are ASCII after validation, so byte chunks are characters
        for line in self.sequence.as_bytes().chunks(SEQUENCE_LINE_WIDTH) {
            message.push_str(&String::from_utf8_lossy(line));
            message.push('\n');
        }
        message
    }
}

/// Notification port
pub trait Notifier: Send + Sync {
    /// Hand off a notice. Returning `Ok` means the notice was accepted for
    /// delivery, not that it arrived.
    fn notify(&self, notice: &JobNotice) -> Result<(), NotifyError>;

    /// Wait for notices still in flight. Called before the process exits;
    /// never affects a submission result.
    fn flush(&self) {}
}

/// Discards notices
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, notice: &JobNotice) -> Result<(), NotifyError> {
        debug!(job_id = %notice.job_id, "notification disabled");
        Ok(())
    }
}

/// Records notices in the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &JobNotice) -> Result<(), NotifyError> {
        info!(
            job_id = %notice.job_id,
            email = %notice.email,
            residues = notice.sequence.len(),
            "new job submitted"
        );
        Ok(())
    }
}

/// Pipes the notice into an external mailer (`sendmail -t` by default).
///
/// Delivery runs on a background thread; `notify` returns once that thread
/// has started.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
    operator: String,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl CommandNotifier {
    /// Build from an argv (`command[0]` is the program)
    pub fn new(command: &[String], operator: impl Into<String>) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            operator: operator.into(),
            pending: Arc::default(),
        })
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// Run the command and wait for it. Used by the delivery thread.
    pub fn deliver(&self, notice: &JobNotice) -> Result<(), NotifyError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(NotifyError::Spawn)?;

        let message = notice.to_message(&self.operator);
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(message.as_bytes()) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(NotifyError::Command(format!("writing message: {}", e)));
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| NotifyError::Command(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NotifyError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, notice: &JobNotice) -> Result<(), NotifyError> {
        let notifier = self.clone();
        let notice = notice.clone();

        let handle = thread::Builder::new()
            .name(format!("notify-{}", notice.job_id))
            .spawn(move || match notifier.deliver(&notice) {
                Ok(()) => debug!(job_id = %notice.job_id, "operator notified"),
                Err(e) => warn!(job_id = %notice.job_id, error = %e, "operator notification failed"),
            })
            .map_err(NotifyError::Spawn)?;

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
        Ok(())
    }

    fn flush(&self) {
        let handles: Vec<_> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            let _ = handle.join();
        }
    }
}
