//! Line-delimited JSON intake handler
//!
//! Reads one `SubmitRequest` per line and writes one `SubmitResponse` per
//! line, in order. This is how a web front end (or anything else that can
//! spawn a process) talks to the intake gate:
//!
//!   dsbond-intake serve
//!
//! A malformed line gets an INVALID_REQUEST response and processing
//! continues with the next line. Blank lines are ignored.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use dsbond_protocol::{IntakeFailure, SubmitRequest, SubmitResponse};
use tracing::debug;

use crate::intake::IntakeService;
use crate::validate::SubmissionRequest;

/// Counts from one `run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    pub requests: usize,
    pub accepted: usize,
}

/// Stdio request handler
pub struct RpcHandler {
    service: Arc<IntakeService>,
}

impl RpcHandler {
    pub fn new(service: Arc<IntakeService>) -> Self {
        Self { service }
    }

    /// Serve stdin to stdout until EOF.
    pub fn run(&self) -> io::Result<ServeSummary> {
        self.run_with_io(&mut io::stdin().lock(), &mut io::stdout().lock())
    }

    /// Serve with custom I/O (for testing).
    pub fn run_with_io<R: BufRead, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
    ) -> io::Result<ServeSummary> {
        let mut summary = ServeSummary::default();
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let response = self.handle_line(&line);
            summary.requests += 1;
            if response.ok {
                summary.accepted += 1;
            }
            self.write_response(writer, &response)?;
        }

        debug!(requests = summary.requests, accepted = summary.accepted, "input closed");
        Ok(summary)
    }

    /// Parse and answer a single request line.
    pub fn handle_line(&self, line: &str) -> SubmitResponse {
        match serde_json::from_str::<SubmitRequest>(line) {
            Ok(request) => self.respond(request),
            Err(e) => SubmitResponse::rejected(
                None,
                String::new(),
                String::new(),
                IntakeFailure::invalid_request(format!("invalid JSON: {}", e)),
            ),
        }
    }

    /// Run a parsed request through the intake service.
    pub fn respond(&self, request: SubmitRequest) -> SubmitResponse {
        let request_id = request.request_id.clone();
        let raw = SubmissionRequest::from(request);

        match self.service.submit(raw.clone()) {
            Ok(receipt) => SubmitResponse::accepted(
                request_id,
                receipt.job_id.to_string(),
                receipt.email,
                receipt.sequence,
            ),
            Err(e) => SubmitResponse::rejected(request_id, raw.email, raw.sequence, e.to_failure()),
        }
    }

    fn write_response<W: Write>(&self, writer: &mut W, response: &SubmitResponse) -> io::Result<()> {
        let json = serde_json::to_string(response)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{}", json)?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ManualClock, RetryPolicy};
    use crate::store::MemoryJobStore;
    use dsbond_protocol::{ErrorCode, Field};
    use std::io::Cursor;
    use std::time::Duration;

    fn handler(store: Arc<MemoryJobStore>) -> RpcHandler {
        let service = IntakeService::new(store)
            .with_clock(Arc::new(ManualClock::at_secs(1_000)))
            .with_retry_policy(RetryPolicy {
                resolution: Duration::from_secs(1),
                max_jitter: Duration::ZERO,
                max_attempts: 3,
            });
        RpcHandler::new(Arc::new(service))
    }

    fn run(handler: &RpcHandler, input: &str) -> (ServeSummary, Vec<SubmitResponse>) {
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let mut output = Vec::new();
        let summary = handler.run_with_io(&mut reader, &mut output).unwrap();
        let responses = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (summary, responses)
    }

    #[test]
    fn test_accepts_request() {
        let store = Arc::new(MemoryJobStore::new());
        let (summary, responses) = run(
            &handler(store.clone()),
            "{\"request_id\":\"r1\",\"email\":\"a@b.com\",\"sequence\":\"cc kr\"}\n",
        );

        assert_eq!(summary, ServeSummary { requests: 1, accepted: 1 });
        let resp = &responses[0];
        assert!(resp.ok);
        assert_eq!(resp.request_id.as_deref(), Some("r1"));
        assert_eq!(resp.job_id.as_deref(), Some("1000"));
        assert_eq!(resp.sequence, "CCKR");
        assert_eq!(store.job_count(), 1);
    }

    #[test]
    fn test_rejection_echoes_raw_input() {
        let (_, responses) = run(
            &handler(Arc::new(MemoryJobStore::new())),
            "{\"email\":\"not-an-email\",\"sequence\":\"mc kr\"}\n",
        );

        let resp = &responses[0];
        assert!(!resp.ok);
        assert_eq!(resp.email, "not-an-email");
        assert_eq!(resp.sequence, "mc kr");
        let error = resp.error.as_ref().unwrap();
        assert_eq!(error.code, ErrorCode::InvalidEmail);
        assert!(error.field_reason(Field::Email).is_some());
        assert!(error.field_reason(Field::Sequence).is_none());
    }

    #[test]
    fn test_bad_line_does_not_stop_stream() {
        let input = "not json\n\n{\"email\":\"a@b.com\",\"sequence\":\"MKV\"}\n";
        let (summary, responses) = run(&handler(Arc::new(MemoryJobStore::new())), input);

        assert_eq!(summary, ServeSummary { requests: 2, accepted: 1 });
        assert_eq!(responses[0].error.as_ref().unwrap().code, ErrorCode::InvalidRequest);
        assert!(responses[1].ok);
    }

    #[test]
    fn test_storage_failure_response_is_generic() {
        let store = Arc::new(MemoryJobStore::new());
        store.fail_persist(true);
        let resp = handler(store).handle_line("{\"email\":\"a@b.com\",\"sequence\":\"MKV\"}");

        assert!(!resp.ok);
        assert!(resp.job_id.is_none());
        let error = resp.error.unwrap();
        assert_eq!(error.code, ErrorCode::StorageError);
        assert!(error.fields.is_empty());
    }
}
