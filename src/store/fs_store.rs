//! Filesystem job store.
//!
//! Layout under the store root:
//! `<root>/claims/<id>`     exclusive-create claim marker
//! `<root>/sequences/<id>`  normalized sequence
//! `<root>/emails/<id>`     requester email (written last, commit marker)
//! `<root>/.tmp/`           staging area for atomic writes
//!
//! Features:
//! - Claims use `O_CREAT | O_EXCL`, so the existence check and the claim are
//!   one syscall and safe across processes sharing the root
//! - Artifacts are staged in `.tmp/` on the same filesystem, fsynced, then
//!   hard-linked into place; an existing artifact is never replaced
//! - The email is published last; the pipeline treats `emails/<id>` as the
//!   signal that the job is complete
//! - Claims are never removed, so an ID whose persistence failed stays burned.
//!   `claims/` grows by one file per job; pruning old markers (e.g. by age,
//!   once their jobs have been processed) is left to the operator. `sweep`
//!   only touches `.tmp/`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tracing::{debug, warn};

use super::{JobStore, StoreError, StoreResult};
use crate::job::{ClaimedJob, JobId};
use crate::validate::ValidatedSubmission;

/// Claim markers
pub const CLAIMS_DIR: &str = "claims";

/// Email artifacts
pub const EMAILS_DIR: &str = "emails";

/// Sequence artifacts
pub const SEQUENCES_DIR: &str = "sequences";

/// Staging area for in-flight writes
pub const STAGING_DIR: &str = ".tmp";

const STAGING_PREFIX: &str = ".tmp.";

/// Job store rooted at a directory shared with the prediction pipeline
#[derive(Debug, Clone)]
pub struct FsJobStore {
    root: PathBuf,
}

impl FsJobStore {
    /// Open (and create if needed) a store at `root`.
    ///
    /// Fails if the layout cannot be created or the root is not writable.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();

        for dir in [CLAIMS_DIR, EMAILS_DIR, SEQUENCES_DIR, STAGING_DIR] {
            fs::create_dir_all(root.join(dir))?;
        }

        // Verify the staging area is writable
        let probe = root
            .join(STAGING_DIR)
            .join(format!(".store_test.{}", std::process::id()));
        if File::create(&probe).is_err() {
            return Err(StoreError::NotWritable(root));
        }
        let _ = fs::remove_file(&probe);

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn claim_path(&self, id: JobId) -> PathBuf {
        self.root.join(CLAIMS_DIR).join(id.to_string())
    }

    pub fn email_path(&self, id: JobId) -> PathBuf {
        self.root.join(EMAILS_DIR).join(id.to_string())
    }

    pub fn sequence_path(&self, id: JobId) -> PathBuf {
        self.root.join(SEQUENCES_DIR).join(id.to_string())
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Whether `id` already has a published artifact.
    fn has_artifacts(&self, id: JobId) -> io::Result<bool> {
        Ok(self.email_path(id).try_exists()? || self.sequence_path(id).try_exists()?)
    }

    /// Write `content` to a fresh, fsynced staging file.
    fn stage(&self, id: JobId, kind: &str, content: &str) -> StoreResult<PathBuf> {
        let name = format!(
            "{}{}.{}.{}.{}",
            STAGING_PREFIX,
            id,
            kind,
            std::process::id(),
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        );
        let path = self.staging_dir().join(name);

        let result = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .and_then(|mut file| {
                file.write_all(content.as_bytes())?;
                file.sync_all()
            });

        match result {
            Ok(()) => Ok(path),
            Err(e) => {
                let _ = fs::remove_file(&path);
                Err(StoreError::Io(e))
            }
        }
    }

    /// Link a staged file to `dest` and drop the staging name.
    ///
    /// Unlike `rename`, linking never replaces an existing artifact.
    fn publish(&self, id: JobId, staged: &Path, dest: &Path) -> StoreResult<()> {
        let result = fs::hard_link(staged, dest);
        if let Err(e) = fs::remove_file(staged) {
            warn!(job_id = %id, error = %e, "failed to remove staging file");
        }
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyPersisted(id))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Remove staging files older than `max_age`.
    ///
    /// These are left behind only by submitters that crashed between staging
    /// and publishing. Returns the number of files removed.
    pub fn sweep_staging(&self, max_age: Duration) -> StoreResult<usize> {
        let staging = self.staging_dir();
        if !staging.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&staging)? {
            let path = entry?.path();

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with(STAGING_PREFIX) {
                continue;
            }

            let age = fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok());
            if matches!(age, Some(age) if age > max_age) {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(file = name, error = %e, "failed to remove stale staging file"),
                }
            }
        }

        Ok(removed)
    }
}

impl JobStore for FsJobStore {
    fn try_claim(&self, id: JobId) -> StoreResult<bool> {
        // Jobs written by submitters that predate claim markers
        if self.has_artifacts(id)? {
            return Ok(false);
        }

        let path = self.claim_path(id);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(StoreError::Io(e)),
        };

        // The claim is already held; the record is informational only
        let record = format!(
            "pid={}\nclaimed_at={}\n",
            std::process::id(),
            Utc::now().to_rfc3339()
        );
        if let Err(e) = file.write_all(record.as_bytes()).and_then(|_| file.sync_all()) {
            warn!(job_id = %id, error = %e, "failed to write claim record");
        }

        Ok(true)
    }

    fn persist(&self, job: &ClaimedJob, submission: &ValidatedSubmission) -> StoreResult<()> {
        let id = job.id();

        let sequence_tmp = self.stage(id, "sequence", submission.sequence())?;
        let email_tmp = match self.stage(id, "email", submission.email()) {
            Ok(path) => path,
            Err(e) => {
                let _ = fs::remove_file(&sequence_tmp);
                return Err(e);
            }
        };

        let sequence_path = self.sequence_path(id);
        if let Err(e) = self.publish(id, &sequence_tmp, &sequence_path) {
            let _ = fs::remove_file(&email_tmp);
            return Err(e);
        }

        // Commit point: once the email is visible the job is complete
        if let Err(e) = self.publish(id, &email_tmp, &self.email_path(id)) {
            if let Err(cleanup) = fs::remove_file(&sequence_path) {
                warn!(job_id = %id, error = %cleanup, "failed to roll back sequence artifact");
            }
            return Err(e);
        }

        for dir in [SEQUENCES_DIR, EMAILS_DIR] {
            if let Err(e) = sync_dir(&self.root.join(dir)) {
                warn!(job_id = %id, dir, error = %e, "directory fsync failed");
            }
        }

        debug!(job_id = %id, "persisted job artifacts");
        Ok(())
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{SubmissionRequest, Validator};
    use tempfile::TempDir;

    fn submission(email: &str, sequence: &str) -> ValidatedSubmission {
        Validator::default()
            .validate(SubmissionRequest::new(email, sequence))
            .unwrap()
    }

    fn staging_entries(store: &FsJobStore) -> usize {
        fs::read_dir(store.root().join(STAGING_DIR)).unwrap().count()
    }

    #[test]
    fn test_open_creates_layout() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("jobs");
        let store = FsJobStore::open(&root).unwrap();

        for dir in [CLAIMS_DIR, EMAILS_DIR, SEQUENCES_DIR, STAGING_DIR] {
            assert!(root.join(dir).is_dir(), "{} missing", dir);
        }
        assert_eq!(staging_entries(&store), 0);
    }

    #[test]
    fn test_open_fails_when_root_is_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("jobs");
        fs::write(&root, "not a directory").unwrap();

        assert!(FsJobStore::open(&root).is_err());
    }

    #[test]
    fn test_claim_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let store = FsJobStore::open(temp.path()).unwrap();
        let id = JobId::from_secs(1_760_601_600);

        assert!(store.try_claim(id).unwrap());
        assert!(!store.try_claim(id).unwrap());
        assert!(store.claim_path(id).exists());

        let record = fs::read_to_string(store.claim_path(id)).unwrap();
        assert!(record.starts_with("pid="));
    }

    #[test]
    fn test_existing_artifact_blocks_claim() {
        let temp = TempDir::new().unwrap();
        let store = FsJobStore::open(temp.path()).unwrap();
        let id = JobId::from_secs(7);

        fs::write(store.email_path(id), "someone@example.org").unwrap();
        assert!(!store.try_claim(id).unwrap());
        assert!(!store.claim_path(id).exists());
    }

    #[test]
    fn test_claim_io_error_surfaces() {
        let temp = TempDir::new().unwrap();
        let store = FsJobStore::open(temp.path()).unwrap();
        fs::remove_dir(temp.path().join(CLAIMS_DIR)).unwrap();
        fs::write(temp.path().join(CLAIMS_DIR), "").unwrap();

        assert!(store.try_claim(JobId::from_secs(1)).is_err());
    }

    #[test]
    fn test_persist_writes_both_artifacts() {
        let temp = TempDir::new().unwrap();
        let store = FsJobStore::open(temp.path()).unwrap();
        let id = JobId::from_secs(42);
        assert!(store.try_claim(id).unwrap());

        store
            .persist(&ClaimedJob::new(id, 1), &submission("a@b.com", "CCKR"))
            .unwrap();

        assert_eq!(fs::read(store.email_path(id)).unwrap(), b"a@b.com");
        assert_eq!(fs::read(store.sequence_path(id)).unwrap(), b"CCKR");
        assert_eq!(staging_entries(&store), 0);
    }

    #[test]
    fn test_failed_email_publish_rolls_back_sequence() {
        let temp = TempDir::new().unwrap();
        let store = FsJobStore::open(temp.path()).unwrap();
        let id = JobId::from_secs(43);
        assert!(store.try_claim(id).unwrap());

        // Rename into a non-directory fails
        fs::remove_dir(temp.path().join(EMAILS_DIR)).unwrap();
        fs::write(temp.path().join(EMAILS_DIR), "").unwrap();

        let result = store.persist(&ClaimedJob::new(id, 1), &submission("a@b.com", "CCKR"));
        assert!(result.is_err());
        assert!(!store.sequence_path(id).exists());
        assert_eq!(staging_entries(&store), 0);
        // The ID stays burned
        assert!(!store.try_claim(id).unwrap());
    }

    #[test]
    fn test_failed_sequence_publish_publishes_nothing() {
        let temp = TempDir::new().unwrap();
        let store = FsJobStore::open(temp.path()).unwrap();
        let id = JobId::from_secs(44);
        assert!(store.try_claim(id).unwrap());

        fs::remove_dir(temp.path().join(SEQUENCES_DIR)).unwrap();
        fs::write(temp.path().join(SEQUENCES_DIR), "").unwrap();

        let result = store.persist(&ClaimedJob::new(id, 1), &submission("a@b.com", "CCKR"));
        assert!(result.is_err());
        assert!(!store.email_path(id).exists());
        assert_eq!(staging_entries(&store), 0);
    }

    #[test]
    fn test_persist_never_replaces_existing_artifacts() {
        let temp = TempDir::new().unwrap();
        let store = FsJobStore::open(temp.path()).unwrap();
        let id = JobId::from_secs(50);
        assert!(store.try_claim(id).unwrap());

        // Written by another writer after the claim was taken
        fs::write(store.email_path(id), "old@b.com").unwrap();
        fs::write(store.sequence_path(id), "OLD").unwrap();

        let result = store.persist(&ClaimedJob::new(id, 1), &submission("new@b.com", "NEW"));
        assert!(matches!(result, Err(StoreError::AlreadyPersisted(found)) if found == id));
        assert_eq!(fs::read_to_string(store.email_path(id)).unwrap(), "old@b.com");
        assert_eq!(fs::read_to_string(store.sequence_path(id)).unwrap(), "OLD");
        assert_eq!(staging_entries(&store), 0);
    }

    #[test]
    fn test_existing_email_rolls_back_new_sequence() {
        let temp = TempDir::new().unwrap();
        let store = FsJobStore::open(temp.path()).unwrap();
        let id = JobId::from_secs(51);
        assert!(store.try_claim(id).unwrap());
        fs::write(store.email_path(id), "old@b.com").unwrap();

        let result = store.persist(&ClaimedJob::new(id, 1), &submission("new@b.com", "NEW"));
        assert!(matches!(result, Err(StoreError::AlreadyPersisted(_))));
        assert_eq!(fs::read_to_string(store.email_path(id)).unwrap(), "old@b.com");
        assert!(!store.sequence_path(id).exists());
        assert_eq!(staging_entries(&store), 0);
    }

    #[test]
    fn test_sweep_staging_respects_age() {
        let temp = TempDir::new().unwrap();
        let store = FsJobStore::open(temp.path()).unwrap();
        let staging = temp.path().join(STAGING_DIR);
        fs::write(staging.join(".tmp.1.email.99.0"), "orphan").unwrap();
        fs::write(staging.join("unrelated"), "keep").unwrap();

        assert_eq!(store.sweep_staging(Duration::from_secs(3600)).unwrap(), 0);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.sweep_staging(Duration::from_millis(1)).unwrap(), 1);
        assert!(staging.join("unrelated").exists());
    }
}
