//! Intake configuration
//!
//! Loaded from TOML with every section optional:
//! 1. Built-in defaults
//! 2. Config file (`dsbond-intake.toml` or `--config`)
//! 3. CLI flags (`--root`)

pub mod defaults;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::RetryPolicy;
use crate::notify::{CommandNotifier, LogNotifier, Notifier, NullNotifier, DEFAULT_OPERATOR};
use crate::validate::{validate_email, ValidationLimits, DEFAULT_MAX_SEQUENCE_LENGTH};

/// Errors from loading or checking configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where job artifacts live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Root shared with the prediction pipeline
    pub root: PathBuf,
    /// Age after which `sweep` removes staging files
    pub staging_max_age_secs: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from(defaults::STORAGE_ROOT),
            staging_max_age_secs: defaults::STAGING_MAX_AGE_SECS,
        }
    }
}

/// Job ID retry behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorSection {
    pub resolution_ms: u64,
    pub max_jitter_ms: u64,
    pub max_attempts: u32,
}

impl Default for AllocatorSection {
    fn default() -> Self {
        Self {
            resolution_ms: defaults::RESOLUTION_MS,
            max_jitter_ms: defaults::MAX_JITTER_MS,
            max_attempts: defaults::MAX_ATTEMPTS,
        }
    }
}

impl AllocatorSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            resolution: Duration::from_millis(self.resolution_ms),
            max_jitter: Duration::from_millis(self.max_jitter_ms),
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    pub max_sequence_length: usize,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
        }
    }
}

impl ValidationSection {
    pub fn limits(&self) -> ValidationLimits {
        ValidationLimits {
            max_sequence_length: self.max_sequence_length,
        }
    }
}

/// How operators hear about new jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMode {
    None,
    #[default]
    Log,
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySection {
    pub mode: NotifyMode,
    /// Fixed operator address every notice goes to
    pub operator: String,
    /// Mailer argv for `mode = "command"`; the message is piped to stdin
    pub command: Vec<String>,
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            mode: NotifyMode::default(),
            operator: DEFAULT_OPERATOR.to_string(),
            command: defaults::mail_command(),
        }
    }
}

impl NotifySection {
    /// Build the configured notifier
    pub fn notifier(&self) -> Result<Box<dyn Notifier>, ConfigError> {
        match self.mode {
            NotifyMode::None => Ok(Box::new(NullNotifier)),
            NotifyMode::Log => Ok(Box::new(LogNotifier)),
            NotifyMode::Command => CommandNotifier::new(&self.command, self.operator.clone())
                .map(|n| Box::new(n) as Box<dyn Notifier>)
                .ok_or_else(|| ConfigError::Invalid("notify.command is empty".to_string())),
        }
    }
}

/// Complete intake configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub storage: StorageSection,
    pub allocator: AllocatorSection,
    pub validation: ValidationSection,
    pub notify: NotifySection,
}

impl IntakeConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    /// Load from `path` if given, else from the default file if present,
    /// else built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(defaults::CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply CLI overrides
    pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
        if let Some(root) = root {
            self.storage.root = root;
        }
        self
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage.root is empty".to_string()));
        }
        // Job IDs are whole seconds; a shorter wait runs ahead of the clock
        if self.allocator.resolution_ms < defaults::RESOLUTION_MS {
            return Err(ConfigError::Invalid(format!(
                "allocator.resolution_ms must be at least {}",
                defaults::RESOLUTION_MS
            )));
        }
        if self.allocator.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "allocator.max_attempts must be positive".to_string(),
            ));
        }
        if self.validation.max_sequence_length == 0 {
            return Err(ConfigError::Invalid(
                "validation.max_sequence_length must be positive".to_string(),
            ));
        }
        let operator = &self.notify.operator;
        if validate_email(operator).is_err() && !is_local_mailbox(operator) {
            return Err(ConfigError::Invalid(format!(
                "notify.operator '{}' is not a mail address",
                operator
            )));
        }
        if self.notify.mode == NotifyMode::Command && self.notify.command.is_empty() {
            return Err(ConfigError::Invalid("notify.command is empty".to_string()));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// `user@localhost` style addresses, valid for a local MTA but rejected by
/// the submitter-facing check (single-label domain)
fn is_local_mailbox(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.eq_ignore_ascii_case("localhost")
                && validate_email(&format!("{}@localhost.localdomain", local)).is_ok()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = IntakeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.notify.mode, NotifyMode::Log);
        assert_eq!(config.allocator.retry_policy(), RetryPolicy::default());
        assert_eq!(config.validation.limits(), ValidationLimits::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = IntakeConfig::from_toml(
            r#"
            [storage]
            root = "/srv/jobs"

            [allocator]
            max_attempts = 5
            "#,
            Path::new("test.toml"),
        )
        .unwrap();

        assert_eq!(config.storage.root, PathBuf::from("/srv/jobs"));
        assert_eq!(config.storage.staging_max_age_secs, defaults::STAGING_MAX_AGE_SECS);
        assert_eq!(config.allocator.max_attempts, 5);
        assert_eq!(config.allocator.resolution_ms, defaults::RESOLUTION_MS);
    }

    #[test]
    fn test_longer_resolution_accepted() {
        let config =
            IntakeConfig::from_toml("[allocator]\nresolution_ms = 2000", Path::new("test.toml"))
                .unwrap();
        assert_eq!(config.allocator.retry_policy().resolution, Duration::from_secs(2));
    }

    #[test]
    fn test_notify_section() {
        let config = IntakeConfig::from_toml(
            r#"
            [notify]
            mode = "command"
            operator = "ops@example.org"
            command = ["/usr/bin/msmtp", "-t"]
            "#,
            Path::new("test.toml"),
        )
        .unwrap();
        assert_eq!(config.notify.mode, NotifyMode::Command);
        assert!(config.notify.notifier().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            "[allocator]\nresolution_ms = 0",
            "[allocator]\nresolution_ms = 999",
            "[allocator]\nmax_attempts = 0",
            "[validation]\nmax_sequence_length = 0",
            "[notify]\noperator = \"nobody\"",
            "[notify]\nmode = \"command\"\ncommand = []",
        ];
        for case in cases {
            let result = IntakeConfig::from_toml(case, Path::new("test.toml"));
            assert!(matches!(result, Err(ConfigError::Invalid(_))), "{}", case);
        }
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = IntakeConfig::from_toml("[notify]\nmode = \"pigeon\"", Path::new("bad.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_from_file_and_root_override() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dsbond-intake.toml");
        fs::write(&path, "[storage]\nroot = \"/srv/jobs\"\n").unwrap();

        let config = IntakeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.storage.root, PathBuf::from("/srv/jobs"));

        let config = config.with_root(Some(PathBuf::from("/tmp/jobs")));
        assert_eq!(config.storage.root, PathBuf::from("/tmp/jobs"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = IntakeConfig::from_file(Path::new("/nonexistent/dsbond.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = IntakeConfig::default();
        let text = config.to_toml().unwrap();
        let back = IntakeConfig::from_toml(&text, Path::new("roundtrip.toml")).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_local_operator_accepted() {
        assert!(is_local_mailbox("dsbond-operator@localhost"));
        assert!(!is_local_mailbox("@localhost"));
        assert!(!is_local_mailbox("ops@intranet"));
    }
}
