//! Built-in defaults
//!
//! Hardcoded values used for any setting the config file leaves out.

/// Store root when neither the config file nor `--root` names one
pub const STORAGE_ROOT: &str = "/var/lib/dsbond/jobs";

/// Staging files older than this are swept (1 hour)
pub const STAGING_MAX_AGE_SECS: u64 = 3600;

/// One job ID slot, also the smallest allowed collision wait
pub const RESOLUTION_MS: u64 = 1000;

pub const MAX_JITTER_MS: u64 = 250;

pub const MAX_ATTEMPTS: u32 = 120;

/// Default config file looked up in the working directory
pub const CONFIG_FILE: &str = "dsbond-intake.toml";

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "DSBOND_LOG";

pub fn mail_command() -> Vec<String> {
    vec!["/usr/sbin/sendmail".to_string(), "-t".to_string()]
}
