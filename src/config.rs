//! Configuration types.
//!
//! Everything is read from `ALARMWORKFLOW_*` environment variables with
//! defaults suitable for a local run. Structured documents (address book,
//! replace dictionary, EMK list, geocodes) live in JSON files whose paths are
//! configured here and loaded by their owning modules.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// What to do once every read attempt for an alarm source file has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustedPolicy {
    /// Continue with whatever text was read (usually nothing).
    #[default]
    Proceed,
    /// Give up on the alarm and report an error.
    Abort,
}

impl FromStr for ExhaustedPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proceed" => Ok(Self::Proceed),
            "abort" => Ok(Self::Abort),
            other => Err(ConfigError::InvalidValue {
                key: "ALARMWORKFLOW_READ_ON_EXHAUSTED".to_string(),
                message: format!("expected 'proceed' or 'abort', got '{other}'"),
            }),
        }
    }
}

/// Retry policy for reading alarm text that may not be fully written yet.
#[derive(Debug, Clone)]
pub struct ReadRetryPolicy {
    /// Number of read attempts before giving up.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
    pub on_exhausted: ExhaustedPolicy,
}

impl Default for ReadRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(1),
            on_exhausted: ExhaustedPolicy::Proceed,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Alarm source aliases to start.
    pub sources: Vec<String>,
    /// Job aliases to enable, in execution order.
    pub jobs: Vec<String>,
    /// Address filter aliases applied to recipient lookups.
    pub filters: Vec<String>,
    pub address_book_path: Option<PathBuf>,
    pub replace_dictionary_path: Option<PathBuf>,
    pub emk_path: Option<PathBuf>,
    pub geocodes_path: Option<PathBuf>,
    /// Directory watched by the file-drop source.
    pub inbox_dir: PathBuf,
    /// Where processed inbox files are moved to.
    pub archive_dir: PathBuf,
    /// Where the exporter job writes operation XML.
    pub export_dir: PathBuf,
    pub poll_interval: Duration,
    /// Drop alarms whose operation number was already stored.
    pub ignore_duplicate_operation_numbers: bool,
    pub read_retry: ReadRetryPolicy,
    /// Directory for the rolling log file (stderr only when unset).
    pub log_dir: Option<PathBuf>,
    /// How long shutdown waits for in-flight alarms and async jobs.
    pub shutdown_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sources: vec!["FileDrop".to_string()],
            jobs: vec!["OperationFileExporter".to_string()],
            filters: vec!["ByLoop".to_string()],
            address_book_path: None,
            replace_dictionary_path: None,
            emk_path: None,
            geocodes_path: None,
            inbox_dir: PathBuf::from("./data/inbox"),
            archive_dir: PathBuf::from("./data/archive"),
            export_dir: PathBuf::from("./data/export"),
            poll_interval: Duration::from_secs(2),
            ignore_duplicate_operation_numbers: false,
            read_retry: ReadRetryPolicy::default(),
            log_dir: None,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let on_exhausted = match std::env::var("ALARMWORKFLOW_READ_ON_EXHAUSTED") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.read_retry.on_exhausted,
        };

        Ok(Self {
            sources: env_list("ALARMWORKFLOW_SOURCES").unwrap_or(defaults.sources),
            jobs: env_list("ALARMWORKFLOW_JOBS").unwrap_or(defaults.jobs),
            filters: env_list("ALARMWORKFLOW_FILTERS").unwrap_or(defaults.filters),
            address_book_path: env_path("ALARMWORKFLOW_ADDRESS_BOOK"),
            replace_dictionary_path: env_path("ALARMWORKFLOW_REPLACE_DICTIONARY"),
            emk_path: env_path("ALARMWORKFLOW_EMK"),
            geocodes_path: env_path("ALARMWORKFLOW_GEOCODES"),
            inbox_dir: env_path("ALARMWORKFLOW_INBOX_DIR").unwrap_or(defaults.inbox_dir),
            archive_dir: env_path("ALARMWORKFLOW_ARCHIVE_DIR").unwrap_or(defaults.archive_dir),
            export_dir: env_path("ALARMWORKFLOW_EXPORT_DIR").unwrap_or(defaults.export_dir),
            poll_interval: env_parse("ALARMWORKFLOW_POLL_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            ignore_duplicate_operation_numbers: env_parse("ALARMWORKFLOW_IGNORE_DUPLICATES")
                .unwrap_or(defaults.ignore_duplicate_operation_numbers),
            read_retry: ReadRetryPolicy {
                max_attempts: env_parse("ALARMWORKFLOW_READ_ATTEMPTS")
                    .unwrap_or(defaults.read_retry.max_attempts)
                    .max(1),
                delay: env_parse("ALARMWORKFLOW_READ_DELAY_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.read_retry.delay),
                on_exhausted,
            },
            log_dir: env_path("ALARMWORKFLOW_LOG_DIR"),
            shutdown_timeout: env_parse("ALARMWORKFLOW_SHUTDOWN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
        })
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

/// Comma-separated list; `None` when unset so the default applies.
fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_policy_matches_intake_contract() {
        let policy = ReadRetryPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.delay, Duration::from_secs(1));
        assert_eq!(policy.on_exhausted, ExhaustedPolicy::Proceed);
    }

    #[test]
    fn exhausted_policy_parses_case_insensitively() {
        assert_eq!("Abort".parse::<ExhaustedPolicy>().unwrap(), ExhaustedPolicy::Abort);
        assert_eq!(" proceed ".parse::<ExhaustedPolicy>().unwrap(), ExhaustedPolicy::Proceed);
        assert!("retry".parse::<ExhaustedPolicy>().is_err());
    }
}
