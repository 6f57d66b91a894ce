//! Error types for the alarm workflow.

use std::path::PathBuf;

/// Top-level error type for the workflow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Addressing error: {0}")]
    Addressing(#[from] AddressingError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Alarm source error: {0}")]
    Source(#[from] SourceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Configuration-related errors. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown {kind} plugin: {alias}")]
    UnknownPlugin { kind: &'static str, alias: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid replace rule {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors while acquiring raw alarm text.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Source {path} not available after {attempts} attempts")]
    SourceUnavailable { path: PathBuf, attempts: u32 },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Address book errors.
#[derive(Debug, thiserror::Error)]
pub enum AddressingError {
    #[error("Address book entry has no name")]
    UnnamedEntry,

    #[error("Address book could not be loaded: {0}")]
    Load(#[from] ConfigError),
}

/// Job-related errors. Raised by job implementations and logged by the manager.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {name} failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("Job {name} is missing a collaborator: {what}")]
    MissingCollaborator { name: String, what: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("SMS error: {0}")]
    Sms(#[from] SmsError),
}

/// SMS gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    #[error("SMS gateway rejected the message: {0}")]
    Rejected(String),

    #[error("SMS gateway unavailable: {0}")]
    Unavailable(String),
}

/// Alarm source errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Alarm channel closed")]
    ChannelClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Operation store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Operation {id} not found")]
    NotFound { id: i64 },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Operation export errors.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("XML write failed: {0}")]
    Xml(String),

    #[error("Export produced invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type alias for the workflow.
pub type Result<T> = std::result::Result<T, Error>;
