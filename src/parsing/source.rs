//! Reading raw alarm text from files that may still be in flight.
//!
//! Producers (OCR tools, fax gateways) drop files into the inbox while they
//! are still writing them, so the first read can fail. Reads are retried
//! with a fixed delay; what happens after the last attempt is decided by the
//! configured [`ExhaustedPolicy`].

use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::config::{ExhaustedPolicy, ReadRetryPolicy};
use crate::error::ParseError;

/// Read `path` into lines, retrying per `policy`.
///
/// Blocks the calling thread between attempts; use
/// [`read_source_lines_blocking`] from async code.
pub fn read_source_lines(path: &Path, policy: &ReadRetryPolicy) -> Result<Vec<String>, ParseError> {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        match std::fs::read(path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                return Ok(text.lines().map(|l| l.trim_end().to_string()).collect());
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    attempt,
                    attempts,
                    error = %e,
                    "Alarm source not readable yet"
                );
                if attempt < attempts {
                    std::thread::sleep(policy.delay);
                }
            }
        }
    }

    error!(
        path = %path.display(),
        attempts,
        policy = ?policy.on_exhausted,
        "Giving up on alarm source"
    );

    match policy.on_exhausted {
        ExhaustedPolicy::Proceed => Ok(Vec::new()),
        ExhaustedPolicy::Abort => Err(ParseError::SourceUnavailable {
            path: path.to_path_buf(),
            attempts,
        }),
    }
}

/// [`read_source_lines`] on the blocking thread pool.
pub async fn read_source_lines_blocking(
    path: PathBuf,
    policy: ReadRetryPolicy,
) -> Result<Vec<String>, ParseError> {
    let display = path.clone();
    tokio::task::spawn_blocking(move || read_source_lines(&path, &policy))
        .await
        .map_err(|e| ParseError::Io {
            path: display,
            source: std::io::Error::other(e.to_string()),
        })?
}
