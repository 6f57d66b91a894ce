//! File-drop source: polls an inbox directory for alarm text files.
//!
//! Fax and OCR tools write one `.txt` file per alarm. Each file is read
//! (with retries while the producer may still hold it), parsed, sent to the
//! engine and then moved to the archive directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::ReadRetryPolicy;
use crate::error::SourceError;
use crate::parsing::AlarmParser;
use crate::services::Services;
use crate::sources::{AlarmSender, AlarmSource};

const ALARM_FILE_EXTENSION: &str = "txt";

struct Settings {
    inbox: PathBuf,
    archive: PathBuf,
    poll_interval: Duration,
    retry: ReadRetryPolicy,
    parser: AlarmParser,
    clock: Arc<dyn Clock>,
}

/// Watches the configured inbox directory.
pub struct FileDropSource {
    settings: Option<Settings>,
    shutdown: Arc<AtomicBool>,
}

impl FileDropSource {
    pub fn new() -> Self {
        Self {
            settings: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for FileDropSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlarmSource for FileDropSource {
    fn name(&self) -> &str {
        "FileDrop"
    }

    async fn initialize(&mut self, services: &Services) -> Result<(), SourceError> {
        let config = &services.config;
        for dir in [&config.inbox_dir, &config.archive_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| SourceError::StartupFailed {
                    name: self.name().to_string(),
                    reason: format!("cannot create {}: {e}", dir.display()),
                })?;
        }

        self.settings = Some(Settings {
            inbox: config.inbox_dir.clone(),
            archive: config.archive_dir.clone(),
            poll_interval: config.poll_interval,
            retry: config.read_retry.clone(),
            parser: services.parser(),
            clock: Arc::clone(&services.clock),
        });
        Ok(())
    }

    async fn run(&self, sender: AlarmSender) -> Result<(), SourceError> {
        let Some(settings) = &self.settings else {
            return Err(SourceError::StartupFailed {
                name: self.name().to_string(),
                reason: "not initialized".to_string(),
            });
        };

        info!(
            inbox = %settings.inbox.display(),
            "Watching inbox every {}ms",
            settings.poll_interval.as_millis()
        );
        let mut tick = tokio::time::interval(settings.poll_interval);

        loop {
            tick.tick().await;

            if self.shutdown.load(Ordering::Relaxed) {
                info!("File drop source shutting down");
                return Ok(());
            }

            poll_once(settings, &sender).await?;
        }
    }

    async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Process every alarm file currently in the inbox, oldest name first.
async fn poll_once(settings: &Settings, sender: &AlarmSender) -> Result<(), SourceError> {
    let entries = match tokio::fs::read_dir(&settings.inbox).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(inbox = %settings.inbox.display(), error = %e, "Cannot list inbox");
            return Ok(());
        }
    };

    let mut files = Vec::new();
    let mut stream = ReadDirStream::new(entries);
    while let Some(entry) = stream.next().await {
        match entry {
            Ok(entry) if is_alarm_file(&entry.path()) => files.push(entry.path()),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Skipping unreadable inbox entry"),
        }
    }
    files.sort();

    for path in files {
        process_file(settings, sender, &path).await?;
    }
    Ok(())
}

async fn process_file(settings: &Settings, sender: &AlarmSender, path: &Path) -> Result<(), SourceError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!(file = %file_name, "Picked up alarm file");

    match settings.parser.parse_file(path, &settings.retry).await {
        Ok(operation) => {
            sender
                .send_with_parameters(operation, serde_json::json!({ "file": file_name }))
                .await?;
        }
        Err(e) => error!(file = %file_name, error = %e, "Could not read alarm file"),
    }

    archive(settings, path, &file_name).await;
    Ok(())
}

/// Move a handled file out of the inbox so it is not picked up again.
async fn archive(settings: &Settings, path: &Path, file_name: &str) {
    let stamp = settings.clock.now().format("%Y%m%d%H%M%S");
    let target = settings.archive.join(format!("{stamp}_{file_name}"));
    if let Err(e) = tokio::fs::rename(path, &target).await {
        warn!(file = %file_name, error = %e, "Could not archive alarm file, deleting it");
        if let Err(e) = tokio::fs::remove_file(path).await {
            error!(file = %file_name, error = %e, "Could not remove alarm file");
        }
    }
}

fn is_alarm_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ALARM_FILE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    use crate::clock::SystemClock;
    use crate::config::{EngineConfig, ExhaustedPolicy};

    fn services(dir: &TempDir) -> Services {
        let config = EngineConfig {
            inbox_dir: dir.path().join("inbox"),
            archive_dir: dir.path().join("archive"),
            poll_interval: Duration::from_millis(20),
            read_retry: ReadRetryPolicy {
                max_attempts: 2,
                delay: Duration::from_millis(5),
                on_exhausted: ExhaustedPolicy::Proceed,
            },
            ..Default::default()
        };
        Services::new(config, Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn picks_up_parses_and_archives_files() {
        let dir = TempDir::new().unwrap();
        let services = services(&dir);
        let mut source = FileDropSource::new();
        source.initialize(&services).await.unwrap();

        let inbox = dir.path().join("inbox");
        std::fs::write(inbox.join("ignored.pdf"), "binary").unwrap();
        std::fs::write(
            inbox.join("alarm.txt"),
            "EINSATZNR: T 1.1\nStraße: Musterstraße 2 a RH\nOrt: 80331 München",
        )
        .unwrap();

        let source = Arc::new(source);
        let (tx, mut rx) = mpsc::channel(4);
        let runner = {
            let source = Arc::clone(&source);
            tokio::spawn(async move { source.run(AlarmSender::new("FileDrop", tx)).await })
        };

        let alarm = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alarm.source, "FileDrop");
        assert_eq!(alarm.parameters["file"], "alarm.txt");
        assert_eq!(alarm.operation.operation_number, "T 1.1");
        assert_eq!(alarm.operation.einsatzort.street_number, "2 a");
        assert_eq!(alarm.operation.einsatzort.city, "München");

        source.shutdown().await;
        runner.await.unwrap().unwrap();

        assert!(!inbox.join("alarm.txt").exists());
        assert!(inbox.join("ignored.pdf").exists());
        let archived: Vec<_> = std::fs::read_dir(dir.path().join("archive"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(archived.len(), 1);
        assert!(archived[0].ends_with("_alarm.txt"));
    }

    #[tokio::test]
    async fn run_without_initialize_fails() {
        let (tx, _rx) = mpsc::channel(1);
        let err = FileDropSource::new()
            .run(AlarmSender::new("FileDrop", tx))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::StartupFailed { .. }));
    }
}
