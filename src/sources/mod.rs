//! Alarm sources: acquisition loops that turn raw input into operations.
//!
//! Each source runs on its own task and hands finished operations to the
//! engine through an [`AlarmSender`].

pub mod file_drop;
pub mod stdin;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use file_drop::FileDropSource;
pub use stdin::StdinSource;

use crate::error::SourceError;
use crate::operation::Operation;
use crate::services::Services;

/// A new operation produced by a source.
#[derive(Debug, Clone)]
pub struct NewAlarm {
    /// Name of the producing source.
    pub source: String,
    pub operation: Operation,
    /// Source-specific extras passed on to jobs.
    pub parameters: serde_json::Value,
}

impl NewAlarm {
    pub fn new(source: impl Into<String>, operation: Operation) -> Self {
        Self {
            source: source.into(),
            operation,
            parameters: serde_json::Value::Null,
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Sending half of the alarm channel, tagged with the source name.
#[derive(Debug, Clone)]
pub struct AlarmSender {
    source: String,
    tx: mpsc::Sender<NewAlarm>,
}

impl AlarmSender {
    pub fn new(source: impl Into<String>, tx: mpsc::Sender<NewAlarm>) -> Self {
        Self {
            source: source.into(),
            tx,
        }
    }

    pub async fn send(&self, operation: Operation) -> Result<(), SourceError> {
        self.send_with_parameters(operation, serde_json::Value::Null).await
    }

    pub async fn send_with_parameters(
        &self,
        operation: Operation,
        parameters: serde_json::Value,
    ) -> Result<(), SourceError> {
        let alarm = NewAlarm::new(self.source.clone(), operation).with_parameters(parameters);
        self.tx.send(alarm).await.map_err(|_| SourceError::ChannelClosed)
    }
}

/// A producer of operations.
#[async_trait]
pub trait AlarmSource: Send + Sync {
    fn name(&self) -> &str;

    /// Prepare the source. An error keeps the source from starting.
    async fn initialize(&mut self, services: &Services) -> Result<(), SourceError>;

    /// Acquisition loop. Returns when the input ends or the source shuts down.
    async fn run(&self, sender: AlarmSender) -> Result<(), SourceError>;

    /// Ask a running loop to stop.
    async fn shutdown(&self) {}
}

/// Run `source` on its own task. Errors and panics end only this source.
pub fn spawn_source(source: Arc<dyn AlarmSource>, tx: mpsc::Sender<NewAlarm>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = source.name().to_string();
        let sender = AlarmSender::new(name.clone(), tx);
        info!(source = %name, "Alarm source started");

        let worker = Arc::clone(&source);
        let outcome = tokio::spawn(async move { worker.run(sender).await }).await;
        match outcome {
            Ok(Ok(())) => info!(source = %name, "Alarm source stopped"),
            Ok(Err(e)) => error!(source = %name, error = %e, "Alarm source failed"),
            Err(e) => error!(source = %name, error = %e, "Alarm source panicked"),
        }
    })
}
