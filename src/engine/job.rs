//! The job plugin contract.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobError;
use crate::operation::Operation;
use crate::services::Services;

/// Point in an operation's lifecycle at which jobs run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Before the operation is stored. Enrichment jobs run here.
    OnOperationSurfaced,
    /// After the operation is stored. Notification jobs run here.
    AfterOperationStored,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OnOperationSurfaced => "on_operation_surfaced",
            Self::AfterOperationStored => "after_operation_stored",
        };
        write!(f, "{s}")
    }
}

/// Per-dispatch context handed to every job.
#[derive(Debug, Clone, Serialize)]
pub struct JobContext {
    /// Alarm source that produced the operation.
    pub alarm_source_name: String,
    /// Source-specific extras (for example the raw file name).
    pub parameters: serde_json::Value,
    pub phase: JobPhase,
    /// Correlates log lines of one intake.
    pub intake_id: Uuid,
}

impl JobContext {
    pub fn new(alarm_source_name: impl Into<String>, parameters: serde_json::Value, phase: JobPhase) -> Self {
        Self {
            alarm_source_name: alarm_source_name.into(),
            parameters,
            phase,
            intake_id: Uuid::new_v4(),
        }
    }

    /// Same intake, different phase.
    pub fn with_phase(&self, phase: JobPhase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }
}

/// A plugin invoked once per operation in its phase.
///
/// Jobs are registered once at startup. A job whose `initialize` returns
/// `false` is skipped for the rest of the process lifetime. Failures in
/// `execute` are logged by the manager and never reach other jobs; retries
/// are up to the job itself.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    fn phase(&self) -> JobPhase;

    /// Run on its own task without blocking the pipeline. Async jobs work on
    /// a snapshot of the operation; their changes are not seen by later jobs.
    fn is_async(&self) -> bool {
        false
    }

    async fn initialize(&mut self, _services: &Services) -> bool {
        true
    }

    async fn execute(&self, ctx: &JobContext, operation: &mut Operation) -> Result<(), JobError>;

    async fn shutdown(&self) {}
}
