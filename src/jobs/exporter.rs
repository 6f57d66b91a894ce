//! Writes every stored operation as an XML file for reporting tools.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::clock::Clock;
use crate::engine::job::{Job, JobContext, JobPhase};
use crate::error::JobError;
use crate::operation::Operation;
use crate::operation::export::to_xml;
use crate::services::Services;

pub struct OperationFileExporterJob {
    export_dir: PathBuf,
    clock: Option<Arc<dyn Clock>>,
}

impl OperationFileExporterJob {
    pub fn new() -> Self {
        Self {
            export_dir: PathBuf::new(),
            clock: None,
        }
    }
}

impl Default for OperationFileExporterJob {
    fn default() -> Self {
        Self::new()
    }
}

/// `operation_<id>.xml`, or the sanitized operation number for unstored operations.
fn file_name(operation: &Operation) -> String {
    match operation.id {
        Some(id) => format!("operation_{id}.xml"),
        None => {
            let number: String = operation
                .operation_number
                .chars()
                .map(|c| if c.is_alphanumeric() { c } else { '_' })
                .collect();
            format!("operation_{number}.xml")
        }
    }
}

#[async_trait]
impl Job for OperationFileExporterJob {
    fn name(&self) -> &str {
        "OperationFileExporter"
    }

    fn phase(&self) -> JobPhase {
        JobPhase::AfterOperationStored
    }

    async fn initialize(&mut self, services: &Services) -> bool {
        let dir = services.config.export_dir.clone();
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            error!(dir = %dir.display(), error = %e, "Cannot create export directory");
            return false;
        }
        self.export_dir = dir;
        self.clock = Some(Arc::clone(&services.clock));
        true
    }

    async fn execute(&self, _ctx: &JobContext, operation: &mut Operation) -> Result<(), JobError> {
        let clock = self.clock.as_ref().ok_or_else(|| JobError::MissingCollaborator {
            name: self.name().to_string(),
            what: "clock".to_string(),
        })?;

        let xml = to_xml(operation, clock.now())?;
        let path = self.export_dir.join(file_name(operation));
        tokio::fs::write(&path, xml).await?;
        info!(path = %path.display(), "Exported operation");
        Ok(())
    }
}
