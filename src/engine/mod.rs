//! Alarm workflow engine.
//!
//! Per operation:
//! 1. Surfaced: duplicate check, pre-store jobs (enrichment)
//! 2. Stored: persisted, post-store jobs (notification)
//! 3. Acknowledged: confirmed later through [`AlarmWorkflowEngine::acknowledge`]
//!
//! Alarm sources feed the engine through an mpsc channel; every alarm is
//! handled on its own task, so intake is safe under concurrent sources.

pub mod job;
pub mod manager;
pub mod registry;
pub mod state;
pub mod store;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use job::{Job, JobContext, JobPhase};
pub use manager::{DispatchReport, JobManager};
pub use registry::PluginRegistry;
pub use state::OperationState;
pub use store::{InMemoryOperationStore, OperationStore};

use crate::error::StoreError;
use crate::operation::Operation;
use crate::services::Services;
use crate::sources::NewAlarm;

/// Result of handling one alarm.
#[derive(Debug)]
pub enum IntakeOutcome {
    /// An operation with the same number was already stored or is in flight.
    Duplicate,
    /// The store rejected the operation; post-store jobs did not run.
    StoreFailed,
    /// Stored under `id`; `operation` is the state after the post-store phase.
    Stored { id: i64, operation: Operation },
}

/// Dispatches incoming operations through the job phases.
pub struct AlarmWorkflowEngine {
    services: Arc<Services>,
    jobs: JobManager,
    store: Arc<dyn OperationStore>,
    /// Operation numbers between duplicate check and store.
    in_flight: Mutex<HashSet<String>>,
    /// Async jobs still running, awaited on shutdown.
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl AlarmWorkflowEngine {
    /// Initialize `jobs` and build the engine.
    pub async fn start(services: Arc<Services>, jobs: Vec<Box<dyn Job>>, store: Arc<dyn OperationStore>) -> Self {
        let jobs = JobManager::initialize(jobs, &services).await;
        info!(jobs = ?jobs.job_names(), "Alarm workflow engine started");
        Self {
            services,
            jobs,
            store,
            in_flight: Mutex::new(HashSet::new()),
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    /// Run one alarm through both phases. Never fails; problems are logged.
    pub async fn handle_alarm(&self, alarm: NewAlarm) -> IntakeOutcome {
        let NewAlarm {
            source,
            mut operation,
            parameters,
        } = alarm;
        let ctx = JobContext::new(source, parameters, JobPhase::OnOperationSurfaced);

        info!(
            intake = %ctx.intake_id,
            source = %ctx.alarm_source_name,
            operation = %operation,
            "Operation surfaced"
        );

        let claimed = if self.services.config.ignore_duplicate_operation_numbers
            && !operation.operation_number.is_empty()
        {
            if !self.claim(&operation.operation_number).await {
                info!(
                    intake = %ctx.intake_id,
                    operation_number = %operation.operation_number,
                    "Ignoring operation with already known number"
                );
                return IntakeOutcome::Duplicate;
            }
            Some(operation.operation_number.clone())
        } else {
            None
        };

        self.jobs.execute_jobs(&ctx, &mut operation).await;

        let stored = self.store.store(&operation).await;
        if let Some(number) = &claimed {
            self.in_flight.lock().await.remove(number);
        }
        let id = match stored {
            Ok(id) => id,
            Err(e) => {
                error!(
                    intake = %ctx.intake_id,
                    operation_number = %operation.operation_number,
                    error = %e,
                    "Could not store operation, skipping notification jobs"
                );
                return IntakeOutcome::StoreFailed;
            }
        };
        let surfaced = OperationState::of(&operation);
        operation.id = Some(id);
        log_transition(ctx.intake_id, surfaced, OperationState::of(&operation));

        let ctx = ctx.with_phase(JobPhase::AfterOperationStored);
        let report = self.jobs.execute_jobs(&ctx, &mut operation).await;
        info!(
            intake = %ctx.intake_id,
            id,
            succeeded = report.succeeded,
            failed = report.failed,
            background = report.spawned.len(),
            "Operation dispatched"
        );
        self.track_background(report.spawned).await;

        IntakeOutcome::Stored { id, operation }
    }

    /// Mark a stored operation as acknowledged.
    pub async fn acknowledge(&self, id: i64) -> Result<(), StoreError> {
        let Some(operation) = self.store.get(id).await? else {
            return Err(StoreError::NotFound { id });
        };
        let state = OperationState::of(&operation);
        if state.is_terminal() {
            debug!(id, "Operation already acknowledged");
            return Ok(());
        }
        self.store.acknowledge(id).await?;
        log_transition(Uuid::nil(), state, OperationState::Acknowledged);
        info!(id, "Operation acknowledged");
        Ok(())
    }

    /// Lifecycle state of a stored operation.
    pub async fn state(&self, id: i64) -> Result<OperationState, StoreError> {
        match self.store.get(id).await? {
            Some(operation) => Ok(OperationState::of(&operation)),
            None => Err(StoreError::NotFound { id }),
        }
    }

    /// Consume alarms until every sender is dropped, handling each on its
    /// own task. Returns once all in-flight intakes have finished.
    pub async fn run(self: Arc<Self>, mut alarms: mpsc::Receiver<NewAlarm>) {
        let mut intakes = JoinSet::new();

        while let Some(alarm) = alarms.recv().await {
            let engine = Arc::clone(&self);
            intakes.spawn(async move {
                engine.handle_alarm(alarm).await;
            });
            // Reap finished intakes so the set does not grow unbounded.
            while let Some(done) = intakes.try_join_next() {
                if let Err(e) = done {
                    error!(error = %e, "Intake task panicked");
                }
            }
        }

        while let Some(done) = intakes.join_next().await {
            if let Err(e) = done {
                error!(error = %e, "Intake task panicked");
            }
        }
        info!("Alarm channel closed, engine stopped");
    }

    /// Wait for running async jobs (bounded by the configured timeout),
    /// then shut the jobs down.
    pub async fn shutdown(&self) {
        let pending = std::mem::take(&mut *self.background.lock().await);
        if !pending.is_empty() {
            let timeout = self.services.config.shutdown_timeout;
            info!(pending = pending.len(), "Waiting for background jobs");
            match tokio::time::timeout(timeout, futures::future::join_all(pending)).await {
                Ok(results) => {
                    for result in results {
                        if let Err(e) = result {
                            error!(error = %e, "Background job task failed");
                        }
                    }
                }
                Err(_) => warn!(?timeout, "Background jobs still running at shutdown"),
            }
        }
        self.jobs.shutdown().await;
    }

    async fn track_background(&self, handles: Vec<JoinHandle<()>>) {
        if handles.is_empty() {
            return;
        }
        let mut background = self.background.lock().await;
        background.retain(|handle| !handle.is_finished());
        background.extend(handles);
    }

    /// Reserve `number` unless it is already stored or being processed.
    async fn claim(&self, number: &str) -> bool {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.contains(number) {
            return false;
        }
        match self.store.exists(number).await {
            Ok(true) => return false,
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Duplicate check failed, accepting operation"),
        }
        in_flight.insert(number.to_string());
        true
    }
}

fn log_transition(intake: Uuid, from: OperationState, to: OperationState) {
    if from.can_transition_to(to) {
        debug!(%intake, %from, %to, "Operation state changed");
    } else {
        warn!(%intake, %from, %to, "Unexpected operation state change");
    }
}
