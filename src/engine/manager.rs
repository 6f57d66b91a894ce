//! Job manager: phase-ordered, failure-isolated job dispatch.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::job::{Job, JobContext};
use crate::operation::Operation;
use crate::services::Services;

/// Outcome of one phase dispatch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Sync jobs that returned `Ok`.
    pub succeeded: usize,
    /// Sync jobs that failed or panicked.
    pub failed: usize,
    /// Handles of async jobs; the engine does not wait for them.
    pub spawned: Vec<JoinHandle<()>>,
}

/// Holds the initialized jobs in registration order.
pub struct JobManager {
    jobs: Vec<Arc<dyn Job>>,
}

impl JobManager {
    /// Initialize `jobs`, keeping those that report ready.
    pub async fn initialize(jobs: Vec<Box<dyn Job>>, services: &Services) -> Self {
        let total = jobs.len();
        let mut ready: Vec<Arc<dyn Job>> = Vec::with_capacity(total);

        for mut job in jobs {
            let name = job.name().to_string();
            let outcome = AssertUnwindSafe(job.initialize(services)).catch_unwind().await;
            match outcome {
                Ok(true) => {
                    debug!(job = %name, phase = %job.phase(), "Job initialized");
                    ready.push(Arc::from(job));
                }
                Ok(false) => warn!(job = %name, "Job failed to initialize and will be skipped"),
                Err(_) => error!(job = %name, "Job panicked during initialization and will be skipped"),
            }
        }

        info!(ready = ready.len(), total, "Jobs initialized");
        Self { jobs: ready }
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name()).collect()
    }

    pub fn count(&self) -> usize {
        self.jobs.len()
    }

    /// Run every job of `ctx.phase` in registration order.
    ///
    /// Sync jobs run inline and may modify `operation`. Async jobs are
    /// spawned with their own copy of it. No failure stops the loop.
    pub async fn execute_jobs(&self, ctx: &JobContext, operation: &mut Operation) -> DispatchReport {
        let mut report = DispatchReport::default();

        for job in self.jobs.iter().filter(|j| j.phase() == ctx.phase) {
            if job.is_async() {
                let job = Arc::clone(job);
                let ctx = ctx.clone();
                let mut snapshot = operation.clone();
                report.spawned.push(tokio::spawn(async move {
                    run_guarded(job.as_ref(), &ctx, &mut snapshot).await;
                }));
            } else if run_guarded(job.as_ref(), ctx, operation).await {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }

        report
    }

    /// Give every job a chance to release its resources.
    pub async fn shutdown(&self) {
        for job in &self.jobs {
            if AssertUnwindSafe(job.shutdown()).catch_unwind().await.is_err() {
                error!(job = %job.name(), "Job panicked during shutdown");
            }
        }
    }
}

/// Execute one job, logging instead of propagating errors and panics.
async fn run_guarded(job: &dyn Job, ctx: &JobContext, operation: &mut Operation) -> bool {
    let operation_number = operation.operation_number.clone();
    debug!(job = %job.name(), phase = %ctx.phase, intake = %ctx.intake_id, "Running job");

    match AssertUnwindSafe(job.execute(ctx, operation)).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!(
                job = %job.name(),
                phase = %ctx.phase,
                operation_number = %operation_number,
                error = %e,
                "Job failed"
            );
            false
        }
        Err(_) => {
            error!(
                job = %job.name(),
                phase = %ctx.phase,
                operation_number = %operation_number,
                "Job panicked"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDateTime;

    use crate::clock::SystemClock;
    use crate::config::EngineConfig;
    use crate::engine::job::JobPhase;
    use crate::error::JobError;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        Panic,
    }

    struct MockJob {
        name: &'static str,
        phase: JobPhase,
        is_async: bool,
        ready: bool,
        behavior: Behavior,
        runs: Arc<AtomicUsize>,
    }

    impl MockJob {
        fn new(name: &'static str, behavior: Behavior, runs: &Arc<AtomicUsize>) -> Self {
            Self {
                name,
                phase: JobPhase::AfterOperationStored,
                is_async: false,
                ready: true,
                behavior,
                runs: Arc::clone(runs),
            }
        }
    }

    #[async_trait]
    impl Job for MockJob {
        fn name(&self) -> &str {
            self.name
        }

        fn phase(&self) -> JobPhase {
            self.phase
        }

        fn is_async(&self) -> bool {
            self.is_async
        }

        async fn initialize(&mut self, _services: &Services) -> bool {
            self.ready
        }

        async fn execute(&self, _ctx: &JobContext, operation: &mut Operation) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            operation.add_custom_data(self.name, true);
            match self.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Fail => Err(JobError::Failed {
                    name: self.name.to_string(),
                    reason: "boom".to_string(),
                }),
                Behavior::Panic => panic!("job bug"),
            }
        }
    }

    fn services() -> Services {
        Services::new(EngineConfig::default(), Arc::new(SystemClock))
    }

    fn ctx(phase: JobPhase) -> JobContext {
        JobContext::new("test", serde_json::Value::Null, phase)
    }

    #[tokio::test]
    async fn failing_job_does_not_stop_the_next_one() {
        let runs = Arc::new(AtomicUsize::new(0));
        let manager = JobManager::initialize(
            vec![
                Box::new(MockJob::new("first", Behavior::Fail, &runs)),
                Box::new(MockJob::new("second", Behavior::Succeed, &runs)),
            ],
            &services(),
        )
        .await;

        let mut op = Operation::new(NaiveDateTime::default());
        let report = manager.execute_jobs(&ctx(JobPhase::AfterOperationStored), &mut op).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!((report.succeeded, report.failed), (1, 1));
        assert!(op.custom_data.contains_key("second"));
    }

    #[tokio::test]
    async fn panicking_job_does_not_stop_the_next_one() {
        let runs = Arc::new(AtomicUsize::new(0));
        let manager = JobManager::initialize(
            vec![
                Box::new(MockJob::new("first", Behavior::Panic, &runs)),
                Box::new(MockJob::new("second", Behavior::Succeed, &runs)),
            ],
            &services(),
        )
        .await;

        let mut op = Operation::new(NaiveDateTime::default());
        let report = manager.execute_jobs(&ctx(JobPhase::AfterOperationStored), &mut op).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!((report.succeeded, report.failed), (1, 1));
    }

    #[tokio::test]
    async fn only_jobs_of_the_current_phase_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut pre = MockJob::new("pre", Behavior::Succeed, &runs);
        pre.phase = JobPhase::OnOperationSurfaced;
        let manager = JobManager::initialize(
            vec![Box::new(pre), Box::new(MockJob::new("post", Behavior::Succeed, &runs))],
            &services(),
        )
        .await;

        let mut op = Operation::new(NaiveDateTime::default());
        manager.execute_jobs(&ctx(JobPhase::OnOperationSurfaced), &mut op).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(op.custom_data.contains_key("pre"));
        assert!(!op.custom_data.contains_key("post"));
    }

    #[tokio::test]
    async fn uninitialized_jobs_are_skipped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut broken = MockJob::new("broken", Behavior::Succeed, &runs);
        broken.ready = false;
        let manager = JobManager::initialize(
            vec![Box::new(broken), Box::new(MockJob::new("ok", Behavior::Succeed, &runs))],
            &services(),
        )
        .await;

        assert_eq!(manager.job_names(), ["ok"]);
    }

    #[tokio::test]
    async fn async_jobs_work_on_a_snapshot() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut background = MockJob::new("background", Behavior::Fail, &runs);
        background.is_async = true;
        let manager = JobManager::initialize(
            vec![Box::new(background), Box::new(MockJob::new("inline", Behavior::Succeed, &runs))],
            &services(),
        )
        .await;

        let mut op = Operation::new(NaiveDateTime::default());
        let report = manager.execute_jobs(&ctx(JobPhase::AfterOperationStored), &mut op).await;
        assert_eq!(report.spawned.len(), 1);
        for handle in report.spawned {
            handle.await.unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(op.custom_data.contains_key("inline"));
        assert!(!op.custom_data.contains_key("background"));
    }
}
