use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use alarm_workflow::config::EngineConfig;
use alarm_workflow::engine::{AlarmWorkflowEngine, InMemoryOperationStore, PluginRegistry};
use alarm_workflow::services::Services;
use alarm_workflow::sources::{AlarmSource, spawn_source};

const ALARM_CHANNEL_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EngineConfig::from_env().context("invalid configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(&config);

    eprintln!("🚒 Alarm Workflow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Sources: {}", config.sources.join(", "));
    eprintln!("   Jobs:    {}", config.jobs.join(", "));
    eprintln!("   Filters: {}", config.filters.join(", "));

    let registry = PluginRegistry::with_builtins();
    let services = Arc::new(Services::load(config, &registry).context("could not load services")?);

    let jobs = registry
        .create_jobs(&services.config.jobs)
        .context("could not create jobs")?;
    let candidates = registry
        .create_sources(&services.config.sources)
        .context("could not create alarm sources")?;

    let mut sources: Vec<Arc<dyn AlarmSource>> = Vec::new();
    for mut source in candidates {
        match source.initialize(&services).await {
            Ok(()) => sources.push(Arc::from(source)),
            Err(e) => error!(source = source.name(), error = %e, "Alarm source failed to start, skipping"),
        }
    }
    if sources.is_empty() {
        anyhow::bail!("no alarm source could be started");
    }

    let store = Arc::new(InMemoryOperationStore::new());
    let engine = Arc::new(AlarmWorkflowEngine::start(Arc::clone(&services), jobs, store).await);

    let (tx, rx) = mpsc::channel(ALARM_CHANNEL_CAPACITY);
    let handles: Vec<_> = sources
        .iter()
        .map(|source| spawn_source(Arc::clone(source), tx.clone()))
        .collect();
    drop(tx);

    let runner = tokio::spawn(Arc::clone(&engine).run(rx));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
        _ = futures::future::join_all(handles) => info!("All alarm sources finished"),
    }

    for source in &sources {
        source.shutdown().await;
    }
    // Sources blocked on input (stdin) never release their sender.
    match tokio::time::timeout(services.config.shutdown_timeout, runner).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Engine task failed"),
        Err(_) => warn!("Timed out waiting for in-flight alarms"),
    }
    engine.shutdown().await;
    info!("Alarm workflow stopped");
    Ok(())
}

/// Console logging, plus a daily rolling file when a log directory is set.
fn init_tracing(config: &EngineConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer().with_target(false);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "alarm-workflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).init();
            None
        }
    }
}
