use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use ulid::Ulid;

use crate::config::{ConfigError, RunLimit, SimConfig};
use crate::engine::Engine;
use crate::model::WorkerId;
use crate::query::{QuerySourceFactory, RandomSourceFactory};
use crate::report::{ReservationReport, StatusSink, TracingSink};
use crate::worker::{Worker, WorkerContext, WorkerStats};

#[derive(Debug)]
pub enum SupervisorError {
    InvalidConfig(ConfigError),
    /// A worker could not be created. Workers started before it were stopped and joined.
    WorkerStartFailure { worker: WorkerId, reason: String },
}

impl SupervisorError {
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::InvalidConfig(_) => "invalid_config",
            SupervisorError::WorkerStartFailure { .. } => "worker_start_failure",
        }
    }
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorError::InvalidConfig(e) => write!(f, "{e}"),
            SupervisorError::WorkerStartFailure { worker, reason } => {
                write!(f, "error creating worker {worker}: {reason}")
            }
        }
    }
}

impl std::error::Error for SupervisorError {}

impl From<ConfigError> for SupervisorError {
    fn from(e: ConfigError) -> Self {
        SupervisorError::InvalidConfig(e)
    }
}

/// Starts the worker pool, lets it run for the configured limit, stops it
/// cooperatively and collects the final ledger.
pub struct Supervisor {
    config: SimConfig,
    sink: Arc<dyn StatusSink>,
    factory: Arc<dyn QuerySourceFactory>,
}

impl Supervisor {
    pub fn new(config: SimConfig) -> Self {
        let factory = Arc::new(RandomSourceFactory::new(config.clone()));
        Self {
            config,
            sink: Arc::new(TracingSink),
            factory,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_source_factory(mut self, factory: Arc<dyn QuerySourceFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs on a fresh engine. Cancelling `shutdown` ends the run early.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<ReservationReport, SupervisorError> {
        self.config.validate()?;
        let engine = Arc::new(Engine::from_config(&self.config));
        self.run_on(engine, shutdown).await
    }

    /// Runs against a caller-provided engine, which stays inspectable while the pool works.
    pub async fn run_on(
        &self,
        engine: Arc<Engine>,
        shutdown: CancellationToken,
    ) -> Result<ReservationReport, SupervisorError> {
        self.config.validate()?;
        let run_id = Ulid::new();
        let started = Instant::now();
        info!(
            %run_id,
            workers = self.config.worker_count,
            events = self.config.event_count,
            admission_limit = self.config.admission_limit,
            wake_policy = ?self.config.wake_policy,
            "starting simulation"
        );

        // Child token: the run limit stops our workers without cancelling the caller's token.
        let stop = shutdown.child_token();
        let mut ctx = WorkerContext::new(engine.clone(), self.sink.clone(), stop.clone())
            .with_delays(self.config.think_delay, self.config.idle_delay);
        if let RunLimit::Operations(limit) = self.config.run_limit {
            ctx = ctx.with_operation_limit(limit);
        }

        let mut handles: Vec<JoinHandle<WorkerStats>> = Vec::with_capacity(self.config.worker_count);
        for n in 0..self.config.worker_count {
            let id = n as WorkerId + 1;
            let source = match self.factory.create(id) {
                Ok(source) => source,
                Err(reason) => {
                    error!(worker = id, %reason, "error creating worker, stopping started workers");
                    stop.cancel();
                    join_workers(handles).await;
                    return Err(SupervisorError::WorkerStartFailure { worker: id, reason });
                }
            };
            let worker = Worker::new(
                id,
                source,
                self.config.event_count,
                self.config.worker_seed(id),
                ctx.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
        }

        match self.config.run_limit {
            RunLimit::Duration(limit) => {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => {}
                    _ = stop.cancelled() => {}
                }
            }
            RunLimit::Operations(_) => stop.cancelled().await,
        }

        info!(%run_id, "shutdown signalled, waiting for workers");
        stop.cancel();
        let workers = join_workers(handles).await;
        info!(%run_id, joined = workers.len(), "waited for workers");

        Ok(ReservationReport {
            run_id,
            elapsed: started.elapsed(),
            capacity: engine.ledger.capacity(),
            events: engine.ledger.snapshot().await,
            workers,
        })
    }
}

async fn join_workers(handles: Vec<JoinHandle<WorkerStats>>) -> Vec<WorkerStats> {
    join_all(handles)
        .await
        .into_iter()
        .filter_map(|res| match res {
            Ok(stats) => Some(stats),
            Err(e) => {
                error!("worker task failed: {e}");
                None
            }
        })
        .collect()
}
