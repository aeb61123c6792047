use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::DelayRange;
use crate::engine::{Engine, Outcome};
use crate::model::*;
use crate::query::{QuerySource, seeded_rng};
use crate::report::{Status, StatusSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    AwaitingAdmission,
    Registering,
    Executing,
    Reporting,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub worker: WorkerId,
    pub iterations: u64,
    pub reads: u64,
    pub tickets_booked: u64,
    pub tickets_cancelled: u64,
    /// Queries the ledger refused (invalid event, no capacity, nothing to cancel).
    pub rejected: u64,
    /// Queries abandoned on registry contention.
    pub dropped: u64,
}

/// Everything a worker shares with the rest of the pool.
#[derive(Clone)]
pub struct WorkerContext {
    pub engine: Arc<Engine>,
    pub sink: Arc<dyn StatusSink>,
    pub shutdown: CancellationToken,
    pub think_delay: DelayRange,
    pub idle_delay: DelayRange,
    /// Iterations completed by the whole pool.
    pub completed: Arc<AtomicU64>,
    /// Cancel `shutdown` once `completed` reaches this value.
    pub operation_limit: Option<u64>,
}

impl WorkerContext {
    pub fn new(engine: Arc<Engine>, sink: Arc<dyn StatusSink>, shutdown: CancellationToken) -> Self {
        Self {
            engine,
            sink,
            shutdown,
            think_delay: DelayRange::none(),
            idle_delay: DelayRange::none(),
            completed: Arc::new(AtomicU64::new(0)),
            operation_limit: None,
        }
    }

    pub fn with_delays(mut self, think: DelayRange, idle: DelayRange) -> Self {
        self.think_delay = think;
        self.idle_delay = idle;
        self
    }

    pub fn with_operation_limit(mut self, limit: u64) -> Self {
        self.operation_limit = Some(limit);
        self
    }
}

/// One long-lived member of the pool.
///
/// Each iteration: admission, draw a query, think, claim a registry slot, run
/// the query against the ledger, release the slot, leave the gate, idle.
/// Shutdown is only observed at the top of an iteration.
pub struct Worker {
    id: WorkerId,
    ctx: WorkerContext,
    source: Box<dyn QuerySource>,
    history: BookingHistory,
    rng: StdRng,
    state: WorkerState,
    stats: WorkerStats,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        source: Box<dyn QuerySource>,
        event_count: usize,
        seed: Option<u64>,
        ctx: WorkerContext,
    ) -> Self {
        Self {
            id,
            ctx,
            source,
            history: BookingHistory::new(event_count),
            rng: seeded_rng(seed),
            state: WorkerState::Idle,
            stats: WorkerStats {
                worker: id,
                ..WorkerStats::default()
            },
        }
    }

    pub async fn run(mut self) -> WorkerStats {
        self.ctx.sink.record(&Status::WorkerStarted { worker: self.id });

        while !self.ctx.shutdown.is_cancelled() {
            self.transition(WorkerState::AwaitingAdmission);
            self.ctx.engine.gate.enter().await;
            self.ctx.sink.record(&Status::Admitted { worker: self.id });

            let query = self.source.next_query().legalize(&self.history);
            tokio::time::sleep(self.ctx.think_delay.sample(&mut self.rng)).await;

            self.transition(WorkerState::Registering);
            self.execute(query).await;

            self.ctx.sink.record(&Status::Released { worker: self.id });
            self.ctx.engine.gate.leave().await;
            self.stats.iterations += 1;
            self.transition(WorkerState::Idle);
            self.count_iteration();

            tokio::time::sleep(self.ctx.idle_delay.sample(&mut self.rng)).await;
        }

        self.transition(WorkerState::Stopped);
        self.ctx.sink.record(&Status::WorkerStopped {
            worker: self.id,
            stats: self.stats.clone(),
        });
        self.stats
    }

    async fn execute(&mut self, query: Query) {
        let engine = Arc::clone(&self.ctx.engine);
        let guard = match engine.registry.claim(query.event(), query.kind(), self.id) {
            Ok(guard) => guard,
            Err(error) => {
                self.stats.dropped += 1;
                record_query_metric(query.kind(), error.as_label());
                self.ctx.sink.record(&Status::Dropped {
                    worker: self.id,
                    query,
                    error,
                });
                return;
            }
        };
        self.ctx.sink.record(&Status::SlotClaimed {
            worker: self.id,
            slot: guard.slot(),
            query,
        });

        self.transition(WorkerState::Executing);
        let result = engine.dispatch(query, &mut self.history).await;

        self.transition(WorkerState::Reporting);
        match result {
            Ok(outcome) => {
                match outcome {
                    Outcome::Available { .. } => self.stats.reads += 1,
                    Outcome::Booked(b) => self.stats.tickets_booked += u64::from(b.tickets),
                    Outcome::Cancelled(_) => self.stats.tickets_cancelled += 1,
                }
                record_query_metric(query.kind(), "ok");
                self.ctx.sink.record(&Status::Completed {
                    worker: self.id,
                    outcome,
                });
            }
            Err(error) => {
                self.stats.rejected += 1;
                record_query_metric(query.kind(), error.as_label());
                self.ctx.sink.record(&Status::Rejected {
                    worker: self.id,
                    query,
                    error,
                });
            }
        }

        self.ctx.sink.record(&Status::SlotReleasing {
            worker: self.id,
            slot: guard.slot(),
            query,
        });
        drop(guard);
    }

    fn count_iteration(&self) {
        let total = self.ctx.completed.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(limit) = self.ctx.operation_limit
            && total >= limit
        {
            self.ctx.shutdown.cancel();
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(worker = self.id, from = ?self.state, to = ?next, "worker state");
        self.state = next;
    }
}

fn record_query_metric(kind: QueryKind, status: &'static str) {
    metrics::counter!(
        crate::observability::QUERIES_TOTAL,
        "kind" => kind.label(),
        "status" => status
    )
    .increment(1);
}
