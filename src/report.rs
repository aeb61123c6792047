use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::engine::{EngineError, Outcome, SlotId};
use crate::model::*;
use crate::worker::WorkerStats;

/// Something a worker did that is worth a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    WorkerStarted { worker: WorkerId },
    Admitted { worker: WorkerId },
    SlotClaimed { worker: WorkerId, slot: SlotId, query: Query },
    /// Reported while the slot is still held.
    SlotReleasing { worker: WorkerId, slot: SlotId, query: Query },
    Completed { worker: WorkerId, outcome: Outcome },
    Rejected { worker: WorkerId, query: Query, error: EngineError },
    /// Registry contention, the query was abandoned.
    Dropped { worker: WorkerId, query: Query, error: EngineError },
    Released { worker: WorkerId },
    WorkerStopped { worker: WorkerId, stats: WorkerStats },
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::WorkerStarted { worker } => write!(f, "worker {worker} starts"),
            Status::Admitted { worker } => write!(f, "worker {worker} acquired access"),
            Status::SlotClaimed { worker, slot, query } => {
                write!(f, "worker {worker}: {query} (slot {})", slot.index())
            }
            Status::SlotReleasing { worker, slot, .. } => {
                write!(f, "worker {worker}: releasing slot {}", slot.index())
            }
            Status::Completed { worker, outcome } => match outcome {
                Outcome::Available { event, seats } => {
                    write!(f, "worker {worker}: {seats} seats available for event {event}")
                }
                Outcome::Booked(b) => write!(
                    f,
                    "worker {worker}: SUCCESS {} tickets booked for event {} ({} left)",
                    b.tickets, b.event, b.remaining
                ),
                Outcome::Cancelled(c) => write!(
                    f,
                    "worker {worker}: ticket cancelled for event {} ({} left)",
                    c.event, c.remaining
                ),
            },
            Status::Rejected { worker, query, error } => {
                write!(f, "worker {worker}: FAILURE {query}: {error}")
            }
            Status::Dropped { worker, query, error } => {
                write!(f, "worker {worker}: dropped {query}: {error}")
            }
            Status::Released { worker } => write!(f, "worker {worker} released access"),
            Status::WorkerStopped { worker, .. } => write!(f, "worker {worker} ends"),
        }
    }
}

/// Receives status lines from every worker.
pub trait StatusSink: Send + Sync {
    fn record(&self, status: &Status);
}

/// Writes status lines through `tracing`.
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn record(&self, status: &Status) {
        match status {
            Status::Rejected { worker, error, .. } => {
                info!(worker, reason = error.as_label(), "{status}")
            }
            Status::Dropped { worker, error, .. } => {
                debug!(worker, reason = error.as_label(), "{status}")
            }
            Status::Admitted { worker }
            | Status::Released { worker }
            | Status::SlotClaimed { worker, .. }
            | Status::SlotReleasing { worker, .. } => debug!(worker, "{status}"),
            Status::WorkerStopped { worker, stats } => {
                info!(worker, iterations = stats.iterations, "{status}")
            }
            Status::Completed { worker, .. } | Status::WorkerStarted { worker } => {
                info!(worker, "{status}")
            }
        }
    }
}

/// Keeps every status in memory. Used by tests and the stress bench.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<Status>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Status> {
        match self.lines.lock() {
            Ok(mut lines) => std::mem::take(&mut *lines),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl StatusSink for MemorySink {
    fn record(&self, status: &Status) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(status.clone()),
            Err(_) => warn!("memory sink poisoned, dropping status"),
        }
    }
}

/// Final state of a run.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationReport {
    pub run_id: Ulid,
    pub elapsed: Duration,
    pub capacity: Seats,
    pub events: Vec<EventReservation>,
    pub workers: Vec<WorkerStats>,
}

impl ReservationReport {
    pub fn total_reserved(&self) -> u64 {
        self.events.iter().map(|e| u64::from(e.reserved)).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ReservationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*************** RESERVATION STATUS *****************")?;
        writeln!(f, "run {} ({:.1}s)", self.run_id, self.elapsed.as_secs_f64())?;
        writeln!(f)?;
        writeln!(f, "{:<10}{:>12}{:>12}", "Event no.", "Reserved", "Available")?;
        for row in &self.events {
            writeln!(f, "{:<10}{:>12}{:>12}", row.event, row.reserved, row.available)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:<10}{:>12}{:>10}{:>10}{:>10}{:>10}",
            "Worker", "Iterations", "Booked", "Cancelled", "Rejected", "Dropped"
        )?;
        for w in &self.workers {
            writeln!(
                f,
                "{:<10}{:>12}{:>10}{:>10}{:>10}{:>10}",
                w.worker, w.iterations, w.tickets_booked, w.tickets_cancelled, w.rejected, w.dropped
            )?;
        }
        Ok(())
    }
}
