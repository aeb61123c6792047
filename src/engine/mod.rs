mod admission;
mod error;
mod ledger;
mod registry;

pub use admission::{AdmissionGate, WakePolicy};
pub use error::EngineError;
pub use ledger::ReservationLedger;
pub use registry::{ActiveQueryRegistry, SlotGuard, SlotId};

use serde::Serialize;

use crate::config::SimConfig;
use crate::model::*;

/// Result of a query that reached the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Available { event: EventIndex, seats: Seats },
    Booked(Booking),
    Cancelled(Cancellation),
}

/// The three shared resources every worker goes through. Each one serializes its
/// own critical section; no code path holds two of their locks at once.
pub struct Engine {
    pub ledger: ReservationLedger,
    pub registry: ActiveQueryRegistry,
    pub gate: AdmissionGate,
}

impl Engine {
    pub fn new(
        event_count: usize,
        capacity: Seats,
        registry_slots: usize,
        admission_limit: usize,
        wake_policy: WakePolicy,
    ) -> Self {
        Self {
            ledger: ReservationLedger::new(event_count, capacity),
            registry: ActiveQueryRegistry::new(registry_slots),
            gate: AdmissionGate::new(admission_limit, wake_policy),
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(
            config.event_count,
            config.capacity,
            config.registry_slots,
            config.admission_limit,
            config.wake_policy,
        )
    }

    /// Runs a query against the ledger. The caller is expected to hold a registry
    /// slot for mutating queries.
    pub async fn dispatch(
        &self,
        query: Query,
        history: &mut BookingHistory,
    ) -> Result<Outcome, EngineError> {
        match query {
            Query::Availability { event } => {
                let seats = self.ledger.available_seats(event).await?;
                Ok(Outcome::Available { event, seats })
            }
            Query::Book { event, tickets } => {
                self.ledger.book(event, tickets, history).await.map(Outcome::Booked)
            }
            Query::Cancel { event } => {
                self.ledger.cancel(event, history).await.map(Outcome::Cancelled)
            }
        }
    }
}
