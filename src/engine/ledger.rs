use tokio::sync::RwLock;

use crate::model::*;

use super::EngineError;

/// Reserved-seat counters for every event, behind one ledger-wide lock.
///
/// Invariant: `0 <= reserved[e] <= capacity` for every event, at every
/// point another task can observe it.
pub struct ReservationLedger {
    capacity: Seats,
    reserved: RwLock<Vec<Seats>>,
}

impl ReservationLedger {
    pub fn new(event_count: usize, capacity: Seats) -> Self {
        Self {
            capacity,
            reserved: RwLock::new(vec![0; event_count]),
        }
    }

    pub fn capacity(&self) -> Seats {
        self.capacity
    }

    pub async fn event_count(&self) -> usize {
        self.reserved.read().await.len()
    }

    pub async fn available_seats(&self, event: EventIndex) -> Result<Seats, EngineError> {
        let reserved = self.reserved.read().await;
        let pos = checked_position(&reserved, event)?;
        Ok(self.capacity - reserved[pos])
    }

    pub async fn reserved(&self, event: EventIndex) -> Result<Seats, EngineError> {
        let reserved = self.reserved.read().await;
        let pos = checked_position(&reserved, event)?;
        Ok(reserved[pos])
    }

    /// All-or-nothing booking of `tickets` seats. The caller's history is updated
    /// under the same lock as the ledger.
    pub async fn book(
        &self,
        event: EventIndex,
        tickets: Seats,
        history: &mut BookingHistory,
    ) -> Result<Booking, EngineError> {
        let mut reserved = self.reserved.write().await;
        let pos = checked_position(&reserved, event)?;
        if tickets == 0 {
            return Err(EngineError::InvalidTicketCount(tickets));
        }

        let available = self.capacity - reserved[pos];
        if tickets > available {
            return Err(EngineError::InsufficientCapacity {
                event,
                requested: tickets,
                available,
            });
        }

        reserved[pos] += tickets;
        history.record_booking(pos, tickets);
        metrics::gauge!(crate::observability::SEATS_RESERVED, "event" => event.to_string())
            .set(f64::from(reserved[pos]));
        Ok(Booking {
            event,
            tickets,
            remaining: available - tickets,
        })
    }

    /// Cancels exactly one ticket, regardless of how many the caller booked.
    pub async fn cancel(
        &self,
        event: EventIndex,
        history: &mut BookingHistory,
    ) -> Result<Cancellation, EngineError> {
        let mut reserved = self.reserved.write().await;
        let pos = checked_position(&reserved, event)?;
        if reserved[pos] == 0 {
            return Err(EngineError::NothingToCancel(event));
        }

        reserved[pos] -= 1;
        history.record_cancellation(pos);
        metrics::gauge!(crate::observability::SEATS_RESERVED, "event" => event.to_string())
            .set(f64::from(reserved[pos]));
        Ok(Cancellation {
            event,
            remaining: self.capacity - reserved[pos],
        })
    }

    /// Consistent view of every event, taken under a single read lock.
    pub async fn snapshot(&self) -> Vec<EventReservation> {
        let reserved = self.reserved.read().await;
        reserved
            .iter()
            .enumerate()
            .map(|(pos, &r)| EventReservation {
                event: pos as EventIndex,
                reserved: r,
                available: self.capacity - r,
            })
            .collect()
    }
}

fn checked_position(reserved: &[Seats], event: EventIndex) -> Result<usize, EngineError> {
    position(event)
        .filter(|&pos| pos < reserved.len())
        .ok_or(EngineError::InvalidEvent(event))
}
