use std::fmt;

use serde::{Deserialize, Serialize};

/// Event index as carried by a query. Signed so that negative (invalid)
/// indices are representable and can be rejected by the ledger.
pub type EventIndex = i64;

/// Worker identifier, 1-based like the console output.
pub type WorkerId = u64;

/// Seat and ticket counts.
pub type Seats = u32;

/// Converts an event index into a vector position, `None` when negative.
pub(crate) fn position(event: EventIndex) -> Option<usize> {
    usize::try_from(event).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKind {
    /// Availability check.
    Read,
    Book,
    Cancel,
}

impl QueryKind {
    /// Book and Cancel change the reserved count and must never overlap on one event.
    pub fn is_mutating(self) -> bool {
        matches!(self, QueryKind::Book | QueryKind::Cancel)
    }

    pub fn label(self) -> &'static str {
        match self {
            QueryKind::Read => "read",
            QueryKind::Book => "book",
            QueryKind::Cancel => "cancel",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A query descriptor produced by a [`crate::query::QuerySource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Query {
    Availability { event: EventIndex },
    Book { event: EventIndex, tickets: Seats },
    Cancel { event: EventIndex },
}

impl Query {
    pub fn kind(&self) -> QueryKind {
        match self {
            Query::Availability { .. } => QueryKind::Read,
            Query::Book { .. } => QueryKind::Book,
            Query::Cancel { .. } => QueryKind::Cancel,
        }
    }

    pub fn event(&self) -> EventIndex {
        match self {
            Query::Availability { event } | Query::Book { event, .. } | Query::Cancel { event } => *event,
        }
    }

    /// A cancel the worker's own history cannot back becomes an availability check.
    pub fn legalize(self, history: &BookingHistory) -> Self {
        match self {
            Query::Cancel { event } if !history.can_cancel(event) => Query::Availability { event },
            other => other,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Availability { event } => write!(f, "query type = read, event = {event}"),
            Query::Book { event, tickets } => {
                write!(f, "query type = book, event = {event}, tickets = {tickets}")
            }
            Query::Cancel { event } => write!(f, "query type = cancel, event = {event}"),
        }
    }
}

/// Contents of an occupied registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveQuery {
    pub event: EventIndex,
    pub kind: QueryKind,
    pub owner: WorkerId,
}

/// Tickets one worker has booked and cancelled, per event.
///
/// Owned by a single worker and never shared. It is the worker's private memory,
/// which may disagree with the ledger: other workers cancel too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingHistory {
    booked: Vec<Seats>,
    cancelled: Vec<Seats>,
}

impl BookingHistory {
    pub fn new(event_count: usize) -> Self {
        Self {
            booked: vec![0; event_count],
            cancelled: vec![0; event_count],
        }
    }

    pub fn booked(&self, event: EventIndex) -> Seats {
        lookup(&self.booked, event)
    }

    pub fn cancelled(&self, event: EventIndex) -> Seats {
        lookup(&self.cancelled, event)
    }

    /// Tickets this worker booked and has not cancelled yet.
    pub fn outstanding(&self, event: EventIndex) -> Seats {
        self.booked(event).saturating_sub(self.cancelled(event))
    }

    pub fn can_cancel(&self, event: EventIndex) -> bool {
        self.outstanding(event) > 0
    }

    pub(crate) fn record_booking(&mut self, pos: usize, tickets: Seats) {
        *slot_mut(&mut self.booked, pos) += tickets;
    }

    pub(crate) fn record_cancellation(&mut self, pos: usize) {
        *slot_mut(&mut self.cancelled, pos) += 1;
    }
}

fn lookup(counts: &[Seats], event: EventIndex) -> Seats {
    position(event)
        .and_then(|pos| counts.get(pos).copied())
        .unwrap_or(0)
}

fn slot_mut(counts: &mut Vec<Seats>, pos: usize) -> &mut Seats {
    if pos >= counts.len() {
        counts.resize(pos + 1, 0);
    }
    &mut counts[pos]
}

// ── Ledger result types ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub event: EventIndex,
    pub tickets: Seats,
    /// Seats left on the event after this booking.
    pub remaining: Seats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cancellation {
    pub event: EventIndex,
    pub remaining: Seats,
}

/// One row of the final reservation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventReservation {
    pub event: EventIndex,
    pub reserved: Seats,
    pub available: Seats,
}
