use crate::model::{EventIndex, Seats, WorkerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Event index outside `[0, event_count)`.
    InvalidEvent(EventIndex),
    InsufficientCapacity {
        event: EventIndex,
        requested: Seats,
        available: Seats,
    },
    NothingToCancel(EventIndex),
    InvalidTicketCount(Seats),
    /// Every registry slot is occupied.
    Busy,
    /// A book or cancel is already running on the event.
    Conflict { event: EventIndex, holder: WorkerId },
}

impl EngineError {
    /// Short stable label for logs and metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::InvalidEvent(_) => "invalid_event",
            EngineError::InsufficientCapacity { .. } => "insufficient_capacity",
            EngineError::NothingToCancel(_) => "nothing_to_cancel",
            EngineError::InvalidTicketCount(_) => "invalid_ticket_count",
            EngineError::Busy => "busy",
            EngineError::Conflict { .. } => "conflict",
        }
    }

    /// Registry contention. The query is dropped without being reported as a failure.
    pub fn is_contention(&self) -> bool {
        matches!(self, EngineError::Busy | EngineError::Conflict { .. })
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidEvent(event) => write!(f, "invalid event: {event}"),
            EngineError::InsufficientCapacity {
                event,
                requested,
                available,
            } => write!(
                f,
                "{requested} tickets requested but only {available} seats available for event {event}"
            ),
            EngineError::NothingToCancel(event) => write!(f, "no booked tickets for event {event}"),
            EngineError::InvalidTicketCount(count) => write!(f, "invalid ticket count: {count}"),
            EngineError::Busy => write!(f, "no empty slot in active query table"),
            EngineError::Conflict { event, holder } => {
                write!(f, "event {event} is being modified by worker {holder}")
            }
        }
    }
}

impl std::error::Error for EngineError {}
