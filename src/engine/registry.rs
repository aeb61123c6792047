use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::model::*;

use super::EngineError;

/// Handle to a claimed registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

impl SlotId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Fixed-capacity table of in-flight queries.
///
/// Claiming scans the whole table under one lock, O(capacity) per claim. A slot
/// holding a book or cancel blocks every other claim on the same event, read
/// requests included; slots holding reads never block anyone.
pub struct ActiveQueryRegistry {
    slots: Mutex<Vec<Option<ActiveQuery>>>,
}

impl ActiveQueryRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(vec![None; capacity]),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().len()
    }

    pub fn try_acquire(
        &self,
        event: EventIndex,
        kind: QueryKind,
        owner: WorkerId,
    ) -> Result<SlotId, EngineError> {
        let mut slots = self.lock();

        let Some(free) = slots.iter().position(Option::is_none) else {
            warn!(worker = owner, event, "no empty slot in active query table");
            metrics::counter!(crate::observability::REGISTRY_REJECTIONS_TOTAL, "reason" => "busy")
                .increment(1);
            return Err(EngineError::Busy);
        };

        if let Some(holder) = slots
            .iter()
            .flatten()
            .find(|q| q.event == event && q.kind.is_mutating())
        {
            metrics::counter!(crate::observability::REGISTRY_REJECTIONS_TOTAL, "reason" => "conflict")
                .increment(1);
            return Err(EngineError::Conflict {
                event,
                holder: holder.owner,
            });
        }

        slots[free] = Some(ActiveQuery { event, kind, owner });
        Ok(SlotId(free))
    }

    /// Frees a slot. Must be called exactly once per successful claim.
    pub fn release(&self, slot: SlotId) {
        let mut slots = self.lock();
        if slots[slot.0].take().is_none() {
            warn!(slot = slot.0, "released a slot that was already empty");
        }
    }

    /// Claims a slot that is released when the returned guard is dropped.
    pub fn claim(
        &self,
        event: EventIndex,
        kind: QueryKind,
        owner: WorkerId,
    ) -> Result<SlotGuard<'_>, EngineError> {
        let slot = self.try_acquire(event, kind, owner)?;
        Ok(SlotGuard {
            registry: self,
            slot,
        })
    }

    /// Occupied slots at this instant.
    pub fn active(&self) -> Vec<(SlotId, ActiveQuery)> {
        self.lock()
            .iter()
            .enumerate()
            .filter_map(|(i, q)| q.map(|q| (SlotId(i), q)))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Option<ActiveQuery>>> {
        // Slot state is plain data, a panicking holder cannot leave it half-written.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A claimed slot. Releases itself on drop, so every exit path of the guarded
/// operation frees the slot exactly once.
pub struct SlotGuard<'a> {
    registry: &'a ActiveQueryRegistry,
    slot: SlotId,
}

impl SlotGuard<'_> {
    pub fn slot(&self) -> SlotId {
        self.slot
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.registry.release(self.slot);
    }
}
