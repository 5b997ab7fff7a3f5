use crate::error::QtrackError;
use parking_lot::RwLock;
use std::sync::Arc;

/// What kind of worker occupies a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    /// Independent top-level client worker.
    Client,
    /// System worker (checkpointer, background writer, and friends).
    Auxiliary,
    /// Helper spawned to assist another worker's query. Its activity is
    /// attributed to its parent and never tracked separately.
    ParallelHelper,
}

#[derive(Debug, Clone, Copy)]
struct WorkerEntry {
    pid: u32,
    kind: WorkerKind,
}

/// Registry of live workers and their slot assignments.
///
/// Capacity is fixed at startup and equals the activity table's capacity.
/// Slot indices are injective among live workers: a slot is handed out to at
/// most one worker at a time and becomes reusable only once that worker's
/// handle is dropped.
#[derive(Debug)]
pub struct WorkerRegistry {
    slots: RwLock<Box<[Option<WorkerEntry>]>>,
    capacity: usize,
}

impl WorkerRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: RwLock::new(vec![None; capacity].into_boxed_slice()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Claim the first free slot for a new worker.
    pub fn claim(self: &Arc<Self>, pid: u32, kind: WorkerKind) -> Result<WorkerHandle, QtrackError> {
        let mut slots = self.slots.write();
        let Some(slot) = slots.iter().position(Option::is_none) else {
            return Err(QtrackError::WorkerTableFull {
                capacity: self.capacity,
            });
        };
        slots[slot] = Some(WorkerEntry { pid, kind });
        Ok(WorkerHandle {
            registry: Arc::clone(self),
            slot,
            pid,
            kind,
        })
    }

    /// Claim one specific slot, used when a restarted worker must land on
    /// its previous index.
    pub fn claim_slot(
        self: &Arc<Self>,
        slot: usize,
        pid: u32,
        kind: WorkerKind,
    ) -> Result<WorkerHandle, QtrackError> {
        let mut slots = self.slots.write();
        match slots.get(slot) {
            None => Err(QtrackError::WorkerTableFull {
                capacity: self.capacity,
            }),
            Some(Some(occupant)) => Err(QtrackError::SlotStillClaimed {
                slot,
                pid: occupant.pid,
            }),
            Some(None) => {
                slots[slot] = Some(WorkerEntry { pid, kind });
                Ok(WorkerHandle {
                    registry: Arc::clone(self),
                    slot,
                    pid,
                    kind,
                })
            }
        }
    }

    /// Enumerate occupied slots under the registry's read lock, returning
    /// (slot, pid) pairs. The lock is released before this returns, so a
    /// caller joining against the activity table never holds both locks.
    pub fn occupied(&self) -> Vec<(usize, u32)> {
        let slots = self.slots.read();
        slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.map(|e| (slot, e.pid)))
            .collect()
    }

    fn release(&self, slot: usize) {
        let mut slots = self.slots.write();
        if let Some(entry) = slots.get_mut(slot) {
            *entry = None;
        }
    }
}

/// RAII claim on one worker slot; dropping it frees the slot for reuse.
///
/// The activity table is deliberately not touched on release: the stale
/// query id left behind is overwritten by the slot's next owner.
#[derive(Debug)]
pub struct WorkerHandle {
    registry: Arc<WorkerRegistry>,
    slot: usize,
    pid: u32,
    kind: WorkerKind,
}

impl WorkerHandle {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub fn is_parallel_helper(&self) -> bool {
        self.kind == WorkerKind::ParallelHelper
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.registry.release(self.slot);
    }
}
