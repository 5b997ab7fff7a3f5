use crate::config::TrackSetting;
use crate::registry::{ActivityTable, QUERY_ID_NONE};
use crate::workers::WorkerRegistry;
use std::vec;
use tracing::debug;

/// One row of the operator-facing activity view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ActivityRow {
    pub pid: u32,
    /// The worker's current top-level query id; `None` when nothing is
    /// tracked for the slot, including workers running an untracked utility
    /// command or sitting between statements.
    pub query_id: Option<u64>,
}

/// Point-in-time join of the worker registry and the activity table.
///
/// Lazy and non-restartable: one forward pass over the slots that were
/// occupied when the snapshot was captured.
#[derive(Debug)]
pub struct ActivitySnapshot {
    workers: vec::IntoIter<(usize, u32)>,
    values: Vec<u64>,
}

impl ActivitySnapshot {
    /// Capture a snapshot. With the gate off this is empty and free.
    ///
    /// Lock order is fixed: the registry's read lock is taken and fully
    /// released while collecting occupied slots, then the table is copied
    /// in one `read_all`. The write path never touches the registry lock,
    /// so no ordering inversion is possible.
    pub fn capture(
        setting: &TrackSetting,
        registry: &WorkerRegistry,
        table: &ActivityTable,
    ) -> Self {
        if !setting.is_enabled() {
            return Self {
                workers: Vec::new().into_iter(),
                values: Vec::new(),
            };
        }
        let occupied = registry.occupied();
        let values = table.read_all();
        debug!(workers = occupied.len(), "captured activity snapshot");
        Self {
            workers: occupied.into_iter(),
            values,
        }
    }

    /// Number of rows not yet yielded.
    pub fn remaining(&self) -> usize {
        self.workers.len()
    }
}

impl Iterator for ActivitySnapshot {
    type Item = ActivityRow;

    fn next(&mut self) -> Option<Self::Item> {
        let (slot, pid) = self.workers.next()?;
        let raw = self.values.get(slot).copied().unwrap_or(QUERY_ID_NONE);
        Some(ActivityRow {
            pid,
            query_id: (raw != QUERY_ID_NONE).then_some(raw),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.workers.size_hint()
    }
}

impl ExactSizeIterator for ActivitySnapshot {}
