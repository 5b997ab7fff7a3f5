use crate::config::QtrackConfig;
use crate::error::QtrackError;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Sentinel stored in a slot when no top-level query id is recorded.
pub const QUERY_ID_NONE: u64 = 0;

/// Shared activity table: one query-id cell per possible worker slot.
///
/// The lock discipline is deliberately inverted relative to a read-mostly
/// RwLock. Writers are frequent (every top-level statement boundary on every
/// worker) and touch disjoint cells, so they take the lock SHARED and may
/// proceed concurrently. The snapshot scan is rare and takes the lock
/// EXCLUSIVE, draining all writers for the duration of one full copy so no
/// cell is observed mid-update.
#[derive(Debug)]
pub struct ActivityTable {
    scan_lock: RwLock<()>,
    slots: Box<[AtomicU64]>,
}

impl ActivityTable {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| AtomicU64::new(QUERY_ID_NONE)).collect();
        Self {
            scan_lock: RwLock::new(()),
            slots,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Record `query_id` as the current top-level statement for `slot`.
    ///
    /// The unlocked equality pre-check keeps repeated writes of the same id
    /// off the lock entirely. It can race with a concurrent snapshot, but
    /// the worst outcome is one redundant locked store of the same value.
    /// Only the slot's owning worker ever calls this for a given slot, so
    /// same-slot write races do not occur in practice.
    pub fn record(&self, slot: usize, query_id: u64) {
        let Some(cell) = self.slots.get(slot) else {
            // Caller holds no valid registry slot; skipping is not an error.
            return;
        };
        if cell.load(Ordering::Relaxed) == query_id {
            return;
        }
        let _shared = self.scan_lock.read();
        cell.store(query_id, Ordering::Relaxed);
    }

    /// Copy every slot under the exclusive lock.
    ///
    /// Each returned value is the latest store completed for that slot
    /// before the lock was granted; the lock hand-off provides the ordering
    /// edges, so the cell loads themselves can stay relaxed.
    pub fn read_all(&self) -> Vec<u64> {
        let _exclusive = self.scan_lock.write();
        self.slots
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect()
    }
}

/// Owner of the table's backing allocation, created once at engine startup.
///
/// Mirrors a named shared-memory segment: the first start allocates and
/// zeroes it, a restart reattaches to the existing allocation after
/// verifying that the deterministically recomputed capacity still matches.
#[derive(Debug)]
pub struct ActivityRegion {
    table: Arc<ActivityTable>,
}

impl ActivityRegion {
    pub fn create(config: &QtrackConfig) -> Result<Self, QtrackError> {
        config.validate()?;
        let capacity = config.worker_slot_capacity();
        let table = Arc::new(ActivityTable::new(capacity));
        info!(capacity, "activity table initialized");
        Ok(Self { table })
    }

    /// Reattach after an engine restart. The existing slot contents are
    /// reused as-is; stale ids are overwritten by the next owner of each
    /// slot.
    pub fn reattach(&self, config: &QtrackConfig) -> Result<Arc<ActivityTable>, QtrackError> {
        config.validate()?;
        let computed = config.worker_slot_capacity();
        let existing = self.table.capacity();
        if computed != existing {
            return Err(QtrackError::CapacityMismatch { existing, computed });
        }
        debug!(capacity = existing, "reattached to existing activity table");
        Ok(Arc::clone(&self.table))
    }

    pub fn table(&self) -> Arc<ActivityTable> {
        Arc::clone(&self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::{ActivityRegion, ActivityTable, QUERY_ID_NONE};
    use crate::config::QtrackConfig;
    use crate::error::QtrackError;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn slots_start_at_the_sentinel() {
        let table = ActivityTable::new(8);
        assert_eq!(table.capacity(), 8);
        assert!(table.read_all().iter().all(|&v| v == QUERY_ID_NONE));
    }

    #[test]
    fn record_and_read_back_per_slot() {
        let table = ActivityTable::new(4);
        table.record(0, 11);
        table.record(2, 22);
        table.record(2, 33);
        assert_eq!(table.read_all(), vec![11, QUERY_ID_NONE, 33, QUERY_ID_NONE]);
    }

    #[test]
    fn out_of_range_slot_is_a_silent_no_op() {
        let table = ActivityTable::new(2);
        table.record(7, 99);
        assert_eq!(table.read_all(), vec![QUERY_ID_NONE, QUERY_ID_NONE]);
    }

    #[test]
    fn concurrent_writers_on_distinct_slots_lose_nothing() {
        let table = Arc::new(ActivityTable::new(16));
        let mut handles = vec![];
        for slot in 0..16usize {
            let table = Arc::clone(&table);
            handles.push(thread::spawn(move || {
                for round in 1..=1000u64 {
                    table.record(slot, (slot as u64) << 32 | round);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("writer panicked");
        }
        let values = table.read_all();
        for (slot, value) in values.iter().enumerate() {
            assert_eq!(*value, (slot as u64) << 32 | 1000);
        }
    }

    #[test]
    fn snapshot_scan_never_tears_a_slot() {
        // Writers flip a slot between two recognizable values while a reader
        // scans; every observed value must be one of the two.
        let table = Arc::new(ActivityTable::new(4));
        let writer = {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for round in 0..50_000u64 {
                    let value = if round % 2 == 0 { u64::MAX } else { 1 };
                    for slot in 0..4 {
                        table.record(slot, value);
                    }
                }
            })
        };
        for _ in 0..200 {
            for value in table.read_all() {
                assert!(value == QUERY_ID_NONE || value == 1 || value == u64::MAX);
            }
        }
        writer.join().expect("writer panicked");
    }

    #[test]
    fn reattach_requires_identical_capacity() {
        let config = QtrackConfig {
            max_workers: 10,
            auxiliary_workers: 2,
            max_prepared_transactions: 4,
            ..QtrackConfig::default()
        };
        let region = ActivityRegion::create(&config).expect("create");
        let table = region.table();
        table.record(3, 4242);

        // Same sizing inputs recompute the same capacity and reuse contents.
        let reattached = region.reattach(&config).expect("reattach");
        assert_eq!(reattached.capacity(), 16);
        assert_eq!(reattached.read_all()[3], 4242);

        let grown = QtrackConfig {
            max_workers: 11,
            ..config
        };
        let err = region.reattach(&grown).unwrap_err();
        assert!(matches!(
            err,
            QtrackError::CapacityMismatch {
                existing: 16,
                computed: 17
            }
        ));
    }

    #[test]
    fn zero_worker_config_fails_startup() {
        let config = QtrackConfig {
            max_workers: 0,
            auxiliary_workers: 0,
            max_prepared_transactions: 0,
            ..QtrackConfig::default()
        };
        assert!(matches!(
            ActivityRegion::create(&config),
            Err(QtrackError::InvalidConfig { .. })
        ));
    }
}
