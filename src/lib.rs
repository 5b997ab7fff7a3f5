pub mod config;
pub mod error;
pub mod hooks;
pub mod nesting;
pub mod permission;
pub mod registry;
pub mod snapshot;
pub mod workers;

pub use crate::config::{QtrackConfig, TrackLevel, TrackSetting};
pub use crate::error::{QtrackError, QtrackErrorCode};
pub use crate::hooks::{AnalyzedQuery, PlannedQuery, QueryLifecycle, TrackingHooks, UtilityCommand};
pub use crate::nesting::{NestingGuard, NestingTracker};
pub use crate::permission::CallerContext;
pub use crate::registry::{ActivityRegion, ActivityTable, QUERY_ID_NONE};
pub use crate::snapshot::{ActivityRow, ActivitySnapshot};
pub use crate::workers::{WorkerHandle, WorkerKind, WorkerRegistry};

use std::sync::Arc;

/// One engine instance's activity-tracking state: the shared table, the
/// runtime gate, and the worker registry the snapshot joins against.
///
/// Created once at engine startup; `reattach` models a restart within the
/// same supervisor, which must address the identical layout.
#[derive(Debug)]
pub struct QtrackInstance {
    config: QtrackConfig,
    region: ActivityRegion,
    setting: Arc<TrackSetting>,
    workers: Arc<WorkerRegistry>,
    table: Arc<ActivityTable>,
}

impl QtrackInstance {
    pub fn bootstrap(config: QtrackConfig) -> Result<Self, QtrackError> {
        let region = ActivityRegion::create(&config)?;
        let table = region.table();
        let workers = Arc::new(WorkerRegistry::new(config.worker_slot_capacity()));
        let setting = Arc::new(TrackSetting::new(config.track));
        Ok(Self {
            config,
            region,
            setting,
            workers,
            table,
        })
    }

    pub fn config(&self) -> &QtrackConfig {
        &self.config
    }

    pub fn setting(&self) -> &Arc<TrackSetting> {
        &self.setting
    }

    pub fn workers(&self) -> &Arc<WorkerRegistry> {
        &self.workers
    }

    pub fn table(&self) -> &Arc<ActivityTable> {
        &self.table
    }

    /// Verify that `config` still computes the startup capacity and hand
    /// back the existing table. Fails startup on any mismatch: the table
    /// must line up with the worker registry exactly.
    pub fn reattach(&self, config: &QtrackConfig) -> Result<Arc<ActivityTable>, QtrackError> {
        self.region.reattach(config)
    }

    /// Register a worker, claiming the first free slot.
    pub fn register_worker(
        &self,
        pid: u32,
        kind: WorkerKind,
    ) -> Result<WorkerHandle, QtrackError> {
        self.workers.claim(pid, kind)
    }

    /// Change the track level; superuser-equivalent callers only.
    pub fn set_track_level(
        &self,
        caller: &CallerContext,
        level: TrackLevel,
    ) -> Result<(), QtrackError> {
        self.setting.set(caller, level)
    }

    /// Wrap `delegate` with tracking for `worker`. Pass `None` for a worker
    /// that has not (yet) claimed a registry slot; its writes are skipped.
    pub fn tracking_hooks<D: QueryLifecycle>(
        &self,
        worker: Option<Arc<WorkerHandle>>,
        delegate: D,
    ) -> TrackingHooks<D> {
        TrackingHooks::new(
            Arc::clone(&self.setting),
            Arc::clone(&self.table),
            worker,
            delegate,
        )
    }

    /// Like `tracking_hooks`, but sharing an existing worker-local nesting
    /// tracker, for layers that re-enter the lifecycle for sub-statements.
    pub fn tracking_hooks_nested<D: QueryLifecycle>(
        &self,
        worker: Option<Arc<WorkerHandle>>,
        nesting: Arc<NestingTracker>,
        delegate: D,
    ) -> TrackingHooks<D> {
        TrackingHooks::with_nesting(
            Arc::clone(&self.setting),
            Arc::clone(&self.table),
            worker,
            nesting,
            delegate,
        )
    }

    /// Operator-facing view: (pid, current top-level query id) per live
    /// worker. Empty when tracking is off.
    pub fn snapshot(&self) -> ActivitySnapshot {
        ActivitySnapshot::capture(&self.setting, &self.workers, &self.table)
    }
}
