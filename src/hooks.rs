use crate::config::{TrackLevel, TrackSetting};
use crate::nesting::NestingTracker;
use crate::registry::{ActivityTable, QUERY_ID_NONE};
use crate::workers::WorkerHandle;
use std::sync::Arc;

/// A statement after parse analysis, carrying the id the analyzer computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedQuery {
    pub query_id: u64,
    pub text: String,
}

impl AnalyzedQuery {
    pub fn new(query_id: u64, text: impl Into<String>) -> Self {
        Self {
            query_id,
            text: text.into(),
        }
    }
}

/// A planned statement about to enter the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedQuery {
    pub query_id: u64,
}

/// A utility command. These never get an analyzed query id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtilityCommand {
    pub tag: String,
}

impl UtilityCommand {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

/// The engine's query-lifecycle extension points.
///
/// Implemented both by the engine's own standard behavior and by wrappers
/// around it, forming a chain of responsibility: each layer delegates inward
/// with unchanged arguments, and a delegate's error must reach the caller
/// unchanged. The engine guarantees that a wrapped region's exit runs even
/// when the wrapped work fails.
pub trait QueryLifecycle {
    type Error;

    fn post_parse_analyze(&mut self, query: &AnalyzedQuery) -> Result<(), Self::Error>;
    fn plan(&mut self, query: &AnalyzedQuery) -> Result<(), Self::Error>;
    fn executor_start(&mut self, query: &PlannedQuery) -> Result<(), Self::Error>;
    fn executor_run(&mut self, query: &PlannedQuery) -> Result<(), Self::Error>;
    fn executor_finish(&mut self, query: &PlannedQuery) -> Result<(), Self::Error>;
    fn process_utility(&mut self, command: &UtilityCommand) -> Result<(), Self::Error>;
}

/// Lifecycle wrapper that records each worker's current top-level query in
/// the shared activity table.
///
/// One instance exists per installed layer per worker. Layers for the same
/// worker share one `NestingTracker`, so a sub-statement spawned from inside
/// a delegate sees the depth its parent opened and is filtered out.
#[derive(Debug)]
pub struct TrackingHooks<D> {
    setting: Arc<TrackSetting>,
    table: Arc<ActivityTable>,
    worker: Option<Arc<WorkerHandle>>,
    nesting: Arc<NestingTracker>,
    delegate: D,
}

impl<D> TrackingHooks<D> {
    pub fn new(
        setting: Arc<TrackSetting>,
        table: Arc<ActivityTable>,
        worker: Option<Arc<WorkerHandle>>,
        delegate: D,
    ) -> Self {
        Self::with_nesting(setting, table, worker, Arc::new(NestingTracker::new()), delegate)
    }

    /// Build a layer that shares an existing worker-local nesting tracker.
    /// Used when a delegate re-enters the lifecycle for a sub-statement.
    pub fn with_nesting(
        setting: Arc<TrackSetting>,
        table: Arc<ActivityTable>,
        worker: Option<Arc<WorkerHandle>>,
        nesting: Arc<NestingTracker>,
        delegate: D,
    ) -> Self {
        Self {
            setting,
            table,
            worker,
            nesting,
            delegate,
        }
    }

    pub fn nesting(&self) -> &Arc<NestingTracker> {
        &self.nesting
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    /// Gate check mirroring the write invariant: tracking is on, this worker
    /// is not a parallel helper, and the relevant depth (taken before the
    /// increment for the region being entered) is 0.
    fn tracking_enabled(&self, depth: u32) -> bool {
        if self
            .worker
            .as_ref()
            .is_some_and(|worker| worker.is_parallel_helper())
        {
            return false;
        }
        self.setting.level() == TrackLevel::Top && depth == 0
    }

    fn record(&self, query_id: u64) {
        // A worker without a registry slot has nowhere to write; skip.
        let Some(worker) = &self.worker else {
            return;
        };
        self.table.record(worker.slot(), query_id);
    }
}

impl<D: QueryLifecycle> QueryLifecycle for TrackingHooks<D> {
    type Error = D::Error;

    /// Delegate first, then record the analyzed id if this is a top-level
    /// statement.
    fn post_parse_analyze(&mut self, query: &AnalyzedQuery) -> Result<(), Self::Error> {
        self.delegate.post_parse_analyze(query)?;
        if self.tracking_enabled(self.nesting.depth_sum()) {
            self.record(query.query_id);
        }
        Ok(())
    }

    fn plan(&mut self, query: &AnalyzedQuery) -> Result<(), Self::Error> {
        let _depth = self.nesting.enter_planning();
        self.delegate.plan(query)
    }

    /// Record before entering the region: the depth test must see the state
    /// outside the statement about to start.
    fn executor_start(&mut self, query: &PlannedQuery) -> Result<(), Self::Error> {
        if self.tracking_enabled(self.nesting.depth_sum()) {
            self.record(query.query_id);
        }
        let _depth = self.nesting.enter_execution();
        self.delegate.executor_start(query)
    }

    fn executor_run(&mut self, query: &PlannedQuery) -> Result<(), Self::Error> {
        let _depth = self.nesting.enter_execution();
        self.delegate.executor_run(query)
    }

    fn executor_finish(&mut self, query: &PlannedQuery) -> Result<(), Self::Error> {
        let _depth = self.nesting.enter_execution();
        self.delegate.executor_finish(query)
    }

    /// Utility commands have no analyzed id: record the sentinel so the slot
    /// shows "an untracked top-level command" instead of a stale prior id.
    /// Only execution depth gates this, matching the executor-side counter
    /// the utility region increments.
    fn process_utility(&mut self, command: &UtilityCommand) -> Result<(), Self::Error> {
        if self.tracking_enabled(self.nesting.execution_depth()) {
            self.record(QUERY_ID_NONE);
        }
        let _depth = self.nesting.enter_execution();
        self.delegate.process_utility(command)
    }
}
