use std::sync::atomic::{AtomicU32, Ordering};

/// Per-worker nesting depth for executor and planner regions.
///
/// One tracker exists per worker and is shared by every hook layer that
/// worker installs; it has no shared-memory footprint. A statement is
/// top-level only while both depths are 0, tested *before* entering the
/// region that the statement is about to open.
#[derive(Debug, Default)]
pub struct NestingTracker {
    exec_depth: AtomicU32,
    plan_depth: AtomicU32,
}

impl NestingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter an executor region. The returned guard decrements the depth on
    /// every exit path, including unwinding out of a failed delegate.
    pub fn enter_execution(&self) -> NestingGuard<'_> {
        NestingGuard::enter(&self.exec_depth)
    }

    /// Enter a planner region. Same guard discipline as `enter_execution`.
    pub fn enter_planning(&self) -> NestingGuard<'_> {
        NestingGuard::enter(&self.plan_depth)
    }

    pub fn execution_depth(&self) -> u32 {
        self.exec_depth.load(Ordering::Relaxed)
    }

    pub fn planning_depth(&self) -> u32 {
        self.plan_depth.load(Ordering::Relaxed)
    }

    pub fn depth_sum(&self) -> u32 {
        self.execution_depth() + self.planning_depth()
    }

    pub fn is_top_level(&self) -> bool {
        self.depth_sum() == 0
    }
}

/// Scoped depth increment; dropping it restores the counter.
#[derive(Debug)]
pub struct NestingGuard<'a> {
    counter: &'a AtomicU32,
}

impl<'a> NestingGuard<'a> {
    fn enter(counter: &'a AtomicU32) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for NestingGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}
