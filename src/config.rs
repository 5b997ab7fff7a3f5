use crate::error::QtrackError;
use crate::permission::CallerContext;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{info, warn};

/// Which statements get recorded in the activity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackLevel {
    /// Track no statements at all.
    None,
    /// Track only top-level statements, never nested sub-statements.
    #[default]
    Top,
}

impl TrackLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackLevel::None => "none",
            TrackLevel::Top => "top",
        }
    }
}

impl FromStr for TrackLevel {
    type Err = QtrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(TrackLevel::None),
            "top" => Ok(TrackLevel::Top),
            other => Err(QtrackError::InvalidConfig {
                message: format!("unknown track level '{other}' (expected 'none' or 'top')"),
            }),
        }
    }
}

/// Sizing inputs for the activity table and worker registry.
///
/// `worker_slot_capacity` must be recomputed identically at every engine
/// start so that reattaching after a restart addresses the same layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QtrackConfig {
    /// Ordinary client-facing workers, including background maintenance
    /// workers launched on their behalf.
    pub max_workers: usize,
    /// Auxiliary system workers (checkpointer-style processes).
    pub auxiliary_workers: usize,
    /// In-flight two-phase-commit slots.
    pub max_prepared_transactions: usize,
    /// Initial track level; changeable at runtime by a superuser.
    pub track: TrackLevel,
}

impl Default for QtrackConfig {
    fn default() -> Self {
        Self {
            max_workers: 128,
            auxiliary_workers: 5,
            max_prepared_transactions: 0,
            track: TrackLevel::Top,
        }
    }
}

impl QtrackConfig {
    /// Total slot count: one per concurrently-possible worker.
    pub fn worker_slot_capacity(&self) -> usize {
        self.max_workers + self.auxiliary_workers + self.max_prepared_transactions
    }

    pub fn validate(&self) -> Result<(), QtrackError> {
        if self.max_workers == 0 {
            return Err(QtrackError::InvalidConfig {
                message: "max_workers must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Runtime-mutable tracking gate, read on every hook invocation.
///
/// Stored as an atomic so the hot write path never takes a lock just to
/// find out whether tracking is on.
#[derive(Debug)]
pub struct TrackSetting {
    level: AtomicU8,
}

const LEVEL_NONE: u8 = 0;
const LEVEL_TOP: u8 = 1;

impl TrackSetting {
    pub fn new(level: TrackLevel) -> Self {
        Self {
            level: AtomicU8::new(encode(level)),
        }
    }

    pub fn level(&self) -> TrackLevel {
        decode(self.level.load(Ordering::Relaxed))
    }

    pub fn is_enabled(&self) -> bool {
        self.level() != TrackLevel::None
    }

    /// Change the track level. Superuser-equivalent callers only.
    pub fn set(&self, caller: &CallerContext, level: TrackLevel) -> Result<(), QtrackError> {
        if !caller.is_superuser() {
            warn!(caller = %caller.caller_id, "rejected track level change");
            return Err(QtrackError::PermissionDenied(format!(
                "caller '{}' may not change the track level",
                caller.caller_id
            )));
        }
        self.level.store(encode(level), Ordering::Relaxed);
        info!(level = level.as_str(), "track level changed");
        Ok(())
    }
}

fn encode(level: TrackLevel) -> u8 {
    match level {
        TrackLevel::None => LEVEL_NONE,
        TrackLevel::Top => LEVEL_TOP,
    }
}

fn decode(raw: u8) -> TrackLevel {
    match raw {
        LEVEL_NONE => TrackLevel::None,
        _ => TrackLevel::Top,
    }
}
