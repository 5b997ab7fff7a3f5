use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QtrackErrorCode {
    InvalidConfig,
    CapacityMismatch,
    WorkerTableFull,
    SlotStillClaimed,
    PermissionDenied,
}

impl QtrackErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            QtrackErrorCode::InvalidConfig => "invalid_config",
            QtrackErrorCode::CapacityMismatch => "capacity_mismatch",
            QtrackErrorCode::WorkerTableFull => "worker_table_full",
            QtrackErrorCode::SlotStillClaimed => "slot_still_claimed",
            QtrackErrorCode::PermissionDenied => "permission_denied",
        }
    }
}

#[derive(Debug, Error)]
pub enum QtrackError {
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error(
        "activity table capacity mismatch: region holds {existing} slots, config computes {computed}"
    )]
    CapacityMismatch { existing: usize, computed: usize },
    #[error("worker table full: all {capacity} slots are claimed")]
    WorkerTableFull { capacity: usize },
    #[error("worker slot {slot} is already claimed by pid {pid}")]
    SlotStillClaimed { slot: usize, pid: u32 },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

impl QtrackError {
    pub fn code(&self) -> QtrackErrorCode {
        match self {
            QtrackError::InvalidConfig { .. } => QtrackErrorCode::InvalidConfig,
            QtrackError::CapacityMismatch { .. } => QtrackErrorCode::CapacityMismatch,
            QtrackError::WorkerTableFull { .. } => QtrackErrorCode::WorkerTableFull,
            QtrackError::SlotStillClaimed { .. } => QtrackErrorCode::SlotStillClaimed,
            QtrackError::PermissionDenied(_) => QtrackErrorCode::PermissionDenied,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }
}
