use crate::types::{ClinicianId, VisitId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No active clinician at decision time. The visit stays
    /// Waiting(unassigned) and is retried later; never fatal.
    #[error("No active clinician available for assignment")]
    NoAvailableClinician,

    /// The rebalancer could not construct any matching. Prior
    /// assignments are left intact.
    #[error("Batch rebalance infeasible: {reason}")]
    InfeasibleBatch { reason: String },

    #[error("Visit '{0}' not found")]
    VisitNotFound(VisitId),

    #[error("Clinician '{0}' not found")]
    ClinicianNotFound(ClinicianId),

    #[error("Clinician '{0}' already has a visit in consultation")]
    ClinicianBusy(ClinicianId),

    #[error("Invalid visit transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
