//! Engine event log — every observable state change, append-only.
//!
//! Events are the audit trail: the store persists each one as a JSON
//! payload next to the assignment_log cost rows.

use crate::{
    clinician::Availability,
    types::{ClinicianId, VisitId},
    visit::Priority,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every event emitted by the engine.
/// Variants are added as operations grow — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    VisitCheckedIn {
        visit_id: VisitId,
        patient_name: String,
        at: DateTime<Utc>,
    },
    TriageCompleted {
        visit_id: VisitId,
        priority: Priority,
        required_specialty: Option<String>,
        at: DateTime<Utc>,
    },
    ClinicianAssigned {
        visit_id: VisitId,
        clinician_id: ClinicianId,
        total_cost: f64,
        at: DateTime<Utc>,
    },
    AssignmentFailed {
        visit_id: VisitId,
        reason: String,
        at: DateTime<Utc>,
    },
    VisitReassigned {
        visit_id: VisitId,
        from: Option<ClinicianId>,
        to: ClinicianId,
        at: DateTime<Utc>,
    },
    AssignmentReleased {
        visit_id: VisitId,
        clinician_id: ClinicianId,
        at: DateTime<Utc>,
    },
    ConsultationStarted {
        visit_id: VisitId,
        clinician_id: ClinicianId,
        at: DateTime<Utc>,
    },
    ClinicalRecordAttached {
        visit_id: VisitId,
        at: DateTime<Utc>,
    },
    VisitCompleted {
        visit_id: VisitId,
        clinician_id: Option<ClinicianId>,
        at: DateTime<Utc>,
    },
    AvailabilityChanged {
        clinician_id: ClinicianId,
        availability: Availability,
        at: DateTime<Utc>,
    },
    RebalanceCompleted {
        moved: usize,
        matched: usize,
        total_cost: f64,
        at: DateTime<Utc>,
    },
    RebalanceInfeasible {
        waiting: usize,
        at: DateTime<Utc>,
    },
}

/// Stable string name for the event_type column in event_log.
pub fn event_type_name(event: &EngineEvent) -> &'static str {
    match event {
        EngineEvent::VisitCheckedIn { .. } => "visit_checked_in",
        EngineEvent::TriageCompleted { .. } => "triage_completed",
        EngineEvent::ClinicianAssigned { .. } => "clinician_assigned",
        EngineEvent::AssignmentFailed { .. } => "assignment_failed",
        EngineEvent::VisitReassigned { .. } => "visit_reassigned",
        EngineEvent::AssignmentReleased { .. } => "assignment_released",
        EngineEvent::ConsultationStarted { .. } => "consultation_started",
        EngineEvent::ClinicalRecordAttached { .. } => "clinical_record_attached",
        EngineEvent::VisitCompleted { .. } => "visit_completed",
        EngineEvent::AvailabilityChanged { .. } => "availability_changed",
        EngineEvent::RebalanceCompleted { .. } => "rebalance_completed",
        EngineEvent::RebalanceInfeasible { .. } => "rebalance_infeasible",
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub component: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized EngineEvent
    pub recorded_at: DateTime<Utc>,
}
