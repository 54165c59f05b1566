//! Visit lifecycle — the state machine every clinic encounter moves through.
//!
//! CheckedIn → Triage → Waiting → InConsultation → Completed.
//! No transition may be skipped. Waiting subdivides on whether an
//! assigned clinician is present; a rebalance repoints the clinician
//! while the visit stays Waiting.

use crate::{
    error::{EngineError, EngineResult},
    types::{ClinicianId, PatientId, VisitId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a checked-in patient. Immutable after check-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: PatientId,
    pub name: String,
}

/// Fixed at triage time; never changed by the engine afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    Priority,
    Emergency,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Priority => "priority",
            Self::Emergency => "emergency",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "priority" => Some(Self::Priority),
            "emergency" => Some(Self::Emergency),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    CheckedIn,
    Triage,
    Waiting,
    InConsultation,
    Completed,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckedIn => "checked_in",
            Self::Triage => "triage",
            Self::Waiting => "waiting",
            Self::InConsultation => "in_consultation",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "checked_in" => Some(Self::CheckedIn),
            "triage" => Some(Self::Triage),
            "waiting" => Some(Self::Waiting),
            "in_consultation" => Some(Self::InConsultation),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// One clinic encounter. Owned by the engine; mutated only through the
/// transition methods below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub visit_id: VisitId,
    pub patient: Patient,
    pub status: VisitStatus,
    pub priority: Priority,
    pub complaint: String,
    /// None = no usable requirement recorded; matches any specialty.
    pub required_specialty: Option<String>,
    pub assigned_clinician: Option<ClinicianId>,
    pub arrived_at: DateTime<Utc>,
    pub triaged_at: Option<DateTime<Utc>>,
    pub consult_started_at: Option<DateTime<Utc>>,
    pub consult_ended_at: Option<DateTime<Utc>>,
    /// Written by the transcription collaborator.
    pub transcript: Option<String>,
    /// Written by the summarization collaborator.
    pub summary: Option<String>,
}

impl Visit {
    /// Register a new encounter in the CheckedIn state. Priority is a
    /// placeholder until triage fixes it.
    pub fn check_in(
        visit_id: VisitId,
        patient: Patient,
        complaint: String,
        arrived_at: DateTime<Utc>,
    ) -> Self {
        Self {
            visit_id,
            patient,
            status: VisitStatus::CheckedIn,
            priority: Priority::Normal,
            complaint,
            required_specialty: None,
            assigned_clinician: None,
            arrived_at,
            triaged_at: None,
            consult_started_at: None,
            consult_ended_at: None,
            transcript: None,
            summary: None,
        }
    }

    fn expect(&self, from: VisitStatus, to: VisitStatus) -> EngineResult<()> {
        if self.status == from {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                from: self.status.as_str(),
                to: to.as_str(),
            })
        }
    }

    /// CheckedIn → Triage. Happens on visit creation.
    pub fn begin_triage(&mut self) -> EngineResult<()> {
        self.expect(VisitStatus::CheckedIn, VisitStatus::Triage)?;
        self.status = VisitStatus::Triage;
        Ok(())
    }

    /// Triage → Waiting. Priority and specialty requirement are fixed here.
    pub fn complete_triage(
        &mut self,
        priority: Priority,
        required_specialty: Option<String>,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        self.expect(VisitStatus::Triage, VisitStatus::Waiting)?;
        self.priority = priority;
        self.required_specialty = required_specialty;
        self.triaged_at = Some(now);
        self.status = VisitStatus::Waiting;
        Ok(())
    }

    /// Waiting(unassigned) → Waiting(assigned).
    pub fn assign(&mut self, clinician_id: ClinicianId) -> EngineResult<()> {
        if self.status != VisitStatus::Waiting || self.assigned_clinician.is_some() {
            return Err(EngineError::InvalidTransition {
                from: self.status.as_str(),
                to: "waiting(assigned)",
            });
        }
        self.assigned_clinician = Some(clinician_id);
        Ok(())
    }

    /// Drop the assigned clinician, returning the previous assignee.
    /// Callers guard that the visit is Waiting.
    pub fn unassign(&mut self) -> Option<ClinicianId> {
        self.assigned_clinician.take()
    }

    /// Waiting(assigned) → InConsultation. The engine additionally
    /// enforces one active consultation per clinician.
    pub fn start_consultation(&mut self, now: DateTime<Utc>) -> EngineResult<()> {
        self.expect(VisitStatus::Waiting, VisitStatus::InConsultation)?;
        if self.assigned_clinician.is_none() {
            return Err(EngineError::InvalidTransition {
                from: "waiting(unassigned)",
                to: VisitStatus::InConsultation.as_str(),
            });
        }
        self.consult_started_at = Some(now);
        self.status = VisitStatus::InConsultation;
        Ok(())
    }

    /// InConsultation → Completed. The engine decrements the ledger.
    pub fn complete(&mut self, now: DateTime<Utc>) -> EngineResult<()> {
        self.expect(VisitStatus::InConsultation, VisitStatus::Completed)?;
        self.consult_ended_at = Some(now);
        self.status = VisitStatus::Completed;
        Ok(())
    }

    /// Assigned but not yet completed — the definition of ledger load.
    pub fn counts_toward_load(&self) -> bool {
        self.assigned_clinician.is_some()
            && matches!(self.status, VisitStatus::Waiting | VisitStatus::InConsultation)
    }
}
