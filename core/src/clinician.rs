//! Clinician roster entries.
//!
//! Availability is owned by an external roster-management collaborator;
//! caseload lives in the load ledger, never on this struct.

use crate::types::ClinicianId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Active,
    #[serde(rename = "break")]
    OnBreak,
    Offline,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::OnBreak => "break",
            Self::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "break" => Some(Self::OnBreak),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinician {
    pub clinician_id: ClinicianId,
    pub name: String,
    pub specialty: String,
    pub availability: Availability,
    /// Rolling mean consult duration; None until history exists, in which
    /// case the clinic-wide default applies.
    pub average_service_time_secs: Option<f64>,
    /// End of the current shift; None when not rostered to a shift.
    pub shift_end: Option<DateTime<Utc>>,
}

impl Clinician {
    pub fn new(clinician_id: impl Into<ClinicianId>, name: impl Into<String>, specialty: impl Into<String>) -> Self {
        Self {
            clinician_id: clinician_id.into(),
            name: name.into(),
            specialty: specialty.into(),
            availability: Availability::Active,
            average_service_time_secs: None,
            shift_end: None,
        }
    }

    /// Only active clinicians are eligible for new assignments.
    pub fn is_active(&self) -> bool {
        self.availability == Availability::Active
    }

    /// Case-insensitive exact match. A None requirement matches any
    /// specialty (the normalized form of an empty triage requirement).
    pub fn specialty_matches(&self, required: Option<&str>) -> bool {
        match required {
            None => true,
            Some(r) => self.specialty.eq_ignore_ascii_case(r),
        }
    }
}
