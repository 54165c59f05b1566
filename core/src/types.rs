//! Shared primitive types used across the engine.

/// Stable identifier for a single clinic encounter.
pub type VisitId = String;

/// Stable identifier for a clinician on the roster.
pub type ClinicianId = String;

/// Stable identifier for a patient.
pub type PatientId = String;
