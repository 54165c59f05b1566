//! Emergency fast-path — speed dominates specialty precision.
//!
//! A distinct decision procedure, not a parameterization of the greedy
//! assigner: no cost model runs. Candidates are the active clinicians at
//! or below the average active load (all active clinicians when that
//! subset is empty). An exact specialty match with the lowest load wins;
//! otherwise the least-loaded candidate takes the case regardless of
//! specialty.

use crate::{
    clinician::Clinician,
    error::{EngineError, EngineResult},
    ledger::LoadLedger,
    types::ClinicianId,
};
use std::cmp::Ordering;

pub fn pick<'a>(
    required: Option<&str>,
    roster: impl IntoIterator<Item = &'a Clinician>,
    ledger: &LoadLedger,
) -> EngineResult<ClinicianId> {
    let active: Vec<&Clinician> = roster.into_iter().filter(|c| c.is_active()).collect();
    if active.is_empty() {
        return Err(EngineError::NoAvailableClinician);
    }

    let avg = ledger.average_load(active.iter().map(|c| &c.clinician_id));
    let mut candidates: Vec<&Clinician> = active
        .iter()
        .copied()
        .filter(|c| f64::from(ledger.current_load(&c.clinician_id)) <= avg)
        .collect();
    if candidates.is_empty() {
        candidates = active;
    }

    let by_load_then_id = |a: &Clinician, b: &Clinician| -> Ordering {
        ledger
            .current_load(&a.clinician_id)
            .cmp(&ledger.current_load(&b.clinician_id))
            .then_with(|| a.clinician_id.cmp(&b.clinician_id))
    };

    let chosen = candidates
        .iter()
        .copied()
        .filter(|c| c.specialty_matches(required))
        .min_by(|a, b| by_load_then_id(a, b))
        .or_else(|| {
            candidates
                .iter()
                .copied()
                .min_by(|a, b| by_load_then_id(a, b))
        });

    match chosen {
        Some(c) => Ok(c.clinician_id.clone()),
        None => Err(EngineError::NoAvailableClinician),
    }
}
