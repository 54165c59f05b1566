//! Real-time single-visit assignment — invoked the instant triage
//! completes for Normal and Priority visits.

use crate::{
    clinician::Clinician,
    config::EngineConfig,
    cost::{score_pair, CostBreakdown},
    error::{EngineError, EngineResult},
    ledger::LoadLedger,
    types::ClinicianId,
};
use chrono::{DateTime, Utc};

/// Pick the minimum-cost active clinician for a requirement.
///
/// Evaluates the cost model for every active candidate; ties break by
/// lowest clinician id, so repeated runs over the same snapshot are
/// deterministic. The caller applies the choice (increment + repoint)
/// inside its own critical section.
pub fn pick<'a>(
    config: &EngineConfig,
    required: Option<&str>,
    roster: impl IntoIterator<Item = &'a Clinician>,
    ledger: &LoadLedger,
    now: DateTime<Utc>,
) -> EngineResult<(ClinicianId, CostBreakdown)> {
    let active: Vec<&Clinician> = roster.into_iter().filter(|c| c.is_active()).collect();
    if active.is_empty() {
        return Err(EngineError::NoAvailableClinician);
    }

    let avg_load = ledger.average_load(active.iter().map(|c| &c.clinician_id));

    let mut best: Option<(&Clinician, CostBreakdown)> = None;
    for candidate in &active {
        let load = ledger.current_load(&candidate.clinician_id);
        let breakdown = score_pair(config, required, candidate, load, avg_load, now);
        let better = match &best {
            None => true,
            Some((current, current_cost)) => {
                breakdown.total < current_cost.total
                    || (breakdown.total == current_cost.total
                        && candidate.clinician_id < current.clinician_id)
            }
        };
        if better {
            best = Some((candidate, breakdown));
        }
    }

    // `active` is non-empty, so a best candidate exists.
    let Some((chosen, breakdown)) = best else {
        return Err(EngineError::NoAvailableClinician);
    };
    Ok((chosen.clinician_id.clone(), breakdown))
}
