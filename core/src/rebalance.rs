//! Batch rebalancer — periodic global re-optimization of waiting,
//! non-emergency assignments.
//!
//! Snapshot → cost matrix (one column per clinician slot) → exact
//! matching → diff plan. The engine applies the plan under the same lock
//! that serializes real-time assignment, so the batch can never race a
//! greedy increment on the same clinician. Emergency visits are excluded
//! and never revisited.

use crate::{
    clinician::Clinician,
    config::EngineConfig,
    cost::{score_pair, CostBreakdown},
    matching::min_cost_assignment,
    types::{ClinicianId, VisitId},
};
use chrono::{DateTime, Utc};

/// One waiting visit as frozen by the snapshot.
#[derive(Debug, Clone)]
pub struct WaitingVisit {
    pub visit_id: VisitId,
    pub required_specialty: Option<String>,
    pub current_clinician: Option<ClinicianId>,
}

/// One active clinician as frozen by the snapshot.
///
/// `base_load` excludes the clinician's own waiting snapshot visits:
/// that mass is exactly what the matching redistributes.
#[derive(Debug, Clone)]
pub struct SlotClinician {
    pub clinician: Clinician,
    pub base_load: u32,
}

/// A single visit move produced by the solver. `from` is None when the
/// visit was Waiting(unassigned).
#[derive(Debug, Clone)]
pub struct ReassignMove {
    pub visit_id: VisitId,
    pub from: Option<ClinicianId>,
    pub to: ClinicianId,
    pub breakdown: CostBreakdown,
}

#[derive(Debug, Clone, Default)]
pub struct RebalancePlan {
    pub moves: Vec<ReassignMove>,
    /// Visits the solver matched (moved or confirmed in place).
    pub matched: usize,
    /// Total cost of the matched assignment set.
    pub total_cost: f64,
}

/// Solve the snapshot. Pure: no engine state is touched.
///
/// Each clinician contributes `max_parallel_waiting` columns; slot k
/// prices the pair at load = base + k, so stacking a second waiting
/// visit on the same clinician is strictly costlier than the first.
/// Visits left unmatched (more waiting visits than slots) keep their
/// current assignment and do not appear in the plan.
pub fn plan(
    config: &EngineConfig,
    visits: &[WaitingVisit],
    clinicians: &[SlotClinician],
    now: DateTime<Utc>,
) -> RebalancePlan {
    if visits.is_empty() || clinicians.is_empty() || config.max_parallel_waiting == 0 {
        return RebalancePlan::default();
    }

    let avg_base_load =
        clinicians.iter().map(|c| f64::from(c.base_load)).sum::<f64>() / clinicians.len() as f64;

    // Column j ↔ (clinician index, slot depth k).
    let mut slot_owner: Vec<(usize, u32)> = Vec::with_capacity(clinicians.len() * config.max_parallel_waiting);
    for (ci, _) in clinicians.iter().enumerate() {
        for k in 0..config.max_parallel_waiting {
            slot_owner.push((ci, k as u32));
        }
    }

    let score = |visit: &WaitingVisit, ci: usize, k: u32| -> CostBreakdown {
        let sc = &clinicians[ci];
        score_pair(
            config,
            visit.required_specialty.as_deref(),
            &sc.clinician,
            sc.base_load + k,
            avg_base_load,
            now,
        )
    };

    // The churn bias makes staying put win cost ties: a move must beat
    // the current clinician by more than churn_bias_secs to happen.
    let cost: Vec<Vec<f64>> = visits
        .iter()
        .map(|v| {
            slot_owner
                .iter()
                .map(|&(ci, k)| {
                    let target = &clinicians[ci].clinician.clinician_id;
                    let bias = if v.current_clinician.as_ref() == Some(target) {
                        0.0
                    } else {
                        config.churn_bias_secs
                    };
                    score(v, ci, k).total + bias
                })
                .collect()
        })
        .collect();

    let assigned = min_cost_assignment(&cost);

    let mut plan = RebalancePlan::default();
    for (row, col) in assigned.iter().enumerate() {
        let Some(col) = col else { continue };
        let (ci, k) = slot_owner[*col];
        let target = &clinicians[ci].clinician.clinician_id;
        let visit = &visits[row];
        let breakdown = score(visit, ci, k);
        plan.matched += 1;
        plan.total_cost += breakdown.total;

        // Already optimal: leave the visit untouched to avoid churn.
        if visit.current_clinician.as_ref() == Some(target) {
            continue;
        }

        plan.moves.push(ReassignMove {
            visit_id: visit.visit_id.clone(),
            from: visit.current_clinician.clone(),
            to: target.clone(),
            breakdown,
        });
    }
    plan
}
