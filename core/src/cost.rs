//! Scalar cost model for (patient requirement, clinician) pairs.
//!
//! cost = mismatch + estimated wait + load penalty + shift penalty,
//! all in seconds. Every term is always reported — audit tooling reads
//! the breakdown, never just the total.

use crate::{clinician::Clinician, config::EngineConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub mismatch: f64,
    pub wait: f64,
    pub load: f64,
    pub shift: f64,
    pub total: f64,
}

impl CostBreakdown {
    /// The emergency fast-path never prices pairs; it reports this.
    pub fn zero() -> Self {
        Self {
            mismatch: 0.0,
            wait: 0.0,
            load: 0.0,
            shift: 0.0,
            total: 0.0,
        }
    }
}

/// Score one candidate pair. Pure: identical inputs always yield an
/// identical breakdown.
///
/// - `required`: None matches any specialty (the normalized form of an
///   empty triage requirement).
/// - `load`: the clinician's caseload in the snapshot being priced.
/// - `avg_load`: mean caseload over active clinicians in the same snapshot.
pub fn score_pair(
    config: &EngineConfig,
    required: Option<&str>,
    clinician: &Clinician,
    load: u32,
    avg_load: f64,
    now: DateTime<Utc>,
) -> CostBreakdown {
    let mismatch = if clinician.specialty_matches(required) {
        0.0
    } else {
        config.mismatch_penalty_secs
    };

    let service_time = clinician
        .average_service_time_secs
        .unwrap_or(config.default_service_time_secs);
    let wait = f64::from(load) * service_time;

    // Only above-average clinicians are penalized.
    let load_term = (f64::from(load) - avg_load).max(0.0) * config.load_penalty_weight_secs;

    let shift = match clinician.shift_end {
        Some(end) if (end - now).num_seconds() < config.shift_threshold_secs => {
            config.shift_penalty_secs
        }
        _ => 0.0,
    };

    let total = mismatch + wait + load_term + shift;
    CostBreakdown {
        mismatch,
        wait,
        load: load_term,
        shift,
        total,
    }
}
