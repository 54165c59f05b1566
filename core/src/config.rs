//! Engine configuration — every tunable constant in one place.
//!
//! All values are externally tunable: load from a JSON file in
//! production, use default_test() in unit tests.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Penalty (seconds) for assigning across specialties. Must dominate
    /// the other cost terms at realistic loads.
    pub mismatch_penalty_secs: f64,
    /// Seconds added per unit of caseload above the active-roster average.
    pub load_penalty_weight_secs: f64,
    /// Clinic-wide service time (seconds) used when a clinician has no
    /// consult history yet.
    pub default_service_time_secs: f64,
    /// Remaining-shift threshold (seconds) below which the shift penalty
    /// applies.
    pub shift_threshold_secs: i64,
    /// Flat penalty (seconds) for clinicians near the end of their shift.
    pub shift_penalty_secs: f64,
    /// Waiting slots each clinician exposes to the batch rebalancer.
    pub max_parallel_waiting: usize,
    /// Matrix bias (seconds) against moving a visit off its current
    /// clinician. Keeps cost ties from producing churn-only swaps.
    pub churn_bias_secs: f64,
}

impl EngineConfig {
    /// Load from a JSON file.
    /// In tests, use EngineConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self::default()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // 4 hours: outweighs any realistic wait/load differential.
            mismatch_penalty_secs: 14_400.0,
            load_penalty_weight_secs: 600.0,
            default_service_time_secs: 900.0,
            shift_threshold_secs: 1_800,
            shift_penalty_secs: 1_200.0,
            max_parallel_waiting: 3,
            churn_bias_secs: 1.0,
        }
    }
}
