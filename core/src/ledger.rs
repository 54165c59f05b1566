//! Clinician load ledger — the caseload counter behind every assignment.
//!
//! INVARIANT: a clinician's load equals the number of visits assigned to
//! it that are not yet completed. Exactly one increment per successful
//! assignment and one decrement per completion; a rebalance move nets to
//! decrement-old / increment-new, never an independent pair.

use crate::types::ClinicianId;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct LoadLedger {
    loads: HashMap<ClinicianId, u32>,
}

impl LoadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new load.
    pub fn increment(&mut self, id: &ClinicianId) -> u32 {
        let load = self.loads.entry(id.clone()).or_insert(0);
        *load += 1;
        *load
    }

    /// Floors at 0. A floored decrement means a double completion or a
    /// release without a matching assignment upstream.
    pub fn decrement(&mut self, id: &ClinicianId) -> u32 {
        let load = self.loads.entry(id.clone()).or_insert(0);
        if *load == 0 {
            log::warn!("load decrement on clinician {id} already at zero");
            return 0;
        }
        *load -= 1;
        *load
    }

    pub fn current_load(&self, id: &ClinicianId) -> u32 {
        self.loads.get(id).copied().unwrap_or(0)
    }

    /// Mean load across the given clinician set. 0.0 for an empty set.
    pub fn average_load<'a>(&self, ids: impl IntoIterator<Item = &'a ClinicianId>) -> f64 {
        let mut sum = 0u64;
        let mut n = 0u64;
        for id in ids {
            sum += u64::from(self.current_load(id));
            n += 1;
        }
        if n == 0 {
            0.0
        } else {
            sum as f64 / n as f64
        }
    }

    pub fn total_load(&self) -> u64 {
        self.loads.values().map(|&l| u64::from(l)).sum()
    }
}
