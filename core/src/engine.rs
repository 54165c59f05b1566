//! The assignment engine — the concurrency-sensitive heart of the
//! triage desk.
//!
//! RULES:
//!   - All shared mutable state (roster, visits, load ledger, store
//!     handle) lives behind one mutex. Assignment read-modify-write is
//!     therefore a single critical section: two concurrent triage
//!     completions can never observe the same pre-increment load.
//!   - The batch rebalancer snapshots, solves, and applies diffs under
//!     the same lock, so it cannot race a real-time assignment.
//!   - Every operation is synchronous and non-suspending. A caller that
//!     abandons a committed assignment must call release_assignment()
//!     for the compensating decrement; nothing rolls back on its own.
//!   - All state changes are recorded in the event log.

use crate::{
    clinician::{Availability, Clinician},
    config::EngineConfig,
    cost::CostBreakdown,
    emergency,
    error::{EngineError, EngineResult},
    event::{event_type_name, EngineEvent, EventLogEntry},
    greedy,
    ledger::LoadLedger,
    rebalance::{self, SlotClinician, WaitingVisit},
    store::TriageStore,
    types::{ClinicianId, VisitId},
    visit::{Patient, Priority, Visit, VisitStatus},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Triage completion as delivered by the intake collaborator.
/// Intake owns the arrival timestamp; the check-in value is provisional
/// until this lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageCompletion {
    pub visit_id: VisitId,
    pub required_specialty: Option<String>,
    pub priority: Priority,
    pub arrived_at: DateTime<Utc>,
}

/// Ephemeral output of one assignment decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentDecision {
    pub visit_id: VisitId,
    pub clinician_id: Option<ClinicianId>,
    pub breakdown: CostBreakdown,
    pub decided_at: DateTime<Utc>,
    pub decision_micros: u64,
}

struct EngineInner {
    clinicians: HashMap<ClinicianId, Clinician>,
    visits: HashMap<VisitId, Visit>,
    ledger: LoadLedger,
    store: TriageStore,
}

pub struct AssignmentEngine {
    config: EngineConfig,
    inner: Mutex<EngineInner>,
}

/// Empty or whitespace-only requirements match any specialty.
fn normalize_specialty(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        log::debug!("empty required specialty treated as match-any");
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl AssignmentEngine {
    pub fn new(config: EngineConfig, store: TriageStore) -> Self {
        Self {
            config,
            inner: Mutex::new(EngineInner {
                clinicians: HashMap::new(),
                visits: HashMap::new(),
                ledger: LoadLedger::new(),
                store,
            }),
        }
    }

    /// Engine over a fresh in-memory store with test defaults.
    pub fn build_test() -> EngineResult<Self> {
        let store = TriageStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(EngineConfig::default_test(), store))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, EngineInner> {
        // A poisoned lock still holds the most recent state; keep serving it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn append_event(
        inner: &EngineInner,
        component: &str,
        event: &EngineEvent,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let entry = EventLogEntry {
            id: None,
            component: component.to_string(),
            event_type: event_type_name(event).to_string(),
            payload: serde_json::to_string(event)?,
            recorded_at: now,
        };
        inner.store.append_event(&entry)
    }

    // ── Roster operations ──────────────────────────────────────

    /// Add or replace a roster entry. The caseload is engine-owned and
    /// survives the upsert.
    pub fn upsert_clinician(&self, clinician: Clinician) -> EngineResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let load = inner.ledger.current_load(&clinician.clinician_id);
        inner.store.upsert_clinician(&clinician, load)?;
        inner
            .clinicians
            .insert(clinician.clinician_id.clone(), clinician);
        Ok(())
    }

    /// Availability flip from the roster-management collaborator.
    /// Existing assignments stay put; the next rebalance moves waiting
    /// visits off a clinician that went off-roster.
    pub fn set_availability(
        &self,
        clinician_id: &ClinicianId,
        availability: Availability,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.clinicians.get_mut(clinician_id) {
            Some(clinician) => clinician.availability = availability,
            None => return Err(EngineError::ClinicianNotFound(clinician_id.clone())),
        }
        inner.store.update_availability(clinician_id, availability)?;
        Self::append_event(
            inner,
            "roster",
            &EngineEvent::AvailabilityChanged {
                clinician_id: clinician_id.clone(),
                availability,
                at: now,
            },
            now,
        )?;
        Ok(())
    }

    // ── Visit lifecycle ────────────────────────────────────────

    /// Register a new encounter. The visit enters Triage immediately;
    /// CheckedIn exists only as the creation state.
    pub fn check_in(
        &self,
        patient: Patient,
        complaint: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Visit> {
        let visit_id = uuid::Uuid::new_v4().to_string();
        let mut visit = Visit::check_in(visit_id.clone(), patient, complaint.to_string(), now);
        visit.begin_triage()?;

        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.store.insert_visit(&visit)?;
        Self::append_event(
            inner,
            "intake",
            &EngineEvent::VisitCheckedIn {
                visit_id: visit_id.clone(),
                patient_name: visit.patient.name.clone(),
                at: now,
            },
            now,
        )?;
        inner.visits.insert(visit_id, visit.clone());
        Ok(visit)
    }

    /// Triage completed: fix priority and requirement, move to Waiting,
    /// and decide an assignment on the spot (greedy, or the emergency
    /// fast-path for Emergency priority).
    ///
    /// `NoAvailableClinician` leaves the visit Waiting(unassigned) for a
    /// later retry_assignment() or rebalance().
    pub fn complete_triage(
        &self,
        completion: TriageCompletion,
        now: DateTime<Utc>,
    ) -> EngineResult<AssignmentDecision> {
        let started = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;

        let required = normalize_specialty(completion.required_specialty);
        match inner.visits.get_mut(&completion.visit_id) {
            Some(visit) => {
                visit.complete_triage(completion.priority, required.clone(), now)?;
                visit.arrived_at = completion.arrived_at;
            }
            None => return Err(EngineError::VisitNotFound(completion.visit_id)),
        }
        if let Some(visit) = inner.visits.get(&completion.visit_id) {
            inner.store.update_visit(visit)?;
        }
        Self::append_event(
            inner,
            "triage",
            &EngineEvent::TriageCompleted {
                visit_id: completion.visit_id.clone(),
                priority: completion.priority,
                required_specialty: required,
                at: now,
            },
            now,
        )?;

        self.assign_waiting(inner, &completion.visit_id, started, now)
    }

    /// Re-run assignment for a visit left Waiting(unassigned) by an
    /// earlier NoAvailableClinician outcome.
    pub fn retry_assignment(
        &self,
        visit_id: &VisitId,
        now: DateTime<Utc>,
    ) -> EngineResult<AssignmentDecision> {
        let started = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.visits.get(visit_id) {
            Some(visit) => {
                if visit.status != VisitStatus::Waiting || visit.assigned_clinician.is_some() {
                    return Err(EngineError::InvalidTransition {
                        from: visit.status.as_str(),
                        to: "waiting(assigned)",
                    });
                }
            }
            None => return Err(EngineError::VisitNotFound(visit_id.clone())),
        }
        self.assign_waiting(inner, visit_id, started, now)
    }

    /// Shared tail of complete_triage and retry_assignment. Runs inside
    /// the caller's critical section.
    fn assign_waiting(
        &self,
        inner: &mut EngineInner,
        visit_id: &VisitId,
        started: Instant,
        now: DateTime<Utc>,
    ) -> EngineResult<AssignmentDecision> {
        let (priority, required) = match inner.visits.get(visit_id) {
            Some(visit) => (visit.priority, visit.required_specialty.clone()),
            None => return Err(EngineError::VisitNotFound(visit_id.clone())),
        };

        let picked = if priority == Priority::Emergency {
            emergency::pick(required.as_deref(), inner.clinicians.values(), &inner.ledger)
                .map(|id| (id, CostBreakdown::zero(), "emergency"))
        } else {
            greedy::pick(
                &self.config,
                required.as_deref(),
                inner.clinicians.values(),
                &inner.ledger,
                now,
            )
            .map(|(id, breakdown)| (id, breakdown, "greedy"))
        };

        let (clinician_id, breakdown, kind) = match picked {
            Ok(choice) => choice,
            Err(EngineError::NoAvailableClinician) => {
                Self::append_event(
                    inner,
                    "assigner",
                    &EngineEvent::AssignmentFailed {
                        visit_id: visit_id.clone(),
                        reason: "no_available_clinician".to_string(),
                        at: now,
                    },
                    now,
                )?;
                log::debug!("no active clinician for visit {visit_id}; left waiting");
                return Err(EngineError::NoAvailableClinician);
            }
            Err(e) => return Err(e),
        };

        match inner.visits.get_mut(visit_id) {
            Some(visit) => visit.assign(clinician_id.clone())?,
            None => return Err(EngineError::VisitNotFound(visit_id.clone())),
        }
        let new_load = inner.ledger.increment(&clinician_id);
        inner.store.update_clinician_load(&clinician_id, new_load)?;
        if let Some(visit) = inner.visits.get(visit_id) {
            inner.store.update_visit(visit)?;
        }
        inner
            .store
            .append_assignment(visit_id, Some(&clinician_id), kind, &breakdown, now)?;
        Self::append_event(
            inner,
            kind,
            &EngineEvent::ClinicianAssigned {
                visit_id: visit_id.clone(),
                clinician_id: clinician_id.clone(),
                total_cost: breakdown.total,
                at: now,
            },
            now,
        )?;
        log::debug!(
            "visit {visit_id} -> clinician {clinician_id} ({kind}, total {:.0}s, load {new_load})",
            breakdown.total
        );

        Ok(AssignmentDecision {
            visit_id: visit_id.clone(),
            clinician_id: Some(clinician_id),
            breakdown,
            decided_at: now,
            decision_micros: started.elapsed().as_micros() as u64,
        })
    }

    /// The assigned clinician calls the patient in. One active
    /// consultation per clinician.
    pub fn start_consultation(
        &self,
        visit_id: &VisitId,
        clinician_id: &ClinicianId,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        match inner.visits.get(visit_id) {
            Some(visit) => {
                if visit.assigned_clinician.as_ref() != Some(clinician_id) {
                    return Err(EngineError::InvalidTransition {
                        from: visit.status.as_str(),
                        to: "in_consultation",
                    });
                }
            }
            None => return Err(EngineError::VisitNotFound(visit_id.clone())),
        }
        let busy = inner.visits.values().any(|v| {
            v.status == VisitStatus::InConsultation
                && v.assigned_clinician.as_ref() == Some(clinician_id)
        });
        if busy {
            return Err(EngineError::ClinicianBusy(clinician_id.clone()));
        }

        match inner.visits.get_mut(visit_id) {
            Some(visit) => visit.start_consultation(now)?,
            None => return Err(EngineError::VisitNotFound(visit_id.clone())),
        }
        if let Some(visit) = inner.visits.get(visit_id) {
            inner.store.update_visit(visit)?;
        }
        Self::append_event(
            inner,
            "consultation",
            &EngineEvent::ConsultationStarted {
                visit_id: visit_id.clone(),
                clinician_id: clinician_id.clone(),
                at: now,
            },
            now,
        )?;
        Ok(())
    }

    /// Diagnosis/discharge submitted: complete the visit and decrement
    /// the clinician's load.
    pub fn complete_visit(&self, visit_id: &VisitId, now: DateTime<Utc>) -> EngineResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let clinician_id = match inner.visits.get_mut(visit_id) {
            Some(visit) => {
                visit.complete(now)?;
                visit.assigned_clinician.clone()
            }
            None => return Err(EngineError::VisitNotFound(visit_id.clone())),
        };
        if let Some(cid) = &clinician_id {
            let load = inner.ledger.decrement(cid);
            inner.store.update_clinician_load(cid, load)?;
        }
        if let Some(visit) = inner.visits.get(visit_id) {
            inner.store.update_visit(visit)?;
        }
        Self::append_event(
            inner,
            "consultation",
            &EngineEvent::VisitCompleted {
                visit_id: visit_id.clone(),
                clinician_id,
                at: now,
            },
            now,
        )?;
        Ok(())
    }

    /// Attach the transcript and/or clinical summary produced by the
    /// documentation collaborators. Fields already present are kept when
    /// the corresponding argument is None.
    pub fn attach_clinical_record(
        &self,
        visit_id: &VisitId,
        transcript: Option<String>,
        summary: Option<String>,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        match inner.visits.get_mut(visit_id) {
            Some(visit) => {
                if let Some(transcript) = transcript {
                    visit.transcript = Some(transcript);
                }
                if let Some(summary) = summary {
                    visit.summary = Some(summary);
                }
            }
            None => return Err(EngineError::VisitNotFound(visit_id.clone())),
        }
        if let Some(visit) = inner.visits.get(visit_id) {
            inner.store.update_visit(visit)?;
        }
        Self::append_event(
            inner,
            "documentation",
            &EngineEvent::ClinicalRecordAttached {
                visit_id: visit_id.clone(),
                at: now,
            },
            now,
        )?;
        Ok(())
    }

    /// Compensating decrement for a caller that abandoned an assignment
    /// after the increment committed. The visit returns to
    /// Waiting(unassigned); a no-op when nothing was assigned.
    pub fn release_assignment(&self, visit_id: &VisitId, now: DateTime<Utc>) -> EngineResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let released = match inner.visits.get_mut(visit_id) {
            Some(visit) => {
                if visit.status != VisitStatus::Waiting {
                    return Err(EngineError::InvalidTransition {
                        from: visit.status.as_str(),
                        to: "waiting(unassigned)",
                    });
                }
                visit.unassign()
            }
            None => return Err(EngineError::VisitNotFound(visit_id.clone())),
        };
        let Some(clinician_id) = released else {
            return Ok(());
        };

        let load = inner.ledger.decrement(&clinician_id);
        inner.store.update_clinician_load(&clinician_id, load)?;
        if let Some(visit) = inner.visits.get(visit_id) {
            inner.store.update_visit(visit)?;
        }
        Self::append_event(
            inner,
            "assigner",
            &EngineEvent::AssignmentReleased {
                visit_id: visit_id.clone(),
                clinician_id,
                at: now,
            },
            now,
        )?;
        Ok(())
    }

    // ── Batch rebalancing ──────────────────────────────────────

    /// Periodic global re-optimization of waiting, non-emergency visits.
    /// Snapshot, solve, and diff application all run inside one critical
    /// section.
    pub fn rebalance(&self, now: DateTime<Utc>) -> EngineResult<Vec<AssignmentDecision>> {
        let started = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;

        let mut waiting: Vec<WaitingVisit> = inner
            .visits
            .values()
            .filter(|v| v.status == VisitStatus::Waiting && v.priority != Priority::Emergency)
            .map(|v| WaitingVisit {
                visit_id: v.visit_id.clone(),
                required_specialty: v.required_specialty.clone(),
                current_clinician: v.assigned_clinician.clone(),
            })
            .collect();
        if waiting.is_empty() {
            return Ok(Vec::new());
        }
        waiting.sort_by(|a, b| a.visit_id.cmp(&b.visit_id));

        // base load = ledger load minus this clinician's share of the
        // waiting mass being redistributed.
        let mut waiting_share: HashMap<ClinicianId, u32> = HashMap::new();
        for visit in &waiting {
            if let Some(cid) = &visit.current_clinician {
                *waiting_share.entry(cid.clone()).or_insert(0) += 1;
            }
        }

        let mut slot_clinicians: Vec<SlotClinician> = Vec::new();
        for c in inner.clinicians.values() {
            if !c.is_active() {
                continue;
            }
            let share = waiting_share.get(&c.clinician_id).copied().unwrap_or(0);
            let base_load = inner
                .ledger
                .current_load(&c.clinician_id)
                .saturating_sub(share);
            slot_clinicians.push(SlotClinician {
                clinician: c.clone(),
                base_load,
            });
        }
        slot_clinicians.sort_by(|a, b| a.clinician.clinician_id.cmp(&b.clinician.clinician_id));

        if slot_clinicians.is_empty() || self.config.max_parallel_waiting == 0 {
            Self::append_event(
                inner,
                "rebalancer",
                &EngineEvent::RebalanceInfeasible {
                    waiting: waiting.len(),
                    at: now,
                },
                now,
            )?;
            return Err(EngineError::InfeasibleBatch {
                reason: "no active clinician slots".to_string(),
            });
        }

        let plan = rebalance::plan(&self.config, &waiting, &slot_clinicians, now);

        let mut results = Vec::with_capacity(plan.moves.len());
        for mv in &plan.moves {
            // Net move: decrement old, increment new, repoint — never an
            // independent increment/decrement pair.
            if let Some(old) = &mv.from {
                let load = inner.ledger.decrement(old);
                inner.store.update_clinician_load(old, load)?;
            }
            let load = inner.ledger.increment(&mv.to);
            inner.store.update_clinician_load(&mv.to, load)?;

            match inner.visits.get_mut(&mv.visit_id) {
                Some(visit) => {
                    let _ = visit.unassign();
                    visit.assign(mv.to.clone())?;
                }
                None => return Err(EngineError::VisitNotFound(mv.visit_id.clone())),
            }
            if let Some(visit) = inner.visits.get(&mv.visit_id) {
                inner.store.update_visit(visit)?;
            }
            inner
                .store
                .append_assignment(&mv.visit_id, Some(&mv.to), "rebalance", &mv.breakdown, now)?;
            Self::append_event(
                inner,
                "rebalancer",
                &EngineEvent::VisitReassigned {
                    visit_id: mv.visit_id.clone(),
                    from: mv.from.clone(),
                    to: mv.to.clone(),
                    at: now,
                },
                now,
            )?;

            results.push(AssignmentDecision {
                visit_id: mv.visit_id.clone(),
                clinician_id: Some(mv.to.clone()),
                breakdown: mv.breakdown,
                decided_at: now,
                decision_micros: started.elapsed().as_micros() as u64,
            });
        }

        Self::append_event(
            inner,
            "rebalancer",
            &EngineEvent::RebalanceCompleted {
                moved: plan.moves.len(),
                matched: plan.matched,
                total_cost: plan.total_cost,
                at: now,
            },
            now,
        )?;
        log::debug!(
            "rebalance: {} matched, {} moved, total {:.0}s",
            plan.matched,
            plan.moves.len(),
            plan.total_cost
        );
        Ok(results)
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn visit(&self, visit_id: &VisitId) -> Option<Visit> {
        self.lock().visits.get(visit_id).cloned()
    }

    pub fn visits_snapshot(&self) -> Vec<Visit> {
        let mut visits: Vec<Visit> = self.lock().visits.values().cloned().collect();
        visits.sort_by(|a, b| a.visit_id.cmp(&b.visit_id));
        visits
    }

    pub fn clinician(&self, clinician_id: &ClinicianId) -> Option<Clinician> {
        self.lock().clinicians.get(clinician_id).cloned()
    }

    pub fn roster(&self) -> Vec<Clinician> {
        let mut roster: Vec<Clinician> = self.lock().clinicians.values().cloned().collect();
        roster.sort_by(|a, b| a.clinician_id.cmp(&b.clinician_id));
        roster
    }

    pub fn current_load(&self, clinician_id: &ClinicianId) -> u32 {
        self.lock().ledger.current_load(clinician_id)
    }

    pub fn total_load(&self) -> u64 {
        self.lock().ledger.total_load()
    }

    pub fn average_active_load(&self) -> f64 {
        let guard = self.lock();
        let active: Vec<&ClinicianId> = guard
            .clinicians
            .values()
            .filter(|c| c.is_active())
            .map(|c| &c.clinician_id)
            .collect();
        guard.ledger.average_load(active)
    }

    pub fn waiting_visit_ids(&self) -> Vec<VisitId> {
        let mut ids: Vec<VisitId> = self
            .lock()
            .visits
            .values()
            .filter(|v| v.status == VisitStatus::Waiting)
            .map(|v| v.visit_id.clone())
            .collect();
        ids.sort();
        ids
    }

    // ── Store pass-throughs for tests and tooling ──────────────

    pub fn store_event_count(&self, event_type: Option<&str>) -> EngineResult<i64> {
        self.lock().store.event_count(event_type)
    }

    pub fn store_assignment_count(&self, kind: Option<&str>) -> EngineResult<i64> {
        self.lock().store.assignment_count(kind)
    }

    pub fn store_visit_count(&self, status: VisitStatus) -> EngineResult<i64> {
        self.lock().store.visit_count_by_status(status)
    }

    pub fn store_visit(&self, visit_id: &VisitId) -> EngineResult<Option<Visit>> {
        self.lock().store.load_visit(visit_id)
    }

    pub fn store_clinician_load(&self, clinician_id: &ClinicianId) -> EngineResult<Option<i64>> {
        self.lock().store.clinician_load(clinician_id)
    }
}
