//! Emergency fast-path tests — candidate subset, specialty preference,
//! and the least-loaded fallback.

use chrono::Utc;
use triage_core::{
    clinician::{Availability, Clinician},
    emergency,
    engine::{AssignmentEngine, TriageCompletion},
    error::EngineError,
    ledger::LoadLedger,
    visit::{Patient, Priority},
};

fn clinician(id: &str, specialty: &str) -> Clinician {
    Clinician::new(id, format!("Dr. {id}"), specialty)
}

fn cardiology_roster() -> Vec<Clinician> {
    vec![
        clinician("A", "Cardiology"),
        clinician("B", "Cardiology"),
        clinician("C", "Neurology"),
    ]
}

/// Loads [A=0, B=2, C=0], Cardiology requirement: the candidate subset
/// is {A, C} (at/below average 0.67) and A is the specialty match.
#[test]
fn below_average_specialty_match_preferred() {
    let roster = cardiology_roster();
    let mut ledger = LoadLedger::new();
    ledger.increment(&"B".to_string());
    ledger.increment(&"B".to_string());

    let chosen = emergency::pick(Some("Cardiology"), roster.iter(), &ledger).unwrap();
    assert_eq!(chosen, "A");
}

/// No specialty match in the subset: the least-loaded candidate takes
/// the case regardless of specialty.
#[test]
fn falls_back_to_least_loaded_any_specialty() {
    let roster = cardiology_roster();
    let mut ledger = LoadLedger::new();
    ledger.increment(&"A".to_string());
    ledger.increment(&"B".to_string());
    ledger.increment(&"B".to_string());
    ledger.increment(&"B".to_string());

    // Average is 4/3; subset = {A(1), C(0)}. Nobody does Endocrinology,
    // so the idle C wins.
    let chosen = emergency::pick(Some("Endocrinology"), roster.iter(), &ledger).unwrap();
    assert_eq!(chosen, "C");
}

/// Equal loads put every active clinician in the subset; specialty
/// preference still applies.
#[test]
fn equal_loads_keep_all_candidates() {
    let roster = cardiology_roster();
    let mut ledger = LoadLedger::new();
    for id in ["A", "B", "C"] {
        ledger.increment(&id.to_string());
    }

    let chosen = emergency::pick(Some("Neurology"), roster.iter(), &ledger).unwrap();
    assert_eq!(chosen, "C");
}

/// The busiest clinician is never chosen while a specialty match exists
/// in the at-or-below-average subset.
#[test]
fn overloaded_match_not_chosen() {
    let roster = cardiology_roster();
    let mut ledger = LoadLedger::new();
    for _ in 0..4 {
        ledger.increment(&"B".to_string());
    }

    let chosen = emergency::pick(Some("Cardiology"), roster.iter(), &ledger).unwrap();
    assert_eq!(chosen, "A", "B is above average and must not be picked");
}

/// Failure mode matches the greedy path: no active clinicians.
#[test]
fn no_active_clinician_errors() {
    let mut roster = cardiology_roster();
    for c in &mut roster {
        c.availability = Availability::Offline;
    }

    let result = emergency::pick(Some("Cardiology"), roster.iter(), &LoadLedger::new());
    assert!(matches!(result, Err(EngineError::NoAvailableClinician)));
}

/// Engine path: an Emergency triage bypasses the cost model, reports a
/// zeroed breakdown, and audits under the emergency kind.
#[test]
fn emergency_triage_bypasses_cost_model() {
    let engine = AssignmentEngine::build_test().unwrap();
    for c in cardiology_roster() {
        engine.upsert_clinician(c).unwrap();
    }
    let now = Utc::now();

    let visit = engine
        .check_in(
            Patient {
                patient_id: "p-911".to_string(),
                name: "Pat Crash".to_string(),
            },
            "collapsed at reception",
            now,
        )
        .unwrap();

    let decision = engine
        .complete_triage(
            TriageCompletion {
                visit_id: visit.visit_id.clone(),
                required_specialty: Some("Cardiology".to_string()),
                priority: Priority::Emergency,
                arrived_at: now,
            },
            now,
        )
        .unwrap();

    assert_eq!(decision.clinician_id.as_deref(), Some("A"));
    assert_eq!(decision.breakdown.total, 0.0);
    assert_eq!(decision.breakdown.mismatch, 0.0);
    assert_eq!(engine.store_assignment_count(Some("emergency")).unwrap(), 1);
    assert_eq!(engine.store_assignment_count(Some("greedy")).unwrap(), 0);
}
