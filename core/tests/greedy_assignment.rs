//! Greedy assigner tests — candidate selection, tie-breaking, and the
//! full engine wiring from triage completion to ledger and audit rows.

use chrono::Utc;
use triage_core::{
    clinician::{Availability, Clinician},
    config::EngineConfig,
    engine::{AssignmentEngine, TriageCompletion},
    error::EngineError,
    greedy,
    ledger::LoadLedger,
    visit::{Patient, Priority, VisitStatus},
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

fn patient(id: &str) -> Patient {
    Patient {
        patient_id: id.to_string(),
        name: format!("Patient {id}"),
    }
}

/// A(Cardiology, 0), B(Cardiology, 2), C(Neurology, 0); Cardiology
/// requirement goes to A: no mismatch, no wait, no load penalty.
#[test]
fn lowest_cost_specialty_match_wins() {
    let config = EngineConfig::default_test();
    let roster = cardiology_roster();
    let mut ledger = LoadLedger::new();
    ledger.increment(&"B".to_string());
    ledger.increment(&"B".to_string());

    let (chosen, breakdown) =
        greedy::pick(&config, Some("Cardiology"), roster.iter(), &ledger, Utc::now()).unwrap();

    assert_eq!(chosen, "A");
    assert_eq!(breakdown.total, 0.0, "A is idle and matched: zero cost");
}

/// No specialty match anywhere: the penalty applies equally, so the
/// least-loaded clinician wins, tie-broken by id.
#[test]
fn mismatch_everywhere_picks_least_loaded() {
    let config = EngineConfig::default_test();
    let roster = cardiology_roster();
    let mut ledger = LoadLedger::new();
    ledger.increment(&"B".to_string());
    ledger.increment(&"B".to_string());

    let (chosen, breakdown) =
        greedy::pick(&config, Some("Endocrinology"), roster.iter(), &ledger, Utc::now()).unwrap();

    // A and C are both idle; A has the lower id.
    assert_eq!(chosen, "A");
    assert_eq!(breakdown.mismatch, config.mismatch_penalty_secs);
}

/// Equal costs resolve to the lowest clinician id, deterministically.
#[test]
fn ties_break_by_lowest_id() {
    let config = EngineConfig::default_test();
    let roster = vec![clinician("B", "Cardiology"), clinician("A", "Cardiology")];
    let ledger = LoadLedger::new();

    for _ in 0..5 {
        let (chosen, _) =
            greedy::pick(&config, Some("Cardiology"), roster.iter(), &ledger, Utc::now()).unwrap();
        assert_eq!(chosen, "A");
    }
}

/// Only active clinicians are candidates; the choice is always drawn
/// from the active set.
#[test]
fn inactive_clinicians_excluded() {
    let config = EngineConfig::default_test();
    let mut roster = cardiology_roster();
    roster[0].availability = Availability::OnBreak;
    let mut ledger = LoadLedger::new();
    ledger.increment(&"B".to_string());
    ledger.increment(&"B".to_string());

    let (chosen, _) =
        greedy::pick(&config, Some("Cardiology"), roster.iter(), &ledger, Utc::now()).unwrap();

    // A is on break; busy-but-matched B still beats mismatched C.
    assert_eq!(chosen, "B");
    let active: Vec<_> = roster
        .iter()
        .filter(|c| c.is_active())
        .map(|c| c.clinician_id.clone())
        .collect();
    assert!(active.contains(&chosen));
}

/// Zero active clinicians fails with NoAvailableClinician.
#[test]
fn no_active_clinician_errors() {
    let config = EngineConfig::default_test();
    let mut roster = cardiology_roster();
    for c in &mut roster {
        c.availability = Availability::Offline;
    }

    let result = greedy::pick(
        &config,
        Some("Cardiology"),
        roster.iter(),
        &LoadLedger::new(),
        Utc::now(),
    );
    assert!(matches!(result, Err(EngineError::NoAvailableClinician)));
}

/// Full engine path: triage completion assigns, increments the ledger,
/// mirrors the visit, and writes audit rows.
#[test]
fn triage_completion_assigns_and_audits() {
    let engine = AssignmentEngine::build_test().unwrap();
    for c in cardiology_roster() {
        engine.upsert_clinician(c).unwrap();
    }
    let now = Utc::now();

    let visit = engine.check_in(patient("p-1"), "chest pain", now).unwrap();
    assert_eq!(visit.status, VisitStatus::Triage);

    let decision = engine
        .complete_triage(
            TriageCompletion {
                visit_id: visit.visit_id.clone(),
                required_specialty: Some("Cardiology".to_string()),
                priority: Priority::Normal,
                arrived_at: now,
            },
            now,
        )
        .unwrap();

    assert_eq!(decision.clinician_id.as_deref(), Some("A"));
    assert_eq!(decision.breakdown.total, 0.0);

    let stored = engine.visit(&visit.visit_id).unwrap();
    assert_eq!(stored.status, VisitStatus::Waiting);
    assert_eq!(stored.assigned_clinician.as_deref(), Some("A"));
    assert_eq!(engine.current_load(&"A".to_string()), 1);

    // Durable mirror and audit trail.
    assert_eq!(engine.store_clinician_load(&"A".to_string()).unwrap(), Some(1));
    assert_eq!(engine.store_assignment_count(Some("greedy")).unwrap(), 1);
    assert_eq!(
        engine.store_event_count(Some("clinician_assigned")).unwrap(),
        1
    );
    let mirrored = engine.store_visit(&visit.visit_id).unwrap().unwrap();
    assert_eq!(mirrored.status, VisitStatus::Waiting);
    assert_eq!(mirrored.assigned_clinician.as_deref(), Some("A"));
}

/// An empty specialty requirement is normalized to match-any and the
/// engine proceeds normally.
#[test]
fn blank_requirement_proceeds_as_match_any() {
    let engine = AssignmentEngine::build_test().unwrap();
    for c in cardiology_roster() {
        engine.upsert_clinician(c).unwrap();
    }
    let now = Utc::now();

    let visit = engine.check_in(patient("p-1"), "unclear intake", now).unwrap();
    let decision = engine
        .complete_triage(
            TriageCompletion {
                visit_id: visit.visit_id.clone(),
                required_specialty: Some("   ".to_string()),
                priority: Priority::Normal,
                arrived_at: now,
            },
            now,
        )
        .unwrap();

    assert!(decision.clinician_id.is_some());
    assert_eq!(decision.breakdown.mismatch, 0.0);
    let stored = engine.visit(&visit.visit_id).unwrap();
    assert_eq!(stored.required_specialty, None);
}

/// NoAvailableClinician leaves the visit Waiting(unassigned); a retry
/// succeeds once a clinician appears.
#[test]
fn failed_assignment_leaves_visit_waiting_and_retries() {
    let engine = AssignmentEngine::build_test().unwrap();
    let now = Utc::now();

    let visit = engine.check_in(patient("p-1"), "chest pain", now).unwrap();
    let result = engine.complete_triage(
        TriageCompletion {
            visit_id: visit.visit_id.clone(),
            required_specialty: Some("Cardiology".to_string()),
            priority: Priority::Normal,
            arrived_at: now,
        },
        now,
    );
    assert!(matches!(result, Err(EngineError::NoAvailableClinician)));

    let stored = engine.visit(&visit.visit_id).unwrap();
    assert_eq!(stored.status, VisitStatus::Waiting);
    assert_eq!(stored.assigned_clinician, None);
    assert_eq!(engine.store_event_count(Some("assignment_failed")).unwrap(), 1);

    engine.upsert_clinician(clinician("A", "Cardiology")).unwrap();
    let decision = engine.retry_assignment(&visit.visit_id, now).unwrap();
    assert_eq!(decision.clinician_id.as_deref(), Some("A"));
    assert_eq!(engine.current_load(&"A".to_string()), 1);
}
