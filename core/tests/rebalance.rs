//! Batch rebalancer tests — global re-optimization, diff-only
//! application, emergency exclusion, and the infeasible no-op.

use chrono::Utc;
use triage_core::{
    clinician::{Availability, Clinician},
    config::EngineConfig,
    engine::{AssignmentEngine, TriageCompletion},
    error::EngineError,
    store::TriageStore,
    visit::{Patient, Priority, VisitStatus},
};

fn clinician(id: &str, specialty: &str) -> Clinician {
    Clinician::new(id, format!("Dr. {id}"), specialty)
}

fn patient(id: &str) -> Patient {
    Patient {
        patient_id: id.to_string(),
        name: format!("Patient {id}"),
    }
}

fn build_engine(config: EngineConfig) -> AssignmentEngine {
    let store = TriageStore::in_memory().unwrap();
    store.migrate().unwrap();
    AssignmentEngine::new(config, store)
}

/// Mismatches cost less than queueing: the config under which spreading
/// beats stacking.
fn cheap_mismatch_config() -> EngineConfig {
    EngineConfig {
        mismatch_penalty_secs: 300.0,
        load_penalty_weight_secs: 0.0,
        default_service_time_secs: 1_200.0,
        shift_threshold_secs: 1_800,
        shift_penalty_secs: 0.0,
        max_parallel_waiting: 3,
        churn_bias_secs: 1.0,
    }
}

fn triage(engine: &AssignmentEngine, specialty: &str, priority: Priority, n: usize) -> Vec<String> {
    let now = Utc::now();
    (0..n)
        .map(|i| {
            let visit = engine
                .check_in(patient(&format!("p-{i}")), "presenting complaint", now)
                .unwrap();
            let _ = engine.complete_triage(
                TriageCompletion {
                    visit_id: visit.visit_id.clone(),
                    required_specialty: Some(specialty.to_string()),
                    priority,
                    arrived_at: now,
                },
                now,
            );
            visit.visit_id
        })
        .collect()
}

/// Two visits stacked on the only clinician spread out when an idle
/// mismatched clinician appears and the mismatch is cheaper than the
/// queue. Exactly one visit moves; the other is untouched.
#[test]
fn stacked_visits_spread_to_idle_clinician() {
    let engine = build_engine(cheap_mismatch_config());
    engine.upsert_clinician(clinician("M", "Cardiology")).unwrap();

    let visit_ids = triage(&engine, "Cardiology", Priority::Normal, 2);
    assert_eq!(engine.current_load(&"M".to_string()), 2);

    engine.upsert_clinician(clinician("N", "Neurology")).unwrap();
    let moves = engine.rebalance(Utc::now()).unwrap();

    assert_eq!(moves.len(), 1, "exactly one visit should move");
    assert_eq!(moves[0].clinician_id.as_deref(), Some("N"));
    assert_eq!(engine.current_load(&"M".to_string()), 1);
    assert_eq!(engine.current_load(&"N".to_string()), 1);

    // The other visit kept its original clinician.
    let still_on_m = visit_ids
        .iter()
        .filter(|id| engine.visit(id).unwrap().assigned_clinician.as_deref() == Some("M"))
        .count();
    assert_eq!(still_on_m, 1);

    assert_eq!(engine.store_assignment_count(Some("rebalance")).unwrap(), 1);
    assert_eq!(engine.store_event_count(Some("visit_reassigned")).unwrap(), 1);
}

/// An already-optimal spread produces zero moves — equal-cost swaps must
/// not churn.
#[test]
fn optimal_assignment_left_untouched() {
    let engine = build_engine(EngineConfig::default_test());
    engine.upsert_clinician(clinician("A", "Cardiology")).unwrap();
    engine.upsert_clinician(clinician("B", "Cardiology")).unwrap();

    triage(&engine, "Cardiology", Priority::Normal, 2);
    assert_eq!(engine.current_load(&"A".to_string()), 1);
    assert_eq!(engine.current_load(&"B".to_string()), 1);

    let moves = engine.rebalance(Utc::now()).unwrap();
    assert!(moves.is_empty(), "no move should happen, got {}", moves.len());
    assert_eq!(engine.current_load(&"A".to_string()), 1);
    assert_eq!(engine.current_load(&"B".to_string()), 1);
    assert_eq!(engine.store_assignment_count(Some("rebalance")).unwrap(), 0);
}

/// Emergency visits are excluded from the batch and never revisited,
/// even when a better-matched clinician has since appeared.
#[test]
fn emergency_visits_never_rebalanced() {
    let engine = build_engine(EngineConfig::default_test());
    engine.upsert_clinician(clinician("M", "Cardiology")).unwrap();

    let visit_ids = triage(&engine, "Neurology", Priority::Emergency, 1);
    assert_eq!(
        engine.visit(&visit_ids[0]).unwrap().assigned_clinician.as_deref(),
        Some("M")
    );

    engine.upsert_clinician(clinician("N", "Neurology")).unwrap();
    let moves = engine.rebalance(Utc::now()).unwrap();

    assert!(moves.is_empty());
    assert_eq!(
        engine.visit(&visit_ids[0]).unwrap().assigned_clinician.as_deref(),
        Some("M"),
        "emergency assignment must stay put"
    );
}

/// Zero active clinicians with waiting visits: InfeasibleBatch, and all
/// prior assignments survive.
#[test]
fn infeasible_batch_preserves_assignments() {
    let engine = build_engine(EngineConfig::default_test());
    engine.upsert_clinician(clinician("M", "Cardiology")).unwrap();

    let visit_ids = triage(&engine, "Cardiology", Priority::Normal, 1);
    engine
        .set_availability(&"M".to_string(), Availability::Offline, Utc::now())
        .unwrap();

    let result = engine.rebalance(Utc::now());
    assert!(matches!(result, Err(EngineError::InfeasibleBatch { .. })));

    let visit = engine.visit(&visit_ids[0]).unwrap();
    assert_eq!(visit.assigned_clinician.as_deref(), Some("M"));
    assert_eq!(engine.current_load(&"M".to_string()), 1);
    assert_eq!(
        engine.store_event_count(Some("rebalance_infeasible")).unwrap(),
        1
    );
}

/// Waiting visits assigned to a clinician that went off-roster migrate
/// to an active one on the next rebalance.
#[test]
fn rebalance_moves_visits_off_inactive_clinician() {
    let engine = build_engine(EngineConfig::default_test());
    engine.upsert_clinician(clinician("M", "Cardiology")).unwrap();

    let visit_ids = triage(&engine, "Cardiology", Priority::Normal, 1);
    engine
        .set_availability(&"M".to_string(), Availability::OnBreak, Utc::now())
        .unwrap();
    engine.upsert_clinician(clinician("N", "Cardiology")).unwrap();

    let moves = engine.rebalance(Utc::now()).unwrap();
    assert_eq!(moves.len(), 1);
    assert_eq!(
        engine.visit(&visit_ids[0]).unwrap().assigned_clinician.as_deref(),
        Some("N")
    );
    // Net move: decrement old, increment new.
    assert_eq!(engine.current_load(&"M".to_string()), 0);
    assert_eq!(engine.current_load(&"N".to_string()), 1);
    assert_eq!(engine.total_load(), 1);
}

/// A visit left unassigned by NoAvailableClinician is picked up by the
/// next rebalance once capacity exists.
#[test]
fn unassigned_waiting_visit_picked_up() {
    let engine = build_engine(EngineConfig::default_test());

    let visit_ids = triage(&engine, "Cardiology", Priority::Normal, 1);
    assert_eq!(engine.visit(&visit_ids[0]).unwrap().assigned_clinician, None);

    engine.upsert_clinician(clinician("A", "Cardiology")).unwrap();
    let moves = engine.rebalance(Utc::now()).unwrap();

    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].clinician_id.as_deref(), Some("A"));
    assert_eq!(engine.current_load(&"A".to_string()), 1);
}

/// More waiting visits than slots: only slot-many get matched, the rest
/// keep their (non-)assignment.
#[test]
fn slot_capacity_bounds_the_matching() {
    let mut config = EngineConfig::default_test();
    config.max_parallel_waiting = 1;
    let engine = build_engine(config);

    // Three unassigned waiting visits, then one clinician appears.
    triage(&engine, "Cardiology", Priority::Normal, 3);
    engine.upsert_clinician(clinician("A", "Cardiology")).unwrap();

    let moves = engine.rebalance(Utc::now()).unwrap();
    assert_eq!(moves.len(), 1, "one slot, one match");
    assert_eq!(engine.current_load(&"A".to_string()), 1);

    let assigned = engine
        .visits_snapshot()
        .iter()
        .filter(|v| v.assigned_clinician.is_some())
        .count();
    assert_eq!(assigned, 1);
}

/// Rebalancing with no waiting visits is a quiet no-op, not an error.
#[test]
fn empty_queue_is_not_infeasible() {
    let engine = build_engine(EngineConfig::default_test());
    let moves = engine.rebalance(Utc::now()).unwrap();
    assert!(moves.is_empty());
}

/// Slot pricing spreads a burst across clinicians instead of stacking
/// everything on the cheapest one.
#[test]
fn burst_spreads_across_matching_clinicians() {
    let engine = build_engine(EngineConfig::default_test());

    // Four unassigned visits, then two cardiologists appear.
    triage(&engine, "Cardiology", Priority::Normal, 4);
    engine.upsert_clinician(clinician("A", "Cardiology")).unwrap();
    engine.upsert_clinician(clinician("B", "Cardiology")).unwrap();

    let moves = engine.rebalance(Utc::now()).unwrap();
    assert_eq!(moves.len(), 4);
    assert_eq!(engine.current_load(&"A".to_string()), 2);
    assert_eq!(engine.current_load(&"B".to_string()), 2);

    let waiting = engine.visit(&engine.waiting_visit_ids()[0]).unwrap();
    assert_eq!(waiting.status, VisitStatus::Waiting);
}
