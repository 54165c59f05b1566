//! triage-runner: headless driver for the assignment engine.
//!
//! Usage:
//!   triage-runner --seed 12345 --patients 200 --db run.db
//!   triage-runner --config engine.json --rebalance-every 10
//!
//! Plays the external collaborators: seeds a roster, feeds triaged
//! arrivals, fires periodic rebalances, and completes consultations.
//! Contains no assignment logic of its own.

mod arrivals;

use anyhow::Result;
use arrivals::ArrivalGenerator;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::env;
use triage_core::{
    clinician::Clinician,
    config::EngineConfig,
    engine::{AssignmentEngine, TriageCompletion},
    error::EngineError,
    store::TriageStore,
    types::{ClinicianId, VisitId},
    visit::{Patient, VisitStatus},
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let patients = parse_arg(&args, "--patients", 200u64);
    let rebalance_every = parse_arg(&args, "--rebalance-every", 10u64).max(1);
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let config = match args.windows(2).find(|w| w[0] == "--config") {
        Some(w) => EngineConfig::load(&w[1])?,
        None => EngineConfig::default(),
    };

    println!("triage-runner");
    println!("  seed:     {seed}");
    println!("  patients: {patients}");
    println!("  db:       {db}");
    println!();

    let store = if db == ":memory:" {
        TriageStore::in_memory()?
    } else {
        TriageStore::open(db)?
    };
    store.migrate()?;
    let engine = AssignmentEngine::new(config, store);

    let mut now = Utc::now();
    seed_roster(&engine, now)?;

    let mut gen = ArrivalGenerator::new(seed);
    // Consultations underway, oldest first, with the owning clinician.
    let mut in_consult: Vec<(VisitId, ClinicianId)> = Vec::new();

    for i in 0..patients {
        let arrival = gen.next_arrival();
        now += Duration::seconds(arrival.gap_secs);

        let visit = engine.check_in(
            Patient {
                patient_id: gen.patient_id(),
                name: arrival.patient_name.clone(),
            },
            &arrival.complaint,
            now,
        )?;

        let completion = TriageCompletion {
            visit_id: visit.visit_id.clone(),
            required_specialty: Some(arrival.specialty.clone()),
            priority: arrival.priority,
            arrived_at: now,
        };
        match engine.complete_triage(completion, now) {
            Ok(decision) => {
                if let Some(clinician_id) = &decision.clinician_id {
                    log::info!(
                        "{} -> {} (total {:.0}s, {}us)",
                        visit.visit_id,
                        clinician_id,
                        decision.breakdown.total,
                        decision.decision_micros
                    );
                }
            }
            Err(EngineError::NoAvailableClinician) => {
                log::warn!("visit {} left waiting: no active clinician", visit.visit_id);
            }
            Err(e) => return Err(e.into()),
        }

        // Drain: finish the oldest consultation once a few are running,
        // then call the next waiting patient in.
        if in_consult.len() >= 3 {
            let (visit_id, _) = in_consult.remove(0);
            engine.complete_visit(&visit_id, now)?;
        }
        call_in_next(&engine, &mut in_consult, now)?;

        if (i + 1) % rebalance_every == 0 {
            match engine.rebalance(now) {
                Ok(moves) if !moves.is_empty() => {
                    log::info!("rebalance moved {} visits", moves.len());
                }
                Ok(_) => {}
                Err(EngineError::InfeasibleBatch { reason }) => {
                    log::warn!("rebalance infeasible: {reason}");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    print_summary(&engine)?;
    Ok(())
}

fn seed_roster(engine: &AssignmentEngine, now: DateTime<Utc>) -> Result<()> {
    let roster = [
        ("c-01", "Dr. Asha Rao", "Cardiology", Some(840.0)),
        ("c-02", "Dr. Ben Ortiz", "Cardiology", None),
        ("c-03", "Dr. Chloe Park", "Neurology", Some(1_080.0)),
        ("c-04", "Dr. Dan Weiss", "Orthopedics", Some(720.0)),
        ("c-05", "Dr. Emeka Obi", "Pediatrics", None),
        ("c-06", "Dr. Farah Khan", "Endocrinology", Some(960.0)),
        ("c-07", "Dr. Greg Liu", "General Medicine", Some(600.0)),
    ];
    for (id, name, specialty, avg) in roster {
        let mut clinician = Clinician::new(id, name, specialty);
        clinician.average_service_time_secs = avg;
        clinician.shift_end = Some(now + Duration::hours(8));
        engine.upsert_clinician(clinician)?;
    }
    Ok(())
}

/// Call in the first waiting assigned patient whose clinician is free.
fn call_in_next(
    engine: &AssignmentEngine,
    in_consult: &mut Vec<(VisitId, ClinicianId)>,
    now: DateTime<Utc>,
) -> Result<()> {
    let busy: HashSet<&ClinicianId> = in_consult.iter().map(|(_, c)| c).collect();
    let mut next = None;
    for visit in engine.visits_snapshot() {
        if visit.status != VisitStatus::Waiting {
            continue;
        }
        let Some(clinician_id) = visit.assigned_clinician.clone() else {
            continue;
        };
        if busy.contains(&clinician_id) {
            continue;
        }
        next = Some((visit.visit_id, clinician_id));
        break;
    }
    if let Some((visit_id, clinician_id)) = next {
        engine.start_consultation(&visit_id, &clinician_id, now)?;
        in_consult.push((visit_id, clinician_id));
    }
    Ok(())
}

fn print_summary(engine: &AssignmentEngine) -> Result<()> {
    let roster = engine.roster();

    println!();
    println!("— roster —");
    for c in &roster {
        println!(
            "  {:6} {:22} {:16} load {}",
            c.clinician_id,
            c.name,
            c.specialty,
            engine.current_load(&c.clinician_id)
        );
    }

    println!("— visits —");
    for status in [
        VisitStatus::Waiting,
        VisitStatus::InConsultation,
        VisitStatus::Completed,
    ] {
        println!(
            "  {:16} {}",
            status.as_str(),
            engine.store_visit_count(status)?
        );
    }

    println!("— assignments —");
    for kind in ["greedy", "emergency", "rebalance"] {
        println!(
            "  {:10} {}",
            kind,
            engine.store_assignment_count(Some(kind))?
        );
    }

    let specialties: HashMap<&ClinicianId, &str> = roster
        .iter()
        .map(|c| (&c.clinician_id, c.specialty.as_str()))
        .collect();
    let mut assigned = 0u64;
    let mut mismatched = 0u64;
    for visit in engine.visits_snapshot() {
        let Some(clinician_id) = &visit.assigned_clinician else {
            continue;
        };
        let Some(required) = &visit.required_specialty else {
            continue;
        };
        assigned += 1;
        if specialties
            .get(clinician_id)
            .is_some_and(|s| !s.eq_ignore_ascii_case(required))
        {
            mismatched += 1;
        }
    }
    if assigned > 0 {
        println!(
            "  mismatch rate: {:.1}% ({mismatched}/{assigned})",
            100.0 * mismatched as f64 / assigned as f64
        );
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
