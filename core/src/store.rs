//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! The engine calls store methods — it never executes SQL directly.
//! The in-memory engine state is authoritative; these tables are the
//! durable mirror plus the append-only audit trail.

use crate::{
    clinician::{Availability, Clinician},
    cost::CostBreakdown,
    error::{EngineError, EngineResult},
    event::EventLogEntry,
    types::{ClinicianId, VisitId},
    visit::{Patient, Priority, Visit, VisitStatus},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub struct TriageStore {
    conn: Connection,
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn opt_ts(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(ts)
}

fn parse_ts(raw: &str) -> EngineResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| EngineError::Other(anyhow::anyhow!("bad timestamp '{raw}': {e}")))
}

fn parse_opt_ts(raw: Option<String>) -> EngineResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

impl TriageStore {
    /// Open (or create) the engine database at `path`.
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: better concurrent read performance (ignored for :memory:).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Clinician roster ───────────────────────────────────────

    pub fn upsert_clinician(&self, clinician: &Clinician, current_load: u32) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO clinician
                 (clinician_id, name, specialty, availability,
                  average_service_secs, shift_end, current_load)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(clinician_id) DO UPDATE SET
                 name = excluded.name,
                 specialty = excluded.specialty,
                 availability = excluded.availability,
                 average_service_secs = excluded.average_service_secs,
                 shift_end = excluded.shift_end,
                 current_load = excluded.current_load",
            params![
                clinician.clinician_id,
                clinician.name,
                clinician.specialty,
                clinician.availability.as_str(),
                clinician.average_service_time_secs,
                opt_ts(clinician.shift_end),
                current_load as i64,
            ],
        )?;
        Ok(())
    }

    pub fn update_availability(
        &self,
        clinician_id: &ClinicianId,
        availability: Availability,
    ) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE clinician SET availability = ?2 WHERE clinician_id = ?1",
            params![clinician_id, availability.as_str()],
        )?;
        Ok(())
    }

    pub fn update_clinician_load(
        &self,
        clinician_id: &ClinicianId,
        current_load: u32,
    ) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE clinician SET current_load = ?2 WHERE clinician_id = ?1",
            params![clinician_id, current_load as i64],
        )?;
        Ok(())
    }

    pub fn clinician_load(&self, clinician_id: &ClinicianId) -> EngineResult<Option<i64>> {
        let load = self
            .conn
            .query_row(
                "SELECT current_load FROM clinician WHERE clinician_id = ?1",
                params![clinician_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(load)
    }

    pub fn clinician_count(&self) -> EngineResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM clinician", [], |row| row.get(0))?;
        Ok(count)
    }

    // ── Visits ─────────────────────────────────────────────────

    pub fn insert_visit(&self, visit: &Visit) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO visit
                 (visit_id, patient_id, patient_name, status, priority, complaint,
                  required_specialty, assigned_clinician, arrived_at, triaged_at,
                  consult_started_at, consult_ended_at, transcript, summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                visit.visit_id,
                visit.patient.patient_id,
                visit.patient.name,
                visit.status.as_str(),
                visit.priority.as_str(),
                visit.complaint,
                visit.required_specialty,
                visit.assigned_clinician,
                ts(visit.arrived_at),
                opt_ts(visit.triaged_at),
                opt_ts(visit.consult_started_at),
                opt_ts(visit.consult_ended_at),
                visit.transcript,
                visit.summary,
            ],
        )?;
        Ok(())
    }

    /// Full-row mirror update after a lifecycle transition.
    pub fn update_visit(&self, visit: &Visit) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE visit SET
                 status = ?2, priority = ?3, complaint = ?4,
                 required_specialty = ?5, assigned_clinician = ?6,
                 arrived_at = ?7, triaged_at = ?8, consult_started_at = ?9,
                 consult_ended_at = ?10, transcript = ?11, summary = ?12
             WHERE visit_id = ?1",
            params![
                visit.visit_id,
                visit.status.as_str(),
                visit.priority.as_str(),
                visit.complaint,
                visit.required_specialty,
                visit.assigned_clinician,
                ts(visit.arrived_at),
                opt_ts(visit.triaged_at),
                opt_ts(visit.consult_started_at),
                opt_ts(visit.consult_ended_at),
                visit.transcript,
                visit.summary,
            ],
        )?;
        Ok(())
    }

    pub fn load_visit(&self, visit_id: &VisitId) -> EngineResult<Option<Visit>> {
        let row = self
            .conn
            .query_row(
                "SELECT visit_id, patient_id, patient_name, status, priority, complaint,
                        required_specialty, assigned_clinician, arrived_at, triaged_at,
                        consult_started_at, consult_ended_at, transcript, summary
                 FROM visit WHERE visit_id = ?1",
                params![visit_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, String>(8)?,
                        row.get::<_, Option<String>>(9)?,
                        row.get::<_, Option<String>>(10)?,
                        row.get::<_, Option<String>>(11)?,
                        row.get::<_, Option<String>>(12)?,
                        row.get::<_, Option<String>>(13)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            visit_id,
            patient_id,
            patient_name,
            status,
            priority,
            complaint,
            required_specialty,
            assigned_clinician,
            arrived_at,
            triaged_at,
            consult_started_at,
            consult_ended_at,
            transcript,
            summary,
        )) = row
        else {
            return Ok(None);
        };

        let status = VisitStatus::parse(&status)
            .ok_or_else(|| EngineError::Other(anyhow::anyhow!("bad visit status '{status}'")))?;
        let priority = Priority::parse(&priority)
            .ok_or_else(|| EngineError::Other(anyhow::anyhow!("bad priority '{priority}'")))?;

        Ok(Some(Visit {
            visit_id,
            patient: Patient {
                patient_id,
                name: patient_name,
            },
            status,
            priority,
            complaint,
            required_specialty,
            assigned_clinician,
            arrived_at: parse_ts(&arrived_at)?,
            triaged_at: parse_opt_ts(triaged_at)?,
            consult_started_at: parse_opt_ts(consult_started_at)?,
            consult_ended_at: parse_opt_ts(consult_ended_at)?,
            transcript,
            summary,
        }))
    }

    pub fn visit_count_by_status(&self, status: VisitStatus) -> EngineResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM visit WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (component, event_type, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.component,
                entry.event_type,
                entry.payload,
                ts(entry.recorded_at),
            ],
        )?;
        Ok(())
    }

    pub fn event_count(&self, event_type: Option<&str>) -> EngineResult<i64> {
        let count = match event_type {
            Some(t) => self.conn.query_row(
                "SELECT COUNT(*) FROM event_log WHERE event_type = ?1",
                params![t],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    // ── Assignment audit log ───────────────────────────────────

    pub fn append_assignment(
        &self,
        visit_id: &VisitId,
        clinician_id: Option<&ClinicianId>,
        kind: &str,
        breakdown: &CostBreakdown,
        decided_at: DateTime<Utc>,
    ) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO assignment_log
                 (visit_id, clinician_id, kind, mismatch_cost, wait_cost,
                  load_cost, shift_cost, total_cost, decided_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                visit_id,
                clinician_id,
                kind,
                breakdown.mismatch,
                breakdown.wait,
                breakdown.load,
                breakdown.shift,
                breakdown.total,
                ts(decided_at),
            ],
        )?;
        Ok(())
    }

    pub fn assignment_count(&self, kind: Option<&str>) -> EngineResult<i64> {
        let count = match kind {
            Some(k) => self.conn.query_row(
                "SELECT COUNT(*) FROM assignment_log WHERE kind = ?1",
                params![k],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM assignment_log", [], |row| row.get(0))?,
        };
        Ok(count)
    }
}
