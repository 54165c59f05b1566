//! Deterministic arrival generation for demo runs.
//!
//! All randomness flows through one Pcg64Mcg stream seeded from the CLI,
//! so a given seed always produces the same patient sequence. This is
//! the demo stand-in for the real intake/triage collaborators.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use triage_core::visit::Priority;

/// One triaged patient arrival.
pub struct Arrival {
    pub patient_name: String,
    pub complaint: String,
    pub specialty: String,
    pub priority: Priority,
    /// Seconds since the previous arrival.
    pub gap_secs: i64,
}

pub struct ArrivalGenerator {
    rng: Pcg64Mcg,
    counter: u64,
}

impl ArrivalGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg64Mcg::seed_from_u64(seed),
            counter: 0,
        }
    }

    fn next_u64_below(&mut self, n: u64) -> u64 {
        self.rng.next_u64() % n
    }

    fn next_f64(&mut self) -> f64 {
        (self.rng.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    pub fn next_arrival(&mut self) -> Arrival {
        self.counter += 1;

        let first = FIRST_NAMES[self.next_u64_below(FIRST_NAMES.len() as u64) as usize];
        let last = LAST_NAMES[self.next_u64_below(LAST_NAMES.len() as u64) as usize];

        let (complaint, specialty) =
            COMPLAINTS[self.next_u64_below(COMPLAINTS.len() as u64) as usize];

        let roll = self.next_f64();
        let priority = if roll < 0.05 {
            Priority::Emergency
        } else if roll < 0.30 {
            Priority::Priority
        } else {
            Priority::Normal
        };

        Arrival {
            patient_name: format!("{first} {last}"),
            complaint: complaint.to_string(),
            specialty: specialty.to_string(),
            priority,
            gap_secs: 30 + self.next_u64_below(600) as i64,
        }
    }

    /// Stable per-run patient id for the current arrival.
    pub fn patient_id(&self) -> String {
        format!("patient-{:05}", self.counter)
    }
}

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "Michael", "Jennifer", "David", "Linda", "William",
    "Elizabeth", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah", "Daniel", "Karen",
    "Matthew", "Lisa", "Anthony", "Nancy", "Mark", "Betty", "Steven", "Sandra", "Andrew",
    "Ashley", "Joshua", "Emily", "Kenneth", "Donna", "Kevin", "Michelle", "Brian", "Carol",
    "George", "Amanda", "Timothy", "Melissa",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
    "Clark", "Ramirez", "Lewis", "Robinson", "Walker", "Young", "Allen", "King", "Wright",
    "Scott", "Torres", "Nguyen", "Hill", "Flores",
];

/// Presenting complaint with the specialty it triages to.
const COMPLAINTS: &[(&str, &str)] = &[
    ("chest pain on exertion", "Cardiology"),
    ("palpitations and dizziness", "Cardiology"),
    ("recurring migraine", "Neurology"),
    ("numbness in left arm", "Neurology"),
    ("knee pain after fall", "Orthopedics"),
    ("lower back pain", "Orthopedics"),
    ("persistent cough in child", "Pediatrics"),
    ("fever and rash", "Pediatrics"),
    ("fatigue and weight change", "Endocrinology"),
    ("elevated blood sugar", "Endocrinology"),
    ("seasonal flu symptoms", "General Medicine"),
    ("routine follow-up", "General Medicine"),
];
