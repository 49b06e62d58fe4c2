//! Doctor seeding functionality
//!
//! Seeds the doctors table through the generic repository so the same
//! session and commit path as application code is exercised.

use anyhow::Result;
use sea_orm::ColumnTrait;

use crate::models::doctor;
use crate::repositories::GenericRepository;
use crate::session::Session;

struct DoctorSeed {
    full_name: &'static str,
    specialty: &'static str,
}

const DOCTORS: [DoctorSeed; 4] = [
    DoctorSeed {
        full_name: "Amelia Hart",
        specialty: "General Practice",
    },
    DoctorSeed {
        full_name: "Rafael Ortiz",
        specialty: "Cardiology",
    },
    DoctorSeed {
        full_name: "Mei Tanaka",
        specialty: "Dermatology",
    },
    DoctorSeed {
        full_name: "Jonas Weber",
        specialty: "Pediatrics",
    },
];

/// Seeds the doctors table with the clinic's default staff
///
/// Doctors whose full name already exists are skipped, so running the seed
/// repeatedly is safe.
///
/// # Arguments
///
/// * `session` - Session whose pending changes are committed by this call
///
/// # Returns
///
/// Returns the number of doctors created
pub async fn seed_doctors(session: &Session) -> Result<usize> {
    let repo = GenericRepository::<doctor::Entity>::new(session);

    let names: Vec<&str> = DOCTORS.iter().map(|seed| seed.full_name).collect();
    let existing = repo
        .get_by_filter(doctor::Column::FullName.is_in(names), &[])
        .await?;

    let mut created = 0;
    for seed in &DOCTORS {
        if existing.iter().any(|d| d.read().full_name == seed.full_name) {
            log::info!("Doctor '{}' already exists, skipping", seed.full_name);
            continue;
        }

        log::info!("Creating doctor: {}", seed.full_name);
        repo.create(doctor::Model::new(seed.full_name, seed.specialty))?;
        created += 1;
    }

    let summary = session.commit().await?;
    log::info!("Doctor seeding finished, {} inserted", summary.inserted);
    Ok(created)
}
