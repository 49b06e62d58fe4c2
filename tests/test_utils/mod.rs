//! Test utilities for database testing.
//!
//! This module provides utilities for setting up in-memory SQLite databases
//! with migrations applied, plus small fixtures shared by the integration
//! tests.

use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};
use clinic_data::models::{doctor, patient};
use clinic_data::repositories::GenericRepository;
use clinic_data::session::Session;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

/// Sets up an in-memory SQLite database with all migrations applied.
///
/// The pool is pinned to a single connection so every query sees the same
/// in-memory database. Foreign keys are enforced.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    Migrator::up(&db, None).await?;

    Ok(db)
}

/// Sets up a migrated database and opens a session on it.
#[allow(dead_code)]
pub async fn setup_session() -> Result<Session> {
    let db = setup_test_db().await?;
    Ok(Session::new(db))
}

/// Opens a second session over the same connection pool.
#[allow(dead_code)]
pub fn sibling_session(session: &Session) -> Session {
    Session::new(session.connection().clone())
}

/// Inserts and commits a patient, returning the stored values.
#[allow(dead_code)]
pub async fn insert_patient(session: &Session, first: &str, last: &str) -> Result<patient::Model> {
    let repo = GenericRepository::<patient::Entity>::new(session);
    let tracked = repo.create(patient::Model::new(first, last))?;
    session.commit().await?;
    Ok(tracked.snapshot())
}

/// Inserts and commits a doctor, returning the stored values.
#[allow(dead_code)]
pub async fn insert_doctor(session: &Session, name: &str, specialty: &str) -> Result<doctor::Model> {
    let repo = GenericRepository::<doctor::Entity>::new(session);
    let tracked = repo.create(doctor::Model::new(name, specialty))?;
    session.commit().await?;
    Ok(tracked.snapshot())
}

/// A fixed whole-second timestamp on 2026-03-02, `hour` o'clock UTC.
#[allow(dead_code)]
pub fn at_hour(hour: u32) -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0)
        .single()
        .ok_or_else(|| anyhow!("invalid hour {hour}"))
}
