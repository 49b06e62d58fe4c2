//! Database migrations for the clinic data layer.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_01_05_090000_create_patients;
mod m2026_01_05_090100_create_doctors;
mod m2026_01_05_090200_create_appointments;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_01_05_090000_create_patients::Migration),
            Box::new(m2026_01_05_090100_create_doctors::Migration),
            Box::new(m2026_01_05_090200_create_appointments::Migration),
        ]
    }
}
