//! # Clinic Data Library
//!
//! A generic data-access layer over SeaORM: one repository type serves every
//! entity with a single integer key, while a shared [`session::Session`]
//! tracks loaded and registered instances and writes their changes in one
//! transaction on commit.
//!
//! ```no_run
//! use clinic_data::{models::patient, repositories::GenericRepository, session::Session};
//! # async fn demo(db: sea_orm::DatabaseConnection) -> anyhow::Result<()> {
//! let session = Session::new(db);
//! let patients = GenericRepository::<patient::Entity>::new(&session);
//!
//! let ada = patients.create(patient::Model::new("Ada", "Lovelace"))?;
//! session.commit().await?;
//! assert_ne!(ada.read().id, 0);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod models;
pub mod repositories;
pub mod seeds;
pub mod session;
pub mod telemetry;
pub use migration;
