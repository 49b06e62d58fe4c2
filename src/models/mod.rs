//! # Data Models
//!
//! SeaORM entities for the clinic schema. Each entity also implements
//! [`EntityDescriptor`](crate::entity::EntityDescriptor) so it can be handled
//! by the generic repository and the session.

pub mod appointment;
pub mod doctor;
pub mod patient;

pub use appointment::Entity as Appointment;
pub use doctor::Entity as Doctor;
pub use patient::Entity as Patient;
