//! Appointment entity model
//!
//! This module contains the SeaORM entity model for the appointments table.
//! An appointment belongs to exactly one patient and one doctor; both can be
//! eagerly loaded into the navigation fields through repository includes.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

use super::doctor::Entity as Doctor;
use super::patient::Entity as Patient;
use crate::entity::{EntityDescriptor, EntityKey, UNASSIGNED_KEY};

pub const STATUS_SCHEDULED: &str = "scheduled";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_CANCELLED: &str = "cancelled";

/// Appointment between a patient and a doctor
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "appointments")]
pub struct Model {
    /// Store-generated identifier (primary key)
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Patient attending the appointment
    pub patient_id: i32,

    /// Doctor holding the appointment
    pub doctor_id: i32,

    /// Start of the appointment
    pub scheduled_at: DateTimeUtc,

    /// Free-form reason for the visit (optional)
    pub reason: Option<String>,

    /// Lifecycle status (scheduled|completed|cancelled)
    pub status: String,

    /// Owning patient, filled only when eagerly included
    #[sea_orm(ignore)]
    pub patient: Option<super::patient::Model>,

    /// Owning doctor, filled only when eagerly included
    #[sea_orm(ignore)]
    pub doctor: Option<super::doctor::Model>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Patient",
        from = "Column::PatientId",
        to = "super::patient::Column::Id"
    )]
    Patient,
    #[sea_orm(
        belongs_to = "Doctor",
        from = "Column::DoctorId",
        to = "super::doctor::Column::Id"
    )]
    Doctor,
}

impl Related<Patient> for Entity {
    fn to() -> RelationDef {
        Relation::Patient.def()
    }
}

impl Related<Doctor> for Entity {
    fn to() -> RelationDef {
        Relation::Doctor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl EntityDescriptor for Entity {
    type Active = ActiveModel;

    fn key(model: &Model) -> EntityKey {
        model.id
    }
}

impl Model {
    /// Creates a scheduled appointment that has not been stored yet.
    pub fn new(patient_id: i32, doctor_id: i32, scheduled_at: DateTimeUtc) -> Self {
        Self {
            id: UNASSIGNED_KEY,
            patient_id,
            doctor_id,
            scheduled_at,
            reason: None,
            status: STATUS_SCHEDULED.to_string(),
            patient: None,
            doctor: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == STATUS_CANCELLED
    }
}
