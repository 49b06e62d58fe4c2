//! Patient entity model
//!
//! This module contains the SeaORM entity model for the patients table.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

use super::appointment::Entity as Appointment;
use crate::entity::{EntityDescriptor, EntityKey, UNASSIGNED_KEY};

/// Patient registered with the clinic
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "patients")]
pub struct Model {
    /// Store-generated identifier (primary key)
    #[sea_orm(primary_key)]
    pub id: i32,

    pub first_name: String,

    pub last_name: String,

    /// Contact email address (optional)
    pub email: Option<String>,

    /// Contact phone number (optional)
    pub phone: Option<String>,

    /// Appointments of this patient, filled only when eagerly included
    #[sea_orm(ignore)]
    pub appointments: Vec<super::appointment::Model>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "Appointment")]
    Appointment,
}

impl Related<Appointment> for Entity {
    fn to() -> RelationDef {
        Relation::Appointment.def()
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
    /// Creates a patient that has not been stored yet.
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_KEY,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            phone: None,
            appointments: Vec::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Display name in "First Last" form.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
