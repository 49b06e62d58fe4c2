//! Doctor entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

use super::appointment::Entity as Appointment;
use crate::entity::{EntityDescriptor, EntityKey, UNASSIGNED_KEY};

/// Doctor practicing at the clinic
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "doctors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Full display name, unique across doctors
    pub full_name: String,

    pub specialty: String,

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
    pub fn new(full_name: impl Into<String>, specialty: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_KEY,
            full_name: full_name.into(),
            specialty: specialty.into(),
            appointments: Vec::new(),
        }
    }
}
