//! Migration to create the appointments table.
//!
//! Appointments reference both a patient and a doctor. Deleting a patient
//! or doctor that still has appointments is rejected by the foreign keys.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Appointments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Appointments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Appointments::PatientId).integer().not_null())
                    .col(ColumnDef::new(Appointments::DoctorId).integer().not_null())
                    .col(
                        ColumnDef::new(Appointments::ScheduledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Appointments::Reason).text().null())
                    .col(
                        ColumnDef::new(Appointments::Status)
                            .text()
                            .not_null()
                            .default("scheduled"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appointments_patient_id")
                            .from(Appointments::Table, Appointments::PatientId)
                            .to(Patients::Table, Patients::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appointments_doctor_id")
                            .from(Appointments::Table, Appointments::DoctorId)
                            .to(Doctors::Table, Doctors::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_appointments_patient_id")
                    .table(Appointments::Table)
                    .col(Appointments::PatientId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_appointments_doctor_id")
                    .table(Appointments::Table)
                    .col(Appointments::DoctorId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Appointments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Appointments {
    Table,
    Id,
    PatientId,
    DoctorId,
    ScheduledAt,
    Reason,
    Status,
}

#[derive(DeriveIden)]
enum Patients {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Doctors {
    Table,
    Id,
}
