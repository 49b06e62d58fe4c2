//! Integration tests for GenericRepository against an in-memory SQLite database.

use anyhow::Result;
use clinic_data::error::{ConflictKind, RepositoryError};
use clinic_data::models::{appointment, doctor, patient};
use clinic_data::repositories::{GenericRepository, include_many, include_one, shape};
use clinic_data::session::{CommitSummary, EntityState};
use sea_orm::{ColumnTrait, QueryFilter, Select};

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{at_hour, insert_doctor, insert_patient, setup_session, sibling_session};

#[tokio::test]
async fn create_commit_and_get_by_id_roundtrip() -> Result<()> {
    let session = setup_session().await?;
    let repo = GenericRepository::<patient::Entity>::new(&session);

    let tracked = repo.create(
        patient::Model::new("Ada", "Lovelace")
            .with_email("ada@example.com")
            .with_phone("+44 20 7946 0000"),
    )?;
    assert_eq!(session.state_of::<patient::Entity>(&tracked), Some(EntityState::Added));

    let summary = session.commit().await?;
    assert_eq!(
        summary,
        CommitSummary {
            inserted: 1,
            updated: 0,
            deleted: 0
        }
    );

    let stored = tracked.snapshot();
    assert_ne!(stored.id, 0);
    assert_eq!(session.state_of::<patient::Entity>(&tracked), Some(EntityState::Unchanged));

    let found = repo.get_by_id(stored.id, &[]).await?;
    assert_eq!(found, Some(stored));
    Ok(())
}

#[tokio::test]
async fn get_by_id_returns_none_for_missing_key() -> Result<()> {
    let session = setup_session().await?;
    let repo = GenericRepository::<patient::Entity>::new(&session);

    assert!(repo.get_by_id(404, &[]).await?.is_none());
    assert_eq!(session.total_tracked(), 0);
    Ok(())
}

#[tokio::test]
async fn get_all_is_ordered_by_key_and_not_tracked() -> Result<()> {
    let session = setup_session().await?;
    let repo = GenericRepository::<patient::Entity>::new(&session);
    assert!(repo.get_all(&[]).await?.is_empty());

    insert_patient(&session, "Grace", "Hopper").await?;
    insert_patient(&session, "Alan", "Turing").await?;
    insert_patient(&session, "Edsger", "Dijkstra").await?;

    let reader = sibling_session(&session);
    let all = GenericRepository::<patient::Entity>::new(&reader)
        .get_all(&[])
        .await?;

    let names: Vec<&str> = all.iter().map(|p| p.last_name.as_str()).collect();
    assert_eq!(names, vec!["Hopper", "Turing", "Dijkstra"]);
    assert!(all.windows(2).all(|pair| pair[0].id < pair[1].id));
    assert_eq!(reader.total_tracked(), 0);
    Ok(())
}

#[tokio::test]
async fn get_by_filter_matches_condition() -> Result<()> {
    let session = setup_session().await?;
    insert_patient(&session, "Grace", "Hopper").await?;
    insert_patient(&session, "Grace", "Kelly").await?;
    insert_patient(&session, "Alan", "Turing").await?;

    let repo = GenericRepository::<patient::Entity>::new(&session);
    let graces = repo
        .get_by_filter(patient::Column::FirstName.eq("Grace"), &[])
        .await?;
    assert_eq!(graces.len(), 2);
    assert!(graces.iter().all(|p| p.read().first_name == "Grace"));

    let nobody = repo
        .get_by_filter(patient::Column::LastName.eq("Lovelace"), &[])
        .await?;
    assert!(nobody.is_empty());
    Ok(())
}

#[tokio::test]
async fn get_by_filter_with_includes_populates_navigation() -> Result<()> {
    let session = setup_session().await?;
    let ada = insert_patient(&session, "Ada", "Lovelace").await?;
    let alan = insert_patient(&session, "Alan", "Turing").await?;
    let house = insert_doctor(&session, "Gregory House", "Diagnostics").await?;

    let appointments = GenericRepository::<appointment::Entity>::new(&session);
    appointments.create(
        appointment::Model::new(ada.id, house.id, at_hour(9)?).with_reason("checkup"),
    )?;
    appointments.create(appointment::Model::new(ada.id, house.id, at_hour(11)?))?;
    appointments.create(appointment::Model::new(alan.id, house.id, at_hour(13)?))?;
    session.commit().await?;

    let with_patient = include_one::<appointment::Entity, patient::Entity>(|a, p| a.patient = p);
    let with_doctor = include_one::<appointment::Entity, doctor::Entity>(|a, d| a.doctor = d);

    let found = appointments
        .get_by_filter(
            appointment::Column::PatientId.eq(ada.id),
            &[&with_patient, &with_doctor],
        )
        .await?;

    assert_eq!(found.len(), 2);
    for visit in &found {
        let visit = visit.read();
        assert_eq!(visit.patient.as_ref().map(|p| p.id), Some(ada.id));
        assert_eq!(
            visit.doctor.as_ref().map(|d| d.full_name.as_str()),
            Some("Gregory House")
        );
    }
    assert_eq!(found[0].read().reason.as_deref(), Some("checkup"));
    assert_eq!(found[0].read().scheduled_at, at_hour(9)?);

    let reader = sibling_session(&session);
    let without = GenericRepository::<appointment::Entity>::new(&reader)
        .get_by_filter(appointment::Column::PatientId.eq(ada.id), &[])
        .await?;
    assert_eq!(without.len(), 2);
    assert!(
        without
            .iter()
            .all(|a| a.read().patient.is_none() && a.read().doctor.is_none())
    );
    Ok(())
}

#[tokio::test]
async fn include_many_and_shape_on_reads() -> Result<()> {
    let session = setup_session().await?;
    let ada = insert_patient(&session, "Ada", "Lovelace").await?;
    let house = insert_doctor(&session, "Gregory House", "Diagnostics").await?;

    let appointments = GenericRepository::<appointment::Entity>::new(&session);
    appointments.create(appointment::Model::new(ada.id, house.id, at_hour(9)?))?;
    let cancelled = appointments.create(appointment::Model::new(ada.id, house.id, at_hour(10)?))?;
    cancelled.write().status = appointment::STATUS_CANCELLED.to_string();
    session.commit().await?;

    let patients = GenericRepository::<patient::Entity>::new(&session);
    let with_appointments =
        include_many::<patient::Entity, appointment::Entity>(|p, a| p.appointments = a);
    let loaded = patients
        .get_by_id(ada.id, &[&with_appointments])
        .await?
        .expect("patient exists");
    assert_eq!(loaded.appointments.len(), 2);

    let only_scheduled = shape(|query: Select<appointment::Entity>| {
        query.filter(appointment::Column::Status.eq(appointment::STATUS_SCHEDULED))
    });
    let scheduled = appointments.get_all(&[&only_scheduled]).await?;
    assert_eq!(scheduled.len(), 1);
    assert!(!scheduled[0].is_cancelled());
    Ok(())
}

#[tokio::test]
async fn update_detached_merges_into_loaded_instance() -> Result<()> {
    let session = setup_session().await?;
    let ada = insert_patient(&session, "Ada", "Lovelace").await?;

    let writer = sibling_session(&session);
    let repo = GenericRepository::<patient::Entity>::new(&writer);

    let mut detached = ada.clone();
    detached.email = Some("ada@example.com".to_string());

    let resolution = repo.update(detached).await?;
    assert!(resolution.is_merged());
    assert_eq!(
        writer.state_of::<patient::Entity>(resolution.tracked()),
        Some(EntityState::Modified)
    );

    let summary = writer.commit().await?;
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.updated, 1);

    let all = repo.get_all(&[]).await?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].email.as_deref(), Some("ada@example.com"));
    assert_eq!(all[0].first_name, "Ada");
    Ok(())
}

#[tokio::test]
async fn update_detached_reuses_tracked_instance() -> Result<()> {
    let session = setup_session().await?;
    let ada = insert_patient(&session, "Ada", "Lovelace").await?;
    let repo = GenericRepository::<patient::Entity>::new(&session);

    let tracked = repo
        .get_tracked_or_attach(ada.id, &[])
        .await?
        .expect("patient exists");

    let mut detached = ada.clone();
    detached.phone = Some("555-0100".to_string());
    let resolution = repo.update(detached).await?;

    assert!(resolution.is_merged());
    assert!(resolution.tracked().same_instance(&tracked));
    assert_eq!(tracked.read().phone.as_deref(), Some("555-0100"));
    assert_eq!(session.tracked_count::<patient::Entity>(), 1);

    session.commit().await?;
    let stored = repo.get_by_id(ada.id, &[]).await?.expect("patient exists");
    assert_eq!(stored.phone.as_deref(), Some("555-0100"));
    Ok(())
}

#[tokio::test]
async fn update_of_unknown_key_conflicts_on_commit() -> Result<()> {
    let session = setup_session().await?;
    let repo = GenericRepository::<patient::Entity>::new(&session);

    let ghost = patient::Model {
        id: 999,
        ..patient::Model::new("No", "Body")
    };
    let resolution = repo.update(ghost).await?;
    assert!(!resolution.is_merged());

    let error = session.commit().await.unwrap_err();
    assert!(matches!(
        error,
        RepositoryError::Conflict {
            key: 999,
            operation: ConflictKind::Update,
            ..
        }
    ));

    assert_eq!(
        session.state_of_key::<patient::Entity>(999),
        Some(EntityState::Modified)
    );
    assert!(session.has_changes());
    Ok(())
}

#[tokio::test]
async fn update_tracked_relies_on_change_detection() -> Result<()> {
    let session = setup_session().await?;
    let ada = insert_patient(&session, "Ada", "Lovelace").await?;

    let editor = sibling_session(&session);
    let repo = GenericRepository::<patient::Entity>::new(&editor);
    let tracked = repo
        .get_tracked_or_attach(ada.id, &[])
        .await?
        .expect("patient exists");
    assert_eq!(repo.update_tracked(&tracked)?, EntityState::Unchanged);

    tracked.write().last_name = "King".to_string();
    assert_eq!(repo.update_tracked(&tracked)?, EntityState::Modified);

    let summary = editor.commit().await?;
    assert_eq!(summary.updated, 1);
    assert_eq!(repo.update_tracked(&tracked)?, EntityState::Unchanged);

    let stored = repo.get_by_id(ada.id, &[]).await?.expect("patient exists");
    assert_eq!(stored.full_name(), "Ada King");
    Ok(())
}

#[tokio::test]
async fn update_tracked_rejects_detached_instance() -> Result<()> {
    let session = setup_session().await?;
    let repo = GenericRepository::<patient::Entity>::new(&session);

    let tracked = repo.create(patient::Model::new("Ada", "Lovelace"))?;
    assert!(session.detach::<patient::Entity>(&tracked));

    let error = repo.update_tracked(&tracked).unwrap_err();
    assert!(matches!(error, RepositoryError::NotTracked { .. }));
    Ok(())
}

#[tokio::test]
async fn delete_removes_row_on_commit() -> Result<()> {
    let session = setup_session().await?;
    let ada = insert_patient(&session, "Ada", "Lovelace").await?;
    let alan = insert_patient(&session, "Alan", "Turing").await?;

    let cleaner = sibling_session(&session);
    let repo = GenericRepository::<patient::Entity>::new(&cleaner);
    repo.delete(ada.id).await?;
    assert_eq!(
        cleaner.state_of_key::<patient::Entity>(ada.id),
        Some(EntityState::Deleted)
    );

    let summary = cleaner.commit().await?;
    assert_eq!(summary.deleted, 1);
    assert_eq!(cleaner.tracked_count::<patient::Entity>(), 0);

    assert!(repo.get_by_id(ada.id, &[]).await?.is_none());
    assert!(repo.get_by_id(alan.id, &[]).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn delete_of_missing_key_is_a_no_op() -> Result<()> {
    let session = setup_session().await?;
    insert_patient(&session, "Ada", "Lovelace").await?;
    let repo = GenericRepository::<patient::Entity>::new(&session);

    repo.delete(12_345).await?;

    assert!(!session.has_changes());
    assert!(session.commit().await?.is_empty());
    assert_eq!(repo.get_all(&[]).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn get_tracked_or_attach_returns_same_instance() -> Result<()> {
    let session = setup_session().await?;
    let ada = insert_patient(&session, "Ada", "Lovelace").await?;

    let reader = sibling_session(&session);
    let repo = GenericRepository::<patient::Entity>::new(&reader);

    let first = repo
        .get_tracked_or_attach(ada.id, &[])
        .await?
        .expect("patient exists");
    let second = repo
        .get_tracked_or_attach(ada.id, &[])
        .await?
        .expect("patient exists");

    assert!(first.same_instance(&second));
    assert_eq!(reader.tracked_count::<patient::Entity>(), 1);
    assert_eq!(
        reader.state_of::<patient::Entity>(&first),
        Some(EntityState::Unchanged)
    );

    assert!(repo.get_tracked_or_attach(404, &[]).await?.is_none());
    assert_eq!(reader.tracked_count::<patient::Entity>(), 1);
    Ok(())
}

#[tokio::test]
async fn attach_twice_with_same_key_fails() -> Result<()> {
    let session = setup_session().await?;
    let ada = insert_patient(&session, "Ada", "Lovelace").await?;

    let other = sibling_session(&session);
    let repo = GenericRepository::<patient::Entity>::new(&other);

    let attached = repo.attach(ada.clone())?;
    assert_eq!(
        other.state_of::<patient::Entity>(&attached),
        Some(EntityState::Unchanged)
    );

    let error = repo.attach(ada.clone()).unwrap_err();
    assert!(matches!(
        error,
        RepositoryError::AlreadyTracked { key, .. } if key == ada.id
    ));
    Ok(())
}

#[tokio::test]
async fn key_property_name_reports_id_column() -> Result<()> {
    let session = setup_session().await?;

    assert_eq!(
        GenericRepository::<patient::Entity>::new(&session).key_property_name()?,
        "id"
    );
    assert_eq!(
        GenericRepository::<appointment::Entity>::new(&session).key_property_name()?,
        "id"
    );
    Ok(())
}

#[tokio::test]
async fn get_by_filter_tracks_results_for_commit() -> Result<()> {
    let session = setup_session().await?;
    insert_patient(&session, "Ada", "Lovelace").await?;
    insert_patient(&session, "Alan", "Turing").await?;

    let editor = sibling_session(&session);
    let repo = GenericRepository::<patient::Entity>::new(&editor);
    let found = repo
        .get_by_filter(patient::Column::FirstName.eq("Ada"), &[])
        .await?;
    assert_eq!(found.len(), 1);
    assert_eq!(editor.tracked_count::<patient::Entity>(), 1);
    assert_eq!(
        editor.state_of::<patient::Entity>(&found[0]),
        Some(EntityState::Unchanged)
    );

    found[0].write().email = Some("ada@example.com".to_string());
    let summary = editor.commit().await?;
    assert_eq!(summary.updated, 1);

    let id = found[0].read().id;
    let stored = GenericRepository::<patient::Entity>::new(&session)
        .get_by_id(id, &[])
        .await?
        .expect("patient exists");
    assert_eq!(stored.email.as_deref(), Some("ada@example.com"));
    Ok(())
}

#[tokio::test]
async fn get_by_filter_returns_the_tracked_instance() -> Result<()> {
    let session = setup_session().await?;
    let ada = insert_patient(&session, "Ada", "Lovelace").await?;

    let editor = sibling_session(&session);
    let repo = GenericRepository::<patient::Entity>::new(&editor);
    let tracked = repo
        .get_tracked_or_attach(ada.id, &[])
        .await?
        .expect("patient exists");
    tracked.write().first_name = "Augusta".to_string();

    let found = repo
        .get_by_filter(patient::Column::Id.eq(ada.id), &[])
        .await?;
    assert_eq!(found.len(), 1);
    assert!(found[0].same_instance(&tracked));
    assert_eq!(found[0].read().first_name, "Augusta");
    assert_eq!(editor.tracked_count::<patient::Entity>(), 1);
    Ok(())
}

#[tokio::test]
async fn unassigned_key_is_registered_for_insert() -> Result<()> {
    let session = setup_session().await?;
    let repo = GenericRepository::<patient::Entity>::new(&session);

    let updated = repo.update(patient::Model::new("Ada", "Lovelace")).await?;
    assert!(!updated.is_merged());
    assert_eq!(
        session.state_of::<patient::Entity>(updated.tracked()),
        Some(EntityState::Added)
    );

    let attached = repo.attach(patient::Model::new("Alan", "Turing"))?;
    assert_eq!(
        session.state_of::<patient::Entity>(&attached),
        Some(EntityState::Added)
    );

    let forced = session.attach_modified::<patient::Entity>(patient::Model::new("Grace", "Hopper"))?;
    assert_eq!(
        session.state_of::<patient::Entity>(&forced),
        Some(EntityState::Added)
    );

    let summary = session.commit().await?;
    assert_eq!(summary.inserted, 3);
    assert_ne!(updated.tracked().read().id, 0);
    assert_ne!(attached.read().id, 0);
    assert_ne!(forced.read().id, 0);
    assert_eq!(repo.get_all(&[]).await?.len(), 3);
    Ok(())
}
