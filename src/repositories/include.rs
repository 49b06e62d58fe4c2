//! Eager-loading directives passed to repository reads.
//!
//! An [`Include`] can reshape the base query (extra filters, joins or
//! ordering) and can fill navigation fields of the loaded models from
//! related entities once the base rows are in memory.

use std::fmt;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, LoaderTrait, Related, Select};

use crate::entity::entity_name;

/// Directive applied to a repository read of `E`.
#[async_trait]
pub trait Include<E: EntityTrait>: Send + Sync {
    /// Adjusts the base query before it runs.
    fn shape(&self, query: Select<E>) -> Select<E> {
        query
    }

    /// Fills related data into the loaded models.
    async fn load(&self, _db: &DatabaseConnection, _models: &mut [E::Model]) -> Result<(), DbErr> {
        Ok(())
    }
}

/// Loads the single related `R` of every model through a belongs-to or
/// has-one relation.
pub struct IncludeOne<E: EntityTrait, R: EntityTrait> {
    assign: fn(&mut E::Model, Option<R::Model>),
}

/// Loads every related `R` of every model through a has-many relation.
pub struct IncludeMany<E: EntityTrait, R: EntityTrait> {
    assign: fn(&mut E::Model, Vec<R::Model>),
}

/// Applies a query transformation, e.g. an extra condition or join.
pub struct Shape<F> {
    transform: F,
}

/// Builds an include that loads one related `R` per model and hands it to
/// `assign`, usually to store it in a navigation field.
///
/// ```ignore
/// let with_patient = include_one::<appointment::Entity, patient::Entity>(|a, p| a.patient = p);
/// ```
pub fn include_one<E: EntityTrait, R: EntityTrait>(
    assign: fn(&mut E::Model, Option<R::Model>),
) -> IncludeOne<E, R> {
    IncludeOne { assign }
}

/// Builds an include that loads all related `R` per model.
pub fn include_many<E: EntityTrait, R: EntityTrait>(
    assign: fn(&mut E::Model, Vec<R::Model>),
) -> IncludeMany<E, R> {
    IncludeMany { assign }
}

pub fn shape<F>(transform: F) -> Shape<F> {
    Shape { transform }
}

#[async_trait]
impl<E, R> Include<E> for IncludeOne<E, R>
where
    E: EntityTrait + Related<R>,
    E::Model: Sync,
    R: EntityTrait,
    R::Model: Send + Sync,
{
    async fn load(&self, db: &DatabaseConnection, models: &mut [E::Model]) -> Result<(), DbErr> {
        let related = {
            let loaded: &[E::Model] = models;
            loaded.load_one(R::default(), db).await?
        };

        for (model, related) in models.iter_mut().zip(related) {
            (self.assign)(model, related);
        }
        Ok(())
    }
}

#[async_trait]
impl<E, R> Include<E> for IncludeMany<E, R>
where
    E: EntityTrait + Related<R>,
    E::Model: Sync,
    R: EntityTrait,
    R::Model: Send + Sync,
{
    async fn load(&self, db: &DatabaseConnection, models: &mut [E::Model]) -> Result<(), DbErr> {
        let related = {
            let loaded: &[E::Model] = models;
            loaded.load_many(R::default(), db).await?
        };

        for (model, related) in models.iter_mut().zip(related) {
            (self.assign)(model, related);
        }
        Ok(())
    }
}

impl<E, F> Include<E> for Shape<F>
where
    E: EntityTrait,
    F: Fn(Select<E>) -> Select<E> + Send + Sync,
{
    fn shape(&self, query: Select<E>) -> Select<E> {
        (self.transform)(query)
    }
}

impl<E: EntityTrait, R: EntityTrait> fmt::Debug for IncludeOne<E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IncludeOne({} -> {})",
            entity_name::<E>(),
            entity_name::<R>()
        )
    }
}

impl<E: EntityTrait, R: EntityTrait> fmt::Debug for IncludeMany<E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IncludeMany({} -> {})",
            entity_name::<E>(),
            entity_name::<R>()
        )
    }
}

/// Applies every include's query shape to `query`, in order.
pub(crate) fn shape_query<E: EntityTrait>(
    query: Select<E>,
    includes: &[&dyn Include<E>],
) -> Select<E> {
    includes
        .iter()
        .fold(query, |query, include| include.shape(query))
}

/// Runs every include's loader over `models`, in order.
pub(crate) async fn load_related<E: EntityTrait>(
    db: &DatabaseConnection,
    includes: &[&dyn Include<E>],
    models: &mut [E::Model],
) -> Result<(), DbErr> {
    if models.is_empty() {
        return Ok(());
    }

    for include in includes {
        include.load(db, models).await?;
    }
    Ok(())
}
