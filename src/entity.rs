//! Per-entity descriptors and primary key resolution.
//!
//! The generic data layer never inspects entity types at runtime. Every
//! entity it handles supplies an [`EntityDescriptor`] stating how to read its
//! integer key and how to copy column values between two instances. The key
//! column itself is resolved from SeaORM's structural metadata so that it
//! can be compared in queries without naming it at compile time.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ColumnType, EntityTrait, IdenStatic, Iterable,
    ModelTrait, PrimaryKeyToColumn, Value,
};

use crate::error::{KeyShape, RepositoryError, RepositoryResult};

/// Integer primary key shared by every entity the data layer handles.
pub type EntityKey = i32;

/// Key value meaning "not assigned yet; the store will generate it".
pub const UNASSIGNED_KEY: EntityKey = 0;

/// Compile-time description of an entity handled by the generic data layer.
///
/// Implemented once per SeaORM entity next to its model definition.
pub trait EntityDescriptor: EntityTrait<Model: Sync> + 'static {
    /// Active model used when the session inserts new rows.
    type Active: ActiveModelTrait<Entity = Self> + Send;

    /// Returns the integer primary key of `model`.
    fn key(model: &Self::Model) -> EntityKey;

    /// Copies every column value of `source` onto `target`.
    ///
    /// Fields that are not columns (eagerly loaded navigations) keep the
    /// values `target` already holds.
    fn apply_values(target: &mut Self::Model, source: &Self::Model) {
        for column in Self::Column::iter() {
            target.set(column, source.get(column));
        }
    }
}

/// Returns the table name of `E`, used to label logs and errors.
pub fn entity_name<E: EntityTrait>() -> String {
    E::default().table_name().to_owned()
}

/// Resolves the single integer primary key column of `E`.
///
/// # Errors
///
/// Returns [`RepositoryError::InvalidKeyShape`] when the entity declares no
/// key, a composite key, or a key column whose type is not an integer.
pub fn key_column<E: EntityTrait>() -> RepositoryResult<E::Column> {
    let columns: Vec<E::Column> = E::PrimaryKey::iter()
        .map(|key| key.into_column())
        .collect();

    match columns.as_slice() {
        [] => Err(invalid_key_shape::<E>(KeyShape::Missing)),
        [column] => {
            let definition = column.def();
            let column_type = definition.get_column_type();
            if is_integer_type(column_type) {
                Ok(*column)
            } else {
                Err(invalid_key_shape::<E>(KeyShape::NonInteger(format!(
                    "{column_type:?}"
                ))))
            }
        }
        many => Err(invalid_key_shape::<E>(KeyShape::Composite(many.len()))),
    }
}

/// Returns the name of the primary key column of `E`.
pub fn key_property_name<E: EntityTrait>() -> RepositoryResult<String> {
    key_column::<E>().map(|column| column.as_str().to_owned())
}

/// Converts a key value handed back by the database into an [`EntityKey`].
///
/// Returns `None` for null, non-integer or out-of-range values.
pub fn key_from_value(value: Value) -> Option<EntityKey> {
    match value {
        Value::TinyInt(Some(v)) => Some(EntityKey::from(v)),
        Value::SmallInt(Some(v)) => Some(EntityKey::from(v)),
        Value::Int(Some(v)) => Some(v),
        Value::BigInt(Some(v)) => EntityKey::try_from(v).ok(),
        Value::TinyUnsigned(Some(v)) => Some(EntityKey::from(v)),
        Value::SmallUnsigned(Some(v)) => Some(EntityKey::from(v)),
        Value::Unsigned(Some(v)) => EntityKey::try_from(v).ok(),
        Value::BigUnsigned(Some(v)) => EntityKey::try_from(v).ok(),
        _ => None,
    }
}

/// Columns of `E` other than its key column, in declaration order.
pub(crate) fn value_columns<E: EntityTrait>(key_column: E::Column) -> Vec<E::Column> {
    E::Column::iter()
        .filter(|column| column.as_str() != key_column.as_str())
        .collect()
}

/// Value columns whose contents differ between `original` and `current`.
pub(crate) fn changed_columns<E: EntityTrait>(
    key_column: E::Column,
    original: &E::Model,
    current: &E::Model,
) -> Vec<E::Column> {
    value_columns::<E>(key_column)
        .into_iter()
        .filter(|column| original.get(*column) != current.get(*column))
        .collect()
}

fn is_integer_type(column_type: &ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::TinyInteger
            | ColumnType::SmallInteger
            | ColumnType::Integer
            | ColumnType::BigInteger
            | ColumnType::TinyUnsigned
            | ColumnType::SmallUnsigned
            | ColumnType::Unsigned
            | ColumnType::BigUnsigned
    )
}

fn invalid_key_shape<E: EntityTrait>(shape: KeyShape) -> RepositoryError {
    RepositoryError::InvalidKeyShape {
        entity: entity_name::<E>(),
        shape,
    }
}
