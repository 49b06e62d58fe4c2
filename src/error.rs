//! # Error Handling
//!
//! Errors raised by the data layer. Lookups never fail for a missing row;
//! absence is reported as `None`. What remains is a broken key shape,
//! session bookkeeping misuse, write conflicts detected at commit time, and
//! whatever the database reports, which is carried through unmodified.

use std::fmt;

use sea_orm::DbErr;
use thiserror::Error;

use crate::entity::EntityKey;

/// Result alias used throughout the repository and session layers.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Why an entity's primary key cannot be used by the generic data layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyShape {
    /// The entity declares no primary key column.
    Missing,
    /// The primary key spans more than one column.
    Composite(usize),
    /// The single key column is not an integer column; carries the column type.
    NonInteger(String),
}

impl fmt::Display for KeyShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyShape::Missing => write!(f, "no primary key column is declared"),
            KeyShape::Composite(columns) => {
                write!(f, "composite primary key over {columns} columns")
            }
            KeyShape::NonInteger(column_type) => {
                write!(f, "primary key column type {column_type} is not an integer")
            }
        }
    }
}

/// Write operation that found no row to act upon during a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Update,
    Delete,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::Update => write!(f, "update"),
            ConflictKind::Delete => write!(f, "delete"),
        }
    }
}

/// Errors that can occur while reading or writing entities.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("entity `{entity}` has an unsupported primary key: {shape}")]
    InvalidKeyShape { entity: String, shape: KeyShape },

    #[error("another `{entity}` instance with key {key} is already tracked by this session")]
    AlreadyTracked { entity: String, key: EntityKey },

    #[error("the `{entity}` instance is not tracked by this session")]
    NotTracked { entity: String },

    #[error("{operation} of `{entity}` with key {key} affected no rows")]
    Conflict {
        entity: String,
        key: EntityKey,
        operation: ConflictKind,
    },

    #[error(transparent)]
    Database(#[from] DbErr),
}

impl RepositoryError {
    /// Wraps a database error without altering it.
    pub fn database_error(err: DbErr) -> Self {
        RepositoryError::Database(err)
    }

    /// Returns the underlying database error, if this error came from the store.
    pub fn as_database_error(&self) -> Option<&DbErr> {
        match self {
            RepositoryError::Database(err) => Some(err),
            _ => None,
        }
    }

    /// Whether this error reports an unusable primary key definition.
    pub fn is_invalid_key_shape(&self) -> bool {
        matches!(self, RepositoryError::InvalidKeyShape { .. })
    }
}
