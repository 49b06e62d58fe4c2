//! # Repository Layer
//!
//! Generic data access for every entity with a single integer key, plus the
//! include directives used to eager-load related entities.

pub mod generic;
pub mod include;

pub use generic::GenericRepository;
pub use include::{Include, IncludeMany, IncludeOne, Shape, include_many, include_one, shape};
