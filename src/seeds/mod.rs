//! Database seeding functionality
//!
//! This module provides functionality to seed the database with reference
//! data the clinic needs before patients can be booked.

pub mod doctor;

pub use doctor::seed_doctors;
