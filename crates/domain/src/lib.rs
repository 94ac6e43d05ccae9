//! Domain layer for the LifeGuard backend.
//!
//! This crate contains:
//! - Domain models (sensor readings, health reports, users)
//! - The health report generator
//! - Storage and sensor-feed traits with in-memory implementations

pub mod models;
pub mod services;
