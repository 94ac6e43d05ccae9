//! Persistence layer for the LifeGuard backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain storage traits
//! - SQL migrations under `src/migrations`

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
