//! HTTP route handlers.

pub mod account;
pub mod health;
pub mod health_report;
pub mod profile;
pub mod reports;
pub mod root;
