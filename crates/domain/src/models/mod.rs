//! Domain models for LifeGuard.

pub mod health_report;
pub mod sensor;
pub mod user;

pub use health_report::{
    CreateReportRequest, HealthReport, HealthReportQuery, ReportRangeQuery, SavedHealthReport,
};
pub use sensor::{DeviceStatus, SensorReading};
pub use user::{NewUser, PasswordResetToken, Profile, ProfileUpdate, User};
