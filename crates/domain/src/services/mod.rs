//! Domain services for LifeGuard.
//!
//! Services contain business logic that operates on domain models, plus the
//! traits for the external systems that logic depends on.

pub mod health_report;
pub mod report_store;
pub mod sensor_source;
pub mod store_error;
pub mod user_store;

pub use health_report::{generate_report, report_window, HealthReportService};
pub use report_store::{HealthReportStore, InMemoryHealthReportStore};
pub use sensor_source::{SensorError, SensorSource, StaticSensorSource};
pub use store_error::StoreError;
pub use user_store::{InMemoryUserStore, UserStore};
