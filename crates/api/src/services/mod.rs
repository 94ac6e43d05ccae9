//! Application services and external integrations.

pub mod auth;
pub mod email;
pub mod firebase;
pub mod otp;
pub mod pdf;

pub use auth::AuthService;
pub use email::EmailService;
pub use firebase::FirebaseSensorSource;
pub use otp::OtpService;
pub use pdf::PdfRenderer;
