//! Common validation utilities.

use std::borrow::Cow;

use validator::ValidationError;

/// Shortest report window in days.
pub const MIN_REPORT_RANGE_DAYS: i32 = 1;

/// Longest report window in days.
pub const MAX_REPORT_RANGE_DAYS: i32 = 365;

/// Report window used when the caller does not give one.
pub const DEFAULT_REPORT_RANGE_DAYS: i32 = 30;

/// Normalizes an e-mail address for lookup and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates that a report range is within 1..=365 days.
pub fn validate_report_range(range: i32) -> Result<(), ValidationError> {
    if (MIN_REPORT_RANGE_DAYS..=MAX_REPORT_RANGE_DAYS).contains(&range) {
        Ok(())
    } else {
        let mut err = ValidationError::new("range_days");
        err.message = Some(Cow::Owned(format!(
            "Range must be between {} and {} days",
            MIN_REPORT_RANGE_DAYS, MAX_REPORT_RANGE_DAYS
        )));
        Err(err)
    }
}

/// Validates a phone number: optional leading `+`, then 7 to 15 digits.
/// Spaces and dashes are ignored.
pub fn validate_phone_number(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let digits: String = digits.chars().filter(|c| *c != ' ' && *c != '-').collect();

    if (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone_number");
        err.message = Some("Phone number must contain 7 to 15 digits".into());
        Err(err)
    }
}
