//! User input validation
//!
//! Pure functions checking the free-text answers collected by the flows:
//! - dates in `DD.MM.YYYY` form (calendar-checked)
//! - integer mileage (strictly positive)
//! - positive decimals with either `,` or `.` as separator
//!
//! Nothing here touches state; callers decide what a failure means.

use chrono::NaiveDate;
use lazy_regex::regex_is_match;
use thiserror::Error;

/// Date format used everywhere in the bot (`15.03.2025`).
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Validation errors
///
/// The `Display` text is for logs. Users see the localized message looked up
/// from [`ValidationError::message_key`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Not `DD.MM.YYYY` or not a real calendar date
    #[error("invalid date, expected DD.MM.YYYY")]
    InvalidDate,

    /// Integer parse failure
    #[error("must be a number")]
    NotANumber,

    /// Zero or negative integer
    #[error("must be positive")]
    NotPositive,

    /// Decimal parse failure for the named field
    #[error("{label} must be a number")]
    NotAFloat { label: String },

    /// Zero or negative decimal for the named field
    #[error("{label} must be a positive number")]
    FloatNotPositive { label: String },

    /// Blank input where a value is required
    #[error("value must not be empty")]
    Empty,

    /// Not a plausible Telegram user id
    #[error("invalid user id")]
    InvalidUserId,

    /// A column edit that does not name its column
    #[error("no vehicle column to edit")]
    NoTargetField,
}

impl ValidationError {
    /// Localization key of the user-facing message.
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::InvalidDate => "validation.invalid_date",
            Self::NotANumber => "validation.not_a_number",
            Self::NotPositive => "validation.not_positive",
            Self::NotAFloat { .. } => "validation.float_not_a_number",
            Self::FloatNotPositive { .. } => "validation.float_not_positive",
            Self::Empty => "validation.empty",
            Self::InvalidUserId => "validation.invalid_user_id",
            Self::NoTargetField => "validation.no_target_field",
        }
    }

    /// Field label referenced by the message, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::NotAFloat { label } | Self::FloatNotPositive { label } => Some(label),
            _ => None,
        }
    }
}

/// Returns `true` if `s` is a valid `DD.MM.YYYY` date.
///
/// # Examples
/// ```
/// use fleetbot::core::validation::validate_date;
///
/// assert!(validate_date("15.03.2025"));
/// assert!(!validate_date("31.02.2025"));
/// assert!(!validate_date("2025-03-15"));
/// ```
pub fn validate_date(s: &str) -> bool {
    parse_date(s).is_ok()
}

/// Parses a `DD.MM.YYYY` date.
///
/// The shape is checked first so inputs like `1.3.2025` are rejected even
/// though chrono would accept them.
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    let s = s.trim();
    if !regex_is_match!(r"^\d{2}\.\d{2}\.\d{4}$", s) {
        return Err(ValidationError::InvalidDate);
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| ValidationError::InvalidDate)
}

/// Validates a mileage value: an integer strictly greater than zero.
///
/// # Examples
/// ```
/// use fleetbot::core::validation::{validate_mileage, ValidationError};
///
/// assert_eq!(validate_mileage("45000"), Ok(45000));
/// assert_eq!(validate_mileage("-5"), Err(ValidationError::NotPositive));
/// assert_eq!(validate_mileage("abc"), Err(ValidationError::NotANumber));
/// ```
pub fn validate_mileage(s: &str) -> Result<i64, ValidationError> {
    let mileage: i64 = s.trim().parse().map_err(|_| ValidationError::NotANumber)?;
    if mileage <= 0 {
        return Err(ValidationError::NotPositive);
    }
    Ok(mileage)
}

/// Validates a positive decimal; both `12,5` and `12.5` are accepted.
///
/// `field_label` is embedded in the error so the message can name the field.
pub fn validate_float(s: &str, field_label: &str) -> Result<f64, ValidationError> {
    let value: f64 = s
        .trim()
        .replace(',', ".")
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| ValidationError::NotAFloat {
            label: field_label.to_string(),
        })?;

    if value <= 0.0 {
        return Err(ValidationError::FloatNotPositive {
            label: field_label.to_string(),
        });
    }
    Ok(value)
}

/// Validates a non-blank free-text answer and returns it trimmed.
pub fn validate_required_text(s: &str) -> Result<String, ValidationError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ValidationError::Empty);
    }
    Ok(s.to_string())
}

/// Validates a non-negative integer (used by field edits such as the model year).
pub fn validate_integer(s: &str) -> Result<i64, ValidationError> {
    let value: i64 = s.trim().parse().map_err(|_| ValidationError::NotANumber)?;
    if value < 0 {
        return Err(ValidationError::NotPositive);
    }
    Ok(value)
}

/// Validates a Telegram user id typed by an admin.
pub fn validate_user_id(s: &str) -> Result<i64, ValidationError> {
    match s.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ValidationError::InvalidUserId),
    }
}
