//! Validation rules for administrator-supplied input.
//!
//! These checks run before any record is written. They cover the malformed-
//! input class of failures; uniqueness and lock checks live in the store.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("session name must be 1-100 characters")]
    NameLength,
    #[error("session name must match [a-zA-Z0-9 _/-]")]
    NameChars,
    #[error("session start date {start} must be before end date {end}")]
    DateWindow { start: NaiveDate, end: NaiveDate },
    #[error("roll number must be 1-50 characters")]
    RollNoLength,
    #[error("roll number must match [a-zA-Z0-9-]")]
    RollNoChars,
}

pub fn validate_session_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.len() > 100 {
        return Err(ValidationError::NameLength);
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b' ' || b == b'_' || b == b'-' || b == b'/')
    {
        return Err(ValidationError::NameChars);
    }
    Ok(())
}

pub fn validate_date_window(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if start >= end {
        return Err(ValidationError::DateWindow { start, end });
    }
    Ok(())
}

pub fn validate_roll_no(roll_no: &str) -> Result<(), ValidationError> {
    if roll_no.is_empty() || roll_no.len() > 50 {
        return Err(ValidationError::RollNoLength);
    }
    if !roll_no
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    {
        return Err(ValidationError::RollNoChars);
    }
    Ok(())
}
