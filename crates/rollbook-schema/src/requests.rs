//! Request types for the lifecycle API.
//!
//! These are the inbound payloads accepted by the engine, the CLI, and the
//! HTTP server. Unknown fields are rejected so a typo in a caller's payload
//! fails loudly instead of being silently ignored.

use crate::types::{ClassId, EnrollmentId, SectionId, SessionId, StudentId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Initial admission of a student into a session/class/section.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EnrollRequest {
    pub student_id: StudentId,
    pub session_id: SessionId,
    pub class_id: ClassId,
    pub section_id: SectionId,
    pub roll_no: String,
}

/// Promotion of one enrollment into a destination session/class/section.
///
/// `roll_no` may be omitted in bulk promotion, in which case the engine
/// assigns sequential zero-padded numbers in submission order.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PromotionRequest {
    pub enrollment_id: EnrollmentId,
    pub session_id: SessionId,
    pub class_id: ClassId,
    pub section_id: SectionId,
    #[serde(default)]
    pub roll_no: Option<String>,
}

/// Retention: repeat the same class/section in a new session.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RetentionRequest {
    pub enrollment_id: EnrollmentId,
    pub session_id: SessionId,
    #[serde(default)]
    pub roll_no: Option<String>,
}

/// Terminal closure without a destination row: transfer, graduate, drop.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClosureRequest {
    pub enrollment_id: EnrollmentId,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// Creation of a new academic session.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionRequest {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_active: bool,
}
