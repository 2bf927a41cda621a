//! Shared vocabulary for the Rollbook enrollment registry.
//!
//! This crate defines the typed identifiers used across the workspace, the
//! validation rules for administrator input (session names, date windows,
//! roll numbers), the request types of the lifecycle API, and the TOML
//! roster format consumed by bulk promotion.

pub mod requests;
pub mod roster;
pub mod types;
pub mod validate;

pub use requests::{ClosureRequest, EnrollRequest, PromotionRequest, RetentionRequest, SessionRequest};
pub use roster::{parse_roster_file, parse_roster_str, RosterError, RosterV1};
pub use types::{ClassId, EnrollmentId, SectionId, SessionId, ShortId, StudentId};
pub use validate::{validate_date_window, validate_roll_no, validate_session_name, ValidationError};
