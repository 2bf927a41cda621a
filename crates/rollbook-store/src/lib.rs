//! File-backed storage layer for the Rollbook enrollment registry.
//!
//! This crate provides `SessionStore` for academic-session records and their
//! one-way lock flag, `EnrollmentStore` for per-student per-session enrollment
//! rows, `RollAllocator` for (session, class, section, roll_no) uniqueness,
//! `RegistryLayout` for directory structure management, and `Journal` — a
//! write-ahead log that makes multi-record mutations all-or-nothing and rolls
//! back incomplete work after a crash.

pub mod enrollments;
pub mod journal;
pub mod layout;
pub mod rolls;
pub mod sessions;

pub use enrollments::{EnrollmentFilter, EnrollmentRecord, EnrollmentStatus, EnrollmentStore};
pub use journal::{Journal, JournalOpKind, RollbackStep};
pub use layout::{RegistryLayout, REGISTRY_FORMAT_VERSION};
pub use rolls::{ReservationToken, RollAllocator};
pub use sessions::{SessionRecord, SessionStore};

use std::path::Path;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// On Linux with ext4 `data=ordered` (the default), renames are usually
/// durable without an explicit dir fsync, but POSIX does not guarantee this.
/// Calling `fsync()` on the parent directory makes the rename durable on
/// all filesystems and mount configurations.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("validation error: {0}")]
    Validation(#[from] rollbook_schema::ValidationError),
    #[error("integrity check failed for record '{id}': expected {expected}, got {actual}")]
    IntegrityFailure {
        id: String,
        expected: String,
        actual: String,
    },
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("enrollment not found: {0}")]
    EnrollmentNotFound(String),
    #[error("session '{0}' is locked")]
    Locked(String),
    #[error("session name '{name}' is already used by session {existing_session_id}")]
    DuplicateSessionName {
        name: String,
        existing_session_id: String,
    },
    #[error("roll number '{roll_no}' already in use in session {session_id}, class {class_id}, section {section_id}")]
    DuplicateRollNumber {
        session_id: String,
        class_id: String,
        section_id: String,
        roll_no: String,
    },
    #[error("student '{student_id}' already has an active enrollment in session {session_id}")]
    DuplicateActiveEnrollment {
        student_id: String,
        session_id: String,
    },
    #[error("invalid transition: enrollment '{enrollment_id}' is '{status}', expected 'active'")]
    NotActive {
        enrollment_id: String,
        status: String,
    },
    #[error("registry format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_locked() {
        let e = StoreError::Locked("2023-24".to_owned());
        assert!(e.to_string().contains("locked"));
        assert!(e.to_string().contains("2023-24"));
    }

    #[test]
    fn store_error_display_duplicate_roll_number() {
        let e = StoreError::DuplicateRollNumber {
            session_id: "s1".to_owned(),
            class_id: "c5".to_owned(),
            section_id: "a".to_owned(),
            roll_no: "05".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("05"));
        assert!(msg.contains("already in use"));
    }

    #[test]
    fn store_error_display_duplicate_active_enrollment() {
        let e = StoreError::DuplicateActiveEnrollment {
            student_id: "S1".to_owned(),
            session_id: "s1".to_owned(),
        };
        assert!(e.to_string().contains("active enrollment"));
    }

    #[test]
    fn store_error_display_not_active() {
        let e = StoreError::NotActive {
            enrollment_id: "e1".to_owned(),
            status: "promoted".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("invalid transition"));
        assert!(msg.contains("promoted"));
    }

    #[test]
    fn store_error_display_session_not_found() {
        let e = StoreError::SessionNotFound("missing".to_owned());
        assert!(e.to_string().contains("missing"));
    }

    #[test]
    fn store_error_display_version_mismatch() {
        let e = StoreError::VersionMismatch {
            expected: 1,
            found: 2,
        };
        let msg = e.to_string();
        assert!(msg.contains('1'));
        assert!(msg.contains('2'));
    }

    #[test]
    fn store_error_display_duplicate_session_name() {
        let e = StoreError::DuplicateSessionName {
            name: "2023-24".to_owned(),
            existing_session_id: "abc123".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("2023-24"));
        assert!(msg.contains("abc123"));
    }
}
