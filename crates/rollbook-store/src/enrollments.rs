use crate::layout::RegistryLayout;
use crate::{fsync_dir, StoreError};
use chrono::NaiveDate;
use rollbook_schema::types::{ClassId, EnrollmentId, SectionId, SessionId, ShortId, StudentId};
use rollbook_schema::validate::validate_roll_no;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// Closed status set for an enrollment row.
///
/// `Active` is the sole non-terminal state; every other status is absorbing
/// for that (student, session) pair. Transitions preserve history: the old
/// row keeps its terminal status and a new row is opened in the destination
/// session where one exists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Promoted,
    Retained,
    Transferred,
    Graduated,
    Dropped,
}

impl EnrollmentStatus {
    pub fn is_terminal(self) -> bool {
        self != EnrollmentStatus::Active
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrollmentStatus::Active => write!(f, "active"),
            EnrollmentStatus::Promoted => write!(f, "promoted"),
            EnrollmentStatus::Retained => write!(f, "retained"),
            EnrollmentStatus::Transferred => write!(f, "transferred"),
            EnrollmentStatus::Graduated => write!(f, "graduated"),
            EnrollmentStatus::Dropped => write!(f, "dropped"),
        }
    }
}

impl std::str::FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EnrollmentStatus::Active),
            "promoted" => Ok(EnrollmentStatus::Promoted),
            "retained" => Ok(EnrollmentStatus::Retained),
            "transferred" => Ok(EnrollmentStatus::Transferred),
            "graduated" => Ok(EnrollmentStatus::Graduated),
            "dropped" => Ok(EnrollmentStatus::Dropped),
            other => Err(format!("unknown enrollment status '{other}'")),
        }
    }
}

/// One student's placement in a specific session/class/section.
///
/// Rows are never physically deleted; lifecycle transitions flip the status
/// to a terminal value and, for promote/retain, link `promoted_to` at the
/// destination row so history stays auditable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrollmentRecord {
    pub enrollment_id: EnrollmentId,
    pub short_id: ShortId,
    pub student_id: StudentId,
    pub session_id: SessionId,
    pub class_id: ClassId,
    pub section_id: SectionId,
    pub roll_no: String,
    pub status: EnrollmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_to: Option<EnrollmentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion_date: Option<NaiveDate>,
    #[serde(default)]
    pub remarks: String,
    pub created_at: String,
    pub updated_at: String,
    /// blake3 checksum for integrity verification. `None` for legacy records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl EnrollmentRecord {
    /// Build a fresh `active` row. The identifier is derived from the row
    /// content plus creation time, 64 hex chars with a 12-char short form.
    pub fn new(
        student_id: StudentId,
        session_id: SessionId,
        class_id: ClassId,
        section_id: SectionId,
        roll_no: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let digest = blake3::hash(
            format!(
                "enrollment\n{student_id}\n{session_id}\n{class_id}\n{section_id}\n{roll_no}\n{now}"
            )
            .as_bytes(),
        )
        .to_hex()
        .to_string();
        let short = digest[..12].to_owned();

        Self {
            enrollment_id: EnrollmentId::new(digest),
            short_id: ShortId::new(short),
            student_id,
            session_id,
            class_id,
            section_id,
            roll_no,
            status: EnrollmentStatus::Active,
            promoted_to: None,
            promotion_date: None,
            remarks: String::new(),
            created_at: now.clone(),
            updated_at: now,
            checksum: None,
        }
    }

    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

/// Optional filters for enrollment listings.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentFilter {
    pub session_id: Option<SessionId>,
    pub class_id: Option<ClassId>,
    pub section_id: Option<SectionId>,
    pub status: Option<EnrollmentStatus>,
    pub student_id: Option<StudentId>,
}

impl EnrollmentFilter {
    fn matches(&self, record: &EnrollmentRecord) -> bool {
        self.session_id
            .as_ref()
            .is_none_or(|s| record.session_id == *s)
            && self.class_id.as_ref().is_none_or(|c| record.class_id == *c)
            && self
                .section_id
                .as_ref()
                .is_none_or(|s| record.section_id == *s)
            && self.status.is_none_or(|s| record.status == s)
            && self
                .student_id
                .as_ref()
                .is_none_or(|s| record.student_id == *s)
    }
}

/// The Enrollment Store: owns per-student, per-session enrollment rows.
pub struct EnrollmentStore {
    layout: RegistryLayout,
}

impl EnrollmentStore {
    pub fn new(layout: RegistryLayout) -> Self {
        Self { layout }
    }

    pub fn put(&self, record: &EnrollmentRecord) -> Result<(), StoreError> {
        validate_roll_no(&record.roll_no)?;
        let dest = self.layout.enrollment_path(&record.enrollment_id);

        let mut with_checksum = record.clone();
        with_checksum.checksum = Some(with_checksum.compute_checksum()?);
        let content = serde_json::to_string_pretty(&with_checksum)?;

        let dir = self.layout.enrollments_dir();
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;

        Ok(())
    }

    pub fn get(&self, enrollment_id: &str) -> Result<EnrollmentRecord, StoreError> {
        let path = self.layout.enrollment_path(enrollment_id);
        if !path.exists() {
            return Err(StoreError::EnrollmentNotFound(enrollment_id.to_owned()));
        }
        let content = fs::read_to_string(&path)?;
        let record: EnrollmentRecord = serde_json::from_str(&content)?;

        if let Some(ref expected) = record.checksum {
            let actual = record.compute_checksum()?;
            if actual != *expected {
                return Err(StoreError::IntegrityFailure {
                    id: enrollment_id.to_owned(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(record)
    }

    pub fn exists(&self, enrollment_id: &str) -> bool {
        self.layout.enrollment_path(enrollment_id).exists()
    }

    pub fn list(&self) -> Result<Vec<EnrollmentRecord>, StoreError> {
        let dir = self.layout.enrollments_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let name = entry.file_name();
                let name_str = name.to_str().unwrap_or("");
                if !name_str.starts_with('.') {
                    match self.get(name_str) {
                        Ok(record) => results.push(record),
                        Err(e) => {
                            tracing::warn!(
                                "skipping corrupted enrollment record '{name_str}': {e}"
                            );
                        }
                    }
                }
            }
        }
        results.sort_by(|a, b| {
            (a.session_id.as_str(), a.roll_no.as_str(), a.enrollment_id.as_str()).cmp(&(
                b.session_id.as_str(),
                b.roll_no.as_str(),
                b.enrollment_id.as_str(),
            ))
        });
        Ok(results)
    }

    pub fn list_filtered(
        &self,
        filter: &EnrollmentFilter,
    ) -> Result<Vec<EnrollmentRecord>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    /// The at-most-one `active` row for this (student, session) pair.
    pub fn find_active(
        &self,
        student_id: &StudentId,
        session_id: &SessionId,
    ) -> Result<Option<EnrollmentRecord>, StoreError> {
        Ok(self.list()?.into_iter().find(|r| {
            r.student_id == *student_id
                && r.session_id == *session_id
                && r.status == EnrollmentStatus::Active
        }))
    }

    /// Full enrollment history for a student, newest session first by
    /// creation time. Used by marksheet rendering to recover the class/
    /// section/roll that were valid for a past exam session.
    pub fn list_by_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<EnrollmentRecord>, StoreError> {
        let mut rows: Vec<_> = self
            .list()?
            .into_iter()
            .filter(|r| r.student_id == *student_id)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    /// Close an `active` row with a terminal status. Fails with an
    /// invalid-transition error if the row is not currently active.
    /// The session lock check belongs to the caller (the engine gates
    /// every mutation before touching the store).
    pub fn close_with_status(
        &self,
        enrollment_id: &str,
        new_status: EnrollmentStatus,
        remarks: Option<&str>,
        promoted_to: Option<EnrollmentId>,
        promotion_date: Option<NaiveDate>,
    ) -> Result<EnrollmentRecord, StoreError> {
        let mut record = self.get(enrollment_id)?;
        if record.status != EnrollmentStatus::Active {
            return Err(StoreError::NotActive {
                enrollment_id: enrollment_id.to_owned(),
                status: record.status.to_string(),
            });
        }
        record.status = new_status;
        if let Some(r) = remarks {
            record.remarks = r.to_owned();
        }
        record.promoted_to = promoted_to;
        record.promotion_date = promotion_date;
        record.updated_at = chrono::Utc::now().to_rfc3339();
        self.put(&record)?;
        Ok(record)
    }
}
