use crate::layout::RegistryLayout;
use crate::{fsync_dir, StoreError};
use chrono::NaiveDate;
use rollbook_schema::types::SessionId;
use rollbook_schema::validate::{validate_date_window, validate_session_name};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// One academic session (year window).
///
/// `is_locked` is a monotonic one-way flag: once set, every dependent
/// enrollment, mark, or fee record is frozen and the flag never resets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
    pub is_locked: bool,
    pub created_at: String,
    pub updated_at: String,
    /// blake3 checksum for integrity verification. `None` for legacy records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl SessionRecord {
    /// Compute the checksum over the record content (excluding the checksum field itself).
    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

/// Derive a session identifier from its unique name.
fn derive_session_id(name: &str) -> SessionId {
    SessionId::new(blake3::hash(format!("session\n{name}").as_bytes()).to_hex().to_string())
}

/// The Session Registry: owns session records and their active/locked flags.
pub struct SessionStore {
    layout: RegistryLayout,
}

impl SessionStore {
    pub fn new(layout: RegistryLayout) -> Self {
        Self { layout }
    }

    /// Create a new session. Fails on an invalid name, a reversed or empty
    /// date window, or a duplicate name. The new session starts inactive;
    /// activation is a separate single-winner operation.
    pub fn create(
        &self,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<SessionRecord, StoreError> {
        validate_session_name(name)?;
        validate_date_window(start_date, end_date)?;

        if let Ok(existing) = self.get_by_name(name) {
            return Err(StoreError::DuplicateSessionName {
                name: name.to_owned(),
                existing_session_id: existing.session_id[..12.min(existing.session_id.len())]
                    .to_owned(),
            });
        }

        let now = chrono::Utc::now().to_rfc3339();
        let record = SessionRecord {
            session_id: derive_session_id(name),
            name: name.to_owned(),
            start_date,
            end_date,
            is_active: false,
            is_locked: false,
            created_at: now.clone(),
            updated_at: now,
            checksum: None,
        };
        self.put(&record)?;
        Ok(record)
    }

    pub fn put(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let dest = self.layout.session_path(&record.session_id);

        let mut with_checksum = record.clone();
        with_checksum.checksum = Some(with_checksum.compute_checksum()?);
        let content = serde_json::to_string_pretty(&with_checksum)?;

        let dir = self.layout.sessions_dir();
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;

        Ok(())
    }

    pub fn get(&self, session_id: &str) -> Result<SessionRecord, StoreError> {
        let path = self.layout.session_path(session_id);
        if !path.exists() {
            return Err(StoreError::SessionNotFound(session_id.to_owned()));
        }
        let content = fs::read_to_string(&path)?;
        let record: SessionRecord = serde_json::from_str(&content)?;

        if let Some(ref expected) = record.checksum {
            let actual = record.compute_checksum()?;
            if actual != *expected {
                return Err(StoreError::IntegrityFailure {
                    id: session_id.to_owned(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(record)
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.layout.session_path(session_id).exists()
    }

    pub fn get_by_name(&self, name: &str) -> Result<SessionRecord, StoreError> {
        let all = self.list()?;
        all.into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| StoreError::SessionNotFound(format!("name '{name}'")))
    }

    /// The session new enrollments default into, if one is active.
    pub fn active(&self) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.list()?.into_iter().find(|s| s.is_active))
    }

    pub fn list(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let dir = self.layout.sessions_dir();
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
                            tracing::warn!("skipping corrupted session record '{name_str}': {e}");
                        }
                    }
                }
            }
        }
        results.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(results)
    }

    /// Set the one-way lock flag. Idempotent: locking an already-locked
    /// session is a no-op success so retries after a partial network
    /// failure are safe. Locking also clears `is_active` — a locked
    /// session can never be the default target for new enrollments.
    pub fn lock(&self, session_id: &str) -> Result<SessionRecord, StoreError> {
        let mut record = self.get(session_id)?;
        if record.is_locked {
            tracing::debug!("session {session_id} already locked; no-op");
            return Ok(record);
        }
        record.is_locked = true;
        record.is_active = false;
        record.updated_at = chrono::Utc::now().to_rfc3339();
        self.put(&record)?;
        tracing::info!("session {session_id} ('{}') locked", record.name);
        Ok(record)
    }

    pub fn is_locked(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.get(session_id)?.is_locked)
    }
}
