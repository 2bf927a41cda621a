use crate::enrollments::{EnrollmentRecord, EnrollmentStore};
use crate::layout::RegistryLayout;
use crate::sessions::{SessionRecord, SessionStore};
use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// A single rollback step that can undo part of a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RollbackStep {
    /// Remove a newly created record file (e.g. a destination enrollment row).
    RemoveFile(PathBuf),
    /// Put a pre-mutation enrollment row back (e.g. re-open a source row
    /// whose status was flipped mid-batch).
    RestoreEnrollment(Box<EnrollmentRecord>),
    /// Put a pre-mutation session record back (e.g. re-activate the session
    /// that lost the active flag during a crashed single-winner flip).
    RestoreSession(Box<SessionRecord>),
}

/// The type of journaled mutation. Single-record writes (enroll, terminal
/// closures, the lock flag) are one atomic file rename and never journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JournalOpKind {
    Promote,
    BulkPromote,
    Retain,
    ActivateSession,
}

impl std::fmt::Display for JournalOpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JournalOpKind::Promote => write!(f, "promote"),
            JournalOpKind::BulkPromote => write!(f, "bulk-promote"),
            JournalOpKind::Retain => write!(f, "retain"),
            JournalOpKind::ActivateSession => write!(f, "activate-session"),
        }
    }
}

/// A journal entry representing an in-flight mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub op_id: String,
    pub kind: JournalOpKind,
    pub subject: String,
    pub timestamp: String,
    pub rollback_steps: Vec<RollbackStep>,
}

/// Write-ahead journal for all-or-nothing mutations and crash recovery.
///
/// Mutating engine methods create an entry before the first write, append
/// rollback steps as side effects occur, and remove the entry on successful
/// completion. A failed mutation aborts, executing its steps in reverse
/// immediately; on startup, incomplete entries from a crashed process are
/// rolled back before any new work.
pub struct Journal {
    layout: RegistryLayout,
    journal_dir: PathBuf,
}

impl Journal {
    pub fn new(layout: &RegistryLayout) -> Self {
        Self {
            layout: layout.clone(),
            journal_dir: layout.journal_dir(),
        }
    }

    /// Ensure the journal directory exists.
    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.journal_dir)?;
        Ok(())
    }

    /// Begin a new entry for a mutation. Returns the op_id.
    pub fn begin(&self, kind: JournalOpKind, subject: &str) -> Result<String, StoreError> {
        let op_id = format!(
            "{}-{}",
            chrono::Utc::now().format("%Y%m%d%H%M%S%3f"),
            &blake3::hash(subject.as_bytes()).to_hex()[..8]
        );
        let entry = JournalEntry {
            op_id: op_id.clone(),
            kind,
            subject: subject.to_owned(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            rollback_steps: Vec::new(),
        };
        self.write_entry(&entry)?;
        debug!("journal begin: {} for {subject} (op_id={op_id})", entry.kind);
        Ok(op_id)
    }

    /// Append a rollback step to an existing entry.
    pub fn add_rollback_step(&self, op_id: &str, step: RollbackStep) -> Result<(), StoreError> {
        let mut entry = self.read_entry(op_id)?;
        entry.rollback_steps.push(step);
        self.write_entry(&entry)?;
        Ok(())
    }

    /// Commit (remove) an entry after successful completion.
    pub fn commit(&self, op_id: &str) -> Result<(), StoreError> {
        let path = self.entry_path(op_id);
        if path.exists() {
            fs::remove_file(&path)?;
            debug!("journal commit: {op_id}");
        }
        Ok(())
    }

    /// Abort an in-flight mutation: execute its rollback steps in reverse
    /// and remove the entry. Used by the engine's error path so a failed
    /// batch leaves zero committed rows.
    pub fn abort(&self, op_id: &str) -> Result<(), StoreError> {
        let entry = self.read_entry(op_id)?;
        info!(
            "journal abort: rolling back {} on {} (op_id={op_id})",
            entry.kind, entry.subject
        );
        self.rollback_entry(&entry);
        let _ = fs::remove_file(self.entry_path(op_id));
        Ok(())
    }

    /// List all incomplete entries.
    pub fn list_incomplete(&self) -> Result<Vec<JournalEntry>, StoreError> {
        if !self.journal_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.journal_dir)? {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                match fs::read_to_string(&path) {
                    Ok(content) => match serde_json::from_str::<JournalEntry>(&content) {
                        Ok(entry) => entries.push(entry),
                        Err(e) => {
                            warn!("corrupt journal entry {}: {e}", path.display());
                            let _ = fs::remove_file(&path);
                        }
                    },
                    Err(e) => {
                        warn!("unreadable journal entry {}: {e}", path.display());
                        let _ = fs::remove_file(&path);
                    }
                }
            }
        }
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }

    /// Roll back all incomplete entries.
    /// Returns the number of entries rolled back.
    pub fn recover(&self) -> Result<usize, StoreError> {
        let entries = self.list_incomplete()?;
        let count = entries.len();
        for entry in &entries {
            info!(
                "journal recovery: rolling back {} on {} (op_id={})",
                entry.kind, entry.subject, entry.op_id
            );
            self.rollback_entry(entry);
            let _ = fs::remove_file(self.entry_path(&entry.op_id));
        }
        if count > 0 {
            info!("journal recovery complete: {count} entries rolled back");
        }
        Ok(count)
    }

    fn rollback_entry(&self, entry: &JournalEntry) {
        // Execute rollback steps in reverse order
        for step in entry.rollback_steps.iter().rev() {
            match step {
                RollbackStep::RemoveFile(path) => {
                    if path.exists() {
                        if let Err(e) = fs::remove_file(path) {
                            warn!(
                                "journal rollback: failed to remove file {}: {e}",
                                path.display()
                            );
                        } else {
                            debug!("journal rollback: removed file {}", path.display());
                        }
                    }
                }
                RollbackStep::RestoreEnrollment(record) => {
                    let store = EnrollmentStore::new(self.layout.clone());
                    if let Err(e) = store.put(record) {
                        warn!(
                            "journal rollback: failed to restore enrollment {}: {e}",
                            record.enrollment_id
                        );
                    } else {
                        debug!(
                            "journal rollback: restored enrollment {} to '{}'",
                            record.short_id, record.status
                        );
                    }
                }
                RollbackStep::RestoreSession(record) => {
                    let store = SessionStore::new(self.layout.clone());
                    if let Err(e) = store.put(record) {
                        warn!(
                            "journal rollback: failed to restore session {}: {e}",
                            record.session_id
                        );
                    } else {
                        debug!("journal rollback: restored session '{}'", record.name);
                    }
                }
            }
        }
    }

    fn entry_path(&self, op_id: &str) -> PathBuf {
        self.journal_dir.join(format!("{op_id}.json"))
    }

    fn write_entry(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        fs::create_dir_all(&self.journal_dir)?;
        let content = serde_json::to_string_pretty(entry)?;
        let mut tmp = NamedTempFile::new_in(&self.journal_dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        let dest = self.entry_path(&entry.op_id);
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        crate::fsync_dir(&self.journal_dir)?;
        Ok(())
    }

    fn read_entry(&self, op_id: &str) -> Result<JournalEntry, StoreError> {
        let path = self.entry_path(op_id);
        let content = fs::read_to_string(&path)?;
        let entry: JournalEntry = serde_json::from_str(&content)?;
        Ok(entry)
    }
}
