use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Current registry format version. Incremented on incompatible layout changes.
pub const REGISTRY_FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "version";

/// Directory layout for the Rollbook registry.
///
/// Sessions and enrollments live in per-record JSON files; the journal
/// holds in-flight multi-record mutations. All subdirectories are created
/// lazily on [`initialize`](Self::initialize).
#[derive(Debug, Clone)]
pub struct RegistryLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryVersion {
    format_version: u32,
}

impl RegistryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("registry").join("sessions")
    }

    #[inline]
    pub fn enrollments_dir(&self) -> PathBuf {
        self.root.join("registry").join("enrollments")
    }

    #[inline]
    pub fn journal_dir(&self) -> PathBuf {
        self.root.join("registry").join("journal")
    }

    #[inline]
    pub fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(session_id)
    }

    #[inline]
    pub fn enrollment_path(&self, enrollment_id: &str) -> PathBuf {
        self.enrollments_dir().join(enrollment_id)
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join("registry").join(".lock")
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.sessions_dir())?;
        fs::create_dir_all(self.enrollments_dir())?;
        fs::create_dir_all(self.journal_dir())?;

        let version_path = self.root.join("registry").join(VERSION_FILE);
        if version_path.exists() {
            self.verify_version()?;
        } else {
            let ver = RegistryVersion {
                format_version: REGISTRY_FORMAT_VERSION,
            };
            let content = serde_json::to_string_pretty(&ver)?;
            let registry_dir = self.root.join("registry");
            let mut tmp = NamedTempFile::new_in(&registry_dir)?;
            tmp.write_all(content.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&version_path)
                .map_err(|e| StoreError::Io(e.error))?;
            crate::fsync_dir(&registry_dir)?;
        }

        Ok(())
    }

    pub fn verify_version(&self) -> Result<(), StoreError> {
        let version_path = self.root.join("registry").join(VERSION_FILE);
        let content = fs::read_to_string(&version_path)?;
        let ver: RegistryVersion = serde_json::from_str(&content)?;

        if ver.format_version != REGISTRY_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: REGISTRY_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = RegistryLayout::new("/tmp/rollbook-test");
        assert_eq!(
            layout.sessions_dir(),
            PathBuf::from("/tmp/rollbook-test/registry/sessions")
        );
        assert_eq!(
            layout.enrollments_dir(),
            PathBuf::from("/tmp/rollbook-test/registry/enrollments")
        );
        assert_eq!(
            layout.journal_dir(),
            PathBuf::from("/tmp/rollbook-test/registry/journal")
        );
        assert_eq!(
            layout.enrollment_path("abc123"),
            PathBuf::from("/tmp/rollbook-test/registry/enrollments/abc123")
        );
    }

    #[test]
    fn initialize_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RegistryLayout::new(dir.path());
        layout.initialize().unwrap();

        assert!(layout.sessions_dir().is_dir());
        assert!(layout.enrollments_dir().is_dir());
        assert!(layout.journal_dir().is_dir());
    }

    #[test]
    fn initialize_writes_version() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RegistryLayout::new(dir.path());
        layout.initialize().unwrap();
        layout.verify_version().unwrap();
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RegistryLayout::new(dir.path());
        layout.initialize().unwrap();
        layout.initialize().unwrap();
        layout.verify_version().unwrap();
    }

    #[test]
    fn verify_version_rejects_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RegistryLayout::new(dir.path());
        layout.initialize().unwrap();
        fs::write(
            dir.path().join("registry").join("version"),
            r#"{"format_version": 99}"#,
        )
        .unwrap();
        assert!(matches!(
            layout.verify_version(),
            Err(StoreError::VersionMismatch { found: 99, .. })
        ));
    }
}
