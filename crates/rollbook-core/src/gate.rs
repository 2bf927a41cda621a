use crate::CoreError;
use rollbook_store::{SessionStore, StoreError};

/// Gate that rejects any mutation touching a locked session.
///
/// Every lifecycle operation consults the gate for each session it reads or
/// writes, source and destination alike, before the first store write.
pub struct LockGate<'a> {
    sessions: &'a SessionStore,
}

impl<'a> LockGate<'a> {
    pub fn new(sessions: &'a SessionStore) -> Self {
        Self { sessions }
    }

    pub fn assert_unlocked(&self, session_id: &str) -> Result<(), CoreError> {
        let record = self.sessions.get(session_id)?;
        if record.is_locked {
            return Err(CoreError::Store(StoreError::Locked(record.name)));
        }
        Ok(())
    }

    pub fn is_locked(&self, session_id: &str) -> Result<bool, CoreError> {
        Ok(self.sessions.is_locked(session_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rollbook_store::RegistryLayout;

    fn setup() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = RegistryLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, SessionStore::new(layout))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn unlocked_session_passes() {
        let (_dir, sessions) = setup();
        let s = sessions
            .create("2023-24", date(2023, 4, 1), date(2024, 3, 31))
            .unwrap();
        let gate = LockGate::new(&sessions);
        gate.assert_unlocked(&s.session_id).unwrap();
        assert!(!gate.is_locked(&s.session_id).unwrap());
    }

    #[test]
    fn locked_session_is_rejected() {
        let (_dir, sessions) = setup();
        let s = sessions
            .create("2023-24", date(2023, 4, 1), date(2024, 3, 31))
            .unwrap();
        sessions.lock(&s.session_id).unwrap();

        let gate = LockGate::new(&sessions);
        let err = gate.assert_unlocked(&s.session_id).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Store(StoreError::Locked(ref name)) if name == "2023-24"
        ));
        assert!(gate.is_locked(&s.session_id).unwrap());
    }

    #[test]
    fn missing_session_is_not_found() {
        let (_dir, sessions) = setup();
        let gate = LockGate::new(&sessions);
        assert!(matches!(
            gate.assert_unlocked("nonexistent"),
            Err(CoreError::Store(StoreError::SessionNotFound(_)))
        ));
    }
}
