use crate::enrollments::{EnrollmentFilter, EnrollmentStore};
use crate::StoreError;
use rollbook_schema::types::{ClassId, SectionId, SessionId};
use rollbook_schema::validate::validate_roll_no;
use std::collections::HashSet;

/// A reservation for one (session, class, section, roll_no) tuple.
///
/// Tokens only live for the duration of a single engine mutation, which runs
/// under the exclusive registry lock — a reservation that is not committed
/// dies with the allocator and never permanently blocks the roll number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReservationToken {
    pub session_id: SessionId,
    pub class_id: ClassId,
    pub section_id: SectionId,
    pub roll_no: String,
}

/// Enforces roll-number uniqueness scoped to (session, class, section).
///
/// Occupancy counts every existing row in scope, terminal or not: closed
/// enrollments keep their roll number as history. The pending set catches
/// intra-batch collisions during bulk validation, before any write.
pub struct RollAllocator<'a> {
    store: &'a EnrollmentStore,
    pending: HashSet<ReservationToken>,
}

impl<'a> RollAllocator<'a> {
    pub fn new(store: &'a EnrollmentStore) -> Self {
        Self {
            store,
            pending: HashSet::new(),
        }
    }

    /// Reserve a tuple, failing if it is occupied by any committed row in
    /// scope or already reserved within this allocator's batch.
    pub fn reserve(
        &mut self,
        session_id: &SessionId,
        class_id: &ClassId,
        section_id: &SectionId,
        roll_no: &str,
    ) -> Result<ReservationToken, StoreError> {
        validate_roll_no(roll_no)?;

        let token = ReservationToken {
            session_id: session_id.clone(),
            class_id: class_id.clone(),
            section_id: section_id.clone(),
            roll_no: roll_no.to_owned(),
        };

        if self.pending.contains(&token) || self.is_occupied(session_id, class_id, section_id, roll_no)? {
            return Err(StoreError::DuplicateRollNumber {
                session_id: session_id.to_string(),
                class_id: class_id.to_string(),
                section_id: section_id.to_string(),
                roll_no: roll_no.to_owned(),
            });
        }

        self.pending.insert(token.clone());
        Ok(token)
    }

    /// Free a tuple reserved earlier in this batch.
    pub fn release(&mut self, token: &ReservationToken) {
        self.pending.remove(token);
    }

    /// Smallest unused numeric roll number in scope, starting at "01",
    /// zero-padded to at least two digits. Counts both committed rows and
    /// pending reservations so repeated calls inside one batch progress.
    pub fn next_available(
        &self,
        session_id: &SessionId,
        class_id: &ClassId,
        section_id: &SectionId,
    ) -> Result<String, StoreError> {
        let filter = EnrollmentFilter {
            session_id: Some(session_id.clone()),
            class_id: Some(class_id.clone()),
            section_id: Some(section_id.clone()),
            ..Default::default()
        };
        let mut taken: HashSet<u32> = self
            .store
            .list_filtered(&filter)?
            .iter()
            .filter_map(|r| r.roll_no.parse().ok())
            .collect();
        taken.extend(
            self.pending
                .iter()
                .filter(|t| {
                    t.session_id == *session_id
                        && t.class_id == *class_id
                        && t.section_id == *section_id
                })
                .filter_map(|t| t.roll_no.parse::<u32>().ok()),
        );

        let mut n = 1;
        while taken.contains(&n) {
            n += 1;
        }
        Ok(format!("{n:02}"))
    }

    fn is_occupied(
        &self,
        session_id: &SessionId,
        class_id: &ClassId,
        section_id: &SectionId,
        roll_no: &str,
    ) -> Result<bool, StoreError> {
        let filter = EnrollmentFilter {
            session_id: Some(session_id.clone()),
            class_id: Some(class_id.clone()),
            section_id: Some(section_id.clone()),
            ..Default::default()
        };
        Ok(self
            .store
            .list_filtered(&filter)?
            .iter()
            .any(|r| r.roll_no == roll_no))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollments::{EnrollmentRecord, EnrollmentStatus};
    use crate::layout::RegistryLayout;

    fn test_store() -> (tempfile::TempDir, EnrollmentStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = RegistryLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, EnrollmentStore::new(layout))
    }

    fn enroll(store: &EnrollmentStore, student: &str, roll: &str) -> EnrollmentRecord {
        let rec = EnrollmentRecord::new(
            student.into(),
            "2023-24".into(),
            "class-5".into(),
            "sec-a".into(),
            roll.to_owned(),
        );
        store.put(&rec).unwrap();
        rec
    }

    #[test]
    fn reserve_free_tuple_succeeds() {
        let (_dir, store) = test_store();
        let mut alloc = RollAllocator::new(&store);
        let token = alloc
            .reserve(&"2023-24".into(), &"class-5".into(), &"sec-a".into(), "01")
            .unwrap();
        assert_eq!(token.roll_no, "01");
    }

    #[test]
    fn reserve_occupied_tuple_fails() {
        let (_dir, store) = test_store();
        enroll(&store, "S1", "01");

        let mut alloc = RollAllocator::new(&store);
        let err = alloc
            .reserve(&"2023-24".into(), &"class-5".into(), &"sec-a".into(), "01")
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateRollNumber { .. }));
    }

    #[test]
    fn terminal_rows_still_occupy_their_roll() {
        let (_dir, store) = test_store();
        let rec = enroll(&store, "S1", "01");
        store
            .close_with_status(&rec.enrollment_id, EnrollmentStatus::Graduated, None, None, None)
            .unwrap();

        let mut alloc = RollAllocator::new(&store);
        assert!(alloc
            .reserve(&"2023-24".into(), &"class-5".into(), &"sec-a".into(), "01")
            .is_err());
    }

    #[test]
    fn intra_batch_duplicate_detected() {
        let (_dir, store) = test_store();
        let mut alloc = RollAllocator::new(&store);
        alloc
            .reserve(&"2023-24".into(), &"class-5".into(), &"sec-a".into(), "05")
            .unwrap();
        let err = alloc
            .reserve(&"2023-24".into(), &"class-5".into(), &"sec-a".into(), "05")
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateRollNumber { .. }));
    }

    #[test]
    fn different_sections_may_share_roll_numbers() {
        let (_dir, store) = test_store();
        let mut alloc = RollAllocator::new(&store);
        alloc
            .reserve(&"2023-24".into(), &"class-5".into(), &"sec-a".into(), "01")
            .unwrap();
        assert!(alloc
            .reserve(&"2023-24".into(), &"class-5".into(), &"sec-b".into(), "01")
            .is_ok());
    }

    #[test]
    fn release_frees_pending_tuple() {
        let (_dir, store) = test_store();
        let mut alloc = RollAllocator::new(&store);
        let token = alloc
            .reserve(&"2023-24".into(), &"class-5".into(), &"sec-a".into(), "01")
            .unwrap();
        alloc.release(&token);
        assert!(alloc
            .reserve(&"2023-24".into(), &"class-5".into(), &"sec-a".into(), "01")
            .is_ok());
    }

    #[test]
    fn next_available_starts_at_01() {
        let (_dir, store) = test_store();
        let alloc = RollAllocator::new(&store);
        let roll = alloc
            .next_available(&"2023-24".into(), &"class-5".into(), &"sec-a".into())
            .unwrap();
        assert_eq!(roll, "01");
    }

    #[test]
    fn next_available_skips_committed_and_pending() {
        let (_dir, store) = test_store();
        enroll(&store, "S1", "01");

        let mut alloc = RollAllocator::new(&store);
        alloc
            .reserve(&"2023-24".into(), &"class-5".into(), &"sec-a".into(), "02")
            .unwrap();
        let roll = alloc
            .next_available(&"2023-24".into(), &"class-5".into(), &"sec-a".into())
            .unwrap();
        assert_eq!(roll, "03");
    }

    #[test]
    fn next_available_ignores_non_numeric_rolls() {
        let (_dir, store) = test_store();
        enroll(&store, "S1", "A-17");

        let alloc = RollAllocator::new(&store);
        let roll = alloc
            .next_available(&"2023-24".into(), &"class-5".into(), &"sec-a".into())
            .unwrap();
        assert_eq!(roll, "01");
    }

    #[test]
    fn reserve_rejects_malformed_roll() {
        let (_dir, store) = test_store();
        let mut alloc = RollAllocator::new(&store);
        assert!(matches!(
            alloc.reserve(&"2023-24".into(), &"class-5".into(), &"sec-a".into(), ""),
            Err(StoreError::Validation(_))
        ));
    }
}
