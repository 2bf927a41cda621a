//! End-to-end lifecycle scenarios against a real on-disk registry.

use chrono::NaiveDate;
use rollbook_core::{CoreError, Engine};
use rollbook_schema::requests::{
    ClosureRequest, EnrollRequest, PromotionRequest, RetentionRequest, SessionRequest,
};
use rollbook_store::{
    EnrollmentFilter, EnrollmentStatus, EnrollmentStore, Journal, JournalOpKind, RegistryLayout,
    RollbackStep, SessionRecord, StoreError,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn make_session(engine: &Engine, name: &str, year: i32) -> SessionRecord {
    engine
        .create_session(&SessionRequest {
            name: name.to_owned(),
            start_date: date(year, 4, 1),
            end_date: date(year + 1, 3, 31),
            is_active: false,
        })
        .unwrap()
}

fn enroll(
    engine: &Engine,
    session: &SessionRecord,
    student: &str,
    roll: &str,
) -> rollbook_store::EnrollmentRecord {
    engine
        .enroll(&EnrollRequest {
            student_id: student.into(),
            session_id: session.session_id.clone(),
            class_id: "class-5".into(),
            section_id: "sec-a".into(),
            roll_no: roll.to_owned(),
        })
        .unwrap()
}

#[test]
fn full_promotion_flow_preserves_history() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    let old = make_session(&engine, "2023-24", 2023);
    let new = make_session(&engine, "2024-25", 2024);

    let src = enroll(&engine, &old, "S1", "01");
    let outcome = engine
        .promote(&PromotionRequest {
            enrollment_id: src.enrollment_id.clone(),
            session_id: new.session_id.clone(),
            class_id: "class-6".into(),
            section_id: "sec-a".into(),
            roll_no: None,
        })
        .unwrap();

    // Source row survives as history with a link to its successor.
    let closed = engine.enrollment(&src.enrollment_id).unwrap();
    assert_eq!(closed.status, EnrollmentStatus::Promoted);
    assert_eq!(closed.promoted_to, Some(outcome.opened.enrollment_id.clone()));
    assert_eq!(closed.roll_no, "01");
    assert_eq!(closed.session_id, old.session_id);

    // The student has exactly one active row, in the new session.
    assert!(engine
        .find_active(&"S1".into(), &old.session_id)
        .unwrap()
        .is_none());
    let active = engine
        .find_active(&"S1".into(), &new.session_id)
        .unwrap()
        .unwrap();
    assert_eq!(active.enrollment_id, outcome.opened.enrollment_id);
    assert_eq!(active.class_id, "class-6");

    let history = engine.student_history(&"S1".into()).unwrap();
    assert_eq!(history.len(), 2);
}

#[test]
fn bulk_promotion_is_all_or_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    let old = make_session(&engine, "2023-24", 2023);
    let new = make_session(&engine, "2024-25", 2024);

    let a = enroll(&engine, &old, "S1", "01");
    let b = enroll(&engine, &old, "S2", "02");

    let promo = |enrollment_id, roll_no| PromotionRequest {
        enrollment_id,
        session_id: new.session_id.clone(),
        class_id: "class-6".into(),
        section_id: "sec-a".into(),
        roll_no,
    };

    // The middle entry references a nonexistent source row.
    let reqs = vec![
        promo(a.enrollment_id.clone(), None),
        promo("f".repeat(64).into(), None),
        promo(b.enrollment_id.clone(), None),
    ];
    let err = engine.bulk_promote(&reqs).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Store(StoreError::EnrollmentNotFound(_))
    ));

    // Nothing was committed: both sources are still active and the
    // destination session has no rows at all.
    assert_eq!(
        engine.enrollment(&a.enrollment_id).unwrap().status,
        EnrollmentStatus::Active
    );
    assert_eq!(
        engine.enrollment(&b.enrollment_id).unwrap().status,
        EnrollmentStatus::Active
    );
    let filter = EnrollmentFilter {
        session_id: Some(new.session_id.clone()),
        ..Default::default()
    };
    assert!(engine.list_enrollments(&filter).unwrap().is_empty());
}

#[test]
fn bulk_promotion_rejects_intra_batch_roll_collision() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    let old = make_session(&engine, "2023-24", 2023);
    let new = make_session(&engine, "2024-25", 2024);

    let a = enroll(&engine, &old, "S1", "01");
    let b = enroll(&engine, &old, "S2", "02");

    let reqs = vec![
        PromotionRequest {
            enrollment_id: a.enrollment_id.clone(),
            session_id: new.session_id.clone(),
            class_id: "class-6".into(),
            section_id: "sec-a".into(),
            roll_no: Some("05".to_owned()),
        },
        PromotionRequest {
            enrollment_id: b.enrollment_id.clone(),
            session_id: new.session_id.clone(),
            class_id: "class-6".into(),
            section_id: "sec-a".into(),
            roll_no: Some("05".to_owned()),
        },
    ];
    let err = engine.bulk_promote(&reqs).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Store(StoreError::DuplicateRollNumber { ref roll_no, .. }) if roll_no == "05"
    ));
    assert_eq!(
        engine.enrollment(&a.enrollment_id).unwrap().status,
        EnrollmentStatus::Active
    );
}

#[test]
fn session_lock_freezes_all_mutations() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    let old = make_session(&engine, "2023-24", 2023);
    let new = make_session(&engine, "2024-25", 2024);
    let src = enroll(&engine, &old, "S1", "01");

    engine.lock_session(&old.session_id).unwrap();
    // Locking again is a safe no-op.
    engine.lock_session(&old.session_id).unwrap();
    assert!(engine.is_session_locked(&old.session_id).unwrap());

    let enroll_err = engine
        .enroll(&EnrollRequest {
            student_id: "S9".into(),
            session_id: old.session_id.clone(),
            class_id: "class-5".into(),
            section_id: "sec-a".into(),
            roll_no: "09".to_owned(),
        })
        .unwrap_err();
    assert!(matches!(enroll_err, CoreError::Store(StoreError::Locked(_))));

    let promote_err = engine
        .promote(&PromotionRequest {
            enrollment_id: src.enrollment_id.clone(),
            session_id: new.session_id.clone(),
            class_id: "class-6".into(),
            section_id: "sec-a".into(),
            roll_no: None,
        })
        .unwrap_err();
    assert!(matches!(promote_err, CoreError::Store(StoreError::Locked(_))));

    let retain_err = engine
        .retain(&RetentionRequest {
            enrollment_id: src.enrollment_id.clone(),
            session_id: new.session_id.clone(),
            roll_no: None,
        })
        .unwrap_err();
    assert!(matches!(retain_err, CoreError::Store(StoreError::Locked(_))));

    let transfer_err = engine
        .transfer(&ClosureRequest {
            enrollment_id: src.enrollment_id.clone(),
            remarks: None,
        })
        .unwrap_err();
    assert!(matches!(transfer_err, CoreError::Store(StoreError::Locked(_))));

    // The frozen row is untouched.
    assert_eq!(
        engine.enrollment(&src.enrollment_id).unwrap().status,
        EnrollmentStatus::Active
    );
}

#[test]
fn locked_session_still_serves_reads() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    let old = make_session(&engine, "2023-24", 2023);
    let src = enroll(&engine, &old, "S1", "01");
    engine.lock_session(&old.session_id).unwrap();

    assert_eq!(
        engine.enrollment(&src.enrollment_id).unwrap().roll_no,
        "01"
    );
    let filter = EnrollmentFilter {
        session_id: Some(old.session_id.clone()),
        ..Default::default()
    };
    assert_eq!(engine.list_enrollments(&filter).unwrap().len(), 1);
}

#[test]
fn concurrent_double_promotion_has_exactly_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    let old = make_session(&engine, "2023-24", 2023);
    let new = make_session(&engine, "2024-25", 2024);
    let src = enroll(&engine, &old, "S1", "01");
    drop(engine);

    let root = dir.path().to_path_buf();
    let mut handles = Vec::new();
    for roll in ["01", "02"] {
        let root = root.clone();
        let enrollment_id = src.enrollment_id.clone();
        let session_id = new.session_id.clone();
        let roll = roll.to_owned();
        handles.push(std::thread::spawn(move || {
            let engine = Engine::open(&root)?;
            engine
                .promote(&PromotionRequest {
                    enrollment_id,
                    session_id,
                    class_id: "class-6".into(),
                    section_id: "sec-a".into(),
                    roll_no: Some(roll),
                })
                .map(|_| ())
        }));
    }

    let results: Vec<Result<(), CoreError>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one promotion may win");

    let engine = Engine::open(dir.path()).unwrap();
    assert_eq!(
        engine.enrollment(&src.enrollment_id).unwrap().status,
        EnrollmentStatus::Promoted
    );
    let filter = EnrollmentFilter {
        session_id: Some(new.session_id.clone()),
        ..Default::default()
    };
    assert_eq!(
        engine.list_enrollments(&filter).unwrap().len(),
        1,
        "the loser must not leave a second destination row"
    );
}

#[test]
fn startup_recovery_rolls_back_interrupted_batch() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    let old = make_session(&engine, "2023-24", 2023);
    let new = make_session(&engine, "2024-25", 2024);
    let src = enroll(&engine, &old, "S1", "01");
    drop(engine);

    // Hand-craft the on-disk state of a process that died mid-promotion:
    // destination written, source flipped, journal entry never committed.
    let layout = RegistryLayout::new(dir.path());
    let enrollments = EnrollmentStore::new(layout.clone());
    let journal = Journal::new(&layout);

    let dest = rollbook_store::EnrollmentRecord::new(
        "S1".into(),
        new.session_id.clone(),
        "class-6".into(),
        "sec-a".into(),
        "01".to_owned(),
    );
    let op_id = journal
        .begin(JournalOpKind::Promote, src.enrollment_id.as_str())
        .unwrap();
    journal
        .add_rollback_step(
            &op_id,
            RollbackStep::RemoveFile(layout.enrollment_path(&dest.enrollment_id)),
        )
        .unwrap();
    enrollments.put(&dest).unwrap();
    journal
        .add_rollback_step(&op_id, RollbackStep::RestoreEnrollment(Box::new(src.clone())))
        .unwrap();
    enrollments
        .close_with_status(
            &src.enrollment_id,
            EnrollmentStatus::Promoted,
            None,
            Some(dest.enrollment_id.clone()),
            None,
        )
        .unwrap();

    // Reopening the registry must undo both writes.
    let engine = Engine::open(dir.path()).unwrap();
    let restored = engine.enrollment(&src.enrollment_id).unwrap();
    assert_eq!(restored.status, EnrollmentStatus::Active);
    assert_eq!(restored.promoted_to, None);
    assert!(matches!(
        engine.enrollment(&dest.enrollment_id),
        Err(CoreError::Store(StoreError::EnrollmentNotFound(_)))
    ));
}

#[test]
fn retention_next_available_skips_taken_rolls() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    let old = make_session(&engine, "2023-24", 2023);
    let new = make_session(&engine, "2024-25", 2024);

    // "01" is already taken in the destination scope by another student.
    engine
        .enroll(&EnrollRequest {
            student_id: "S2".into(),
            session_id: new.session_id.clone(),
            class_id: "class-5".into(),
            section_id: "sec-a".into(),
            roll_no: "01".to_owned(),
        })
        .unwrap();

    let src = enroll(&engine, &old, "S1", "01");
    let outcome = engine
        .retain(&RetentionRequest {
            enrollment_id: src.enrollment_id,
            session_id: new.session_id.clone(),
            roll_no: None,
        })
        .unwrap();
    assert_eq!(outcome.opened.roll_no, "02");
    assert_eq!(outcome.opened.class_id, "class-5");
}

#[test]
fn reenrollment_after_drop_is_a_fresh_row() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    let session = make_session(&engine, "2023-24", 2023);

    let first = enroll(&engine, &session, "S1", "01");
    engine
        .drop_out(&ClosureRequest {
            enrollment_id: first.enrollment_id.clone(),
            remarks: Some("left mid-year".to_owned()),
        })
        .unwrap();

    // The old roll number stays occupied as history; re-admission gets a
    // new row under a new roll.
    let second = engine
        .enroll(&EnrollRequest {
            student_id: "S1".into(),
            session_id: session.session_id.clone(),
            class_id: "class-5".into(),
            section_id: "sec-a".into(),
            roll_no: "02".to_owned(),
        })
        .unwrap();
    assert_ne!(second.enrollment_id, first.enrollment_id);

    let history = engine.student_history(&"S1".into()).unwrap();
    assert_eq!(history.len(), 2);
}
