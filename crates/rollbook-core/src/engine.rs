use crate::concurrency::RegistryLock;
use crate::gate::LockGate;
use crate::lifecycle::validate_transition;
use crate::CoreError;
use rollbook_schema::requests::{
    ClosureRequest, EnrollRequest, PromotionRequest, RetentionRequest, SessionRequest,
};
use rollbook_schema::types::{ClassId, EnrollmentId, SectionId, SessionId, StudentId};
use rollbook_store::{
    EnrollmentFilter, EnrollmentRecord, EnrollmentStatus, EnrollmentStore, Journal, JournalOpKind,
    RegistryLayout, RollAllocator, RollbackStep, SessionRecord, SessionStore, StoreError,
};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// The closed source row and the fresh destination row of one transition.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransitionOutcome {
    pub closed: EnrollmentRecord,
    pub opened: EnrollmentRecord,
}

/// One planned transition, validated but not yet written.
struct TransitionPlan {
    source: EnrollmentRecord,
    destination: EnrollmentRecord,
    terminal: EnrollmentStatus,
}

/// Normalized input for the shared planning phase. `class_id`/`section_id`
/// default to the source row's placement when absent (retention).
struct TransitionInput {
    enrollment_id: EnrollmentId,
    session_id: SessionId,
    class_id: Option<ClassId>,
    section_id: Option<SectionId>,
    roll_no: Option<String>,
    terminal: EnrollmentStatus,
}

/// The lifecycle engine: the single entry point for every registry mutation.
///
/// Each mutating method acquires the exclusive registry lock before its first
/// read and holds it until the last write, so validation and write happen
/// against a consistent view. Multi-record mutations run through the journal
/// and are all-or-nothing; single-record mutations are one atomic file write.
pub struct Engine {
    layout: RegistryLayout,
    sessions: SessionStore,
    enrollments: EnrollmentStore,
    journal: Journal,
}

impl Engine {
    /// Open (creating if needed) the registry at `root` and roll back any
    /// mutation a previous process left incomplete.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, CoreError> {
        let layout = RegistryLayout::new(root.as_ref());
        layout.initialize()?;
        let journal = Journal::new(&layout);
        journal.initialize()?;

        // Recovery needs the registry to itself. If another process holds
        // the lock it is alive and its journal entries are still in flight,
        // so there is nothing to recover yet.
        match RegistryLock::try_acquire(&layout.lock_file())? {
            Some(_guard) => {
                let rolled_back = journal.recover()?;
                if rolled_back > 0 {
                    info!("rolled back {rolled_back} incomplete operation(s) on startup");
                }
            }
            None => debug!("registry lock held elsewhere; skipping startup recovery"),
        }

        Ok(Self {
            sessions: SessionStore::new(layout.clone()),
            enrollments: EnrollmentStore::new(layout.clone()),
            journal,
            layout,
        })
    }

    pub fn layout(&self) -> &RegistryLayout {
        &self.layout
    }

    // ----- session registry -----

    pub fn create_session(&self, req: &SessionRequest) -> Result<SessionRecord, CoreError> {
        let _guard = RegistryLock::acquire(&self.layout.lock_file())?;
        let record = self
            .sessions
            .create(&req.name, req.start_date, req.end_date)?;
        info!("created session '{}' ({})", record.name, &record.session_id[..12]);
        if req.is_active {
            return self.activate_session_locked(&record.session_id);
        }
        Ok(record)
    }

    /// Make `session_id` the single active session, deactivating all others.
    pub fn set_active_session(&self, session_id: &str) -> Result<SessionRecord, CoreError> {
        let _guard = RegistryLock::acquire(&self.layout.lock_file())?;
        self.activate_session_locked(session_id)
    }

    /// Activation flip, caller already holds the registry lock.
    fn activate_session_locked(&self, session_id: &str) -> Result<SessionRecord, CoreError> {
        let target = self.sessions.get(session_id)?;
        if target.is_locked {
            return Err(CoreError::Store(StoreError::Locked(target.name)));
        }
        if target.is_active {
            return Ok(target);
        }

        let op_id = self
            .journal
            .begin(JournalOpKind::ActivateSession, session_id)?;
        let result = (|| -> Result<SessionRecord, CoreError> {
            for other in self.sessions.list()? {
                if other.is_active && other.session_id != target.session_id {
                    self.journal.add_rollback_step(
                        &op_id,
                        RollbackStep::RestoreSession(Box::new(other.clone())),
                    )?;
                    let mut deactivated = other;
                    deactivated.is_active = false;
                    deactivated.updated_at = chrono::Utc::now().to_rfc3339();
                    self.sessions.put(&deactivated)?;
                }
            }
            self.journal.add_rollback_step(
                &op_id,
                RollbackStep::RestoreSession(Box::new(target.clone())),
            )?;
            let mut activated = target;
            activated.is_active = true;
            activated.updated_at = chrono::Utc::now().to_rfc3339();
            self.sessions.put(&activated)?;
            Ok(activated)
        })();

        match result {
            Ok(record) => {
                self.journal.commit(&op_id)?;
                info!("session '{}' is now active", record.name);
                Ok(record)
            }
            Err(e) => {
                self.journal.abort(&op_id)?;
                Err(e)
            }
        }
    }

    /// Apply the one-way session lock. Idempotent on an already-locked
    /// session; also clears the active flag.
    pub fn lock_session(&self, session_id: &str) -> Result<SessionRecord, CoreError> {
        let _guard = RegistryLock::acquire(&self.layout.lock_file())?;
        Ok(self.sessions.lock(session_id)?)
    }

    pub fn session(&self, session_id: &str) -> Result<SessionRecord, CoreError> {
        Ok(self.sessions.get(session_id)?)
    }

    /// Look a session up by full id, then by unique name.
    pub fn resolve_session(&self, name_or_id: &str) -> Result<SessionRecord, CoreError> {
        match self.sessions.get(name_or_id) {
            Ok(record) => Ok(record),
            Err(StoreError::SessionNotFound(_)) => Ok(self.sessions.get_by_name(name_or_id)?),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>, CoreError> {
        Ok(self.sessions.list()?)
    }

    pub fn active_session(&self) -> Result<Option<SessionRecord>, CoreError> {
        Ok(self.sessions.active()?)
    }

    pub fn is_session_locked(&self, session_id: &str) -> Result<bool, CoreError> {
        LockGate::new(&self.sessions).is_locked(session_id)
    }

    /// Precondition check for dependent subsystems (marks, fees): fails with
    /// the locked error before they write anything tied to `session_id`.
    pub fn assert_unlocked(&self, session_id: &str) -> Result<(), CoreError> {
        LockGate::new(&self.sessions).assert_unlocked(session_id)
    }

    // ----- enrollment lifecycle -----

    /// Initial admission: open a fresh `active` row.
    pub fn enroll(&self, req: &EnrollRequest) -> Result<EnrollmentRecord, CoreError> {
        let _guard = RegistryLock::acquire(&self.layout.lock_file())?;

        LockGate::new(&self.sessions).assert_unlocked(&req.session_id)?;
        if self
            .enrollments
            .find_active(&req.student_id, &req.session_id)?
            .is_some()
        {
            return Err(CoreError::Store(StoreError::DuplicateActiveEnrollment {
                student_id: req.student_id.to_string(),
                session_id: req.session_id.to_string(),
            }));
        }

        let mut allocator = RollAllocator::new(&self.enrollments);
        allocator.reserve(&req.session_id, &req.class_id, &req.section_id, &req.roll_no)?;

        let record = EnrollmentRecord::new(
            req.student_id.clone(),
            req.session_id.clone(),
            req.class_id.clone(),
            req.section_id.clone(),
            req.roll_no.clone(),
        );
        self.enrollments.put(&record)?;
        info!(
            "enrolled student {} in session {} as roll {} ({})",
            record.student_id, record.session_id, record.roll_no, record.short_id
        );
        Ok(record)
    }

    /// Promote one enrollment into a destination session/class/section.
    pub fn promote(&self, req: &PromotionRequest) -> Result<TransitionOutcome, CoreError> {
        let _guard = RegistryLock::acquire(&self.layout.lock_file())?;
        let plans = self.plan_transitions(vec![TransitionInput {
            enrollment_id: req.enrollment_id.clone(),
            session_id: req.session_id.clone(),
            class_id: Some(req.class_id.clone()),
            section_id: Some(req.section_id.clone()),
            roll_no: req.roll_no.clone(),
            terminal: EnrollmentStatus::Promoted,
        }])?;
        let mut outcomes =
            self.execute_transitions(JournalOpKind::Promote, req.enrollment_id.as_str(), plans)?;
        outcomes.pop().ok_or_else(|| {
            CoreError::Store(StoreError::EnrollmentNotFound(
                req.enrollment_id.to_string(),
            ))
        })
    }

    /// Promote a whole batch, all-or-nothing: every entry is validated
    /// against a consistent snapshot (including intra-batch roll collisions)
    /// before the first write, and any failure during the write phase rolls
    /// back what was already committed.
    pub fn bulk_promote(
        &self,
        reqs: &[PromotionRequest],
    ) -> Result<Vec<TransitionOutcome>, CoreError> {
        if reqs.is_empty() {
            return Ok(Vec::new());
        }
        let _guard = RegistryLock::acquire(&self.layout.lock_file())?;
        let inputs = reqs
            .iter()
            .map(|req| TransitionInput {
                enrollment_id: req.enrollment_id.clone(),
                session_id: req.session_id.clone(),
                class_id: Some(req.class_id.clone()),
                section_id: Some(req.section_id.clone()),
                roll_no: req.roll_no.clone(),
                terminal: EnrollmentStatus::Promoted,
            })
            .collect();
        let plans = self.plan_transitions(inputs)?;
        let subject = format!("{} enrollments", reqs.len());
        let outcomes = self.execute_transitions(JournalOpKind::BulkPromote, &subject, plans)?;
        info!("bulk promotion complete: {} students", outcomes.len());
        Ok(outcomes)
    }

    /// Retain: repeat the same class/section in the destination session.
    pub fn retain(&self, req: &RetentionRequest) -> Result<TransitionOutcome, CoreError> {
        let _guard = RegistryLock::acquire(&self.layout.lock_file())?;
        let plans = self.plan_transitions(vec![TransitionInput {
            enrollment_id: req.enrollment_id.clone(),
            session_id: req.session_id.clone(),
            class_id: None,
            section_id: None,
            roll_no: req.roll_no.clone(),
            terminal: EnrollmentStatus::Retained,
        }])?;
        let mut outcomes =
            self.execute_transitions(JournalOpKind::Retain, req.enrollment_id.as_str(), plans)?;
        outcomes.pop().ok_or_else(|| {
            CoreError::Store(StoreError::EnrollmentNotFound(
                req.enrollment_id.to_string(),
            ))
        })
    }

    pub fn transfer(&self, req: &ClosureRequest) -> Result<EnrollmentRecord, CoreError> {
        self.close_terminal(req, EnrollmentStatus::Transferred)
    }

    pub fn graduate(&self, req: &ClosureRequest) -> Result<EnrollmentRecord, CoreError> {
        self.close_terminal(req, EnrollmentStatus::Graduated)
    }

    pub fn drop_out(&self, req: &ClosureRequest) -> Result<EnrollmentRecord, CoreError> {
        self.close_terminal(req, EnrollmentStatus::Dropped)
    }

    /// Terminal closure without a destination row. One atomic file write,
    /// no journal entry needed.
    fn close_terminal(
        &self,
        req: &ClosureRequest,
        terminal: EnrollmentStatus,
    ) -> Result<EnrollmentRecord, CoreError> {
        let _guard = RegistryLock::acquire(&self.layout.lock_file())?;

        let source = self.enrollments.get(&req.enrollment_id)?;
        LockGate::new(&self.sessions).assert_unlocked(&source.session_id)?;
        validate_transition(source.status, terminal)?;

        let closed = self.enrollments.close_with_status(
            &req.enrollment_id,
            terminal,
            req.remarks.as_deref(),
            None,
            None,
        )?;
        info!(
            "enrollment {} closed as '{}'",
            closed.short_id, closed.status
        );
        Ok(closed)
    }

    // ----- queries -----

    pub fn enrollment(&self, enrollment_id: &str) -> Result<EnrollmentRecord, CoreError> {
        Ok(self.enrollments.get(enrollment_id)?)
    }

    pub fn list_enrollments(
        &self,
        filter: &EnrollmentFilter,
    ) -> Result<Vec<EnrollmentRecord>, CoreError> {
        Ok(self.enrollments.list_filtered(filter)?)
    }

    pub fn find_active(
        &self,
        student_id: &StudentId,
        session_id: &SessionId,
    ) -> Result<Option<EnrollmentRecord>, CoreError> {
        Ok(self.enrollments.find_active(student_id, session_id)?)
    }

    pub fn student_history(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<EnrollmentRecord>, CoreError> {
        Ok(self.enrollments.list_by_student(student_id)?)
    }

    // ----- shared transition machinery -----

    /// Validate every input against a consistent snapshot and materialize
    /// the destination rows. No store writes happen here; a failure on the
    /// nth entry leaves the registry untouched.
    fn plan_transitions(
        &self,
        inputs: Vec<TransitionInput>,
    ) -> Result<Vec<TransitionPlan>, CoreError> {
        let gate = LockGate::new(&self.sessions);
        let mut allocator = RollAllocator::new(&self.enrollments);
        let mut pending_students: HashSet<(StudentId, SessionId)> = HashSet::new();
        let mut plans = Vec::with_capacity(inputs.len());

        for input in inputs {
            let source = self.enrollments.get(&input.enrollment_id)?;
            validate_transition(source.status, input.terminal)?;
            gate.assert_unlocked(&source.session_id)?;
            gate.assert_unlocked(&input.session_id)?;

            let class_id = input.class_id.unwrap_or_else(|| source.class_id.clone());
            let section_id = input
                .section_id
                .unwrap_or_else(|| source.section_id.clone());

            let pair = (source.student_id.clone(), input.session_id.clone());
            if pending_students.contains(&pair)
                || self
                    .enrollments
                    .find_active(&source.student_id, &input.session_id)?
                    .is_some()
            {
                return Err(CoreError::Store(StoreError::DuplicateActiveEnrollment {
                    student_id: source.student_id.to_string(),
                    session_id: input.session_id.to_string(),
                }));
            }
            pending_students.insert(pair);

            let roll_no = match input.roll_no {
                Some(roll) => roll,
                None => allocator.next_available(&input.session_id, &class_id, &section_id)?,
            };
            allocator.reserve(&input.session_id, &class_id, &section_id, &roll_no)?;

            let destination = EnrollmentRecord::new(
                source.student_id.clone(),
                input.session_id.clone(),
                class_id,
                section_id,
                roll_no,
            );
            plans.push(TransitionPlan {
                source,
                destination,
                terminal: input.terminal,
            });
        }

        Ok(plans)
    }

    /// Write phase: open each destination row, then close its source with a
    /// back-link. Journaled so a crash or mid-batch error rolls back every
    /// row already written.
    fn execute_transitions(
        &self,
        kind: JournalOpKind,
        subject: &str,
        plans: Vec<TransitionPlan>,
    ) -> Result<Vec<TransitionOutcome>, CoreError> {
        let op_id = self.journal.begin(kind, subject)?;
        let today = chrono::Utc::now().date_naive();

        let result = (|| -> Result<Vec<TransitionOutcome>, CoreError> {
            let mut outcomes = Vec::with_capacity(plans.len());
            for plan in plans {
                self.journal.add_rollback_step(
                    &op_id,
                    RollbackStep::RemoveFile(
                        self.layout.enrollment_path(&plan.destination.enrollment_id),
                    ),
                )?;
                self.enrollments.put(&plan.destination)?;

                self.journal.add_rollback_step(
                    &op_id,
                    RollbackStep::RestoreEnrollment(Box::new(plan.source.clone())),
                )?;
                let closed = self.enrollments.close_with_status(
                    &plan.source.enrollment_id,
                    plan.terminal,
                    None,
                    Some(plan.destination.enrollment_id.clone()),
                    Some(today),
                )?;

                debug!(
                    "{} -> {}: {} in session {}",
                    closed.short_id,
                    plan.destination.short_id,
                    plan.terminal,
                    plan.destination.session_id
                );
                outcomes.push(TransitionOutcome {
                    closed,
                    opened: plan.destination,
                });
            }
            Ok(outcomes)
        })();

        match result {
            Ok(outcomes) => {
                self.journal.commit(&op_id)?;
                Ok(outcomes)
            }
            Err(e) => {
                self.journal.abort(&op_id)?;
                Err(e)
            }
        }
    }
}
