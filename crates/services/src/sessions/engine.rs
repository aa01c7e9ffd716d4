use std::sync::Arc;

use exam_core::model::{
    AnswerRecord, AttemptSubmission, CompletedTests, NavDirection, Question, QuestionId,
    StudentId, TestDefinition, TestSession,
};
use exam_core::scoring::{Submission, TestResult, score_attempt};
use storage::repository::{KeyValueStore, TEST_SESSION_SLOT};
use tracing::{debug, info, warn};

use crate::Clock;
use crate::backend::ExamBackend;
use crate::error::SessionError;

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// A live test attempt: the fetched definition plus its session state.
///
/// Once completed, the scored result is kept so later completion calls return
/// it unchanged.
#[derive(Debug, Clone)]
pub struct Attempt {
    definition: TestDefinition,
    session: TestSession,
    result: Option<TestResult>,
}

impl Attempt {
    fn new(definition: TestDefinition, mut session: TestSession) -> Self {
        session.clamp_index(definition.questions.len());
        Self {
            definition,
            session,
            result: None,
        }
    }

    #[must_use]
    pub fn definition(&self) -> &TestDefinition {
        &self.definition
    }

    #[must_use]
    pub fn session(&self) -> &TestSession {
        &self.session
    }

    #[must_use]
    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.session.is_completed()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.definition
            .questions
            .get(self.session.current_question_index())
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.definition.questions.len()
    }
}

/// Outcome of one countdown step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub remaining_seconds: u32,
    /// Set when this tick hit zero and completed the attempt.
    pub completed: Option<TestResult>,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Drives one learner's attempts from start to scored submission.
///
/// Every mutation is written to the `testSession` slot before the call returns.
#[derive(Clone)]
pub struct TestSessionEngine {
    clock: Clock,
    student_id: StudentId,
    store: Arc<dyn KeyValueStore>,
    backend: Arc<dyn ExamBackend>,
}

impl TestSessionEngine {
    #[must_use]
    pub fn new(
        clock: Clock,
        student_id: StudentId,
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn ExamBackend>,
    ) -> Self {
        Self {
            clock,
            student_id,
            store,
            backend,
        }
    }

    /// Same engine reading time from `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Open a new attempt on `definition`, replacing any persisted one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyCompleted` for a graded restart of a test
    /// in `completed`, `SessionError::Definition` for a zero time limit or
    /// repeated question ids, and storage errors if the session cannot be
    /// persisted.
    pub async fn start_attempt(
        &self,
        definition: TestDefinition,
        practice_mode: bool,
        completed: &CompletedTests,
    ) -> Result<Attempt, SessionError> {
        if !practice_mode && completed.contains(&self.student_id, definition.id()) {
            return Err(SessionError::AlreadyCompleted(definition.id().clone()));
        }
        definition.validate()?;

        let session = TestSession::start(&definition, self.clock.now(), practice_mode);
        self.persist(&session).await?;
        info!(
            test_id = %definition.id(),
            practice_mode,
            time_limit_secs = session.time_limit().num_seconds(),
            "test attempt started"
        );
        Ok(Attempt::new(definition, session))
    }

    /// Load the persisted session if it can still be continued.
    ///
    /// Expired, completed and unreadable sessions are deleted and reported as
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the slot cannot be read or cleared.
    pub async fn resume_attempt(&self) -> Result<Option<TestSession>, SessionError> {
        let Some(raw) = self.store.get(TEST_SESSION_SLOT).await? else {
            return Ok(None);
        };

        let session: TestSession = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "discarding malformed persisted test session");
                self.discard().await?;
                return Ok(None);
            }
        };

        let now = self.clock.now();
        if session.is_completed() || session.is_expired(now) {
            info!(test_id = %session.test_id(), "discarding stale test session");
            self.discard().await?;
            return Ok(None);
        }

        debug!(
            test_id = %session.test_id(),
            index = session.current_question_index(),
            answers = session.answers().len(),
            "test session resumed"
        );
        Ok(Some(session))
    }

    /// Pair a resumed session with a freshly fetched definition.
    #[must_use]
    pub fn attach(&self, session: TestSession, definition: TestDefinition) -> Attempt {
        Attempt::new(definition, session)
    }

    /// Replace the answer to `question_id` and persist.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` or `SessionError::Expired` if input is
    /// closed, `UnknownQuestion`/`AnswerKindMismatch` for a record that does not
    /// fit the test, and storage errors.
    pub async fn record_answer(
        &self,
        attempt: &mut Attempt,
        question_id: QuestionId,
        answer: AnswerRecord,
    ) -> Result<(), SessionError> {
        let now = self.clock.now();
        attempt.session.ensure_open(now)?;

        let question = attempt
            .definition
            .question(question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;
        if question.kind() != answer.kind() {
            return Err(SessionError::AnswerKindMismatch {
                question: question_id,
                expected: question.kind(),
                found: answer.kind(),
            });
        }

        attempt.session.record(question_id, answer, now)?;
        self.persist(&attempt.session).await
    }

    /// Move to the next or previous question. Returns whether the index moved.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` or `SessionError::Expired` if input is
    /// closed, and storage errors.
    pub async fn navigate(
        &self,
        attempt: &mut Attempt,
        direction: NavDirection,
    ) -> Result<bool, SessionError> {
        let count = attempt.question_count();
        let moved = attempt
            .session
            .navigate(direction, count, self.clock.now())?;
        if moved {
            self.persist(&attempt.session).await?;
        }
        Ok(moved)
    }

    /// Remaining whole seconds; completes the attempt when it reaches zero.
    pub async fn tick(&self, attempt: &mut Attempt) -> Tick {
        let remaining_seconds = attempt.session.remaining_seconds(self.clock.now());
        let completed = if remaining_seconds == 0 && !attempt.is_completed() {
            info!(test_id = %attempt.session.test_id(), "time limit reached");
            Some(self.complete(attempt).await)
        } else {
            None
        };
        Tick {
            remaining_seconds,
            completed,
        }
    }

    /// Score the attempt, clear the slot and submit graded results.
    ///
    /// The slot is rewritten as completed before it is deleted, so a failed
    /// delete still leaves nothing resumable.
    ///
    /// Idempotent: later calls return the first result without side effects.
    /// Storage and submission failures are logged; a failed submission is
    /// recorded on the result instead of failing the call.
    pub async fn complete(&self, attempt: &mut Attempt) -> TestResult {
        if let Some(result) = &attempt.result {
            return result.clone();
        }
        attempt.session.mark_completed();

        let now = self.clock.now();
        let mut result = score_attempt(&attempt.definition, &attempt.session, now);
        attempt.result = Some(result.clone());

        if let Err(err) = self.persist(&attempt.session).await {
            warn!(error = %err, "failed to persist completed test session");
        }
        if let Err(err) = self.discard().await {
            warn!(error = %err, "failed to clear completed test session");
        }

        if !attempt.session.is_practice_mode() {
            result.submission = self.submit(&result).await;
            attempt.result = Some(result.clone());
        }

        info!(
            test_id = %result.test_id,
            total_points = result.total_points,
            max_points = result.max_points,
            rating_score = result.rating_score,
            practice_mode = result.practice_mode,
            "test attempt completed"
        );
        result
    }

    /// Drop the attempt without scoring it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the slot cannot be cleared.
    pub async fn abandon(&self, attempt: Attempt) -> Result<(), SessionError> {
        info!(test_id = %attempt.session.test_id(), "test attempt abandoned");
        self.discard().await
    }

    /// Clear the persisted session slot.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the slot cannot be cleared.
    pub async fn discard(&self) -> Result<(), SessionError> {
        self.store.delete(TEST_SESSION_SLOT).await?;
        Ok(())
    }

    async fn persist(&self, session: &TestSession) -> Result<(), SessionError> {
        let raw = serde_json::to_string(session)?;
        self.store.set(TEST_SESSION_SLOT, &raw).await?;
        Ok(())
    }

    async fn submit(&self, result: &TestResult) -> Submission {
        let submission = AttemptSubmission {
            student_id: self.student_id.clone(),
            test_id: result.test_id.clone(),
            test_title: result.test_title.clone(),
            answers: result.answers.clone(),
            time_spent_minutes: result.time_spent_minutes,
            score: result.rating_score,
        };
        match self.backend.submit_attempt(&submission).await {
            Ok(id) => {
                debug!(attempt_id = %id, "graded attempt submitted");
                Submission::Accepted(id)
            }
            Err(err) => {
                warn!(test_id = %result.test_id, error = %err, "graded attempt submission failed");
                Submission::Failed(err.to_string())
            }
        }
    }
}
