use std::sync::Arc;

use exam_core::model::{CompletedTests, TestId};
use tracing::info;

use super::engine::{Attempt, TestSessionEngine};
use crate::backend::ExamBackend;
use crate::error::SessionError;

/// Wires the engine to backend lookups for the learner-facing test flow.
#[derive(Clone)]
pub struct TestFlowService {
    engine: TestSessionEngine,
    backend: Arc<dyn ExamBackend>,
}

impl TestFlowService {
    #[must_use]
    pub fn new(engine: TestSessionEngine, backend: Arc<dyn ExamBackend>) -> Self {
        Self { engine, backend }
    }

    #[must_use]
    pub fn engine(&self) -> &TestSessionEngine {
        &self.engine
    }

    /// The learner's graded attempts, freshly loaded.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Backend` if the attempts cannot be loaded.
    pub async fn completed_tests(&self) -> Result<CompletedTests, SessionError> {
        let student_id = self.engine.student_id().clone();
        let attempts = self.backend.fetch_completed_attempts(&student_id).await?;
        Ok(CompletedTests::new(student_id, attempts))
    }

    /// Fetch `test_id` fresh and start an attempt on it.
    ///
    /// A graded restart is refused before the definition is fetched.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyCompleted`, `SessionError::DefinitionNotFound`,
    /// backend errors, or anything `start_attempt` reports.
    pub async fn start_test(
        &self,
        test_id: &TestId,
        practice_mode: bool,
    ) -> Result<Attempt, SessionError> {
        let completed = self.completed_tests().await?;
        if !practice_mode && completed.contains(self.engine.student_id(), test_id) {
            return Err(SessionError::AlreadyCompleted(test_id.clone()));
        }

        let definition = self
            .backend
            .fetch_test_definition(test_id)
            .await?
            .ok_or_else(|| SessionError::DefinitionNotFound(test_id.clone()))?;
        self.engine
            .start_attempt(definition, practice_mode, &completed)
            .await
    }

    /// Continue the persisted attempt, if any, against a fresh definition.
    ///
    /// A graded session for a test the learner already has results for is
    /// discarded rather than resumed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DefinitionNotFound` after discarding the session
    /// when its test no longer exists, and backend or storage errors.
    pub async fn resume_test(&self) -> Result<Option<Attempt>, SessionError> {
        let Some(session) = self.engine.resume_attempt().await? else {
            return Ok(None);
        };

        let test_id = session.test_id().clone();
        if !session.is_practice_mode() {
            let completed = self.completed_tests().await?;
            if completed.contains(self.engine.student_id(), &test_id) {
                info!(%test_id, "discarding session for already graded test");
                self.engine.discard().await?;
                return Ok(None);
            }
        }

        match self.backend.fetch_test_definition(&test_id).await? {
            Some(definition) => Ok(Some(self.engine.attach(session, definition))),
            None => {
                info!(%test_id, "test removed while in progress");
                self.engine.discard().await?;
                Err(SessionError::DefinitionNotFound(test_id))
            }
        }
    }

    /// Leave the attempt without scoring it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the slot cannot be cleared.
    pub async fn back_to_tests(&self, attempt: Attempt) -> Result<(), SessionError> {
        self.engine.abandon(attempt).await
    }
}
