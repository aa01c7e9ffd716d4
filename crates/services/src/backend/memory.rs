use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use exam_core::model::{
    AttemptId, AttemptStatistics, AttemptSubmission, CompletedAttempt, Direction, NewTest,
    StudentId, TestDefinition, TestId, TestSummary,
};
use exam_core::scoring::percentage;

use super::{ExamBackend, TestAdminBackend};
use crate::error::BackendError;

#[derive(Default)]
struct State {
    directions: Vec<Direction>,
    tests: Vec<TestDefinition>,
    attempts: Vec<(StudentId, CompletedAttempt)>,
    statistics: HashMap<AttemptId, AttemptStatistics>,
    submissions: Vec<AttemptSubmission>,
    fail_submissions: bool,
    fail_statistics: bool,
    next_id: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn test_mut(&mut self, test_id: &TestId) -> Result<&mut TestDefinition, BackendError> {
        self.tests
            .iter_mut()
            .find(|t| t.id() == test_id)
            .ok_or(BackendError::NotFound)
    }
}

/// Backend double holding everything in memory.
///
/// Only active tests are listed to learners, like the real server. Graded
/// submissions become completed attempts with statistics. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, BackendError> {
        self.state
            .lock()
            .map_err(|_| BackendError::Unavailable("poisoned".into()))
    }

    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the state lock is poisoned.
    pub fn add_direction(&self, id: &str, name: &str) -> Result<(), BackendError> {
        self.lock()?.directions.push(Direction {
            id: id.to_owned(),
            name: name.to_owned(),
        });
        Ok(())
    }

    /// Insert or replace a test by id.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the state lock is poisoned.
    pub fn put_test(&self, test: TestDefinition) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        match state.tests.iter_mut().find(|t| t.id() == test.id()) {
            Some(existing) => *existing = test,
            None => state.tests.push(test),
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the state lock is poisoned.
    pub fn remove_test(&self, test_id: &TestId) -> Result<(), BackendError> {
        self.lock()?.tests.retain(|t| t.id() != test_id);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the state lock is poisoned.
    pub fn test(&self, test_id: &TestId) -> Result<Option<TestDefinition>, BackendError> {
        Ok(self.lock()?.tests.iter().find(|t| t.id() == test_id).cloned())
    }

    /// Record a graded attempt that happened elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the state lock is poisoned.
    pub fn add_attempt(
        &self,
        student_id: StudentId,
        attempt: CompletedAttempt,
        statistics: Option<AttemptStatistics>,
    ) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        if let Some(stats) = statistics {
            state.statistics.insert(attempt.id.clone(), stats);
        }
        state.attempts.push((student_id, attempt));
        Ok(())
    }

    /// Make `submit_attempt` fail until switched back.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the state lock is poisoned.
    pub fn fail_submissions(&self, fail: bool) -> Result<(), BackendError> {
        self.lock()?.fail_submissions = fail;
        Ok(())
    }

    /// Make `fetch_attempt_statistics` fail until switched back.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the state lock is poisoned.
    pub fn fail_statistics(&self, fail: bool) -> Result<(), BackendError> {
        self.lock()?.fail_statistics = fail;
        Ok(())
    }

    /// Every accepted submission, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the state lock is poisoned.
    pub fn submissions(&self) -> Result<Vec<AttemptSubmission>, BackendError> {
        Ok(self.lock()?.submissions.clone())
    }
}

#[async_trait]
impl ExamBackend for InMemoryBackend {
    async fn fetch_directions(&self) -> Result<Vec<Direction>, BackendError> {
        Ok(self.lock()?.directions.clone())
    }

    async fn fetch_tests_for_direction(
        &self,
        direction: &str,
    ) -> Result<Vec<TestSummary>, BackendError> {
        Ok(self
            .lock()?
            .tests
            .iter()
            .filter(|t| t.summary.direction == direction && t.summary.is_active)
            .map(|t| t.summary.clone())
            .collect())
    }

    async fn fetch_test_definition(
        &self,
        test_id: &TestId,
    ) -> Result<Option<TestDefinition>, BackendError> {
        self.test(test_id)
    }

    async fn fetch_completed_attempts(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<CompletedAttempt>, BackendError> {
        Ok(self
            .lock()?
            .attempts
            .iter()
            .filter(|(student, _)| student == student_id)
            .map(|(_, attempt)| attempt.clone())
            .collect())
    }

    async fn fetch_attempt_statistics(
        &self,
        attempt_id: &AttemptId,
    ) -> Result<Option<AttemptStatistics>, BackendError> {
        let state = self.lock()?;
        if state.fail_statistics {
            return Err(BackendError::Unavailable("statistics disabled".into()));
        }
        Ok(state.statistics.get(attempt_id).cloned())
    }

    async fn submit_attempt(
        &self,
        submission: &AttemptSubmission,
    ) -> Result<AttemptId, BackendError> {
        let mut state = self.lock()?;
        if state.fail_submissions {
            return Err(BackendError::Unavailable("submissions disabled".into()));
        }

        let id = AttemptId::new(state.next_id("attempt"));
        let correct_answers =
            u32::try_from(submission.answers.iter().filter(|a| a.is_correct).count())
                .unwrap_or(u32::MAX);
        let total_questions = u32::try_from(submission.answers.len()).unwrap_or(u32::MAX);
        state.statistics.insert(
            id.clone(),
            AttemptStatistics {
                correct_answers,
                total_questions,
                accuracy: percentage(correct_answers, total_questions),
                answers: submission.answers.clone(),
            },
        );
        state.attempts.push((
            submission.student_id.clone(),
            CompletedAttempt {
                id: id.clone(),
                test_id: submission.test_id.clone(),
                score: submission.score,
                time_spent_minutes: submission.time_spent_minutes,
            },
        ));
        state.submissions.push(submission.clone());
        Ok(id)
    }
}

#[async_trait]
impl TestAdminBackend for InMemoryBackend {
    async fn create_test(&self, test: &NewTest) -> Result<TestId, BackendError> {
        let mut state = self.lock()?;
        let id = TestId::new(state.next_id("test"));
        state.tests.push(definition_from(id.clone(), test));
        Ok(id)
    }

    async fn update_test(&self, test_id: &TestId, test: &NewTest) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        *state.test_mut(test_id)? = definition_from(test_id.clone(), test);
        Ok(())
    }

    async fn delete_test(&self, test_id: &TestId) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        let before = state.tests.len();
        state.tests.retain(|t| t.id() != test_id);
        if state.tests.len() == before {
            return Err(BackendError::NotFound);
        }
        Ok(())
    }

    async fn toggle_visibility(&self, test_id: &TestId) -> Result<bool, BackendError> {
        let mut state = self.lock()?;
        let test = state.test_mut(test_id)?;
        test.summary.is_active = !test.summary.is_active;
        Ok(test.summary.is_active)
    }
}

fn definition_from(id: TestId, test: &NewTest) -> TestDefinition {
    TestDefinition {
        summary: TestSummary {
            id,
            title: test.title.clone(),
            direction: test.direction.clone(),
            start_date: test.start_date,
            end_date: test.end_date,
            time_limit_minutes: test.time_limit_minutes,
            is_active: test.is_active,
        },
        questions: test.questions.clone(),
    }
}
