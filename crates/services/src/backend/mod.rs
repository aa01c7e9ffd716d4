//! Contracts with the exam backend and their transports.

use async_trait::async_trait;

use exam_core::model::{
    AttemptId, AttemptStatistics, AttemptSubmission, CompletedAttempt, Direction, NewTest,
    StudentId, TestDefinition, TestId, TestSummary,
};

use crate::error::BackendError;

mod http;
mod memory;

pub use http::HttpExamBackend;
pub use memory::InMemoryBackend;

/// Read side used by learners, plus graded attempt submission.
#[async_trait]
pub trait ExamBackend: Send + Sync {
    /// # Errors
    ///
    /// Returns `BackendError` on transport or decoding failure.
    async fn fetch_directions(&self) -> Result<Vec<Direction>, BackendError>;

    /// Summaries of every test in `direction`. An unknown direction yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport or decoding failure.
    async fn fetch_tests_for_direction(
        &self,
        direction: &str,
    ) -> Result<Vec<TestSummary>, BackendError>;

    /// Full definition of a test, or `None` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport or decoding failure.
    async fn fetch_test_definition(
        &self,
        test_id: &TestId,
    ) -> Result<Option<TestDefinition>, BackendError>;

    /// # Errors
    ///
    /// Returns `BackendError` on transport or decoding failure.
    async fn fetch_completed_attempts(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<CompletedAttempt>, BackendError>;

    /// # Errors
    ///
    /// Returns `BackendError` on transport or decoding failure.
    async fn fetch_attempt_statistics(
        &self,
        attempt_id: &AttemptId,
    ) -> Result<Option<AttemptStatistics>, BackendError>;

    /// Store a graded attempt and return its backend id.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the attempt was not accepted.
    async fn submit_attempt(
        &self,
        submission: &AttemptSubmission,
    ) -> Result<AttemptId, BackendError>;
}

/// Write side used by examiners.
#[async_trait]
pub trait TestAdminBackend: Send + Sync {
    /// # Errors
    ///
    /// Returns `BackendError` if the test was not created.
    async fn create_test(&self, test: &NewTest) -> Result<TestId, BackendError>;

    /// # Errors
    ///
    /// Returns `BackendError::NotFound` for an unknown id.
    async fn update_test(&self, test_id: &TestId, test: &NewTest) -> Result<(), BackendError>;

    /// # Errors
    ///
    /// Returns `BackendError::NotFound` for an unknown id.
    async fn delete_test(&self, test_id: &TestId) -> Result<(), BackendError>;

    /// Flip the test's visibility to learners and return the new value.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` for an unknown id.
    async fn toggle_visibility(&self, test_id: &TestId) -> Result<bool, BackendError>;
}
