use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use exam_core::catalog::{CatalogPage, CatalogQuery, build_page};
use exam_core::model::{AttemptStatistics, CompletedTests, Direction, StudentId, TestId};
use tracing::warn;

use crate::Clock;
use crate::backend::ExamBackend;
use crate::error::CatalogError;

/// Builds the learner's classified, filtered and paginated test listing.
#[derive(Clone)]
pub struct CatalogService {
    clock: Clock,
    student_id: StudentId,
    backend: Arc<dyn ExamBackend>,
}

impl CatalogService {
    #[must_use]
    pub fn new(clock: Clock, student_id: StudentId, backend: Arc<dyn ExamBackend>) -> Self {
        Self {
            clock,
            student_id,
            backend,
        }
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Backend` if directions cannot be loaded.
    pub async fn directions(&self) -> Result<Vec<Direction>, CatalogError> {
        Ok(self.backend.fetch_directions().await?)
    }

    /// One page of the tests in `direction`.
    ///
    /// Completed entries carry attempt statistics when the backend has them;
    /// a failed statistics lookup only leaves them out.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Backend` if tests or completed attempts cannot be
    /// loaded.
    pub async fn view(
        &self,
        direction: &str,
        query: &CatalogQuery,
    ) -> Result<CatalogPage, CatalogError> {
        let tests = self.backend.fetch_tests_for_direction(direction).await?;
        let attempts = self
            .backend
            .fetch_completed_attempts(&self.student_id)
            .await?;
        let completed = CompletedTests::new(self.student_id.clone(), attempts);

        let listed: HashSet<&TestId> = tests.iter().map(|t| &t.id).collect();
        let mut statistics: HashMap<TestId, AttemptStatistics> = HashMap::new();
        for attempt in completed.attempts().filter(|a| listed.contains(&a.test_id)) {
            match self.backend.fetch_attempt_statistics(&attempt.id).await {
                Ok(Some(stats)) => {
                    statistics.insert(attempt.test_id.clone(), stats);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        attempt_id = %attempt.id,
                        error = %err,
                        "failed to load attempt statistics"
                    );
                }
            }
        }

        Ok(build_page(
            &tests,
            &completed,
            self.clock.now(),
            query,
            |test| statistics.get(&test.id),
        ))
    }
}
