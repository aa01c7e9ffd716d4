use std::sync::Arc;

use exam_core::model::{TestDraft, TestId};
use tracing::info;

use crate::backend::TestAdminBackend;
use crate::error::AuthoringError;

/// Examiner-side test management.
#[derive(Clone)]
pub struct TestAuthoringService {
    admin: Arc<dyn TestAdminBackend>,
}

impl TestAuthoringService {
    #[must_use]
    pub fn new(admin: Arc<dyn TestAdminBackend>) -> Self {
        Self { admin }
    }

    /// Validate `draft` and create it as a new test.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::Draft` for an invalid draft (nothing is sent)
    /// and `AuthoringError::Backend` if the backend rejects it.
    pub async fn create_test(&self, draft: TestDraft) -> Result<TestId, AuthoringError> {
        let test = draft.validate()?;
        let id = self.admin.create_test(&test).await?;
        info!(test_id = %id, questions = test.questions.len(), "test created");
        Ok(id)
    }

    /// Validate `draft` and replace the stored test with it.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::Draft` for an invalid draft and
    /// `AuthoringError::Backend` for unknown ids or transport failures.
    pub async fn update_test(
        &self,
        test_id: &TestId,
        draft: TestDraft,
    ) -> Result<(), AuthoringError> {
        let test = draft.validate()?;
        self.admin.update_test(test_id, &test).await?;
        info!(%test_id, "test updated");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `AuthoringError::Backend` for unknown ids or transport failures.
    pub async fn delete_test(&self, test_id: &TestId) -> Result<(), AuthoringError> {
        self.admin.delete_test(test_id).await?;
        info!(%test_id, "test deleted");
        Ok(())
    }

    /// Show or hide a test from learners. Returns the new visibility.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::Backend` for unknown ids or transport failures.
    pub async fn toggle_visibility(&self, test_id: &TestId) -> Result<bool, AuthoringError> {
        let visible = self.admin.toggle_visibility(test_id).await?;
        info!(%test_id, visible, "test visibility changed");
        Ok(visible)
    }
}
