use std::sync::Arc;

use exam_core::model::StudentId;
use storage::repository::{KeyValueStore, Storage};

use crate::Clock;
use crate::authoring_service::TestAuthoringService;
use crate::backend::{ExamBackend, HttpExamBackend, TestAdminBackend};
use crate::catalog_service::CatalogService;
use crate::config::BackendConfig;
use crate::error::AppServicesError;
use crate::sessions::{TestFlowService, TestSessionEngine};

/// Assembles app-facing services for one learner.
#[derive(Clone)]
pub struct AppServices {
    student_id: StudentId,
    flow: Arc<TestFlowService>,
    catalog: Arc<CatalogService>,
    authoring: Arc<TestAuthoringService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the HTTP backend.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if no student is configured, or if storage
    /// or the HTTP client cannot be initialized.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: &BackendConfig,
    ) -> Result<Self, AppServicesError> {
        let student_id = config
            .student_id
            .clone()
            .ok_or(AppServicesError::MissingStudent)?;
        let storage = Storage::sqlite(db_url).await?;
        let http = Arc::new(HttpExamBackend::new(config)?);

        Ok(Self::from_parts(
            clock,
            student_id,
            Arc::clone(&storage.slots),
            Arc::clone(&http) as Arc<dyn ExamBackend>,
            http as Arc<dyn TestAdminBackend>,
        ))
    }

    /// Build services over explicit adapters.
    #[must_use]
    pub fn from_parts(
        clock: Clock,
        student_id: StudentId,
        slots: Arc<dyn KeyValueStore>,
        backend: Arc<dyn ExamBackend>,
        admin: Arc<dyn TestAdminBackend>,
    ) -> Self {
        let engine = TestSessionEngine::new(
            clock,
            student_id.clone(),
            slots,
            Arc::clone(&backend),
        );
        let flow = Arc::new(TestFlowService::new(engine, Arc::clone(&backend)));
        let catalog = Arc::new(CatalogService::new(clock, student_id.clone(), backend));
        let authoring = Arc::new(TestAuthoringService::new(admin));

        Self {
            student_id,
            flow,
            catalog,
            authoring,
        }
    }

    #[must_use]
    pub fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    #[must_use]
    pub fn flow(&self) -> Arc<TestFlowService> {
        Arc::clone(&self.flow)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn authoring(&self) -> Arc<TestAuthoringService> {
        Arc::clone(&self.authoring)
    }
}
