#![forbid(unsafe_code)]

pub mod app_services;
pub mod authoring_service;
pub mod backend;
pub mod catalog_service;
pub mod config;
pub mod error;
pub mod sessions;

pub use exam_core::Clock;

pub use app_services::AppServices;
pub use authoring_service::TestAuthoringService;
pub use backend::{ExamBackend, HttpExamBackend, InMemoryBackend, TestAdminBackend};
pub use catalog_service::CatalogService;
pub use config::BackendConfig;
pub use error::{
    AppServicesError, AuthoringError, BackendError, CatalogError, ConfigError, SessionError,
};
pub use sessions::{
    Attempt, Countdown, SharedAttempt, TestFlowService, TestSessionEngine, Tick, share,
};
