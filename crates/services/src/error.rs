//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{
    DraftError, QuestionId, QuestionKind, SessionStateError, TestDefinitionError, TestId,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by backend transports.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("resource not found")]
    NotFound,
    #[error("backend request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("backend response could not be decoded: {0}")]
    Decode(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
    #[error("request payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors emitted while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Errors emitted by `TestSessionEngine` and `TestFlowService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("test {0} was already completed")]
    AlreadyCompleted(TestId),
    #[error("test session time limit elapsed")]
    Expired,
    #[error("test session already completed")]
    Completed,
    #[error("test {0} is not available")]
    DefinitionNotFound(TestId),
    #[error("question {0} is not part of this test")]
    UnknownQuestion(QuestionId),
    #[error("question {question} expects a {expected} answer, got {found}")]
    AnswerKindMismatch {
        question: QuestionId,
        expected: QuestionKind,
        found: QuestionKind,
    },
    #[error(transparent)]
    State(SessionStateError),
    #[error(transparent)]
    Definition(#[from] TestDefinitionError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("test session could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<SessionStateError> for SessionError {
    fn from(err: SessionStateError) -> Self {
        match err {
            SessionStateError::Completed => SessionError::Completed,
            SessionStateError::Expired => SessionError::Expired,
            other => SessionError::State(other),
        }
    }
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors emitted by `TestAuthoringService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthoringError {
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error("no student id configured")]
    MissingStudent,
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}
