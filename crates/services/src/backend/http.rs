use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use exam_core::model::{
    AttemptId, AttemptStatistics, AttemptSubmission, CompletedAttempt, Direction, NewTest,
    Question, StudentId, TestDefinition, TestId, TestSummary,
};

use super::{ExamBackend, TestAdminBackend};
use crate::config::BackendConfig;
use crate::error::BackendError;

/// REST transport for the exam backend.
///
/// Every request carries the configured timeout; a 404 on a lookup is
/// reported as absence rather than as an error.
#[derive(Clone)]
pub struct HttpExamBackend {
    client: Client,
    base_url: Url,
}

impl HttpExamBackend {
    /// # Errors
    ///
    /// Returns `BackendError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        endpoint(&self.base_url, segments)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, BackendError> {
        tracing::debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        read_json(response).await
    }
}

fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, BackendError> {
    let mut joined = base.clone();
    joined
        .path_segments_mut()
        .map_err(|()| BackendError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(segments);
    Ok(joined)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<Option<T>, BackendError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(BackendError::HttpStatus(status));
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| BackendError::Decode(e.to_string()))
}

async fn expect_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    read_json(response).await?.ok_or(BackendError::NotFound)
}

fn expect_success(response: &Response) -> Result<(), BackendError> {
    match response.status() {
        StatusCode::NOT_FOUND => Err(BackendError::NotFound),
        status if status.is_success() => Ok(()),
        status => Err(BackendError::HttpStatus(status)),
    }
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    #[serde(alias = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct VisibilityResponse {
    #[serde(alias = "isActive")]
    visible: bool,
}

/// Test body for create/update requests.
///
/// The server expects an explicit `points` on every question, so `multiple`
/// questions get theirs computed from the correct options.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TestPayload<'a> {
    title: &'a str,
    direction: &'a str,
    start_date: chrono::DateTime<chrono::Utc>,
    end_date: chrono::DateTime<chrono::Utc>,
    time_limit_minutes: u32,
    is_active: bool,
    questions: Vec<serde_json::Value>,
}

impl<'a> TestPayload<'a> {
    fn from_test(test: &'a NewTest) -> Result<Self, BackendError> {
        let questions = test
            .questions
            .iter()
            .map(question_payload)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            title: &test.title,
            direction: &test.direction,
            start_date: test.start_date,
            end_date: test.end_date,
            time_limit_minutes: test.time_limit_minutes,
            is_active: test.is_active,
            questions,
        })
    }
}

fn question_payload(question: &Question) -> Result<serde_json::Value, BackendError> {
    let mut value = serde_json::to_value(question)?;
    if let Some(fields) = value.as_object_mut() {
        fields.insert("points".into(), question.points().into());
    }
    Ok(value)
}

#[async_trait]
impl ExamBackend for HttpExamBackend {
    async fn fetch_directions(&self) -> Result<Vec<Direction>, BackendError> {
        let url = self.endpoint(&["directions"])?;
        Ok(self.get_json(url).await?.unwrap_or_default())
    }

    async fn fetch_tests_for_direction(
        &self,
        direction: &str,
    ) -> Result<Vec<TestSummary>, BackendError> {
        let url = self.endpoint(&["tests", direction])?;
        Ok(self.get_json(url).await?.unwrap_or_default())
    }

    async fn fetch_test_definition(
        &self,
        test_id: &TestId,
    ) -> Result<Option<TestDefinition>, BackendError> {
        let url = self.endpoint(&["test", test_id.as_str()])?;
        self.get_json(url).await
    }

    async fn fetch_completed_attempts(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<CompletedAttempt>, BackendError> {
        let url = self.endpoint(&["test-sessions", "student", student_id.as_str()])?;
        Ok(self.get_json(url).await?.unwrap_or_default())
    }

    async fn fetch_attempt_statistics(
        &self,
        attempt_id: &AttemptId,
    ) -> Result<Option<AttemptStatistics>, BackendError> {
        let url = self.endpoint(&["test-session", attempt_id.as_str(), "stats"])?;
        self.get_json(url).await
    }

    async fn submit_attempt(
        &self,
        submission: &AttemptSubmission,
    ) -> Result<AttemptId, BackendError> {
        let url = self.endpoint(&["create-test-session"])?;
        tracing::debug!(%url, test_id = %submission.test_id, "POST attempt");
        let response = self.client.post(url).json(submission).send().await?;
        let created: IdResponse = expect_json(response).await?;
        Ok(AttemptId::new(created.id))
    }
}

#[async_trait]
impl TestAdminBackend for HttpExamBackend {
    async fn create_test(&self, test: &NewTest) -> Result<TestId, BackendError> {
        let url = self.endpoint(&["create-test"])?;
        let payload = TestPayload::from_test(test)?;
        let response = self.client.post(url).json(&payload).send().await?;
        let created: IdResponse = expect_json(response).await?;
        Ok(TestId::new(created.id))
    }

    async fn update_test(&self, test_id: &TestId, test: &NewTest) -> Result<(), BackendError> {
        let url = self.endpoint(&["test", test_id.as_str()])?;
        let payload = TestPayload::from_test(test)?;
        let response = self.client.put(url).json(&payload).send().await?;
        expect_success(&response)
    }

    async fn delete_test(&self, test_id: &TestId) -> Result<(), BackendError> {
        let url = self.endpoint(&["test", test_id.as_str()])?;
        let response = self.client.delete(url).send().await?;
        expect_success(&response)
    }

    async fn toggle_visibility(&self, test_id: &TestId) -> Result<bool, BackendError> {
        let url = self.endpoint(&["test", test_id.as_str(), "toggle-visibility"])?;
        let response = self.client.put(url).send().await?;
        let toggled: VisibilityResponse = expect_json(response).await?;
        Ok(toggled.visible)
    }
}
