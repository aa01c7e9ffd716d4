use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{QuestionId, TestId};
use crate::model::question::Question;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TestDefinitionError {
    #[error("time limit must be > 0 minutes")]
    InvalidTimeLimit,

    #[error("duplicate question id {0}")]
    DuplicateQuestion(QuestionId),
}

//
// ─── DIRECTION ─────────────────────────────────────────────────────────────────
//

/// Subject track grouping tests (e.g. "Mathematics").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Direction {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
}

//
// ─── SUMMARY ───────────────────────────────────────────────────────────────────
//

/// Catalog-level view of a test, without its questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    #[serde(alias = "_id")]
    pub id: TestId,
    pub title: String,
    #[serde(default)]
    pub direction: String,
    #[serde(with = "crate::time::wire_date")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "crate::time::wire_date")]
    pub end_date: DateTime<Utc>,
    pub time_limit_minutes: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

//
// ─── DEFINITION ────────────────────────────────────────────────────────────────
//

/// Full, server-authoritative test with its ordered questions.
///
/// Read-only for the session engine and fetched fresh for every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinition {
    #[serde(flatten)]
    pub summary: TestSummary,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl TestDefinition {
    #[must_use]
    pub fn id(&self) -> &TestId {
        &self.summary.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.summary.title
    }

    #[must_use]
    pub fn time_limit(&self) -> Duration {
        Duration::minutes(i64::from(self.summary.time_limit_minutes))
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    /// Sum of every question's points.
    #[must_use]
    pub fn max_points(&self) -> u32 {
        self.questions.iter().map(Question::points).sum()
    }

    /// Check the invariants an attempt relies on.
    ///
    /// Content is server-authoritative: an empty question list or a question
    /// nobody can answer correctly still makes a startable attempt.
    ///
    /// # Errors
    ///
    /// Returns `TestDefinitionError` for a zero time limit or a repeated
    /// question id.
    pub fn validate(&self) -> Result<(), TestDefinitionError> {
        if self.summary.time_limit_minutes == 0 {
            return Err(TestDefinitionError::InvalidTimeLimit);
        }

        let mut seen = HashSet::with_capacity(self.questions.len());
        for question in &self.questions {
            if !seen.insert(question.id()) {
                return Err(TestDefinitionError::DuplicateQuestion(question.id()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::AnswerOption;
    use crate::time::fixed_now;

    fn definition(questions: Vec<Question>) -> TestDefinition {
        TestDefinition {
            summary: TestSummary {
                id: TestId::new("t1"),
                title: "Algebra".into(),
                direction: "Mathematics".into(),
                start_date: fixed_now(),
                end_date: fixed_now() + Duration::days(7),
                time_limit_minutes: 30,
                is_active: true,
            },
            questions,
        }
    }

    fn sum_question(id: u32) -> Question {
        Question::single(
            id,
            "2 + 2",
            5,
            vec![
                AnswerOption::new("a", "2", false),
                AnswerOption::new("b", "4", true),
            ],
        )
    }

    #[test]
    fn parses_wire_definition_with_mongo_id() {
        let json = r#"{
            "_id": "665f",
            "title": "Algebra",
            "direction": "Mathematics",
            "startDate": "2024-01-01T00:00:00Z",
            "endDate": "2024-01-31T23:59:59Z",
            "timeLimitMinutes": 30,
            "isActive": true,
            "questions": [
                {"questionId": 1, "type": "single", "text": "2 + 2", "points": 5,
                 "answers": [{"id": "a", "text": "4", "isCorrect": true, "pointValue": 0}],
                 "correctAnswers": []}
            ]
        }"#;
        let def: TestDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.id(), &TestId::new("665f"));
        assert_eq!(def.time_limit(), Duration::minutes(30));
        assert_eq!(def.max_points(), 5);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn parses_zoneless_admin_form_dates() {
        let json = r#"{"_id": "t9", "title": "Geometry", "direction": "Mathematics",
            "startDate": "2024-01-01T10:00", "endDate": "2024-01-08T18:30:00",
            "timeLimitMinutes": 20}"#;
        let summary: TestSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.start_date.to_rfc3339(), "2024-01-01T10:00:00+00:00");
        assert_eq!(summary.end_date.to_rfc3339(), "2024-01-08T18:30:00+00:00");

        let written = serde_json::to_value(&summary).unwrap();
        assert_eq!(written["startDate"], "2024-01-01T10:00:00Z");
    }

    #[test]
    fn rejects_zero_time_limit() {
        let mut def = definition(vec![sum_question(1)]);
        def.summary.time_limit_minutes = 0;
        assert_eq!(def.validate(), Err(TestDefinitionError::InvalidTimeLimit));
    }

    #[test]
    fn rejects_duplicate_question_ids() {
        let def = definition(vec![sum_question(1), sum_question(1)]);
        assert_eq!(
            def.validate(),
            Err(TestDefinitionError::DuplicateQuestion(QuestionId::new(1)))
        );
    }

    #[test]
    fn accepts_empty_question_list() {
        assert!(definition(Vec::new()).validate().is_ok());
    }

    #[test]
    fn accepts_single_question_without_correct_option() {
        let unanswerable = Question::single(
            1,
            "Pick one",
            2,
            vec![AnswerOption::new("a", "no", false)],
        );
        assert!(definition(vec![unanswerable]).validate().is_ok());
    }
}
