use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::ids::{AnswerId, QuestionId, TestId};
use crate::model::question::QuestionKind;
use crate::model::test::TestDefinition;
use crate::time::ceil_seconds;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("test session already completed")]
    Completed,

    #[error("test session time limit elapsed")]
    Expired,
}

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

/// The learner's raw input for one question, shaped by the question kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnswerRecord {
    Single {
        #[serde(rename = "selectedAnswer", default)]
        selected_answer: Option<AnswerId>,
    },
    Multiple {
        #[serde(rename = "selectedAnswers", default)]
        selected_answers: BTreeSet<AnswerId>,
    },
    Text {
        #[serde(rename = "textAnswer", default)]
        text_answer: String,
    },
}

impl AnswerRecord {
    #[must_use]
    pub fn single(selected: Option<&str>) -> Self {
        Self::Single {
            selected_answer: selected.map(AnswerId::new),
        }
    }

    #[must_use]
    pub fn multiple<I, S>(selected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Multiple {
            selected_answers: selected.into_iter().map(AnswerId::new).collect(),
        }
    }

    #[must_use]
    pub fn text(answer: impl Into<String>) -> Self {
        Self::Text {
            text_answer: answer.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        match self {
            AnswerRecord::Single { .. } => QuestionKind::Single,
            AnswerRecord::Multiple { .. } => QuestionKind::Multiple,
            AnswerRecord::Text { .. } => QuestionKind::Text,
        }
    }

    /// Option ids referenced by this record; empty for text answers.
    #[must_use]
    pub fn selected_ids(&self) -> Vec<&AnswerId> {
        match self {
            AnswerRecord::Single { selected_answer } => selected_answer.iter().collect(),
            AnswerRecord::Multiple { selected_answers } => selected_answers.iter().collect(),
            AnswerRecord::Text { .. } => Vec::new(),
        }
    }
}

/// An answer record keyed by its question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedAnswer {
    pub question_id: QuestionId,
    #[serde(flatten)]
    pub answer: AnswerRecord,
}

//
// ─── NAVIGATION ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDirection {
    Next,
    Prev,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Mutable state of one test attempt, persisted after every change.
///
/// The time limit is captured when the attempt starts and never re-read from
/// the definition afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSession {
    test_id: TestId,
    test_title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    start_time: DateTime<Utc>,
    #[serde(rename = "timeLimitSeconds")]
    time_limit_secs: u32,
    current_question_index: usize,
    #[serde(default)]
    answers: Vec<RecordedAnswer>,
    #[serde(default)]
    is_completed: bool,
    #[serde(default)]
    is_practice_mode: bool,
}

impl TestSession {
    /// Open a fresh session on the first question with no answers.
    #[must_use]
    pub fn start(test: &TestDefinition, started_at: DateTime<Utc>, practice_mode: bool) -> Self {
        Self {
            test_id: test.id().clone(),
            test_title: test.title().to_owned(),
            start_time: started_at,
            time_limit_secs: test.summary.time_limit_minutes.saturating_mul(60),
            current_question_index: 0,
            answers: Vec::new(),
            is_completed: false,
            is_practice_mode: practice_mode,
        }
    }

    #[must_use]
    pub fn test_id(&self) -> &TestId {
        &self.test_id
    }

    #[must_use]
    pub fn test_title(&self) -> &str {
        &self.test_title
    }

    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    #[must_use]
    pub fn time_limit(&self) -> Duration {
        Duration::seconds(i64::from(self.time_limit_secs))
    }

    #[must_use]
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.start_time + self.time_limit()
    }

    #[must_use]
    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    #[must_use]
    pub fn answers(&self) -> &[RecordedAnswer] {
        &self.answers
    }

    #[must_use]
    pub fn answer(&self, question_id: QuestionId) -> Option<&AnswerRecord> {
        self.answers
            .iter()
            .find(|a| a.question_id == question_id)
            .map(|a| &a.answer)
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn is_practice_mode(&self) -> bool {
        self.is_practice_mode
    }

    /// Seconds left on the countdown, rounded up, never negative.
    #[must_use]
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u32 {
        ceil_seconds(self.ends_at() - now)
    }

    /// A session is resumable only while `now < start_time + time_limit`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at()
    }

    /// Fails if the session can no longer accept input at `now`.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::Completed` or `SessionStateError::Expired`.
    pub fn ensure_open(&self, now: DateTime<Utc>) -> Result<(), SessionStateError> {
        if self.is_completed {
            return Err(SessionStateError::Completed);
        }
        if self.is_expired(now) {
            return Err(SessionStateError::Expired);
        }
        Ok(())
    }

    /// Replace any existing record for `question_id`.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if the session is completed or expired.
    pub fn record(
        &mut self,
        question_id: QuestionId,
        answer: AnswerRecord,
        now: DateTime<Utc>,
    ) -> Result<(), SessionStateError> {
        self.ensure_open(now)?;
        match self.answers.iter_mut().find(|a| a.question_id == question_id) {
            Some(existing) => existing.answer = answer,
            None => self.answers.push(RecordedAnswer {
                question_id,
                answer,
            }),
        }
        Ok(())
    }

    /// Move one question forward or back. Returns whether the index changed.
    ///
    /// Moving past either end is ignored.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if the session is completed or expired.
    pub fn navigate(
        &mut self,
        direction: NavDirection,
        question_count: usize,
        now: DateTime<Utc>,
    ) -> Result<bool, SessionStateError> {
        self.ensure_open(now)?;
        let last = question_count.saturating_sub(1);
        let next = match direction {
            NavDirection::Next if self.current_question_index < last => {
                self.current_question_index + 1
            }
            NavDirection::Prev if self.current_question_index > 0 => {
                self.current_question_index - 1
            }
            _ => return Ok(false),
        };
        self.current_question_index = next;
        Ok(true)
    }

    /// Pull a restored index back inside `[0, question_count - 1]`.
    pub fn clamp_index(&mut self, question_count: usize) {
        let last = question_count.saturating_sub(1);
        if self.current_question_index > last {
            self.current_question_index = last;
        }
    }

    /// Set the terminal flag. Returns `false` if it was already set.
    pub fn mark_completed(&mut self) -> bool {
        !std::mem::replace(&mut self.is_completed, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::{AnswerOption, Question};
    use crate::model::test::TestSummary;
    use crate::time::fixed_now;

    fn test_definition(minutes: u32) -> TestDefinition {
        TestDefinition {
            summary: TestSummary {
                id: TestId::new("t1"),
                title: "Geography".into(),
                direction: "Humanities".into(),
                start_date: fixed_now(),
                end_date: fixed_now() + Duration::days(1),
                time_limit_minutes: minutes,
                is_active: true,
            },
            questions: vec![
                Question::single(
                    1,
                    "2 + 2",
                    5,
                    vec![
                        AnswerOption::new("a", "2", false),
                        AnswerOption::new("b", "4", true),
                    ],
                ),
                Question::text(2, "Capital of France", 3, vec!["Paris".into()]),
            ],
        }
    }

    #[test]
    fn start_captures_time_limit_in_seconds() {
        let session = TestSession::start(&test_definition(30), fixed_now(), false);
        assert_eq!(session.time_limit(), Duration::minutes(30));
        assert_eq!(session.current_question_index(), 0);
        assert!(session.answers().is_empty());
        assert!(!session.is_completed());
    }

    #[test]
    fn remaining_seconds_counts_down_to_zero() {
        let session = TestSession::start(&test_definition(30), fixed_now(), false);
        let almost = fixed_now() + Duration::minutes(29) + Duration::seconds(59);
        assert_eq!(session.remaining_seconds(almost), 1);
        assert!(!session.is_expired(almost));

        let end = fixed_now() + Duration::minutes(30);
        assert_eq!(session.remaining_seconds(end), 0);
        assert!(session.is_expired(end));
        assert_eq!(session.remaining_seconds(end + Duration::hours(1)), 0);
    }

    #[test]
    fn record_replaces_existing_answer() {
        let mut session = TestSession::start(&test_definition(30), fixed_now(), false);
        let q = QuestionId::new(1);
        session
            .record(q, AnswerRecord::single(Some("a")), fixed_now())
            .unwrap();
        session
            .record(q, AnswerRecord::single(Some("b")), fixed_now())
            .unwrap();
        assert_eq!(session.answers().len(), 1);
        assert_eq!(session.answer(q), Some(&AnswerRecord::single(Some("b"))));
    }

    #[test]
    fn record_after_expiry_is_rejected() {
        let mut session = TestSession::start(&test_definition(1), fixed_now(), false);
        let late = fixed_now() + Duration::minutes(1);
        let err = session
            .record(QuestionId::new(1), AnswerRecord::text("x"), late)
            .unwrap_err();
        assert_eq!(err, SessionStateError::Expired);
        assert!(session.answers().is_empty());
    }

    #[test]
    fn navigation_is_bounded() {
        let mut session = TestSession::start(&test_definition(30), fixed_now(), false);
        let now = fixed_now();
        assert!(!session.navigate(NavDirection::Prev, 2, now).unwrap());
        assert!(session.navigate(NavDirection::Next, 2, now).unwrap());
        assert_eq!(session.current_question_index(), 1);
        assert!(!session.navigate(NavDirection::Next, 2, now).unwrap());
        assert_eq!(session.current_question_index(), 1);
        assert!(session.navigate(NavDirection::Prev, 2, now).unwrap());
        assert_eq!(session.current_question_index(), 0);
    }

    #[test]
    fn mark_completed_reports_first_transition_only() {
        let mut session = TestSession::start(&test_definition(30), fixed_now(), true);
        assert!(session.mark_completed());
        assert!(!session.mark_completed());
        assert_eq!(
            session.ensure_open(fixed_now()),
            Err(SessionStateError::Completed)
        );
    }

    #[test]
    fn persisted_json_restores_identical_session() {
        let mut session = TestSession::start(&test_definition(30), fixed_now(), false);
        let now = fixed_now();
        session
            .record(QuestionId::new(1), AnswerRecord::single(Some("b")), now)
            .unwrap();
        session
            .record(QuestionId::new(2), AnswerRecord::text(" paris "), now)
            .unwrap();
        session.navigate(NavDirection::Next, 2, now).unwrap();

        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"textAnswer\":\" paris \""));
        let restored: TestSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn clamp_index_pulls_back_into_range() {
        let mut session = TestSession::start(&test_definition(30), fixed_now(), false);
        session.navigate(NavDirection::Next, 5, fixed_now()).unwrap();
        session.clamp_index(1);
        assert_eq!(session.current_question_index(), 0);
    }
}
