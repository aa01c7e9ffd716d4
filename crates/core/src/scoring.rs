//! Client-side scoring of a finished attempt.
//!
//! Every question is scored all-or-nothing: `multiple` questions award their
//! points only when the selected set equals the correct set exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{
    AnswerId, AnswerRecord, AttemptId, Question, QuestionBody, QuestionId, TestDefinition,
    TestId, TestSession,
};
use crate::time::ceil_minutes;

/// One question's outcome. `answer` is absent for unanswered questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredAnswer {
    pub question_id: QuestionId,
    #[serde(flatten)]
    pub answer: Option<AnswerRecord>,
    pub is_correct: bool,
    pub points: u32,
}

/// What happened to the graded submission of a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Practice attempts are never sent.
    Skipped,
    /// Scored locally, not yet sent.
    Pending,
    Accepted(AttemptId),
    /// Transport or backend failure; the local result still stands.
    Failed(String),
}

/// Aggregate outcome shown to the learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub test_id: TestId,
    pub test_title: String,
    pub total_points: u32,
    pub max_points: u32,
    pub correct_answers: u32,
    pub total_questions: u32,
    /// Percentage of questions answered correctly, rounded.
    pub accuracy: u32,
    /// `total_points / max_points` as a rounded percentage.
    pub rating_score: u32,
    pub time_spent_minutes: u32,
    pub practice_mode: bool,
    pub answers: Vec<ScoredAnswer>,
    pub submission: Submission,
}

/// Lowercased, trimmed form used to compare free-text answers.
#[must_use]
pub fn normalize_text_answer(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Score a single question against the learner's record, if any.
///
/// A record whose shape does not match the question kind counts as no selection.
#[must_use]
pub fn score_question(question: &Question, answer: Option<&AnswerRecord>) -> ScoredAnswer {
    let is_correct = match (&question.body, answer) {
        (
            QuestionBody::Single { answers, .. },
            Some(AnswerRecord::Single {
                selected_answer: Some(selected),
            }),
        ) => answers
            .iter()
            .find(|a| a.is_correct)
            .is_some_and(|correct| &correct.id == selected),
        (QuestionBody::Single { .. }, _) => false,
        (QuestionBody::Multiple { .. }, Some(AnswerRecord::Multiple { selected_answers })) => {
            let selected: BTreeSet<&AnswerId> = selected_answers.iter().collect();
            selected == question.correct_option_ids()
        }
        (QuestionBody::Multiple { .. }, _) => question.correct_option_ids().is_empty(),
        (QuestionBody::Text { correct_answers, .. }, Some(AnswerRecord::Text { text_answer })) => {
            let given = normalize_text_answer(text_answer);
            correct_answers
                .iter()
                .map(|c| normalize_text_answer(c))
                .any(|c| !c.is_empty() && c == given)
        }
        (QuestionBody::Text { .. }, _) => false,
    };

    ScoredAnswer {
        question_id: question.id(),
        answer: answer.cloned(),
        is_correct,
        points: if is_correct { question.points() } else { 0 },
    }
}

/// Rounded `100 * part / whole`, or 0 when `whole` is 0.
#[must_use]
pub fn percentage(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    let (part, whole) = (u64::from(part), u64::from(whole));
    let rounded = (200 * part + whole) / (2 * whole);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// Score every question of `test` in order using the answers held by `session`.
#[must_use]
pub fn score_attempt(
    test: &TestDefinition,
    session: &TestSession,
    completed_at: DateTime<Utc>,
) -> TestResult {
    let answers: Vec<ScoredAnswer> = test
        .questions
        .iter()
        .map(|q| score_question(q, session.answer(q.id())))
        .collect();

    let total_points = answers.iter().map(|a| a.points).sum();
    let max_points = test.max_points();
    let correct_answers =
        u32::try_from(answers.iter().filter(|a| a.is_correct).count()).unwrap_or(u32::MAX);
    let total_questions = u32::try_from(test.questions.len()).unwrap_or(u32::MAX);

    TestResult {
        test_id: test.id().clone(),
        test_title: test.title().to_owned(),
        total_points,
        max_points,
        correct_answers,
        total_questions,
        accuracy: percentage(correct_answers, total_questions),
        rating_score: percentage(total_points, max_points),
        time_spent_minutes: ceil_minutes(completed_at - session.start_time()),
        practice_mode: session.is_practice_mode(),
        answers,
        submission: if session.is_practice_mode() {
            Submission::Skipped
        } else {
            Submission::Pending
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerOption, TestSummary};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn sum_question() -> Question {
        Question::single(
            1,
            "2 + 2",
            5,
            vec![
                AnswerOption::new("a", "2", false),
                AnswerOption::new("b", "4", true),
            ],
        )
    }

    fn primes_question() -> Question {
        Question::multiple(
            2,
            "Primes",
            vec![
                AnswerOption::new("a", "2", true).with_point_value(2),
                AnswerOption::new("b", "3", true).with_point_value(2),
                AnswerOption::new("c", "4", false),
                AnswerOption::new("d", "5", true).with_point_value(1),
            ],
        )
    }

    fn capital_question() -> Question {
        Question::text(3, "Capital of France", 4, vec!["Paris".into()])
    }

    #[test]
    fn single_choice_scenarios() {
        let q = sum_question();
        let right = score_question(&q, Some(&AnswerRecord::single(Some("b"))));
        assert!(right.is_correct);
        assert_eq!(right.points, 5);

        let wrong = score_question(&q, Some(&AnswerRecord::single(Some("a"))));
        assert!(!wrong.is_correct);
        assert_eq!(wrong.points, 0);

        let empty = score_question(&q, Some(&AnswerRecord::single(None)));
        assert!(!empty.is_correct);
        assert_eq!(empty.points, 0);

        let unanswered = score_question(&q, None);
        assert!(!unanswered.is_correct);
        assert_eq!(unanswered.points, 0);
    }

    #[test]
    fn multiple_choice_requires_exact_set() {
        let q = primes_question();
        assert_eq!(q.points(), 5);

        let exact = score_question(&q, Some(&AnswerRecord::multiple(["d", "a", "b"])));
        assert!(exact.is_correct);
        assert_eq!(exact.points, 5);

        let missing_one = score_question(&q, Some(&AnswerRecord::multiple(["a", "b"])));
        assert!(!missing_one.is_correct);
        assert_eq!(missing_one.points, 0);

        let extra_incorrect =
            score_question(&q, Some(&AnswerRecord::multiple(["a", "b", "c", "d"])));
        assert!(!extra_incorrect.is_correct);
        assert_eq!(extra_incorrect.points, 0);

        let substituted = score_question(&q, Some(&AnswerRecord::multiple(["a", "b", "c"])));
        assert_eq!(substituted.points, 0);

        let unknown_id = score_question(&q, Some(&AnswerRecord::multiple(["a", "b", "d", "z"])));
        assert_eq!(unknown_id.points, 0);
    }

    #[test]
    fn text_answers_trim_and_ignore_case_but_need_full_match() {
        let q = capital_question();
        let padded = score_question(&q, Some(&AnswerRecord::text("  paris ")));
        assert!(padded.is_correct);
        assert_eq!(padded.points, 4);

        let longer = score_question(&q, Some(&AnswerRecord::text("Paris, France")));
        assert!(!longer.is_correct);
        assert_eq!(longer.points, 0);

        let blank = score_question(&q, Some(&AnswerRecord::text("   ")));
        assert!(!blank.is_correct);
    }

    #[test]
    fn mismatched_record_shape_counts_as_no_selection() {
        let scored = score_question(&sum_question(), Some(&AnswerRecord::text("4")));
        assert!(!scored.is_correct);
        assert_eq!(scored.points, 0);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(0, 0), 0);
    }

    #[test]
    fn score_attempt_aggregates_in_question_order() {
        let test = TestDefinition {
            summary: TestSummary {
                id: TestId::new("t1"),
                title: "Mixed".into(),
                direction: "General".into(),
                start_date: fixed_now(),
                end_date: fixed_now() + Duration::days(1),
                time_limit_minutes: 30,
                is_active: true,
            },
            questions: vec![sum_question(), primes_question(), capital_question()],
        };
        let mut session = TestSession::start(&test, fixed_now(), false);
        let now = fixed_now();
        session
            .record(QuestionId::new(1), AnswerRecord::single(Some("b")), now)
            .unwrap();
        session
            .record(QuestionId::new(3), AnswerRecord::text("PARIS"), now)
            .unwrap();

        let result = score_attempt(&test, &session, now + Duration::seconds(61));
        assert_eq!(result.total_points, 9);
        assert_eq!(result.max_points, 14);
        assert_eq!(result.correct_answers, 2);
        assert_eq!(result.total_questions, 3);
        assert_eq!(result.accuracy, 67);
        assert_eq!(result.rating_score, 64);
        assert_eq!(result.time_spent_minutes, 2);
        assert_eq!(result.submission, Submission::Pending);

        let ids: Vec<u32> = result.answers.iter().map(|a| a.question_id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(result.answers[1].answer.is_none());
    }

    #[test]
    fn scored_answer_serializes_flat() {
        let scored = score_question(&sum_question(), Some(&AnswerRecord::single(Some("b"))));
        let json = serde_json::to_value(&scored).unwrap();
        assert_eq!(json["questionId"], 1);
        assert_eq!(json["type"], "single");
        assert_eq!(json["selectedAnswer"], "b");
        assert_eq!(json["isCorrect"], true);
        assert_eq!(json["points"], 5);
    }
}
