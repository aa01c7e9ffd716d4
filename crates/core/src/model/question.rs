use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::model::ids::{AnswerId, QuestionId};

/// One selectable option of a `single` or `multiple` question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: AnswerId,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    /// Only meaningful for correct options of `multiple` questions.
    #[serde(default)]
    pub point_value: u32,
}

impl AnswerOption {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            id: AnswerId::new(id),
            text: text.into(),
            is_correct,
            point_value: 0,
        }
    }

    #[must_use]
    pub fn with_point_value(mut self, point_value: u32) -> Self {
        self.point_value = point_value;
        self
    }
}

/// Discriminant of a question, also used to shape recorded answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Single,
    Multiple,
    Text,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionKind::Single => "single",
            QuestionKind::Multiple => "multiple",
            QuestionKind::Text => "text",
        };
        f.write_str(s)
    }
}

/// Variant-specific part of a question.
///
/// `Multiple` carries no `points`: its value is always the sum of the correct
/// options' `point_value`, and any `points` sent by the server is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionBody {
    Single {
        #[serde(default)]
        points: u32,
        answers: Vec<AnswerOption>,
    },
    Multiple {
        answers: Vec<AnswerOption>,
    },
    Text {
        #[serde(default)]
        points: u32,
        #[serde(rename = "correctAnswers", default)]
        correct_answers: Vec<String>,
    },
}

/// A question inside a test definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_id: QuestionId,
    pub text: String,
    #[serde(flatten)]
    pub body: QuestionBody,
}

impl Question {
    #[must_use]
    pub fn single(
        question_id: u32,
        text: impl Into<String>,
        points: u32,
        answers: Vec<AnswerOption>,
    ) -> Self {
        Self {
            question_id: QuestionId::new(question_id),
            text: text.into(),
            body: QuestionBody::Single { points, answers },
        }
    }

    #[must_use]
    pub fn multiple(question_id: u32, text: impl Into<String>, answers: Vec<AnswerOption>) -> Self {
        Self {
            question_id: QuestionId::new(question_id),
            text: text.into(),
            body: QuestionBody::Multiple { answers },
        }
    }

    #[must_use]
    pub fn text(
        question_id: u32,
        text: impl Into<String>,
        points: u32,
        correct_answers: Vec<String>,
    ) -> Self {
        Self {
            question_id: QuestionId::new(question_id),
            text: text.into(),
            body: QuestionBody::Text {
                points,
                correct_answers,
            },
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.question_id
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        match self.body {
            QuestionBody::Single { .. } => QuestionKind::Single,
            QuestionBody::Multiple { .. } => QuestionKind::Multiple,
            QuestionBody::Text { .. } => QuestionKind::Text,
        }
    }

    /// Points awarded for a correct answer.
    #[must_use]
    pub fn points(&self) -> u32 {
        match &self.body {
            QuestionBody::Single { points, .. } | QuestionBody::Text { points, .. } => *points,
            QuestionBody::Multiple { answers } => answers
                .iter()
                .filter(|a| a.is_correct)
                .map(|a| a.point_value)
                .sum(),
        }
    }

    /// Answer options for choice questions; empty for `text`.
    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        match &self.body {
            QuestionBody::Single { answers, .. } | QuestionBody::Multiple { answers } => answers,
            QuestionBody::Text { .. } => &[],
        }
    }

    /// Ids of the options flagged correct.
    #[must_use]
    pub fn correct_option_ids(&self) -> BTreeSet<&AnswerId> {
        self.options()
            .iter()
            .filter(|a| a.is_correct)
            .map(|a| &a.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capitals() -> Question {
        Question::multiple(
            2,
            "Pick the capitals",
            vec![
                AnswerOption::new("a", "Paris", true).with_point_value(2),
                AnswerOption::new("b", "Lyon", false).with_point_value(9),
                AnswerOption::new("c", "Rome", true).with_point_value(3),
            ],
        )
    }

    #[test]
    fn multiple_points_are_sum_of_correct_point_values() {
        assert_eq!(capitals().points(), 5);
    }

    #[test]
    fn multiple_ignores_server_points_field() {
        let json = r#"{
            "questionId": 4,
            "type": "multiple",
            "text": "Pick",
            "points": 100,
            "answers": [
                {"id": "a", "text": "x", "isCorrect": true, "pointValue": 1},
                {"id": "b", "text": "y", "isCorrect": false}
            ]
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.kind(), QuestionKind::Multiple);
        assert_eq!(q.points(), 1);
    }

    #[test]
    fn parses_text_question_with_correct_answers() {
        let json = r#"{
            "questionId": 1,
            "type": "text",
            "text": "Capital of France?",
            "points": 3,
            "answers": [],
            "correctAnswers": ["Paris"]
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.id(), QuestionId::new(1));
        assert_eq!(q.points(), 3);
        assert!(q.options().is_empty());
        match q.body {
            QuestionBody::Text {
                correct_answers, ..
            } => assert_eq!(correct_answers, vec!["Paris".to_string()]),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn correct_option_ids_are_ordered() {
        let q = capitals();
        let correct: Vec<_> = q.correct_option_ids().into_iter().cloned().collect();
        assert_eq!(correct, vec![AnswerId::new("a"), AnswerId::new("c")]);
    }
}
