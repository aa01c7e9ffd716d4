use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{AnswerId, QuestionId};
use crate::model::question::{AnswerOption, Question, QuestionBody, QuestionKind};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DraftError {
    #[error("test title cannot be empty")]
    EmptyTitle,

    #[error("test direction cannot be empty")]
    EmptyDirection,

    #[error("end date is before start date")]
    InvalidWindow,

    #[error("time limit must be > 0 minutes")]
    InvalidTimeLimit,

    #[error("add at least one question")]
    NoQuestions,

    #[error("question {0} has no text")]
    EmptyQuestionText(u32),

    #[error("question {0} needs at least two answer options")]
    TooFewOptions(u32),

    #[error("question {0} has an answer option without text")]
    EmptyOptionText(u32),

    #[error("question {0} must have exactly one correct option")]
    SingleCorrectCount(u32),

    #[error("question {0} must have at least one correct option")]
    NoCorrectOption(u32),

    #[error("question {0} needs at least one accepted answer")]
    NoAcceptedAnswers(u32),
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Unvalidated answer option as entered by an examiner.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OptionDraft {
    pub text: String,
    pub is_correct: bool,
    pub point_value: u32,
}

impl OptionDraft {
    #[must_use]
    pub fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            text: text.into(),
            is_correct,
            point_value: 0,
        }
    }

    #[must_use]
    pub fn worth(mut self, point_value: u32) -> Self {
        self.point_value = point_value;
        self
    }
}

/// Unvalidated question. Fields irrelevant to `kind` are dropped on validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub kind: QuestionKind,
    pub text: String,
    /// Ignored for `multiple`, whose points come from its correct options.
    pub points: u32,
    pub options: Vec<OptionDraft>,
    pub correct_answers: Vec<String>,
}

impl QuestionDraft {
    #[must_use]
    pub fn choice(
        kind: QuestionKind,
        text: impl Into<String>,
        points: u32,
        options: Vec<OptionDraft>,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            points,
            options,
            correct_answers: Vec::new(),
        }
    }

    #[must_use]
    pub fn free_text(text: impl Into<String>, points: u32, correct_answers: Vec<String>) -> Self {
        Self {
            kind: QuestionKind::Text,
            text: text.into(),
            points,
            options: Vec::new(),
            correct_answers,
        }
    }

    fn validate(self, number: u32) -> Result<Question, DraftError> {
        let text = self.text.trim().to_owned();
        if text.is_empty() {
            return Err(DraftError::EmptyQuestionText(number));
        }

        let body = match self.kind {
            QuestionKind::Single | QuestionKind::Multiple => {
                if self.options.len() < 2 {
                    return Err(DraftError::TooFewOptions(number));
                }
                if self.options.iter().any(|o| o.text.trim().is_empty()) {
                    return Err(DraftError::EmptyOptionText(number));
                }
                let correct = self.options.iter().filter(|o| o.is_correct).count();
                let multiple = self.kind == QuestionKind::Multiple;
                if multiple && correct == 0 {
                    return Err(DraftError::NoCorrectOption(number));
                }
                if !multiple && correct != 1 {
                    return Err(DraftError::SingleCorrectCount(number));
                }

                let answers = self
                    .options
                    .into_iter()
                    .enumerate()
                    .map(|(i, o)| AnswerOption {
                        id: AnswerId::from_index(i),
                        text: o.text.trim().to_owned(),
                        is_correct: o.is_correct,
                        point_value: if multiple && o.is_correct { o.point_value } else { 0 },
                    })
                    .collect();
                if multiple {
                    QuestionBody::Multiple { answers }
                } else {
                    QuestionBody::Single {
                        points: self.points,
                        answers,
                    }
                }
            }
            QuestionKind::Text => {
                let correct_answers: Vec<String> = self
                    .correct_answers
                    .into_iter()
                    .map(|a| a.trim().to_owned())
                    .filter(|a| !a.is_empty())
                    .collect();
                if correct_answers.is_empty() {
                    return Err(DraftError::NoAcceptedAnswers(number));
                }
                QuestionBody::Text {
                    points: self.points,
                    correct_answers,
                }
            }
        };

        Ok(Question {
            question_id: QuestionId::new(number),
            text,
            body,
        })
    }
}

/// Unvalidated test as entered in the authoring form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDraft {
    pub title: String,
    pub direction: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub time_limit_minutes: u32,
    pub is_active: bool,
    pub questions: Vec<QuestionDraft>,
}

/// A validated test ready to be created or updated on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTest {
    pub title: String,
    pub direction: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub time_limit_minutes: u32,
    pub is_active: bool,
    pub questions: Vec<Question>,
}

impl TestDraft {
    /// Validate the draft, numbering questions from 1 and options from `a`.
    ///
    /// # Errors
    ///
    /// Returns the first `DraftError` found, checking test fields before questions.
    pub fn validate(self) -> Result<NewTest, DraftError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(DraftError::EmptyTitle);
        }
        let direction = self.direction.trim().to_owned();
        if direction.is_empty() {
            return Err(DraftError::EmptyDirection);
        }
        if self.end_date < self.start_date {
            return Err(DraftError::InvalidWindow);
        }
        if self.time_limit_minutes == 0 {
            return Err(DraftError::InvalidTimeLimit);
        }
        if self.questions.is_empty() {
            return Err(DraftError::NoQuestions);
        }

        let questions = self
            .questions
            .into_iter()
            .zip(1_u32..)
            .map(|(q, number)| q.validate(number))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewTest {
            title,
            direction,
            start_date: self.start_date,
            end_date: self.end_date,
            time_limit_minutes: self.time_limit_minutes,
            is_active: self.is_active,
            questions,
        })
    }
}
