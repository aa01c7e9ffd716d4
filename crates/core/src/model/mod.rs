mod attempt;
mod draft;
mod ids;
mod question;
mod session;
mod test;

pub use ids::{AnswerId, AttemptId, ParseIdError, QuestionId, StudentId, TestId};

pub use attempt::{AttemptStatistics, AttemptSubmission, CompletedAttempt, CompletedTests};
pub use draft::{DraftError, NewTest, OptionDraft, QuestionDraft, TestDraft};
pub use question::{AnswerOption, Question, QuestionBody, QuestionKind};
pub use session::{AnswerRecord, NavDirection, RecordedAnswer, SessionStateError, TestSession};
pub use test::{Direction, TestDefinition, TestDefinitionError, TestSummary};
