use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::ids::{AttemptId, StudentId, TestId};
use crate::scoring::ScoredAnswer;

/// A graded attempt the backend already holds for the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedAttempt {
    #[serde(alias = "_id")]
    pub id: AttemptId,
    pub test_id: TestId,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub time_spent_minutes: u32,
}

/// Per-attempt breakdown returned by the statistics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStatistics {
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub accuracy: u32,
    #[serde(default)]
    pub answers: Vec<ScoredAnswer>,
}

/// Payload sent to the backend when a graded attempt completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSubmission {
    pub student_id: StudentId,
    pub test_id: TestId,
    pub test_title: String,
    pub answers: Vec<ScoredAnswer>,
    pub time_spent_minutes: u32,
    /// Normalized 0-100 rating score.
    pub score: u32,
}

/// The learner's completed-tests set, keyed by test.
///
/// Practice attempts never enter this set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTests {
    student_id: StudentId,
    by_test: HashMap<TestId, CompletedAttempt>,
}

impl CompletedTests {
    #[must_use]
    pub fn new(student_id: StudentId, attempts: Vec<CompletedAttempt>) -> Self {
        let by_test = attempts
            .into_iter()
            .map(|attempt| (attempt.test_id.clone(), attempt))
            .collect();
        Self {
            student_id,
            by_test,
        }
    }

    #[must_use]
    pub fn empty(student_id: StudentId) -> Self {
        Self::new(student_id, Vec::new())
    }

    #[must_use]
    pub fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    /// Whether the `(student, test)` pair already has a graded attempt.
    #[must_use]
    pub fn contains(&self, student_id: &StudentId, test_id: &TestId) -> bool {
        &self.student_id == student_id && self.by_test.contains_key(test_id)
    }

    #[must_use]
    pub fn get(&self, test_id: &TestId) -> Option<&CompletedAttempt> {
        self.by_test.get(test_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_test.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_test.is_empty()
    }

    pub fn attempts(&self) -> impl Iterator<Item = &CompletedAttempt> {
        self.by_test.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(id: &str, test: &str) -> CompletedAttempt {
        CompletedAttempt {
            id: AttemptId::new(id),
            test_id: TestId::new(test),
            score: 80,
            time_spent_minutes: 12,
        }
    }

    #[test]
    fn contains_is_scoped_to_student() {
        let set = CompletedTests::new(StudentId::new("s1"), vec![attempt("x", "t1")]);
        assert!(set.contains(&StudentId::new("s1"), &TestId::new("t1")));
        assert!(!set.contains(&StudentId::new("s2"), &TestId::new("t1")));
        assert!(!set.contains(&StudentId::new("s1"), &TestId::new("t2")));
    }

    #[test]
    fn parses_backend_attempt_list() {
        let json = r#"[{"_id": "a1", "testId": "t1", "score": 75, "timeSpentMinutes": 9}]"#;
        let attempts: Vec<CompletedAttempt> = serde_json::from_str(json).unwrap();
        let set = CompletedTests::new(StudentId::new("s1"), attempts);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&TestId::new("t1")).unwrap().score, 75);
    }
}
