//! Availability classification, filtering and pagination of a direction's tests.
//!
//! Everything here is a pure function of `(tests, completed, now, query)`.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::model::{AttemptStatistics, CompletedAttempt, CompletedTests, TestSummary};

/// Tests shown per catalog page.
pub const DEFAULT_PAGE_SIZE: usize = 6;

/// Exactly one status applies to every `(test, completed, now)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestStatus {
    Upcoming,
    Available,
    Missed,
    Completed,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestStatus::Upcoming => "upcoming",
            TestStatus::Available => "available",
            TestStatus::Missed => "missed",
            TestStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Classify one test. A completed test stays completed regardless of its window.
#[must_use]
pub fn classify(test: &TestSummary, completed: &CompletedTests, now: DateTime<Utc>) -> TestStatus {
    if completed.contains(completed.student_id(), &test.id) {
        TestStatus::Completed
    } else if now < test.start_date {
        TestStatus::Upcoming
    } else if now > test.end_date {
        TestStatus::Missed
    } else {
        TestStatus::Available
    }
}

/// Per-status counters for the currently filtered tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub upcoming: usize,
    pub available: usize,
    pub missed: usize,
    pub completed: usize,
}

impl StatusCounts {
    fn bump(&mut self, status: TestStatus) {
        match status {
            TestStatus::Upcoming => self.upcoming += 1,
            TestStatus::Available => self.available += 1,
            TestStatus::Missed => self.missed += 1,
            TestStatus::Completed => self.completed += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.upcoming + self.available + self.missed + self.completed
    }
}

/// Learner-facing filters. Counts ignore `status`; the listing honors it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
    /// Keep tests whose window ends at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Keep tests whose window starts at or before this instant.
    pub until: Option<DateTime<Utc>>,
    pub status: Option<TestStatus>,
    /// 1-indexed; 0 is treated as 1.
    pub page: usize,
    /// 0 falls back to `DEFAULT_PAGE_SIZE`.
    pub page_size: usize,
}

impl CatalogQuery {
    #[must_use]
    pub fn page(page: usize) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    fn matches_search(&self, test: &TestSummary) -> bool {
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => test.title.to_lowercase().contains(&term.to_lowercase()),
        }
    }

    fn overlaps_window(&self, test: &TestSummary) -> bool {
        let ends_after_from = self.from.is_none_or(|from| test.end_date >= from);
        let starts_before_until = self.until.is_none_or(|until| test.start_date <= until);
        ends_after_from && starts_before_until
    }

    fn effective_page_size(&self) -> usize {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }
}

/// A classified test with the learner's attempt data when completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub test: TestSummary,
    pub status: TestStatus,
    pub attempt: Option<CompletedAttempt>,
    pub statistics: Option<AttemptStatistics>,
}

impl CatalogEntry {
    /// Graded start is only offered for available tests.
    #[must_use]
    pub fn can_start(&self) -> bool {
        self.status == TestStatus::Available
    }

    /// Practice is offered once the graded attempt exists.
    #[must_use]
    pub fn can_practice(&self) -> bool {
        self.status == TestStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPage {
    pub entries: Vec<CatalogEntry>,
    pub counts: StatusCounts,
    /// Number of tests after every filter, including `status`.
    pub total_items: usize,
    pub page: usize,
    pub total_pages: usize,
}

/// Filter, classify and paginate `tests`, preserving their input order.
///
/// `statistics` is looked up by test for completed entries.
#[must_use]
pub fn build_page<'a, F>(
    tests: &[TestSummary],
    completed: &CompletedTests,
    now: DateTime<Utc>,
    query: &CatalogQuery,
    statistics: F,
) -> CatalogPage
where
    F: Fn(&TestSummary) -> Option<&'a AttemptStatistics>,
{
    let mut counts = StatusCounts::default();
    let mut listed = Vec::new();
    for test in tests
        .iter()
        .filter(|t| query.matches_search(t) && query.overlaps_window(t))
    {
        let status = classify(test, completed, now);
        counts.bump(status);
        if query.status.is_none_or(|wanted| wanted == status) {
            listed.push((test, status));
        }
    }

    let page_size = query.effective_page_size();
    let total_items = listed.len();
    let total_pages = total_items.div_ceil(page_size);
    let page = query.page.max(1);

    let entries = listed
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .map(|(test, status)| {
            let attempt = match status {
                TestStatus::Completed => completed.get(&test.id).cloned(),
                _ => None,
            };
            let statistics = attempt
                .as_ref()
                .and_then(|_| statistics(test))
                .cloned();
            CatalogEntry {
                test: test.clone(),
                status,
                attempt,
                statistics,
            }
        })
        .collect();

    CatalogPage {
        entries,
        counts,
        total_items,
        page,
        total_pages,
    }
}
