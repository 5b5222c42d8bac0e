//! Paginated issue retrieval.
//!
//! The tracker is reached through the [`IssueSource`] trait so the paging
//! rules can be exercised without a server. [`jira::JiraClient`] is the
//! production implementation.
//!
//! Paging requests offsets `0, B, 2B, ...` and stops at the first block
//! holding fewer than `B` issues. When every block is full the end is only
//! detected by a terminal empty block. Sources must therefore return full
//! blocks while data remains, even if the server caps page sizes.

pub mod jira;

use crate::error::{ExtractError, Result};
use crate::logging::RunContext;
use crate::model::RawIssueRecord;
use crate::util::time::DateRange;
use serde::Serialize;
use tracing::{error, info};

/// Default number of issues requested per block.
pub const DEFAULT_BLOCK_SIZE: usize = 1000;

/// Read access to an issue tracker.
pub trait IssueSource {
    /// Keys of every project visible to the current user.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker cannot be reached.
    fn projects(&self) -> Result<Vec<String>>;

    /// One block of issues matching `jql`, changelog expanded.
    ///
    /// Must return exactly `max_results` issues unless fewer remain.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker cannot be reached or rejects the query.
    fn search(&self, jql: &str, start_at: usize, max_results: usize)
    -> Result<Vec<RawIssueRecord>>;
}

/// Receives each block as soon as it is retrieved.
pub trait BlockObserver {
    /// # Errors
    ///
    /// An error aborts the fetch.
    fn on_block(&mut self, project: &str, block: &[RawIssueRecord]) -> Result<()>;
}

impl<F> BlockObserver for F
where
    F: FnMut(&str, &[RawIssueRecord]) -> Result<()>,
{
    fn on_block(&mut self, project: &str, block: &[RawIssueRecord]) -> Result<()> {
        self(project, block)
    }
}

/// Observer that ignores blocks.
pub struct NoopObserver;

impl BlockObserver for NoopObserver {
    fn on_block(&mut self, _project: &str, _block: &[RawIssueRecord]) -> Result<()> {
        Ok(())
    }
}

/// Which projects to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Project(String),
    AllProjects,
}

impl Scope {
    /// `Project` for a non-empty key, `AllProjects` otherwise.
    #[must_use]
    pub fn from_key(key: Option<&str>) -> Self {
        match key.map(str::trim) {
            Some(key) if !key.is_empty() => Self::Project(key.to_string()),
            _ => Self::AllProjects,
        }
    }

    /// Label used in file names; empty for all projects.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Project(key) => key,
            Self::AllProjects => "",
        }
    }
}

/// A project or board that failed and was skipped.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Skipped {
    pub source: String,
    pub reason: String,
}

/// Everything a fetch produced.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// All retrieved issues, in project then offset order.
    pub records: Vec<RawIssueRecord>,
    /// Number of search requests issued (including terminal empty ones).
    pub requests: usize,
    pub skipped: Vec<Skipped>,
}

/// JQL for one project and date range.
#[must_use]
pub fn build_jql(project: &str, range: &DateRange) -> String {
    let mut clauses = vec![format!("project='{project}'")];
    clauses.extend(range.jql_clauses());
    clauses.join(" and ")
}

/// Page through `fetch_block` until it returns a short or empty block.
///
/// Returns the concatenated items and the number of calls made.
///
/// # Errors
///
/// Returns the first error from `fetch_block` or `on_block`, or a validation
/// error for a zero block size.
pub fn paginate<T, F, O>(block_size: usize, mut fetch_block: F, mut on_block: O) -> Result<(Vec<T>, usize)>
where
    F: FnMut(usize, usize) -> Result<Vec<T>>,
    O: FnMut(&[T]) -> Result<()>,
{
    if block_size == 0 {
        return Err(ExtractError::validation("block-size", "must be at least 1"));
    }
    let mut all = Vec::new();
    let mut calls = 0;
    loop {
        let start_at = calls * block_size;
        calls += 1;
        let block = fetch_block(start_at, block_size)?;
        if block.is_empty() {
            break;
        }
        let exhausted = block.len() < block_size;
        on_block(&block)?;
        all.extend(block);
        if exhausted {
            break;
        }
    }
    Ok((all, calls))
}

/// Fetch every issue of one project. Any failure is returned to the caller.
///
/// # Errors
///
/// Returns the first request or observer error.
pub fn fetch_project<S, O>(
    source: &S,
    project: &str,
    range: &DateRange,
    block_size: usize,
    observer: &mut O,
    ctx: &RunContext,
) -> Result<(Vec<RawIssueRecord>, usize)>
where
    S: IssueSource + ?Sized,
    O: BlockObserver + ?Sized,
{
    let _guard = ctx.span().enter();
    let jql = build_jql(project, range);
    info!(project, jql = %jql, "Fetching project");

    let (records, requests) = paginate(
        block_size,
        |start_at, max| {
            info!(from = start_at + 1, to = start_at + max, "Searching for issues");
            let block = source.search(&jql, start_at, max)?;
            if block.is_empty() {
                info!("... no issues found");
            } else {
                info!(count = block.len(), "... issues retrieved");
            }
            Ok(block)
        },
        |block| observer.on_block(project, block),
    )?;

    info!(project, total = records.len(), "Issues retrieved in total");
    Ok((records, requests))
}

/// Fetch the requested scope.
///
/// In single-project mode any error aborts. In all-projects mode a failing
/// project is logged and skipped; only listing the projects is fatal.
///
/// # Errors
///
/// See above.
pub fn fetch<S, O>(
    source: &S,
    scope: &Scope,
    range: &DateRange,
    block_size: usize,
    observer: &mut O,
    ctx: &RunContext,
) -> Result<FetchOutcome>
where
    S: IssueSource + ?Sized,
    O: BlockObserver + ?Sized,
{
    match scope {
        Scope::Project(project) => {
            let (records, requests) =
                fetch_project(source, project, range, block_size, observer, ctx)?;
            Ok(FetchOutcome {
                records,
                requests,
                skipped: Vec::new(),
            })
        }
        Scope::AllProjects => {
            let projects = source.projects()?;
            let _guard = ctx.span().enter();
            info!(count = projects.len(), "Fetching all projects");

            let mut outcome = FetchOutcome::default();
            for project in projects {
                match fetch_project(source, &project, range, block_size, observer, ctx) {
                    Ok((records, requests)) => {
                        outcome.records.extend(records);
                        outcome.requests += requests;
                    }
                    Err(err) => {
                        error!(project = %project, error = %err, "Error getting project; skipping");
                        outcome.skipped.push(Skipped {
                            source: project,
                            reason: err.to_string(),
                        });
                    }
                }
            }
            Ok(outcome)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory tracker recording every search call.
    struct FakeTracker {
        issues: HashMap<String, usize>,
        failing: Vec<String>,
        calls: RefCell<Vec<(String, usize, usize)>>,
    }

    impl FakeTracker {
        fn new(projects: &[(&str, usize)]) -> Self {
            Self {
                issues: projects.iter().map(|(p, n)| ((*p).to_string(), *n)).collect(),
                failing: Vec::new(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn block_sizes(&self) -> Vec<usize> {
            self.calls.borrow().iter().map(|(_, _, n)| *n).collect()
        }
    }

    fn record(key: String) -> RawIssueRecord {
        serde_json::from_value(serde_json::json!({"key": key, "fields": {}})).unwrap()
    }

    impl IssueSource for FakeTracker {
        fn projects(&self) -> Result<Vec<String>> {
            let mut keys: Vec<String> = self.issues.keys().cloned().collect();
            keys.sort();
            Ok(keys)
        }

        fn search(&self, jql: &str, start_at: usize, max_results: usize) -> Result<Vec<RawIssueRecord>> {
            let project = jql
                .split('\'')
                .nth(1)
                .unwrap_or_default()
                .to_string();
            if self.failing.contains(&project) {
                return Err(ExtractError::Api {
                    status: 500,
                    url: "search".to_string(),
                    body: "boom".to_string(),
                });
            }
            let total = self.issues.get(&project).copied().unwrap_or(0);
            let end = total.min(start_at + max_results);
            let block: Vec<RawIssueRecord> = (start_at..end)
                .map(|i| record(format!("{project}-{}", i + 1)))
                .collect();
            self.calls
                .borrow_mut()
                .push((project, start_at, block.len()));
            Ok(block)
        }
    }

    #[test]
    fn three_issues_block_two_takes_two_calls() {
        let tracker = FakeTracker::new(&[("ABC", 3)]);
        let ctx = RunContext::quiet();
        let outcome = fetch(
            &tracker,
            &Scope::Project("ABC".into()),
            &DateRange::default(),
            2,
            &mut NoopObserver,
            &ctx,
        )
        .unwrap();
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(tracker.block_sizes(), [2, 1]);
        assert_eq!(outcome.requests, 2);
    }

    #[test]
    fn four_issues_block_two_takes_three_calls() {
        let tracker = FakeTracker::new(&[("ABC", 4)]);
        let ctx = RunContext::quiet();
        let outcome = fetch(
            &tracker,
            &Scope::Project("ABC".into()),
            &DateRange::default(),
            2,
            &mut NoopObserver,
            &ctx,
        )
        .unwrap();
        assert_eq!(tracker.block_sizes(), [2, 2, 0]);
        let keys: Vec<&str> = outcome.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["ABC-1", "ABC-2", "ABC-3", "ABC-4"]);
    }

    #[test]
    fn paginate_needs_empty_block_when_all_blocks_full() {
        let data = [1, 2, 3, 4];
        let mut sizes = Vec::new();
        let (items, calls) = paginate(
            2,
            |start, max| {
                let block: Vec<i32> = data.iter().skip(start).take(max).copied().collect();
                sizes.push(block.len());
                Ok(block)
            },
            |_| Ok(()),
        )
        .unwrap();
        assert_eq!(items, [1, 2, 3, 4]);
        assert_eq!(sizes, [2, 2, 0]);
        assert_eq!(calls, 3);
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let result = paginate::<i32, _, _>(0, |_, _| Ok(vec![]), |_| Ok(()));
        assert!(matches!(result, Err(ExtractError::Validation { .. })));
    }

    #[test]
    fn observer_sees_each_block_before_next_request() {
        let tracker = FakeTracker::new(&[("ABC", 3)]);
        let ctx = RunContext::quiet();
        let mut seen = Vec::new();
        let mut observer = |project: &str, block: &[RawIssueRecord]| -> Result<()> {
            seen.push((project.to_string(), block.len(), tracker.calls.borrow().len()));
            Ok(())
        };
        fetch(
            &tracker,
            &Scope::Project("ABC".into()),
            &DateRange::default(),
            2,
            &mut observer,
            &ctx,
        )
        .unwrap();
        assert_eq!(
            seen,
            [("ABC".to_string(), 2, 1), ("ABC".to_string(), 1, 2)]
        );
    }

    #[test]
    fn single_project_failure_is_fatal() {
        let mut tracker = FakeTracker::new(&[("ABC", 3)]);
        tracker.failing.push("ABC".into());
        let ctx = RunContext::quiet();
        let result = fetch(
            &tracker,
            &Scope::Project("ABC".into()),
            &DateRange::default(),
            2,
            &mut NoopObserver,
            &ctx,
        );
        assert!(matches!(result, Err(ExtractError::Api { status: 500, .. })));
    }

    #[test]
    fn all_projects_skips_failing_project() {
        let mut tracker = FakeTracker::new(&[("AAA", 1), ("BBB", 2), ("CCC", 1)]);
        tracker.failing.push("BBB".into());
        let ctx = RunContext::quiet();
        let outcome = fetch(
            &tracker,
            &Scope::AllProjects,
            &DateRange::default(),
            10,
            &mut NoopObserver,
            &ctx,
        )
        .unwrap();
        let keys: Vec<&str> = outcome.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["AAA-1", "CCC-1"]);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].source, "BBB");
    }

    #[test]
    fn jql_includes_date_bounds() {
        let range = DateRange::parse(Some("2016-01-01"), Some("2016-02-01")).unwrap();
        assert_eq!(
            build_jql("JRA", &range),
            "project='JRA' and created >= 2016-01-01 and created < 2016-02-02"
        );
        assert_eq!(build_jql("JRA", &DateRange::default()), "project='JRA'");
    }

    #[test]
    fn scope_from_key() {
        assert_eq!(Scope::from_key(Some("ABC")), Scope::Project("ABC".into()));
        assert_eq!(Scope::from_key(Some("")), Scope::AllProjects);
        assert_eq!(Scope::from_key(None).label(), "");
    }
}
