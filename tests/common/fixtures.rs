#![allow(dead_code)]

use jira_extract::ExtractError;
use jira_extract::fetch::IssueSource;
use jira_extract::model::RawIssueRecord;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

/// Build a raw issue from JSON parts.
pub fn issue(key: &str, fields: Value, histories: Value) -> RawIssueRecord {
    serde_json::from_value(json!({
        "id": key.rsplit('-').next().unwrap_or("0"),
        "key": key,
        "fields": fields,
        "changelog": {"startAt": 0, "histories": histories}
    }))
    .expect("valid issue")
}

/// The two-issue scenario: ABC-1 reported by bob with one status change,
/// ABC-2 assigned to bob without history.
pub fn abc_issues() -> Vec<RawIssueRecord> {
    vec![
        issue(
            "ABC-1",
            json!({"summary": "x", "reporter": {"key": "bob"}}),
            json!([{
                "author": {"key": "bob", "displayName": "Bob"},
                "created": "2020-01-02T10:00:00.000+0000",
                "items": [{
                    "field": "status",
                    "fieldtype": "jira",
                    "from": "1",
                    "fromString": "Open",
                    "to": "6",
                    "toString": "Closed"
                }]
            }]),
        ),
        issue(
            "ABC-2",
            json!({"summary": "y", "assignee": {"key": "bob"}}),
            json!([]),
        ),
    ]
}

/// In-memory tracker serving fixed issues per project.
#[derive(Default)]
pub struct FakeTracker {
    projects: Vec<(String, Vec<RawIssueRecord>)>,
    failing: Vec<String>,
    calls: RefCell<Vec<(String, usize, usize)>>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, key: &str, issues: Vec<RawIssueRecord>) -> Self {
        self.projects.push((key.to_string(), issues));
        self
    }

    /// A project whose search always fails with a server error.
    pub fn with_failing_project(mut self, key: &str) -> Self {
        self.projects.push((key.to_string(), Vec::new()));
        self.failing.push(key.to_string());
        self
    }

    /// `(jql, startAt, returned)` for every search call.
    pub fn calls(&self) -> Vec<(String, usize, usize)> {
        self.calls.borrow().clone()
    }

    fn project_in(jql: &str) -> Option<&str> {
        let rest = jql.strip_prefix("project='")?;
        rest.split('\'').next()
    }
}

impl IssueSource for FakeTracker {
    fn projects(&self) -> jira_extract::Result<Vec<String>> {
        Ok(self.projects.iter().map(|(key, _)| key.clone()).collect())
    }

    fn search(
        &self,
        jql: &str,
        start_at: usize,
        max_results: usize,
    ) -> jira_extract::Result<Vec<RawIssueRecord>> {
        let project = Self::project_in(jql).unwrap_or_default();
        if self.failing.iter().any(|p| p == project) {
            return Err(ExtractError::Api {
                status: 500,
                url: "rest/api/2/search".to_string(),
                body: "boom".to_string(),
            });
        }
        let issues = self
            .projects
            .iter()
            .find(|(key, _)| key == project)
            .map(|(_, issues)| issues.as_slice())
            .unwrap_or_default();
        let block: Vec<RawIssueRecord> = issues
            .iter()
            .skip(start_at)
            .take(max_results)
            .cloned()
            .collect();
        self.calls
            .borrow_mut()
            .push((jql.to_string(), start_at, block.len()));
        Ok(block)
    }
}

/// Write a raw dump with the given rows; `fields` and `changelog` are JSON.
pub fn write_raw_dump(dir: &Path, name: &str, rows: &[(&str, Value, Value)]) -> PathBuf {
    let quote = |v: &Value| format!("\"{}\"", v.to_string().replace('"', "\"\""));
    let mut contents = String::from("id,key,fields,changelog\n");
    for (idx, (key, fields, changelog)) in rows.iter().enumerate() {
        contents.push_str(&format!(
            "{},{},{},{}\n",
            idx + 1,
            key,
            quote(fields),
            quote(changelog)
        ));
    }
    let path = dir.join(name);
    fs::write(&path, contents).expect("write dump");
    path
}
