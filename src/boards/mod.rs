//! Agile board export: every board's issues in one flattened table.

use crate::error::Result;
use crate::fetch::jira::{Board, JiraClient};
use crate::fetch::{Skipped, paginate};
use crate::flatten::{ArrayPolicy, FieldFlattener};
use crate::logging::RunContext;
use crate::model::RawIssueRecord;
use crate::pipeline::RunSummary;
use crate::schema::TableBuilder;
use crate::sink::write_table;
use crate::util::progress::create_spinner;
use crate::util::time::format_elapsed;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

/// Fixed columns following the flattened fields in the boards table.
pub const BOARD_TRAILING_COLUMNS: [&str; 3] = ["key", "board.name", "board.id"];

/// Read access to agile boards.
pub trait BoardSource {
    /// # Errors
    ///
    /// Returns an error if the board list cannot be retrieved.
    fn boards(&self) -> Result<Vec<Board>>;

    /// # Errors
    ///
    /// Returns an error if the page cannot be retrieved.
    fn board_issues(&self, board_id: &str, start_at: usize, max_results: usize)
    -> Result<Vec<RawIssueRecord>>;
}

impl BoardSource for JiraClient {
    fn boards(&self) -> Result<Vec<Board>> {
        Self::boards(self)
    }

    fn board_issues(
        &self,
        board_id: &str,
        start_at: usize,
        max_results: usize,
    ) -> Result<Vec<RawIssueRecord>> {
        Self::board_issues(self, board_id, start_at, max_results)
    }
}

/// Fetch all boards' issues and write them to `output`.
///
/// A board whose issues cannot be read is logged and skipped.
///
/// # Errors
///
/// Returns an error if the board list cannot be retrieved or the output
/// cannot be written.
pub fn export_boards<S>(
    source: &S,
    block_size: usize,
    arrays: ArrayPolicy,
    output: &Path,
    ctx: &RunContext,
) -> Result<RunSummary>
where
    S: BoardSource + ?Sized,
{
    let started = Instant::now();
    let _guard = ctx.span().enter();

    let boards = source.boards()?;
    info!(count = boards.len(), "Boards retrieved");

    let mut builder = TableBuilder::new(
        FieldFlattener::with_array_policy(arrays),
        &BOARD_TRAILING_COLUMNS,
    );
    let mut summary = RunSummary::default();
    let spinner = create_spinner("Boards", ctx.show_progress());
    for board in &boards {
        spinner.set_message(board.name.clone());
        let fetched = paginate(
            block_size,
            |start_at, max| source.board_issues(&board.id, start_at, max),
            |block| {
                spinner.inc(block.len() as u64);
                Ok(())
            },
        );
        match fetched {
            Ok((issues, requests)) => {
                info!(board = %board.name, id = %board.id, issues = issues.len(), "Board issues retrieved");
                summary.requests += requests;
                for issue in &issues {
                    builder.push(
                        &issue.fields,
                        vec![
                            Some(issue.key.clone()),
                            Some(board.name.clone()),
                            Some(board.id.clone()),
                        ],
                    );
                }
            }
            Err(err) => {
                error!(board = %board.name, id = %board.id, error = %err, "Error getting board; skipping");
                summary.skipped.push(Skipped {
                    source: format!("board {}", board.id),
                    reason: err.to_string(),
                });
            }
        }
    }

    spinner.finish_and_clear();

    let table = builder.finish();
    write_table(output, &table)?;
    info!(
        path = %output.display(),
        rows = table.len(),
        elapsed = %format_elapsed(started.elapsed()),
        "Saved board issues"
    );

    summary.issues = table.len();
    summary.issue_columns = table.columns().len();
    summary.files = vec![output.to_path_buf()];
    summary.elapsed_secs = started.elapsed().as_secs_f64();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::sink::csv::read_table;
    use serde_json::json;
    use tempfile::TempDir;

    struct FakeBoards;

    impl BoardSource for FakeBoards {
        fn boards(&self) -> Result<Vec<Board>> {
            Ok(vec![
                Board { id: "1".into(), name: "Team A".into() },
                Board { id: "2".into(), name: "Broken".into() },
                Board { id: "3".into(), name: "Team C".into() },
            ])
        }

        fn board_issues(&self, board_id: &str, start_at: usize, _max: usize) -> Result<Vec<RawIssueRecord>> {
            let issue = |key: &str, fields: serde_json::Value| -> RawIssueRecord {
                serde_json::from_value(json!({"key": key, "fields": fields})).unwrap()
            };
            match (board_id, start_at) {
                ("1", 0) => Ok(vec![issue("A-1", json!({"summary": "a"}))]),
                ("2", _) => Err(ExtractError::Api {
                    status: 400,
                    url: "board/2".into(),
                    body: "not a scrum board".into(),
                }),
                ("3", 0) => Ok(vec![issue("C-1", json!({"sprint": {"name": "S1"}}))]),
                _ => Ok(Vec::new()),
            }
        }
    }

    #[test]
    fn exports_boards_and_skips_failures() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("boards.csv");
        let summary =
            export_boards(&FakeBoards, 50, ArrayPolicy::Keep, &output, &RunContext::quiet()).unwrap();

        assert_eq!(summary.issues, 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].source, "board 2");

        let table = read_table(&output).unwrap();
        assert_eq!(
            table.columns(),
            ["summary", "sprint.name", "key", "board.name", "board.id"]
        );
        assert_eq!(table.get(0, "board.name"), Some("Team A"));
        assert_eq!(table.get(1, "sprint.name"), Some("S1"));
        assert_eq!(table.get(1, "summary"), None);
    }
}
