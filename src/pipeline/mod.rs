//! Extraction pipeline.
//!
//! Fetch blocks, keep a raw dump of each block, flatten fields and expand
//! changelogs into the two tables, optionally pseudonymize, then write.
//!
//! By default every row is buffered and the tables are written once with the
//! full column union. Streaming mode writes each block as it arrives instead,
//! fixing each table's header at the first block.

use crate::anonymize::{IdentityColumns, PseudonymMap, anonymize_in_place};
use crate::changelog::{append_changelog, changelog_table};
use crate::config::ExtractSettings;
use crate::error::Result;
use crate::fetch::{BlockObserver, IssueSource, Scope, Skipped, fetch};
use crate::flatten::{ArrayPolicy, FieldFlattener};
use crate::logging::RunContext;
use crate::model::RawIssueRecord;
use crate::schema::{Table, TableBuilder};
use crate::sink::{CsvSink, write_table};
use crate::util::progress::create_progress_bar;
use crate::util::time::{DateRange, format_elapsed};
use crate::util::{prefixed_output, server_domain};
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Columns of the raw dump. `fields` and `changelog` hold JSON text.
pub const RAW_COLUMNS: [&str; 4] = ["id", "key", "fields", "changelog"];

/// Fixed columns following the flattened fields in the issues table.
pub const ISSUE_TRAILING_COLUMNS: [&str; 2] = ["key", "project"];

/// What to extract and how.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub scope: Scope,
    pub range: DateRange,
    pub anonymize: bool,
    pub streaming: bool,
    pub arrays: ArrayPolicy,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            scope: Scope::AllProjects,
            range: DateRange::default(),
            anonymize: false,
            streaming: false,
            arrays: ArrayPolicy::Keep,
        }
    }
}

/// Outcome of one command, printed with `--json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub issues: usize,
    pub changes: usize,
    pub issue_columns: usize,
    #[serde(skip_serializing_if = "is_zero")]
    pub requests: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pseudonyms: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<Skipped>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped_columns: Vec<String>,
    pub files: Vec<PathBuf>,
    pub elapsed_secs: f64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl RunSummary {
    /// One-line human summary.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut line = format!(
            "{} issues ({} columns), {} changes",
            self.issues, self.issue_columns, self.changes
        );
        if let Some(n) = self.pseudonyms {
            line.push_str(&format!(", {n} identities anonymized"));
        }
        if !self.skipped.is_empty() {
            line.push_str(&format!(", {} skipped", self.skipped.len()));
        }
        line
    }
}

/// Raw dump path for a project: `{dir}/{project}-raw.csv`.
#[must_use]
pub fn raw_dump_path(dir: &Path, project: &str) -> PathBuf {
    dir.join(format!("{project}-raw.csv"))
}

/// One raw-dump row per record.
///
/// # Errors
///
/// Returns an error if a record cannot be encoded as JSON.
pub fn raw_table(block: &[RawIssueRecord]) -> Result<Table> {
    let mut table = Table::with_columns(&RAW_COLUMNS);
    for record in block {
        table.push_row(vec![
            record.id.clone(),
            Some(record.key.clone()),
            Some(serde_json::to_string(&record.fields)?),
            Some(serde_json::to_string(&record.changelog)?),
        ]);
    }
    Ok(table)
}

/// Builder for the issues table.
#[must_use]
pub fn issue_builder(arrays: ArrayPolicy) -> TableBuilder {
    TableBuilder::new(
        FieldFlattener::with_array_policy(arrays),
        &ISSUE_TRAILING_COLUMNS,
    )
}

/// Flatten one record into the issues builder and its changes into `changelog`.
pub fn push_record(issues: &mut TableBuilder, changelog: &mut Table, record: &RawIssueRecord) {
    issues.push(
        &record.fields,
        vec![Some(record.key.clone()), Some(record.project().to_string())],
    );
    append_changelog(changelog, &record.key, &record.changelog.histories);
}

/// Build the issues and changelog tables from fetched records.
#[must_use]
pub fn build_tables(records: &[RawIssueRecord], arrays: ArrayPolicy, ctx: &RunContext) -> (Table, Table) {
    let started = Instant::now();
    let progress = create_progress_bar(records.len() as u64, "Parsing issues", ctx.show_progress());

    let mut issues = issue_builder(arrays);
    let mut changelog = changelog_table();
    for record in records {
        push_record(&mut issues, &mut changelog, record);
        progress.inc(1);
    }
    progress.finish_and_clear();

    let issues = issues.finish();
    info!(
        issues = issues.len(),
        columns = issues.columns().len(),
        changes = changelog.len(),
        elapsed = %format_elapsed(started.elapsed()),
        "Parsed issues"
    );
    (issues, changelog)
}

/// Appends every fetched block to its project's raw dump.
#[derive(Debug)]
pub struct RawDumpWriter {
    dir: PathBuf,
    sinks: HashMap<String, CsvSink>,
}

impl RawDumpWriter {
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            sinks: HashMap::new(),
        }
    }

    /// Dump files written so far.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.sinks.values().map(|s| s.path().to_path_buf()).collect();
        paths.sort();
        paths
    }
}

impl BlockObserver for RawDumpWriter {
    fn on_block(&mut self, project: &str, block: &[RawIssueRecord]) -> Result<()> {
        let sink = match self.sinks.entry(project.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let path = raw_dump_path(&self.dir, project);
                debug!(path = %path.display(), "Starting raw dump");
                entry.insert(CsvSink::create(path)?)
            }
        };
        sink.write(raw_table(block)?)?;
        Ok(())
    }
}

/// Writes both tables block by block while fetching.
struct StreamingWriter {
    raw: RawDumpWriter,
    issues: CsvSink,
    changelog: CsvSink,
    builder: TableBuilder,
    pseudonyms: Option<(PseudonymMap, IdentityColumns)>,
    issue_count: usize,
    change_count: usize,
}

impl BlockObserver for StreamingWriter {
    fn on_block(&mut self, project: &str, block: &[RawIssueRecord]) -> Result<()> {
        self.raw.on_block(project, block)?;

        let mut changelog = changelog_table();
        for record in block {
            push_record(&mut self.builder, &mut changelog, record);
        }
        let mut issues = self.builder.take();

        // The map grows with each block so earlier pseudonyms never change.
        if let Some((map, columns)) = &mut self.pseudonyms {
            map.observe_table(&issues, &columns.issues);
            map.observe_table(&changelog, &columns.changelog);
            map.apply(&mut issues, &columns.issues);
            map.apply(&mut changelog, &columns.changelog);
        }

        self.issue_count += issues.len();
        self.change_count += changelog.len();
        self.issues.write(issues)?;
        self.changelog.write(changelog)?;
        Ok(())
    }
}

/// Run a full extraction against `source`.
///
/// # Errors
///
/// Returns fetch errors (all of them in single-project mode, only the project
/// listing in all-projects mode) and any write error.
pub fn run_extract<S>(
    source: &S,
    settings: &ExtractSettings,
    options: &ExtractOptions,
    ctx: &RunContext,
) -> Result<RunSummary>
where
    S: IssueSource + ?Sized,
{
    let started = Instant::now();
    fs::create_dir_all(&settings.out_dir)?;

    let domain = server_domain(settings.server.as_deref().unwrap_or_default());
    let label = options.scope.label();
    let issue_path = prefixed_output(&settings.out_dir, &domain, label, &settings.issue_file);
    let changelog_path = prefixed_output(&settings.out_dir, &domain, label, &settings.changelog_file);
    if options.range.is_unbounded() {
        info!(scope = %display_scope(&options.scope), "Starting extraction");
    } else {
        info!(scope = %display_scope(&options.scope), range = %options.range, "Starting extraction for creation dates");
    }

    let mut summary = if options.streaming {
        let mut writer = StreamingWriter {
            raw: RawDumpWriter::new(&settings.out_dir),
            issues: CsvSink::create(&issue_path)?,
            changelog: CsvSink::create(&changelog_path)?,
            builder: issue_builder(options.arrays),
            pseudonyms: options
                .anonymize
                .then(|| (PseudonymMap::new(), settings.identity.clone())),
            issue_count: 0,
            change_count: 0,
        };
        let outcome = fetch(source, &options.scope, &options.range, settings.block_size, &mut writer, ctx)?;

        let mut files = writer.raw.paths();
        files.push(issue_path);
        files.push(changelog_path);
        RunSummary {
            issues: writer.issue_count,
            changes: writer.change_count,
            issue_columns: writer.issues.header().map_or(0, <[String]>::len),
            requests: outcome.requests,
            pseudonyms: writer.pseudonyms.map(|(map, _)| map.len()),
            skipped: outcome.skipped,
            dropped_columns: writer.issues.dropped_columns().iter().cloned().collect(),
            files,
            ..RunSummary::default()
        }
    } else {
        let mut raw = RawDumpWriter::new(&settings.out_dir);
        let outcome = fetch(source, &options.scope, &options.range, settings.block_size, &mut raw, ctx)?;
        let (mut issues, mut changelog) = build_tables(&outcome.records, options.arrays, ctx);

        let pseudonyms = if options.anonymize {
            info!("Anonymizing...");
            let map = anonymize_in_place(&mut issues, &mut changelog, &settings.identity);
            Some(map.len())
        } else {
            None
        };

        info!(path = %issue_path.display(), "Saving issues to file");
        write_table(&issue_path, &issues)?;
        info!(path = %changelog_path.display(), "Saving changelog to file");
        write_table(&changelog_path, &changelog)?;

        let mut files = raw.paths();
        files.push(issue_path);
        files.push(changelog_path);
        RunSummary {
            issues: issues.len(),
            changes: changelog.len(),
            issue_columns: issues.columns().len(),
            requests: outcome.requests,
            pseudonyms,
            skipped: outcome.skipped,
            files,
            ..RunSummary::default()
        }
    };

    summary.elapsed_secs = started.elapsed().as_secs_f64();
    info!(elapsed = %format_elapsed(started.elapsed()), "Total elapsed time");
    Ok(summary)
}

fn display_scope(scope: &Scope) -> &str {
    match scope {
        Scope::Project(key) => key,
        Scope::AllProjects => "all projects",
    }
}
