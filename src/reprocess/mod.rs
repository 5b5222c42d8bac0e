//! Re-derive the issues and changelog tables from a raw dump.
//!
//! The dump is split into `N` contiguous chunks, sized like
//! `numpy.array_split`, and each chunk is flattened on its own into
//! `{dump}issues{i}.csv` and `{dump}changelog{i}.csv`. Column unions are
//! chunk-local, so the final `{dump}-issues.csv` and `{dump}-changelog.csv`
//! are written after a second reconciliation over every chunk header.
//!
//! Only one chunk is held in memory at a time.

use crate::anonymize::{IdentityCollector, IdentityColumns, PseudonymMap};
use crate::changelog::changelog_table;
use crate::error::{ExtractError, Result};
use crate::flatten::ArrayPolicy;
use crate::logging::RunContext;
use crate::model::{Changelog, RawIssueRecord};
use crate::pipeline::{ISSUE_TRAILING_COLUMNS, RunSummary, issue_builder, push_record};
use crate::schema::{ColumnUnion, Table, TableBuilder};
use crate::sink::csv::{open_reader, read_header, read_table};
use crate::sink::{CsvSink, write_table};
use crate::util::progress::create_progress_bar;
use crate::util::time::format_elapsed;
use crate::util::with_suffix;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// `changelog` cell value of duplicated header rows in appended dumps.
pub const SENTINEL: &str = "changelog";

/// Options for [`reprocess`].
#[derive(Debug, Clone)]
pub struct ReprocessOptions {
    pub split: usize,
    pub anonymize: bool,
    pub keep_chunks: bool,
    pub arrays: ArrayPolicy,
    pub identity: IdentityColumns,
}

impl Default for ReprocessOptions {
    fn default() -> Self {
        Self {
            split: 1,
            anonymize: false,
            keep_chunks: false,
            arrays: ArrayPolicy::Keep,
            identity: IdentityColumns::default(),
        }
    }
}

/// Sizes of `n` contiguous chunks over `len` rows.
///
/// The first `len % n` chunks get one extra row; trailing chunks may be
/// empty when `n > len`.
#[must_use]
pub fn chunk_sizes(len: usize, n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let (base, extra) = (len / n, len % n);
    (0..n).map(|i| base + usize::from(i < extra)).collect()
}

/// Per-chunk output files.
#[must_use]
pub fn chunk_paths(dump: &Path, index: usize) -> (PathBuf, PathBuf) {
    (
        with_suffix(dump, &format!("issues{index}.csv")),
        with_suffix(dump, &format!("changelog{index}.csv")),
    )
}

/// Final output files.
#[must_use]
pub fn final_paths(dump: &Path) -> (PathBuf, PathBuf) {
    (
        with_suffix(dump, "-issues.csv"),
        with_suffix(dump, "-changelog.csv"),
    )
}

/// Positions of the columns the reprocessor needs.
#[derive(Debug, Clone, Copy)]
struct DumpLayout {
    id: Option<usize>,
    key: usize,
    fields: usize,
    changelog: usize,
}

impl DumpLayout {
    fn locate(path: &Path, header: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| header.iter().position(|h| h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| ExtractError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
        };
        Ok(Self {
            id: find("id"),
            key: require("key")?,
            fields: require("fields")?,
            changelog: require("changelog")?,
        })
    }

    fn is_sentinel(&self, record: &csv::StringRecord) -> bool {
        record.get(self.changelog) == Some(SENTINEL)
    }

    /// Decode one dump row. `number` is the 1-based data row number.
    fn decode(&self, record: &csv::StringRecord, number: u64) -> Result<RawIssueRecord> {
        let cell = |idx: usize| record.get(idx).unwrap_or_default();

        let key = cell(self.key).trim();
        if key.is_empty() {
            return Err(ExtractError::raw_record(number, "empty key"));
        }
        let fields: Map<String, Value> = match cell(self.fields).trim() {
            "" => Map::new(),
            text => serde_json::from_str(text).map_err(|err| {
                ExtractError::raw_record(number, format!("invalid fields: {err}"))
            })?,
        };
        let changelog: Changelog = match cell(self.changelog).trim() {
            "" => Changelog::default(),
            text => serde_json::from_str(text).map_err(|err| {
                ExtractError::raw_record(number, format!("invalid changelog: {err}"))
            })?,
        };

        Ok(RawIssueRecord {
            id: self
                .id
                .and_then(|idx| record.get(idx))
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            key: key.to_string(),
            fields,
            changelog,
        })
    }
}

/// Chunk currently being filled.
struct ChunkWriter {
    index: usize,
    issues: TableBuilder,
    changelog: Table,
}

impl ChunkWriter {
    fn new(index: usize, arrays: ArrayPolicy) -> Self {
        Self {
            index,
            issues: issue_builder(arrays),
            changelog: changelog_table(),
        }
    }

    fn finish(self, dump: &Path) -> Result<(Table, Table)> {
        let (issue_path, changelog_path) = chunk_paths(dump, self.index);
        let issues = self.issues.finish();
        info!(
            chunk = self.index,
            issues = issues.len(),
            columns = issues.columns().len(),
            changes = self.changelog.len(),
            "Saving chunk to file"
        );
        write_table(&issue_path, &issues)?;
        write_table(&changelog_path, &self.changelog)?;
        Ok((issues, self.changelog))
    }
}

/// Reprocess `dump` into the final issues and changelog tables.
///
/// # Errors
///
/// Returns an error if `split` is zero, the dump lacks a required column, a
/// row's JSON cannot be decoded, or any file cannot be read or written.
pub fn reprocess(dump: &Path, options: &ReprocessOptions, ctx: &RunContext) -> Result<RunSummary> {
    let started = Instant::now();
    let _guard = ctx.span().enter();
    if options.split == 0 {
        return Err(ExtractError::validation("split", "must be at least 1"));
    }

    // Pass 1: count usable rows.
    let mut reader = open_reader(dump)?;
    let layout = DumpLayout::locate(dump, reader.headers()?)?;
    let mut total = 0;
    let mut sentinels = 0;
    for record in reader.records() {
        if layout.is_sentinel(&record?) {
            sentinels += 1;
        } else {
            total += 1;
        }
    }
    if sentinels > 0 {
        debug!(count = sentinels, "Removed duplicated header rows");
    }

    let sizes = chunk_sizes(total, options.split);
    info!(path = %dump.display(), rows = total, chunks = sizes.len(), "Processing raw dump");

    // Pass 2: flatten chunk by chunk.
    let mut issue_ids = IdentityCollector::new(&options.identity.issues);
    let mut change_ids = IdentityCollector::new(&options.identity.changelog);
    let progress = create_progress_bar(sizes.len() as u64, "Processing chunks", ctx.show_progress());

    let mut reader = open_reader(dump)?;
    let mut records = reader.records();
    let mut number = 0u64;
    for (index, &size) in sizes.iter().enumerate() {
        debug!(chunk = index, rows = size, "Processing chunk");
        let mut chunk = ChunkWriter::new(index, options.arrays);
        let mut taken = 0;
        while taken < size {
            let Some(record) = records.next() else {
                break;
            };
            let record = record?;
            number += 1;
            if layout.is_sentinel(&record) {
                continue;
            }
            let raw = layout.decode(&record, number)?;
            push_record(&mut chunk.issues, &mut chunk.changelog, &raw);
            taken += 1;
        }

        let (issues, changelog) = chunk.finish(dump)?;
        if options.anonymize {
            issue_ids.collect(&issues);
            change_ids.collect(&changelog);
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    let pseudonyms = options
        .anonymize
        .then(|| PseudonymMap::from_collected(&issue_ids, &change_ids));

    // Second reconciliation: the chunk unions may differ.
    let (issue_path, changelog_path) = final_paths(dump);
    let issue_chunks: Vec<PathBuf> = (0..sizes.len()).map(|i| chunk_paths(dump, i).0).collect();
    let change_chunks: Vec<PathBuf> = (0..sizes.len()).map(|i| chunk_paths(dump, i).1).collect();

    let identity = &options.identity;
    let (issue_rows, issue_columns) = merge_chunks(
        &issue_chunks,
        &issue_path,
        &ISSUE_TRAILING_COLUMNS,
        pseudonyms.as_ref().map(|map| (map, identity.issues.as_slice())),
    )?;
    let (change_rows, _) = merge_chunks(
        &change_chunks,
        &changelog_path,
        &[],
        pseudonyms.as_ref().map(|map| (map, identity.changelog.as_slice())),
    )?;

    if !options.keep_chunks {
        for path in issue_chunks.iter().chain(&change_chunks) {
            fs::remove_file(path)?;
        }
    }

    info!(elapsed = %format_elapsed(started.elapsed()), "Total elapsed time");
    Ok(RunSummary {
        issues: issue_rows,
        changes: change_rows,
        issue_columns,
        chunks: Some(sizes.len()),
        pseudonyms: pseudonyms.as_ref().map(PseudonymMap::len),
        files: vec![issue_path, changelog_path],
        elapsed_secs: started.elapsed().as_secs_f64(),
        ..RunSummary::default()
    })
}

/// Concatenate chunk files into `target` under the union of their headers.
///
/// `trailing` columns are kept after every field column, whichever chunk
/// introduced the field. Returns the number of rows and columns written.
fn merge_chunks(
    chunks: &[PathBuf],
    target: &Path,
    trailing: &[&str],
    pseudonyms: Option<(&PseudonymMap, &[String])>,
) -> Result<(usize, usize)> {
    let mut union = ColumnUnion::new();
    for path in chunks {
        let header = read_header(path)?;
        union.extend(
            header
                .iter()
                .map(String::as_str)
                .filter(|column| !trailing.contains(column)),
        );
    }
    let mut columns = union.into_vec();
    columns.extend(trailing.iter().map(|column| (*column).to_string()));
    debug!(path = %target.display(), columns = columns.len(), "Joining chunk files");

    let mut sink = CsvSink::create(target)?;
    for path in chunks {
        let mut table = read_table(path)?;
        if let Some((map, identity)) = pseudonyms {
            let unmapped = map.apply(&mut table, identity);
            if unmapped > 0 {
                warn!(path = %path.display(), unmapped, "Identities without pseudonym left as-is");
            }
        }
        sink.write(table.conform_to(&columns))?;
    }
    Ok((sink.rows_written(), columns.len()))
}
