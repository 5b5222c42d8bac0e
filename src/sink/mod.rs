//! Incremental CSV sink.
//!
//! A [`CsvSink`] owns one output file. Tables pushed to it are buffered and
//! written on [`CsvSink::flush`]. The header is written exactly once, at the
//! first flush of a new or empty file, and fixes the column order for every
//! later flush. Appending to a non-empty file reuses that file's header.
//!
//! Flushing once at the end of a run gives a header that is the union of all
//! pushed tables. Flushing after every push (streaming) fixes the header at
//! the first block; columns first seen later are dropped and logged.

pub mod csv;

use crate::error::Result;
use crate::schema::{Table, column_mapping, reconcile_tables, remap_row};
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Append-only CSV writer for one table.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    header: Option<Vec<String>>,
    pending: Vec<Table>,
    dropped: BTreeSet<String>,
    rows_written: usize,
}

impl CsvSink {
    /// Open a sink that appends to `path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file's header cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let header = if path.is_file() {
            Some(csv::read_header(&path)?).filter(|columns| !columns.is_empty())
        } else {
            None
        };
        if let Some(columns) = &header {
            debug!(path = %path.display(), columns = columns.len(), "Appending to existing CSV");
        }
        Ok(Self {
            path,
            header,
            pending: Vec::new(),
            dropped: BTreeSet::new(),
            rows_written: 0,
        })
    }

    /// Open a sink on a fresh file, truncating any previous content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        File::create(&path)?;
        Self::open(path)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header fixed by the first flush, if any.
    #[must_use]
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Columns dropped because they appeared after the header was fixed.
    #[must_use]
    pub fn dropped_columns(&self) -> &BTreeSet<String> {
        &self.dropped
    }

    #[must_use]
    pub const fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Buffer a table for the next flush.
    pub fn push(&mut self, table: Table) {
        self.pending.push(table);
    }

    /// Write all buffered rows. Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written.
    pub fn flush(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let batch = reconcile_tables(std::mem::take(&mut self.pending));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::writer(file);

        let header = match &self.header {
            Some(header) => header.clone(),
            None => {
                let header = batch.columns().to_vec();
                csv::write_header(&mut writer, &header)?;
                self.header = Some(header.clone());
                header
            }
        };

        for column in batch.columns() {
            if !header.contains(column) && self.dropped.insert(column.clone()) {
                warn!(
                    path = %self.path.display(),
                    column = %column,
                    "Column appeared after the header was written; dropping it"
                );
            }
        }

        let mapping = column_mapping(batch.columns(), &header);
        let count = batch.len();
        for row in batch.rows().iter().cloned() {
            let row = remap_row(row, &mapping, header.len());
            csv::write_row(&mut writer, &row)?;
        }
        writer.flush()?;

        self.rows_written += count;
        debug!(path = %self.path.display(), rows = count, "Flushed rows");
        Ok(count)
    }

    /// Push and flush in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&mut self, table: Table) -> Result<usize> {
        self.push(table);
        self.flush()
    }
}

/// Write a table to a fresh file with its full header.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    csv::write_table(File::create(path)?, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        let mut table = Table::with_columns(columns);
        for row in rows {
            table.push_row(
                row.iter()
                    .map(|c| (!c.is_empty()).then(|| (*c).to_string()))
                    .collect(),
            );
        }
        table
    }

    #[test]
    fn header_written_once_across_flushes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.csv");
        let mut sink = CsvSink::create(&path).unwrap();

        sink.write(table(&["a", "key"], &[&["1", "K-1"]])).unwrap();
        sink.write(table(&["a", "key"], &[&["2", "K-2"]])).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "a,key\n1,K-1\n2,K-2\n");
        assert_eq!(sink.rows_written(), 2);
    }

    #[test]
    fn buffered_flush_uses_union_header() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.csv");
        let mut sink = CsvSink::create(&path).unwrap();

        sink.push(table(&["a", "key"], &[&["1", "K-1"]]));
        sink.push(table(&["b", "key"], &[&["2", "K-2"]]));
        sink.flush().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "a,key,b\n1,K-1,\n,K-2,2\n");
        assert!(sink.dropped_columns().is_empty());
    }

    #[test]
    fn streaming_flush_drops_late_columns() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.csv");
        let mut sink = CsvSink::create(&path).unwrap();

        sink.write(table(&["a", "key"], &[&["1", "K-1"]])).unwrap();
        sink.write(table(&["a", "b", "key"], &[&["", "2", "K-2"]])).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "a,key\n1,K-1\n,K-2\n");
        assert!(sink.dropped_columns().contains("b"));
    }

    #[test]
    fn reopening_appends_under_existing_header() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.csv");
        CsvSink::create(&path)
            .unwrap()
            .write(table(&["key", "a"], &[&["K-1", "1"]]))
            .unwrap();

        let mut sink = CsvSink::open(&path).unwrap();
        assert_eq!(sink.header().unwrap(), ["key", "a"]);
        sink.write(table(&["a", "key"], &[&["2", "K-2"]])).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "key,a\nK-1,1\nK-2,2\n");
    }

    #[test]
    fn flush_without_rows_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.csv");
        let mut sink = CsvSink::create(&path).unwrap();
        assert_eq!(sink.flush().unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert!(sink.header().is_none());
    }
}
