//! CSV encoding helpers over the `csv` crate.
//!
//! Headers are written explicitly so the sink decides when a file gets one.
//! Null cells are written as empty fields and read back as null; dumps carry
//! multi-line quoted JSON, which both directions round-trip.

use crate::error::Result;
use crate::schema::Table;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

/// Writer that never emits a header on its own.
#[must_use]
pub fn writer<W: Write>(inner: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(inner)
}

/// Write the header row.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_header<W: Write>(writer: &mut csv::Writer<W>, columns: &[String]) -> Result<()> {
    writer.write_record(columns)?;
    Ok(())
}

/// Write one row; null cells become empty fields.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_row<W: Write>(writer: &mut csv::Writer<W>, cells: &[Option<String>]) -> Result<()> {
    writer.write_record(cells.iter().map(|cell| cell.as_deref().unwrap_or_default()))?;
    Ok(())
}

/// Write a whole table (header plus rows) and flush.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_table<W: Write>(inner: W, table: &Table) -> Result<()> {
    let mut writer = writer(inner);
    write_header(&mut writer, table.columns())?;
    for row in table.rows() {
        write_row(&mut writer, row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Open a CSV reader with a header row.
///
/// # Errors
///
/// Returns an error if the file cannot be opened.
pub fn open_reader(path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file)))
}

/// Read only the header of a CSV file. Empty files have no columns.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or parsed.
pub fn read_header(path: &Path) -> Result<Vec<String>> {
    if std::fs::metadata(path)?.len() == 0 {
        return Ok(Vec::new());
    }
    let mut reader = open_reader(path)?;
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

/// Read a CSV file into a table; empty fields become null.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or parsed.
pub fn read_table(path: &Path) -> Result<Table> {
    let columns = read_header(path)?;
    let mut table = Table::new(columns);
    if table.columns().is_empty() {
        return Ok(table);
    }
    let mut reader = open_reader(path)?;
    for record in reader.records() {
        table.push_row(record_cells(&record?));
    }
    Ok(table)
}

/// Cells of a CSV record; empty fields become null.
#[must_use]
pub fn record_cells(record: &csv::StringRecord) -> Vec<Option<String>> {
    record
        .iter()
        .map(|field| (!field.is_empty()).then(|| field.to_string()))
        .collect()
}
