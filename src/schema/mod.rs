//! Schema reconciliation.
//!
//! Issues flattened one at a time each expose their own set of columns. This
//! module turns them into a single rectangular [`Table`] whose header is the
//! union of every column seen, with absent cells back-filled as null.
//!
//! Two boundaries reconcile columns:
//! - [`TableBuilder`] within one run (or one chunk of a raw dump)
//! - [`reconcile_tables`] / [`Table::conform_to`] across independently built
//!   tables, such as the per-chunk outputs of the raw-file reprocessor

use crate::flatten::{FieldFlattener, FlatRow};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Insertion-ordered set of column names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnUnion {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl ColumnUnion {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column; returns `true` if it was not seen before.
    pub fn insert(&mut self, column: &str) -> bool {
        if self.seen.contains(column) {
            return false;
        }
        self.seen.insert(column.to_string());
        self.order.push(column.to_string());
        true
    }

    pub fn extend<'a, I>(&mut self, columns: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for column in columns {
            self.insert(column);
        }
    }

    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.seen.contains(column)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.order
    }
}

/// A rectangular table of nullable text cells.
///
/// Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from a static header, e.g. [`crate::model::ChangeRow::COLUMNS`].
    #[must_use]
    pub fn with_columns(columns: &[&str]) -> Self {
        Self::new(columns.iter().map(|c| (*c).to_string()).collect())
    }

    /// Append a row, padding short rows with nulls and truncating long ones.
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Vec<Option<String>>] {
        &mut self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Cell at `row` for the named column; `None` for null or unknown column.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Values of one column, top to bottom. Empty if the column is unknown.
    #[must_use]
    pub fn column_values(&self, column: &str) -> Vec<Option<&str>> {
        self.column_index(column).map_or_else(Vec::new, |idx| {
            self.rows.iter().map(|row| row[idx].as_deref()).collect()
        })
    }

    /// Append all rows of `other`, mapped by column name onto this header.
    ///
    /// Columns of `other` that this table lacks are dropped.
    pub fn append(&mut self, other: Self) {
        let mapping = column_mapping(&other.columns, &self.columns);
        for row in other.rows {
            self.rows.push(remap_row(row, &mapping, self.columns.len()));
        }
    }

    /// Re-shape this table onto `columns`, back-filling nulls.
    #[must_use]
    pub fn conform_to(self, columns: &[String]) -> Self {
        let mut out = Self::new(columns.to_vec());
        out.append(self);
        out
    }
}

/// For each source column, its index in `target` (if present).
#[must_use]
pub fn column_mapping(source: &[String], target: &[String]) -> Vec<Option<usize>> {
    source
        .iter()
        .map(|column| target.iter().position(|t| t == column))
        .collect()
}

/// Move the cells of `row` into a `width`-wide row following `mapping`.
#[must_use]
pub fn remap_row(
    row: Vec<Option<String>>,
    mapping: &[Option<usize>],
    width: usize,
) -> Vec<Option<String>> {
    let mut out = vec![None; width];
    for (cell, target) in row.into_iter().zip(mapping) {
        if let Some(idx) = target {
            out[*idx] = cell;
        }
    }
    out
}

/// Concatenate tables whose column sets may differ.
///
/// The result's header is the union of all headers in first-seen order.
#[must_use]
pub fn reconcile_tables(tables: Vec<Table>) -> Table {
    let mut union = ColumnUnion::new();
    for table in &tables {
        union.extend(table.columns().iter().map(String::as_str));
    }
    let mut out = Table::new(union.into_vec());
    for table in tables {
        out.append(table);
    }
    out
}

/// Text form of a flattened value. Strings are unquoted, other scalars and
/// arrays use their JSON text, null stays null.
#[must_use]
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Append-only buffer of flattened issue rows.
///
/// Field columns come first in first-seen order, followed by the fixed
/// trailing columns given at construction (`key`, `project` for issues).
/// A field path that collides with a trailing column is shadowed by it.
#[derive(Debug)]
pub struct TableBuilder {
    flattener: FieldFlattener,
    trailing: Vec<String>,
    rows: Vec<(FlatRow, Vec<Option<String>>)>,
}

impl TableBuilder {
    #[must_use]
    pub fn new(flattener: FieldFlattener, trailing: &[&str]) -> Self {
        Self {
            flattener,
            trailing: trailing.iter().map(|c| (*c).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Flatten `fields` and buffer it with the trailing cell values.
    pub fn push(&mut self, fields: &Map<String, Value>, trailing: Vec<Option<String>>) {
        let row = self.flattener.flatten(fields);
        self.rows.push((row, trailing));
    }

    /// Number of rows buffered since the last [`Self::take`].
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rows.len()
    }

    /// Current header: all field columns seen so far, then trailing columns.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .flattener
            .columns()
            .as_slice()
            .iter()
            .filter(|c| !self.trailing.contains(c))
            .cloned()
            .collect();
        columns.extend(self.trailing.iter().cloned());
        columns
    }

    /// Drain buffered rows into a table using the union seen so far.
    ///
    /// The column union is kept, so a later `take` still knows every column
    /// observed in earlier ones.
    pub fn take(&mut self) -> Table {
        let columns = self.columns();
        let field_count = columns.len() - self.trailing.len();
        let mut table = Table::new(columns);
        for (row, trailing) in std::mem::take(&mut self.rows) {
            let mut cells = Vec::with_capacity(table.columns.len());
            for column in &table.columns[..field_count] {
                cells.push(row.get(column).and_then(cell_text));
            }
            cells.extend(trailing);
            table.push_row(cells);
        }
        table
    }

    /// Drain everything into the final table.
    #[must_use]
    pub fn finish(mut self) -> Table {
        self.take()
    }
}
