//! Pseudonymization of identity-bearing columns.
//!
//! Identities found in the declared columns of both tables are mapped to
//! `U1, U2, ...` in discovery order, so one person keeps one pseudonym in the
//! issues table and the changelog alike and the tables stay joinable.

use crate::schema::Table;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Default identity columns of the issues table.
pub const DEFAULT_ISSUE_IDENTITY_COLUMNS: &[&str] = &["reporter.key", "creator.key", "assignee.key"];

/// Default identity columns of the changelog table.
pub const DEFAULT_CHANGELOG_IDENTITY_COLUMNS: &[&str] = &["author"];

/// Pseudonym prefix.
const PSEUDONYM_PREFIX: &str = "U";

/// Declared identity columns for each table, scanned in this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityColumns {
    pub issues: Vec<String>,
    pub changelog: Vec<String>,
}

impl Default for IdentityColumns {
    fn default() -> Self {
        Self {
            issues: DEFAULT_ISSUE_IDENTITY_COLUMNS
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
            changelog: DEFAULT_CHANGELOG_IDENTITY_COLUMNS
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
        }
    }
}

/// Bijection from identity value to pseudonym.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PseudonymMap {
    index: HashMap<String, String>,
    order: Vec<String>,
}

impl PseudonymMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value; returns its pseudonym (existing or newly assigned).
    pub fn observe(&mut self, value: &str) -> &str {
        if !self.index.contains_key(value) {
            let pseudonym = format!("{PSEUDONYM_PREFIX}{}", self.order.len() + 1);
            self.order.push(value.to_string());
            self.index.insert(value.to_string(), pseudonym);
        }
        &self.index[value]
    }

    /// Scan `columns` of `table` column by column, top to bottom.
    ///
    /// Columns the table does not have are skipped.
    pub fn observe_table(&mut self, table: &Table, columns: &[String]) {
        for column in columns {
            for value in table.column_values(column).into_iter().flatten() {
                self.observe(value);
            }
        }
    }

    /// Build a map from both tables: issue columns first, then changelog columns.
    #[must_use]
    pub fn build(issues: &Table, changelog: &Table, columns: &IdentityColumns) -> Self {
        let mut map = Self::new();
        map.observe_table(issues, &columns.issues);
        map.observe_table(changelog, &columns.changelog);
        debug!(identities = map.len(), "Built pseudonym map");
        map
    }

    #[must_use]
    pub fn get(&self, value: &str) -> Option<&str> {
        self.index.get(value).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Original values in pseudonym order (`U1` first).
    pub fn originals(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Rewrite `columns` of `table` in place.
    ///
    /// Values without a mapping are left as they are. Returns how many cells
    /// were left unmapped.
    pub fn apply(&self, table: &mut Table, columns: &[String]) -> usize {
        let targets: Vec<usize> = columns
            .iter()
            .filter_map(|column| table.column_index(column))
            .collect();
        let mut unmapped = 0;
        for row in table.rows_mut() {
            for &idx in &targets {
                let Some(value) = row[idx].as_deref() else {
                    continue;
                };
                match self.index.get(value) {
                    Some(pseudonym) => row[idx] = Some(pseudonym.clone()),
                    None => unmapped += 1,
                }
            }
        }
        unmapped
    }
}

/// Distinct values of declared columns gathered over several tables.
///
/// Feeding tables in row order and then [`PseudonymMap::from_collected`]
/// yields the same map as [`PseudonymMap::build`] on their concatenation,
/// without holding all rows at once.
#[derive(Debug, Clone, Default)]
pub struct IdentityCollector {
    columns: Vec<String>,
    seen: Vec<HashSet<String>>,
    order: Vec<Vec<String>>,
}

impl IdentityCollector {
    #[must_use]
    pub fn new(columns: &[String]) -> Self {
        Self {
            columns: columns.to_vec(),
            seen: vec![HashSet::new(); columns.len()],
            order: vec![Vec::new(); columns.len()],
        }
    }

    /// Record the values of the next table's rows.
    pub fn collect(&mut self, table: &Table) {
        for (idx, column) in self.columns.iter().enumerate() {
            for value in table.column_values(column).into_iter().flatten() {
                if self.seen[idx].insert(value.to_string()) {
                    self.order[idx].push(value.to_string());
                }
            }
        }
    }

    /// Values column by column, each in first-seen order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.order.iter().flatten().map(String::as_str)
    }
}

impl PseudonymMap {
    /// Build a map from collected issue values, then changelog values.
    #[must_use]
    pub fn from_collected(issues: &IdentityCollector, changelog: &IdentityCollector) -> Self {
        let mut map = Self::new();
        for value in issues.values().chain(changelog.values()) {
            map.observe(value);
        }
        debug!(identities = map.len(), "Built pseudonym map");
        map
    }
}

/// Pseudonymize both tables, returning the rewritten tables and the map.
#[must_use]
pub fn anonymize(
    mut issues: Table,
    mut changelog: Table,
    columns: &IdentityColumns,
) -> (Table, Table, PseudonymMap) {
    let map = anonymize_in_place(&mut issues, &mut changelog, columns);
    (issues, changelog, map)
}

/// Pseudonymize both tables in place.
pub fn anonymize_in_place(
    issues: &mut Table,
    changelog: &mut Table,
    columns: &IdentityColumns,
) -> PseudonymMap {
    let map = PseudonymMap::build(issues, changelog, columns);
    map.apply(issues, &columns.issues);
    map.apply(changelog, &columns.changelog);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    fn issues() -> Table {
        let mut table = Table::with_columns(&["summary", "reporter.key", "assignee.key", "key"]);
        table.push_row(cells(&[Some("x"), Some("u1"), Some("u2"), Some("A-1")]));
        table.push_row(cells(&[Some("y"), Some("u1"), None, Some("A-2")]));
        table.push_row(cells(&[Some("z"), Some("u3"), Some("u1"), Some("A-3")]));
        table
    }

    fn changelog(authors: &[Option<&str>]) -> Table {
        let mut table = Table::with_columns(&["key", "author"]);
        for author in authors {
            table.push_row(cells(&[Some("A-1"), *author]));
        }
        table
    }

    #[test]
    fn assigns_in_column_then_row_order() {
        let mut map = PseudonymMap::new();
        for value in ["u1", "u2", "u1", "u3"] {
            map.observe(value);
        }
        assert_eq!(map.get("u1"), Some("U1"));
        assert_eq!(map.get("u2"), Some("U2"));
        assert_eq!(map.get("u3"), Some("U3"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn build_scans_declared_columns_left_to_right() {
        let columns = IdentityColumns {
            issues: vec!["reporter.key".into(), "assignee.key".into()],
            changelog: vec!["author".into()],
        };
        let map = PseudonymMap::build(&issues(), &changelog(&[Some("u4")]), &columns);
        // reporter.key column: u1, u1, u3; then assignee.key: u2, u1; then author: u4
        assert_eq!(
            map.originals().collect::<Vec<_>>(),
            ["u1", "u3", "u2", "u4"]
        );
    }

    #[test]
    fn rewrites_both_tables_consistently() {
        let columns = IdentityColumns::default();
        let (issues, changelog, map) =
            anonymize(issues(), changelog(&[Some("u2"), None]), &columns);

        assert_eq!(issues.get(0, "reporter.key"), Some("U1"));
        assert_eq!(issues.get(0, "assignee.key"), map.get("u2"));
        assert_eq!(changelog.get(0, "author"), map.get("u2"));
        assert_eq!(changelog.get(1, "author"), None);
        assert_eq!(issues.get(0, "summary"), Some("x"));
        assert_eq!(issues.get(2, "key"), Some("A-3"));
    }

    #[test]
    fn missing_declared_columns_are_skipped() {
        let columns = IdentityColumns::default();
        // issues() has no creator.key column
        let (issues, _, map) = anonymize(issues(), changelog(&[]), &columns);
        assert_eq!(map.len(), 3);
        assert!(issues.column_index("creator.key").is_none());
    }

    #[test]
    fn reapplying_is_idempotent() {
        let columns = IdentityColumns::default();
        let (mut issues, mut changelog, map) =
            anonymize(issues(), changelog(&[Some("u3")]), &columns);
        let before = (issues.clone(), changelog.clone());

        map.apply(&mut issues, &columns.issues);
        map.apply(&mut changelog, &columns.changelog);
        assert_eq!((issues, changelog), before);
    }

    #[test]
    fn unmapped_values_pass_through() {
        let columns = IdentityColumns::default();
        let (_, _, map) = anonymize(issues(), changelog(&[]), &columns);

        // An identity first seen after the map was built, e.g. in a later chunk.
        let mut late = changelog(&[Some("newcomer"), Some("u1")]);
        let unmapped = map.apply(&mut late, &columns.changelog);
        assert_eq!(unmapped, 1);
        assert_eq!(late.get(0, "author"), Some("newcomer"));
        assert_eq!(late.get(1, "author"), Some("U1"));
    }

    #[test]
    fn collector_matches_build_over_concatenation() {
        let columns = IdentityColumns::default();
        let mut first = issues();
        let mut second = Table::with_columns(&["assignee.key", "reporter.key", "key"]);
        second.push_row(cells(&[Some("u9"), Some("u5"), Some("A-4")]));

        let mut issue_ids = IdentityCollector::new(&columns.issues);
        issue_ids.collect(&first);
        issue_ids.collect(&second);
        let mut change_ids = IdentityCollector::new(&columns.changelog);
        change_ids.collect(&changelog(&[Some("u7"), Some("u1")]));
        let collected = PseudonymMap::from_collected(&issue_ids, &change_ids);

        first.append(second);
        let built = PseudonymMap::build(&first, &changelog(&[Some("u7"), Some("u1")]), &columns);
        assert_eq!(collected, built);
        assert_eq!(
            collected.originals().collect::<Vec<_>>(),
            ["u1", "u3", "u5", "u2", "u9", "u7"]
        );
    }
}
