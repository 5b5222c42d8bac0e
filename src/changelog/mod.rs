//! Changelog expansion.
//!
//! Each history entry of an issue carries one or more change items. The
//! expander emits one [`ChangeRow`] per item, in issue -> history -> item
//! order, tagging every row with the history's author and timestamp.

use crate::model::{ChangeRow, HistoryEntry, project_of};
use crate::schema::Table;
use serde_json::{Map, Value};

/// Candidate author paths, highest priority first.
///
/// Server deployments expose `key`, cloud deployments expose `accountId`,
/// and `displayName` is the last resort. The `author.` variants match entries
/// whose author attributes were flattened onto the entry itself.
pub const AUTHOR_CANDIDATES: [&str; 6] = [
    "key",
    "author.key",
    "accountId",
    "author.accountId",
    "displayName",
    "author.displayName",
];

/// Look up a dotted path in a mapping.
///
/// A literal key equal to the whole path wins over nested traversal.
#[must_use]
pub fn lookup_path<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(path) {
        return Some(value);
    }
    let (head, rest) = path.split_once('.')?;
    lookup_path(map.get(head)?.as_object()?, rest)
}

/// Value of the first candidate present in any scope, probing every scope per
/// candidate before moving to the next candidate.
///
/// A present candidate wins even when its value is null.
#[must_use]
pub fn first_present<'a>(
    scopes: &[&'a Map<String, Value>],
    candidates: &[&str],
) -> Option<&'a Value> {
    candidates.iter().find_map(|candidate| {
        scopes
            .iter()
            .find_map(|scope| lookup_path(*scope, candidate))
    })
}

/// Resolve the author of a history entry, or `None` if no candidate exists or
/// the first present one is null.
#[must_use]
pub fn resolve_author(entry: &HistoryEntry) -> Option<String> {
    let mut scopes = Vec::with_capacity(2);
    if let Some(author) = entry.author.as_object() {
        scopes.push(author);
    }
    scopes.push(&entry.extra);

    match first_present(&scopes, &AUTHOR_CANDIDATES)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Expand one issue's histories into change rows.
#[must_use]
pub fn expand_changelog(key: &str, histories: &[HistoryEntry]) -> Vec<ChangeRow> {
    let project = project_of(key);
    let mut rows = Vec::new();
    for history in histories {
        let author = resolve_author(history);
        for item in &history.items {
            rows.push(ChangeRow {
                key: key.to_string(),
                author: author.clone(),
                date: history.created.clone(),
                field: item.field.clone(),
                fieldtype: item.fieldtype.clone(),
                from: item.from.clone(),
                from_string: item.from_string.clone(),
                to: item.to.clone(),
                to_string: item.to_string.clone(),
                project: project.to_string(),
            });
        }
    }
    rows
}

/// Append one issue's change rows to a changelog table.
pub fn append_changelog(table: &mut Table, key: &str, histories: &[HistoryEntry]) {
    for row in expand_changelog(key, histories) {
        table.push_row(row.into_cells());
    }
}

/// Empty changelog table with the canonical header.
#[must_use]
pub fn changelog_table() -> Table {
    Table::with_columns(&ChangeRow::COLUMNS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeItem;
    use serde_json::json;

    fn history(author: Value, created: &str, fields: &[&str]) -> HistoryEntry {
        HistoryEntry {
            author,
            created: Some(created.to_string()),
            items: fields
                .iter()
                .map(|f| ChangeItem {
                    field: Some((*f).to_string()),
                    ..Default::default()
                })
                .collect(),
            extra: Map::new(),
        }
    }

    #[test]
    fn rows_follow_history_then_item_order() {
        let histories = vec![
            history(json!({"key": "a"}), "h1", &["i1", "i2"]),
            history(json!({"key": "b"}), "h2", &["i1", "i2"]),
        ];
        let rows = expand_changelog("ABC-1", &histories);
        let order: Vec<(String, String)> = rows
            .iter()
            .map(|r| (r.date.clone().unwrap(), r.field.clone().unwrap()))
            .collect();
        assert_eq!(
            order,
            [
                ("h1".to_string(), "i1".to_string()),
                ("h1".to_string(), "i2".to_string()),
                ("h2".to_string(), "i1".to_string()),
                ("h2".to_string(), "i2".to_string()),
            ]
        );
        assert!(rows.iter().all(|r| r.project == "ABC" && r.key == "ABC-1"));
    }

    #[test]
    fn author_prefers_key_over_account_id() {
        let entry = history(json!({"key": "bob", "accountId": "42"}), "t", &["f"]);
        assert_eq!(resolve_author(&entry).as_deref(), Some("bob"));
    }

    #[test]
    fn author_falls_back_to_account_id() {
        let entry = history(json!({"accountId": "42", "displayName": "Bob"}), "t", &["f"]);
        assert_eq!(resolve_author(&entry).as_deref(), Some("42"));
    }

    #[test]
    fn author_from_flattened_entry_keys() {
        let mut entry = history(Value::Null, "t", &["f"]);
        entry
            .extra
            .insert("author.accountId".to_string(), json!("42"));
        assert_eq!(resolve_author(&entry).as_deref(), Some("42"));
    }

    #[test]
    fn author_missing_resolves_to_none() {
        let entry = history(json!({"emailAddress": "x@y"}), "t", &["f"]);
        assert_eq!(resolve_author(&entry), None);
        let entry = history(Value::Null, "t", &["f"]);
        assert_eq!(resolve_author(&entry), None);
    }

    #[test]
    fn present_null_candidate_resolves_to_null() {
        let entry = history(json!({"key": null, "displayName": "Bob"}), "t", &["f"]);
        assert_eq!(resolve_author(&entry), None);

        let entry = history(json!({"accountId": null, "displayName": "Bob"}), "t", &["f"]);
        assert_eq!(resolve_author(&entry), None);
    }

    #[test]
    fn absent_candidate_falls_through() {
        let entry = history(json!({"name": "bob", "displayName": "Bob"}), "t", &["f"]);
        assert_eq!(resolve_author(&entry).as_deref(), Some("Bob"));
    }

    #[test]
    fn lookup_path_prefers_literal_key() {
        let map = json!({"author.key": "flat", "author": {"key": "nested"}});
        let map = map.as_object().unwrap();
        assert_eq!(lookup_path(map, "author.key"), Some(&json!("flat")));
        assert_eq!(lookup_path(map, "author.missing"), None);
    }

    #[test]
    fn history_without_items_emits_nothing() {
        let histories = vec![history(json!({"key": "a"}), "h1", &[])];
        assert!(expand_changelog("ABC-1", &histories).is_empty());
    }

    #[test]
    fn append_changelog_fills_table() {
        let mut table = changelog_table();
        append_changelog(
            &mut table,
            "X-1",
            &[history(json!({"key": "a"}), "h1", &["status"])],
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "author"), Some("a"));
        assert_eq!(table.get(0, "field"), Some("status"));
        assert_eq!(table.get(0, "project"), Some("X"));
        assert_eq!(table.get(0, "from"), None);
    }
}
