//! Field flattening.
//!
//! Converts an issue's nested `fields` mapping into a flat mapping keyed by
//! dotted paths, e.g. `reporter: {key: "bob"}` becomes `reporter.key: "bob"`.
//! The changelog is structurally different and is handled by
//! [`crate::changelog`], never here.

use crate::schema::ColumnUnion;
use serde_json::{Map, Value};

/// A flattened issue: dotted path -> scalar, array, or null.
///
/// Keys keep the order in which they were reached.
pub type FlatRow = Map<String, Value>;

/// How arrays inside `fields` are flattened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArrayPolicy {
    /// Keep the array as a single cell (rendered as a JSON list).
    #[default]
    Keep,
    /// Flatten each element under its index: `components.0.name`.
    Explode,
}

/// Flatten one `fields` mapping with the default array policy.
#[must_use]
pub fn flatten_fields(fields: &Map<String, Value>) -> FlatRow {
    flatten_with(fields, ArrayPolicy::Keep)
}

/// Flatten one `fields` mapping.
///
/// Empty nested mappings contribute no column. When a literal dotted key and
/// a nested path produce the same column, the one reached last wins.
#[must_use]
pub fn flatten_with(fields: &Map<String, Value>, policy: ArrayPolicy) -> FlatRow {
    let mut out = Map::new();
    flatten_map(fields, "", policy, &mut out);
    out
}

fn flatten_map(map: &Map<String, Value>, prefix: &str, policy: ArrayPolicy, out: &mut FlatRow) {
    for (key, value) in map {
        let path = join_path(prefix, key);
        flatten_value(value, path, policy, out);
    }
}

fn flatten_value(value: &Value, path: String, policy: ArrayPolicy, out: &mut FlatRow) {
    match value {
        Value::Object(nested) => flatten_map(nested, &path, policy, out),
        Value::Array(items) if policy == ArrayPolicy::Explode && !items.is_empty() => {
            for (idx, item) in items.iter().enumerate() {
                flatten_value(item, join_path(&path, &idx.to_string()), policy, out);
            }
        }
        other => {
            out.insert(path, other.clone());
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Flattener that remembers every column path it has produced.
#[derive(Debug, Clone, Default)]
pub struct FieldFlattener {
    policy: ArrayPolicy,
    columns: ColumnUnion,
}

impl FieldFlattener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_array_policy(policy: ArrayPolicy) -> Self {
        Self {
            policy,
            columns: ColumnUnion::new(),
        }
    }

    /// Flatten one issue and record its paths in the running union.
    pub fn flatten(&mut self, fields: &Map<String, Value>) -> FlatRow {
        let row = flatten_with(fields, self.policy);
        self.columns.extend(row.keys().map(String::as_str));
        row
    }

    /// Union of all paths produced so far, in first-seen order.
    #[must_use]
    pub const fn columns(&self) -> &ColumnUnion {
        &self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn flattens_nested_mapping() {
        let row = flatten_fields(&obj(json!({"a": 1, "b": {"c": 2}})));
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, ["a", "b.c"]);
        assert_eq!(row["a"], json!(1));
        assert_eq!(row["b.c"], json!(2));
    }

    #[test]
    fn flattens_deep_user_objects() {
        let row = flatten_fields(&obj(json!({
            "reporter": {"key": "bob", "displayName": "Bob", "avatarUrls": {"48x48": "u"}},
            "status": {"name": "Open", "statusCategory": {"id": 2}}
        })));
        assert_eq!(row["reporter.key"], json!("bob"));
        assert_eq!(row["reporter.avatarUrls.48x48"], json!("u"));
        assert_eq!(row["status.statusCategory.id"], json!(2));
    }

    #[test]
    fn keeps_arrays_and_nulls_by_default() {
        let row = flatten_fields(&obj(json!({
            "fixVersions": [{"name": "1.0"}, {"name": "1.1"}],
            "assignee": null,
            "labels": []
        })));
        assert_eq!(row["fixVersions"], json!([{"name": "1.0"}, {"name": "1.1"}]));
        assert_eq!(row["assignee"], Value::Null);
        assert_eq!(row["labels"], json!([]));
    }

    #[test]
    fn explode_policy_indexes_elements() {
        let row = flatten_with(
            &obj(json!({"components": [{"name": "core"}, {"name": "ui"}], "labels": []})),
            ArrayPolicy::Explode,
        );
        assert_eq!(row["components.0.name"], json!("core"));
        assert_eq!(row["components.1.name"], json!("ui"));
        assert_eq!(row["labels"], json!([]));
    }

    #[test]
    fn empty_mapping_contributes_no_column() {
        let row = flatten_fields(&obj(json!({"a": {}, "b": 1})));
        assert_eq!(row.len(), 1);
        assert!(row.contains_key("b"));
    }

    #[test]
    fn flattener_accumulates_union() {
        let mut flattener = FieldFlattener::new();
        flattener.flatten(&obj(json!({"summary": "x", "reporter": {"key": "bob"}})));
        flattener.flatten(&obj(json!({"summary": "y", "assignee": {"key": "bob"}})));
        assert_eq!(
            flattener.columns().as_slice(),
            ["summary", "reporter.key", "assignee.key"]
        );
    }
}
