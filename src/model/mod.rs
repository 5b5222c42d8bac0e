//! Raw tracker records and the derived row types.
//!
//! Raw records mirror the Jira REST payload closely enough to deserialize
//! with `serde`; anything version-dependent (author shape, custom fields)
//! stays as [`serde_json::Value`] and is interpreted by the flattener and
//! the changelog expander.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One issue as returned by the search endpoint with `expand=changelog`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIssueRecord {
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub key: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub changelog: Changelog,
}

impl RawIssueRecord {
    /// Project key derived from the issue key.
    #[must_use]
    pub fn project(&self) -> &str {
        project_of(&self.key)
    }
}

/// Change history attached to an issue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changelog {
    #[serde(default)]
    pub histories: Vec<HistoryEntry>,
}

/// A single change event: who, when, and which fields changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Author shape differs between server and cloud APIs, so it is kept raw.
    #[serde(default)]
    pub author: Value,
    #[serde(default, deserialize_with = "lenient_text")]
    pub created: Option<String>,
    #[serde(default)]
    pub items: Vec<ChangeItem>,
    /// Any other attributes, including pre-flattened `author.*` keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One field's before/after values within a history entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeItem {
    #[serde(default, deserialize_with = "lenient_text")]
    pub field: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub fieldtype: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", rename = "fromString")]
    pub from_string: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", rename = "toString")]
    pub to_string: Option<String>,
}

/// One row of the changelog table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeRow {
    pub key: String,
    pub author: Option<String>,
    pub date: Option<String>,
    pub field: Option<String>,
    pub fieldtype: Option<String>,
    pub from: Option<String>,
    #[serde(rename = "fromString")]
    pub from_string: Option<String>,
    pub to: Option<String>,
    #[serde(rename = "toString")]
    pub to_string: Option<String>,
    pub project: String,
}

impl ChangeRow {
    /// Column order of the changelog table.
    pub const COLUMNS: [&'static str; 10] = [
        "key",
        "author",
        "date",
        "field",
        "fieldtype",
        "from",
        "fromString",
        "to",
        "toString",
        "project",
    ];

    /// Cells in [`Self::COLUMNS`] order.
    #[must_use]
    pub fn into_cells(self) -> Vec<Option<String>> {
        vec![
            Some(self.key),
            self.author,
            self.date,
            self.field,
            self.fieldtype,
            self.from,
            self.from_string,
            self.to,
            self.to_string,
            Some(self.project),
        ]
    }
}

/// Accept any JSON scalar where text is expected; `null` becomes `None`.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Project key of an issue key: everything before the first `-`.
///
/// A key without a dash is its own project.
#[must_use]
pub fn project_of(key: &str) -> &str {
    key.split_once('-').map_or(key, |(project, _)| project)
}
