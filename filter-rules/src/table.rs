//! Rule table documents as stored on disk.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One uncompiled rule exactly as written in the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Query phrase that triggers the rule, optionally with a `{n}` or `{word}` slot.
    pub pattern: String,
    /// Job field the condition is checked against.
    pub field: String,
    /// Condition token such as `not_contains` or `less_than_years`.
    pub condition: String,
    /// Comparison value; empty (or the slot token) for parametrized patterns.
    #[serde(default, deserialize_with = "string_or_number")]
    pub value: String,
}

impl RuleSpec {
    /// Convenience constructor used by the generator and tests.
    pub fn new(
        pattern: impl Into<String>,
        field: impl Into<String>,
        condition: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            field: field.into(),
            condition: condition.into(),
            value: value.into(),
        }
    }
}

/// Errors raised while reading a rule table document.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("failed to read rule table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid rule table: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A table entry that could not be read as a [`RuleSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEntry {
    /// Position of the entry in the document.
    pub index: usize,
    /// The entry's `pattern` when it had a string one.
    pub pattern: String,
    pub reason: String,
}

/// Ordered list of rule specs.
///
/// Entries that do not have the rule shape are kept aside in `malformed`
/// so one bad entry never sinks the rest of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub rules: Vec<RuleSpec>,
    #[serde(skip)]
    pub malformed: Vec<MalformedEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TableDocument {
    Wrapped { rules: Vec<Value> },
    Bare(Vec<Value>),
}

impl RuleTable {
    /// Parses either `{"rules": [...]}` or a bare JSON array.
    pub fn from_json_str(raw: &str) -> Result<Self, TableError> {
        let document: TableDocument = serde_json::from_str(raw)?;
        Ok(Self::from(document))
    }

    /// Reads a table from any reader (stdin in the CLI).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let document: TableDocument = serde_json::from_reader(reader)?;
        Ok(Self::from(document))
    }

    /// Loads a table from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Wraps well-formed specs.
    pub fn new(rules: Vec<RuleSpec>) -> Self {
        Self {
            rules,
            malformed: Vec::new(),
        }
    }

    /// Number of well-formed specs.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<TableDocument> for RuleTable {
    fn from(document: TableDocument) -> Self {
        match document {
            TableDocument::Wrapped { rules } | TableDocument::Bare(rules) => {
                let mut table = Self::default();
                for (index, entry) in rules.into_iter().enumerate() {
                    let pattern = entry
                        .get("pattern")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    match serde_json::from_value::<RuleSpec>(entry) {
                        Ok(spec) => table.rules.push(spec),
                        Err(err) => table.malformed.push(MalformedEntry {
                            index,
                            pattern,
                            reason: err.to_string(),
                        }),
                    }
                }
                table
            }
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
        Null,
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Int(value) => value.to_string(),
        Raw::Float(value) => value.to_string(),
        Raw::Null => String::new(),
    })
}
