//! Exclusion rules triggered by phrases in a free-text job query.
//!
//! A rule table is plain data: each entry names a query pattern, the job field
//! it inspects, and the condition that field must satisfy. Rules compile into a
//! [`RuleSet`]; a query then binds the set to the subset of rules it triggers,
//! and each candidate job either passes all of them or is excluded.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod compile;
mod engine;
mod generate;
mod table;

pub use compile::{
    compile, Capture, CompiledRule, Compiled, Condition, ConfigError, RejectedRule, RuleSet,
};
pub use engine::{extract_years, passes, AppliedRule, BoundRules};
pub use generate::default_rule_table;
pub use table::{MalformedEntry, RuleSpec, RuleTable, TableError};

/// Job attribute a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Company,
    Description,
    Location,
    #[serde(rename = "type")]
    JobType,
    Skills,
    Date,
    Source,
    Link,
}

impl Field {
    /// Name used in rule tables.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Company => "company",
            Field::Description => "description",
            Field::Location => "location",
            Field::JobType => "type",
            Field::Skills => "skills",
            Field::Date => "date",
            Field::Source => "source",
            Field::Link => "link",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Field::Title),
            "company" => Ok(Field::Company),
            "description" => Ok(Field::Description),
            "location" => Ok(Field::Location),
            "type" => Ok(Field::JobType),
            "skills" => Ok(Field::Skills),
            "date" => Ok(Field::Date),
            "source" => Ok(Field::Source),
            "link" => Ok(Field::Link),
            _ => Err(ConfigError::UnknownField(raw.to_string())),
        }
    }
}

/// Read access to the fields of a job posting.
///
/// List-valued fields are flattened into one space-joined string so every
/// condition works on plain text.
pub trait FieldSource {
    /// Text of `field`, in any case; the engine lower-cases it.
    fn field_text(&self, field: Field) -> Cow<'_, str>;
}
