//! Turns rule specs into typed, query-ready matchers.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::Serialize;

use crate::table::{MalformedEntry, RuleSpec, RuleTable};
use crate::Field;

const NUMERIC_SLOT: &str = "{n}";
const WORD_SLOT: &str = "{word}";

/// Reasons a single rule spec is rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("rule entry is malformed: {reason}")]
    Malformed { reason: String },
    #[error("rule pattern is empty")]
    EmptyPattern,
    #[error("unknown rule field '{0}'")]
    UnknownField(String),
    #[error("unknown rule condition '{0}'")]
    UnknownCondition(String),
    #[error("rule '{pattern}' has no comparison value")]
    MissingValue { pattern: String },
    #[error("rule '{pattern}' needs an integer year count, got '{value}'")]
    InvalidYears { pattern: String, value: String },
    #[error("rule '{pattern}' has more than one capture slot")]
    TooManySlots { pattern: String },
    #[error("rule '{pattern}' captures its value, but also names value '{value}'")]
    ConflictingValue { pattern: String, value: String },
    #[error("rule '{pattern}' compares years but captures a word")]
    WordSlotForYears { pattern: String },
    #[error("rule '{pattern}' does not compile: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Condition a job field must satisfy once a rule is triggered.
///
/// `less_than`/`under` and `more_than`/`over` are aliases: both names are
/// accepted and evaluate identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    NotContains,
    LessThanYears,
    MoreThanYears,
    AtLeastYears,
    UnderYears,
    OverYears,
}

impl Condition {
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::NotContains => "not_contains",
            Condition::LessThanYears => "less_than_years",
            Condition::MoreThanYears => "more_than_years",
            Condition::AtLeastYears => "at_least_years",
            Condition::UnderYears => "under_years",
            Condition::OverYears => "over_years",
        }
    }

    /// True for the experience comparisons.
    pub fn is_years(self) -> bool {
        !matches!(self, Condition::NotContains)
    }

    /// Compares a stated experience requirement against the rule bound.
    pub(crate) fn admits_years(self, stated: u64, bound: u64) -> bool {
        match self {
            Condition::LessThanYears | Condition::UnderYears => stated < bound,
            Condition::MoreThanYears | Condition::OverYears => stated > bound,
            Condition::AtLeastYears => stated >= bound,
            Condition::NotContains => true,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "not_contains" => Ok(Condition::NotContains),
            "less_than_years" | "less_than" => Ok(Condition::LessThanYears),
            "more_than_years" | "more_than" => Ok(Condition::MoreThanYears),
            "at_least_years" | "at_least" => Ok(Condition::AtLeastYears),
            "under_years" | "under" => Ok(Condition::UnderYears),
            "over_years" | "over" => Ok(Condition::OverYears),
            _ => Err(ConfigError::UnknownCondition(raw.to_string())),
        }
    }
}

/// How a rule recognizes itself in a query.
#[derive(Debug, Clone)]
pub enum Capture {
    /// Lower-cased substring of the query.
    Literal(String),
    /// Pattern with a `{n}` slot; the digits become the comparison value.
    Numeric(Regex),
    /// Pattern with a `{word}` slot; the word becomes the comparison value.
    ///
    /// The slot takes a single token: letters, digits and `+#.-` after a
    /// leading word character. Multi-word values are cut at the first space,
    /// so `not in {word}` reads "not in new york" as `new`. Tables that need
    /// a multi-word value spell it out as a literal rule instead.
    Word(Regex),
}

impl Capture {
    pub fn is_parametrized(&self) -> bool {
        !matches!(self, Capture::Literal(_))
    }
}

/// A validated rule ready to run against queries.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    index: usize,
    pattern: String,
    field: Field,
    condition: Condition,
    capture: Capture,
    value: Option<String>,
}

impl CompiledRule {
    /// Position of the rule in its source table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Pattern as written in the table.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    /// Fixed comparison value (lower-cased); `None` for parametrized rules.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Resolves the comparison value for a lower-cased query, or `None` when
    /// the rule is not triggered by it.
    pub(crate) fn trigger(&self, query: &str) -> Option<String> {
        match &self.capture {
            Capture::Literal(text) => {
                if query.contains(text.as_str()) {
                    self.value.clone()
                } else {
                    None
                }
            }
            Capture::Numeric(regex) => regex
                .captures(query)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
            Capture::Word(regex) => regex
                .captures(query)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim_end_matches(['.', '-']).to_string())
                .filter(|word| !word.is_empty()),
        }
    }
}

/// Immutable, ordered collection of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compiles a loaded table, dropping invalid entries. Entries the table
    /// could not read are reported at their document position.
    pub fn from_table(table: &RuleTable) -> Compiled {
        let mut specs = table.rules.iter();
        let mut malformed = table.malformed.iter().peekable();
        let total = table.rules.len() + table.malformed.len();
        let entries = (0..total).map_while(|index| {
            match malformed.next_if(|entry| entry.index == index) {
                Some(entry) => Some((index, Err(entry))),
                None => specs.next().map(|spec| (index, Ok(spec))),
            }
        });
        compile_entries(entries, table.rules.len())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }
}

/// A spec that failed validation, with its table position.
#[derive(Debug)]
pub struct RejectedRule {
    pub index: usize,
    pub pattern: String,
    pub error: ConfigError,
}

/// Compilation output: the usable rules plus everything that was dropped.
#[derive(Debug)]
pub struct Compiled {
    pub rules: RuleSet,
    pub rejected: Vec<RejectedRule>,
}

/// Compiles every spec independently. A bad spec is logged and dropped; it
/// never prevents the rest of the table from compiling.
pub fn compile(specs: &[RuleSpec]) -> Compiled {
    let entries = specs
        .iter()
        .enumerate()
        .map(|(index, spec)| (index, Ok::<_, &MalformedEntry>(spec)));
    compile_entries(entries, specs.len())
}

fn compile_entries<'a, I>(entries: I, capacity: usize) -> Compiled
where
    I: Iterator<Item = (usize, Result<&'a RuleSpec, &'a MalformedEntry>)>,
{
    let mut rules = Vec::with_capacity(capacity);
    let mut rejected = Vec::new();
    for (index, entry) in entries {
        let (pattern, outcome) = match entry {
            Ok(spec) => (&spec.pattern, compile_one(index, spec)),
            Err(bad) => (
                &bad.pattern,
                Err(ConfigError::Malformed {
                    reason: bad.reason.clone(),
                }),
            ),
        };
        match outcome {
            Ok(rule) => rules.push(rule),
            Err(error) => {
                tracing::warn!(index, pattern = %pattern, "dropping filter rule: {error}");
                rejected.push(RejectedRule {
                    index,
                    pattern: pattern.clone(),
                    error,
                });
            }
        }
    }
    Compiled {
        rules: RuleSet { rules },
        rejected,
    }
}

fn compile_one(index: usize, spec: &RuleSpec) -> Result<CompiledRule, ConfigError> {
    let pattern = spec.pattern.trim().to_lowercase();
    if pattern.is_empty() {
        return Err(ConfigError::EmptyPattern);
    }
    let field: Field = spec.field.parse()?;
    let condition: Condition = spec.condition.parse()?;
    let value = spec.value.trim();

    let numeric_slots = pattern.matches(NUMERIC_SLOT).count();
    let word_slots = pattern.matches(WORD_SLOT).count();
    if numeric_slots + word_slots > 1 {
        return Err(ConfigError::TooManySlots {
            pattern: spec.pattern.clone(),
        });
    }

    if numeric_slots + word_slots == 0 {
        if value.is_empty() {
            return Err(ConfigError::MissingValue {
                pattern: spec.pattern.clone(),
            });
        }
        if condition.is_years() && value.parse::<u64>().is_err() {
            return Err(ConfigError::InvalidYears {
                pattern: spec.pattern.clone(),
                value: value.to_string(),
            });
        }
        return Ok(CompiledRule {
            index,
            pattern: spec.pattern.clone(),
            field,
            condition,
            capture: Capture::Literal(pattern),
            value: Some(value.to_lowercase()),
        });
    }

    let slot = if numeric_slots == 1 {
        NUMERIC_SLOT
    } else {
        WORD_SLOT
    };
    if !value.is_empty() && value != slot {
        return Err(ConfigError::ConflictingValue {
            pattern: spec.pattern.clone(),
            value: value.to_string(),
        });
    }
    if slot == WORD_SLOT && condition.is_years() {
        return Err(ConfigError::WordSlotForYears {
            pattern: spec.pattern.clone(),
        });
    }

    let group = if slot == NUMERIC_SLOT {
        r"(\d+)"
    } else {
        r"(\w[\w+#.\-]*)"
    };
    let source = pattern
        .split(slot)
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(group);
    let regex = Regex::new(&source).map_err(|source| ConfigError::Regex {
        pattern: spec.pattern.clone(),
        source,
    })?;
    let capture = if slot == NUMERIC_SLOT {
        Capture::Numeric(regex)
    } else {
        Capture::Word(regex)
    };

    Ok(CompiledRule {
        index,
        pattern: spec.pattern.clone(),
        field,
        condition,
        capture,
        value: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec(pattern: &str, field: &str, condition: &str, value: &str) -> RuleSpec {
        RuleSpec::new(pattern, field, condition, value)
    }

    #[test]
    fn classifies_literal_and_parametrized_patterns() {
        let compiled = compile(&[
            spec("not freelance", "type", "not_contains", "Freelance"),
            spec("under {n} years of experience", "description", "under_years", ""),
            spec("without {word}", "skills", "not_contains", "{word}"),
        ]);
        assert!(compiled.rejected.is_empty());
        let kinds: Vec<bool> = compiled
            .rules
            .iter()
            .map(|rule| rule.capture().is_parametrized())
            .collect();
        assert_eq!(kinds, vec![false, true, true]);
        let first = compiled.rules.iter().next().expect("first rule");
        assert_eq!(first.value(), Some("freelance"));
        assert_eq!(first.field(), Field::JobType);
    }

    #[test]
    fn bad_rules_are_dropped_individually() {
        let compiled = compile(&[
            spec("not remote", "location", "not_contains", "Remote"),
            spec("not java", "skills", "excludes", "Java"),
            spec("", "skills", "not_contains", "Go"),
            spec("not rust", "salary", "not_contains", "Rust"),
            spec("not php", "skills", "not_contains", ""),
            spec("over five years", "description", "over", "five"),
            spec("{n} to {n} years", "description", "over", ""),
            spec("with {word} years", "description", "over_years", ""),
            spec("under {n} years", "description", "under", "7"),
            spec("not kotlin", "skills", "not_contains", "Kotlin"),
        ]);

        assert_eq!(compiled.rules.len(), 2);
        let indexes: Vec<usize> = compiled.rejected.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(matches!(
            compiled.rejected[0].error,
            ConfigError::UnknownCondition(_)
        ));
        assert!(matches!(compiled.rejected[1].error, ConfigError::EmptyPattern));
        assert!(matches!(
            compiled.rejected[2].error,
            ConfigError::UnknownField(_)
        ));
        assert!(matches!(
            compiled.rejected[3].error,
            ConfigError::MissingValue { .. }
        ));
        assert!(matches!(
            compiled.rejected[4].error,
            ConfigError::InvalidYears { .. }
        ));
        assert!(matches!(
            compiled.rejected[5].error,
            ConfigError::TooManySlots { .. }
        ));
        assert!(matches!(
            compiled.rejected[6].error,
            ConfigError::WordSlotForYears { .. }
        ));
        assert!(matches!(
            compiled.rejected[7].error,
            ConfigError::ConflictingValue { .. }
        ));
    }

    #[test]
    fn short_condition_names_are_aliases() {
        for (short, long) in [
            ("less_than", Condition::LessThanYears),
            ("more_than", Condition::MoreThanYears),
            ("at_least", Condition::AtLeastYears),
            ("under", Condition::UnderYears),
            ("over", Condition::OverYears),
        ] {
            assert_eq!(short.parse::<Condition>().expect(short), long);
            assert_eq!(long.as_str().parse::<Condition>().expect(short), long);
        }
    }

    #[test]
    fn aliases_compare_identically() {
        assert_eq!(
            Condition::LessThanYears.admits_years(2, 3),
            Condition::UnderYears.admits_years(2, 3)
        );
        assert_eq!(
            Condition::MoreThanYears.admits_years(3, 3),
            Condition::OverYears.admits_years(3, 3)
        );
        assert!(Condition::AtLeastYears.admits_years(3, 3));
        assert!(!Condition::OverYears.admits_years(3, 3));
    }

    #[test]
    fn placeholder_patterns_escape_literal_text() {
        let compiled = compile(&[spec(
            "experience (c++) with {word}",
            "skills",
            "not_contains",
            "",
        )]);
        let rule = compiled.rules.iter().next().expect("rule");
        assert_eq!(
            rule.trigger("experience (c++) with node.js."),
            Some("node.js".to_string())
        );
        assert_eq!(rule.trigger("experience c++ with node"), None);
    }

    #[test]
    fn word_slot_captures_one_token() {
        let compiled = compile(&[
            spec("not in {word}", "location", "not_contains", ""),
            spec("not in new york", "location", "not_contains", "New York"),
        ]);
        let mut rules = compiled.rules.iter();
        let word = rules.next().expect("word rule");
        assert_eq!(word.trigger("python not in new york"), Some("new".to_string()));
        assert_eq!(word.trigger("python not in c#, please"), Some("c#".to_string()));
        let literal = rules.next().expect("literal rule");
        assert_eq!(
            literal.trigger("python not in new york"),
            Some("new york".to_string())
        );
    }

    #[test]
    fn unreadable_entries_are_rejected_in_place() {
        let table = RuleTable::from_json_str(
            r#"[
                {"pattern": "not remote", "field": "location", "value": "Remote"},
                {"pattern": "not freelance", "field": "type", "condition": "not_contains", "value": "Freelance"},
                {"pattern": "not java", "field": "skills", "condition": "not_contains", "value": true},
                {"pattern": "not php", "field": "skills", "condition": "excludes", "value": "PHP"},
                {"pattern": "not onsite", "field": "location", "condition": "not_contains", "value": "Onsite"}
            ]"#,
        )
        .expect("document parses");
        let compiled = RuleSet::from_table(&table);

        let kept: Vec<usize> = compiled.rules.iter().map(CompiledRule::index).collect();
        assert_eq!(kept, vec![1, 4]);
        let rejected: Vec<(usize, &str)> = compiled
            .rejected
            .iter()
            .map(|r| (r.index, r.pattern.as_str()))
            .collect();
        assert_eq!(
            rejected,
            vec![(0, "not remote"), (2, "not java"), (3, "not php")]
        );
        assert!(matches!(
            compiled.rejected[0].error,
            ConfigError::Malformed { .. }
        ));
        assert!(matches!(
            compiled.rejected[1].error,
            ConfigError::Malformed { .. }
        ));
        assert!(matches!(
            compiled.rejected[2].error,
            ConfigError::UnknownCondition(_)
        ));
    }
}
