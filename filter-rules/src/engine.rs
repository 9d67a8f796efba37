//! Applies compiled rules to job postings for a given query.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::compile::{CompiledRule, Condition, RuleSet};
use crate::{Field, FieldSource};

static YEARS_OF_EXPERIENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s*\+?\s*years of experience").expect("valid experience regex")
});

/// Returns the first year count stated right before "years of experience".
///
/// Expects lower-cased text. Counts too large for `u64` are treated as absent.
pub fn extract_years(text: &str) -> Option<u64> {
    YEARS_OF_EXPERIENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// A rule triggered by a specific query, with its comparison value resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedRule<'a> {
    pub index: usize,
    pub pattern: &'a str,
    pub field: Field,
    pub condition: Condition,
    pub value: String,
}

impl AppliedRule<'_> {
    /// Whether `job` satisfies this rule. Values that cannot be compared
    /// leave the job in.
    pub fn admits<J: FieldSource + ?Sized>(&self, job: &J) -> bool {
        let text = job.field_text(self.field).to_lowercase();
        match self.condition {
            Condition::NotContains => !text.contains(self.value.as_str()),
            condition => {
                let Ok(bound) = self.value.parse::<u64>() else {
                    return true;
                };
                match extract_years(&text) {
                    Some(stated) => condition.admits_years(stated, bound),
                    None => true,
                }
            }
        }
    }
}

/// The subset of a rule set triggered by one query, in table order.
#[derive(Debug, Clone, Default)]
pub struct BoundRules<'a> {
    applied: Vec<AppliedRule<'a>>,
}

impl<'a> BoundRules<'a> {
    pub fn applicable(&self) -> &[AppliedRule<'a>] {
        &self.applied
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    /// First rule the job violates, if any.
    pub fn first_violation<J: FieldSource + ?Sized>(&self, job: &J) -> Option<&AppliedRule<'a>> {
        self.applied.iter().find(|rule| !rule.admits(job))
    }

    /// True when the job violates none of the triggered rules.
    pub fn passes<J: FieldSource + ?Sized>(&self, job: &J) -> bool {
        self.first_violation(job).is_none()
    }
}

impl RuleSet {
    /// Resolves which rules `query` triggers. The query is lower-cased once here.
    pub fn bind(&self, query: &str) -> BoundRules<'_> {
        let normalized = query.to_lowercase();
        let applied = self
            .iter()
            .filter_map(|rule| bind_rule(rule, &normalized))
            .collect();
        BoundRules { applied }
    }
}

fn bind_rule<'a>(rule: &'a CompiledRule, query: &str) -> Option<AppliedRule<'a>> {
    let value = rule.trigger(query)?;
    Some(AppliedRule {
        index: rule.index(),
        pattern: rule.pattern(),
        field: rule.field(),
        condition: rule.condition(),
        value,
    })
}

/// Decides whether `job` survives every rule `query` triggers.
///
/// Rules the query does not trigger are skipped, so a job facing no
/// triggered rules passes.
pub fn passes<J: FieldSource + ?Sized>(job: &J, query: &str, rules: &RuleSet) -> bool {
    rules.bind(query).passes(job)
}
