//! Listing browser: facet values and field filters over the whole corpus.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::corpus::JobRecord;

/// Field filters for browsing. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseFilter {
    /// Exact company name.
    pub company: Option<String>,
    /// Exact location.
    pub location: Option<String>,
    /// Exact job board.
    pub source: Option<String>,
    /// Case-insensitive substring of the title or company.
    pub term: Option<String>,
}

impl BrowseFilter {
    /// True when `job` satisfies every set field.
    pub fn matches(&self, job: &JobRecord) -> bool {
        if !exact(&self.company, &job.company)
            || !exact(&self.location, &job.location)
            || !exact(&self.source, &job.source)
        {
            return false;
        }
        match self.term.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                job.title.to_lowercase().contains(&term)
                    || job.company.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }

    /// Jobs that match, in corpus order.
    pub fn apply<'a>(&self, jobs: &'a [JobRecord]) -> Vec<&'a JobRecord> {
        jobs.iter().filter(|job| self.matches(job)).collect()
    }
}

fn exact(wanted: &Option<String>, actual: &str) -> bool {
    match wanted.as_deref() {
        None | Some("") => true,
        Some(wanted) => wanted == actual,
    }
}

/// Distinct filter values present in the corpus, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    /// Companies.
    pub companies: Vec<String>,
    /// Locations.
    pub locations: Vec<String>,
    /// Job boards.
    pub sources: Vec<String>,
}

impl Facets {
    /// Collects facet values, skipping blanks.
    pub fn collect<'a, I>(jobs: I) -> Self
    where
        I: IntoIterator<Item = &'a JobRecord>,
    {
        let mut companies = BTreeSet::new();
        let mut locations = BTreeSet::new();
        let mut sources = BTreeSet::new();
        for job in jobs {
            insert_non_blank(&mut companies, &job.company);
            insert_non_blank(&mut locations, &job.location);
            insert_non_blank(&mut sources, &job.source);
        }
        Self {
            companies: companies.into_iter().collect(),
            locations: locations.into_iter().collect(),
            sources: sources.into_iter().collect(),
        }
    }
}

fn insert_non_blank(set: &mut BTreeSet<String>, value: &str) {
    if !value.trim().is_empty() {
        set.insert(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn job(title: &str, company: &str, location: &str, source: &str) -> JobRecord {
        JobRecord {
            title: title.into(),
            company: company.into(),
            location: location.into(),
            source: source.into(),
            ..JobRecord::default()
        }
    }

    fn corpus() -> Vec<JobRecord> {
        vec![
            job("Rust Engineer", "Ferris Labs", "Remote", "remoteok"),
            job("Data Analyst", "Acme", "Madrid", "linkedin"),
            job("Platform Engineer", "Acme", "Remote", "linkedin"),
            job("Designer", "", "", "remoteok"),
        ]
    }

    #[test]
    fn facets_are_sorted_distinct_and_skip_blanks() {
        let facets = Facets::collect(&corpus());
        assert_eq!(facets.companies, vec!["Acme", "Ferris Labs"]);
        assert_eq!(facets.locations, vec!["Madrid", "Remote"]);
        assert_eq!(facets.sources, vec!["linkedin", "remoteok"]);
    }

    #[test]
    fn exact_fields_and_term_combine() {
        let jobs = corpus();
        let filter = BrowseFilter {
            company: Some("Acme".into()),
            location: Some("Remote".into()),
            ..BrowseFilter::default()
        };
        let titles: Vec<&str> = filter.apply(&jobs).iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Platform Engineer"]);

        let filter = BrowseFilter {
            term: Some("  ENGINEER ".into()),
            ..BrowseFilter::default()
        };
        assert_eq!(filter.apply(&jobs).len(), 2);

        let filter = BrowseFilter {
            term: Some("ferris".into()),
            company: Some("acme".into()),
            ..BrowseFilter::default()
        };
        assert!(filter.apply(&jobs).is_empty());
    }

    #[test]
    fn default_filter_matches_everything() {
        assert_eq!(BrowseFilter::default().apply(&corpus()).len(), 4);
    }
}
