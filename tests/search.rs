use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use jobscout::filter_rules::RuleSet;
use jobscout::{
    load_rule_set, CorpusSource, CorpusStore, QueryEmbedder, RankedCandidate, SearchControls,
    SearchEngine, SearchError, UpstreamError,
};

/// Maps queries mentioning design onto an axis no posting leans toward; every
/// other query points at the Python postings.
struct StaticEmbedder;

impl QueryEmbedder for StaticEmbedder {
    fn embed(&self, query: &str) -> Result<Vec<f32>, UpstreamError> {
        if query.contains("design") {
            Ok(vec![0.0, 0.0, 1.0])
        } else {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn engine_with(rules: RuleSet) -> SearchEngine {
    let store = Arc::new(CorpusStore::open(CorpusSource {
        vectors: fixture("job_vectors.jsonl"),
        jobs: None,
    }));
    SearchEngine::new(
        Arc::new(StaticEmbedder),
        store,
        rules,
        SearchControls::new(10, 0.5, 3, Duration::from_secs(5)),
    )
}

fn engine() -> SearchEngine {
    engine_with(load_rule_set(&fixture("rules.json")).expect("rules"))
}

fn ids(results: &[RankedCandidate]) -> Vec<&str> {
    results.iter().map(|c| c.job_id.as_str()).collect()
}

#[tokio::test]
async fn ranks_above_threshold_and_skips_mismatched_vectors() {
    let results = engine().search("python developer", None).await.expect("search");
    assert_eq!(ids(&results), vec!["py-freelance", "py-senior", "py-junior"]);
    assert!(results.iter().all(|c| c.similarity > 0.5));
    assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[tokio::test]
async fn negated_job_type_excludes_freelance_posting() {
    let report = engine()
        .run("python developer not freelance", None)
        .await
        .expect("search");
    assert_eq!(ids(&report.results), vec!["py-senior", "py-junior"]);
    assert_eq!(report.ranked, 3);
    assert_eq!(report.excluded, 1);
    assert_eq!(report.rules_applied, 1);
}

#[tokio::test]
async fn experience_cap_uses_number_from_query() {
    let results = engine()
        .search("senior engineer under 3 years of experience", None)
        .await
        .expect("search");
    // 5 years is excluded, 2 years kept, no stated experience passes
    assert_eq!(ids(&results), vec!["py-freelance", "py-junior"]);
}

#[tokio::test]
async fn word_capture_excludes_location() {
    let results = engine()
        .search("python developer not in madrid", None)
        .await
        .expect("search");
    assert_eq!(ids(&results), vec!["py-freelance", "py-junior"]);
}

#[tokio::test]
async fn nothing_above_threshold_is_empty_not_error() {
    let results = engine()
        .search("product design lead", None)
        .await
        .expect("search");
    assert!(results.is_empty());
}

#[tokio::test]
async fn top_n_caps_results() {
    let results = engine().search("python developer", Some(2)).await.expect("search");
    assert_eq!(ids(&results), vec!["py-freelance", "py-senior"]);
}

#[tokio::test]
async fn repeated_searches_are_identical() {
    let engine = engine();
    let query = "python developer not freelance under 3 years of experience";
    let first = engine.search(query, None).await.expect("first");
    let second = engine.search(query, None).await.expect("second");
    assert_eq!(first, second);
}

#[tokio::test]
async fn filtering_only_removes_candidates() {
    let query = "python developer not freelance not in madrid";
    let unfiltered = engine_with(RuleSet::empty())
        .search(query, None)
        .await
        .expect("unfiltered");
    let filtered = engine().search(query, None).await.expect("filtered");

    let mut remaining = unfiltered.iter();
    for candidate in &filtered {
        assert!(
            remaining.any(|other| other == candidate),
            "{} was added or reordered by filtering",
            candidate.job_id
        );
    }
    assert_eq!(ids(&filtered), vec!["py-junior"]);
}

#[tokio::test]
async fn reload_picks_up_new_vectors_and_rules() {
    let dir = tempfile::tempdir().expect("temp dir");
    let vectors = dir.path().join("job_vectors.json");
    let rules = dir.path().join("rules.json");
    std::fs::write(
        &vectors,
        r#"{"a": {"embedding": [1.0, 0.0, 0.0], "data": {"title": "Rust Engineer", "type": "Freelance"}}}"#,
    )
    .expect("write vectors");
    std::fs::write(&rules, "[]").expect("write rules");

    let store = Arc::new(CorpusStore::open(CorpusSource {
        vectors: vectors.clone(),
        jobs: None,
    }));
    let engine = SearchEngine::new(
        Arc::new(StaticEmbedder),
        store,
        load_rule_set(&rules).expect("rules"),
        SearchControls::new(10, 0.5, 3, Duration::from_secs(5)),
    )
    .with_rules_path(&rules);

    let query = "rust not freelance";
    assert_eq!(ids(&engine.search(query, None).await.expect("before")), vec!["a"]);

    std::fs::write(
        &rules,
        r#"[{"pattern": "not freelance", "field": "type", "condition": "not_contains", "value": "freelance"}]"#,
    )
    .expect("rewrite rules");
    std::fs::write(
        &vectors,
        r#"{
            "a": {"embedding": [1.0, 0.0, 0.0], "data": {"title": "Rust Engineer", "type": "Freelance"}},
            "b": {"embedding": [1.0, 0.1, 0.0], "data": {"title": "Rust Engineer", "type": "Full Time"}}
        }"#,
    )
    .expect("rewrite vectors");

    let summary = engine.reload().expect("reload");
    assert_eq!((summary.vectors, summary.rules), (2, 1));
    assert_eq!(ids(&engine.search(query, None).await.expect("after")), vec!["b"]);

    let loaded = engine.corpus().expect("corpus loaded");
    std::fs::write(
        &vectors,
        r#"{"c": {"embedding": [1.0, 0.0, 0.0], "data": {"title": "Go Engineer"}}}"#,
    )
    .expect("rewrite vectors again");
    std::fs::write(&rules, "{ not json").expect("break rules");
    assert!(engine.reload().is_err());
    assert_eq!(engine.rules().expect("rules kept").len(), 1);
    let current = engine.corpus().expect("corpus kept");
    assert!(Arc::ptr_eq(&loaded, &current));
    assert_eq!(ids(&engine.search(query, None).await.expect("kept")), vec!["b"]);
}

#[tokio::test]
async fn broken_rule_table_blocks_searches_until_reload() {
    let dir = tempfile::tempdir().expect("temp dir");
    let rules = dir.path().join("rules.json");
    std::fs::write(&rules, r#"{"rules": 7}"#).expect("write rules");

    let store = Arc::new(CorpusStore::open(CorpusSource {
        vectors: fixture("job_vectors.jsonl"),
        jobs: None,
    }));
    let engine = SearchEngine::new(
        Arc::new(StaticEmbedder),
        store,
        RuleSet::empty(),
        SearchControls::new(10, 0.5, 3, Duration::from_secs(5)),
    )
    .with_rule_table(&rules);

    let query = "python developer not freelance";
    let err = engine.search(query, None).await.expect_err("rules missing");
    assert!(matches!(err, SearchError::RulesUnavailable));

    std::fs::copy(fixture("rules.json"), &rules).expect("restore rules");
    let summary = engine.reload().expect("reload");
    assert_eq!(summary.rules, 3);
    let results = engine.search(query, None).await.expect("search");
    assert_eq!(ids(&results), vec!["py-senior", "py-junior"]);
}

#[tokio::test]
async fn browse_filters_the_loaded_listing() {
    let engine = engine();
    let filter = jobscout::BrowseFilter {
        company: Some("Acme".into()),
        term: Some("senior".into()),
        ..Default::default()
    };
    let (jobs, facets) = engine.browse(&filter).expect("browse");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].title, "Senior Python Engineer");
    assert_eq!(facets.sources, vec!["linkedin", "remoteok"]);
}
