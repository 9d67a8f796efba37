//! Query orchestration: embed, rank, filter.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use filter_rules::{RuleSet, RuleTable};
use parking_lot::RwLock;
use serde::Serialize;

use crate::browse::{BrowseFilter, Facets};
use crate::controls::SearchControls;
use crate::corpus::{Corpus, CorpusStore, JobRecord};
use crate::embedder::QueryEmbedder;
use crate::error::{DataError, UpstreamError};
use crate::explain::{Explainer, Explanation};
use crate::ranker::{rank, RankedCandidate};

/// Pipeline position of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStage {
    /// Computing the query embedding.
    Embedding,
    /// Scoring the corpus.
    Ranking,
    /// Applying exclusion rules.
    Filtering,
    /// Finished.
    Done,
}

impl fmt::Display for SearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchStage::Embedding => "embedding",
            SearchStage::Ranking => "ranking",
            SearchStage::Filtering => "filtering",
            SearchStage::Done => "done",
        })
    }
}

/// Why a query produced no result list.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Blank query text.
    #[error("query is empty")]
    EmptyQuery,
    /// The embedding provider failed or timed out.
    #[error("could not compute query embedding: {0}")]
    Embedding(#[source] UpstreamError),
    /// No corpus snapshot is loaded.
    #[error("could not load job vectors")]
    CorpusUnavailable,
    /// The configured rule table has not loaded.
    #[error("could not load filter rules")]
    RulesUnavailable,
}

impl SearchError {
    /// Stage the query failed in.
    pub fn stage(&self) -> SearchStage {
        match self {
            SearchError::EmptyQuery | SearchError::Embedding(_) => SearchStage::Embedding,
            SearchError::CorpusUnavailable => SearchStage::Ranking,
            SearchError::RulesUnavailable => SearchStage::Filtering,
        }
    }
}

/// Results of one query plus what happened along the way.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    /// Filtered results, best first.
    pub results: Vec<RankedCandidate>,
    /// Candidates above the similarity floor before filtering.
    pub ranked: usize,
    /// Rules the query triggered.
    pub rules_applied: usize,
    /// Candidates removed by rules.
    pub excluded: usize,
}

/// Reads and compiles a rule table. Invalid rules are logged and dropped.
pub fn load_rule_set(path: &Path) -> Result<RuleSet, DataError> {
    let table = RuleTable::load(path)?;
    let compiled = RuleSet::from_table(&table);
    tracing::info!(
        rules = compiled.rules.len(),
        rejected = compiled.rejected.len(),
        path = %path.display(),
        "loaded filter rules"
    );
    Ok(compiled.rules)
}

/// Entry point tying the embedder, corpus, rules and explainer together.
pub struct SearchEngine {
    embedder: Arc<dyn QueryEmbedder>,
    corpus: Arc<CorpusStore>,
    /// `None` while a configured table has failed to load.
    rules: RwLock<Option<Arc<RuleSet>>>,
    rules_path: Option<PathBuf>,
    controls: SearchControls,
    explainer: Option<Explainer>,
}

impl SearchEngine {
    /// Builds an engine over an already loaded store and rule set.
    pub fn new(
        embedder: Arc<dyn QueryEmbedder>,
        corpus: Arc<CorpusStore>,
        rules: RuleSet,
        controls: SearchControls,
    ) -> Self {
        Self {
            embedder,
            corpus,
            rules: RwLock::new(Some(Arc::new(rules))),
            rules_path: None,
            controls,
            explainer: None,
        }
    }

    /// Remembers where the rules came from so `reload` can re-read them.
    pub fn with_rules_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_path = Some(path.into());
        self
    }

    /// Loads the rule table at `path` and remembers it for `reload`. A table
    /// that fails to load is logged and leaves the rules unavailable, so
    /// searches fail with [`SearchError::RulesUnavailable`] until a reload
    /// succeeds.
    pub fn with_rule_table(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let rules = match load_rule_set(&path) {
            Ok(rules) => Some(Arc::new(rules)),
            Err(err) => {
                tracing::error!(path = %path.display(), "could not load filter rules: {err}");
                None
            }
        };
        *self.rules.write() = rules;
        self.with_rules_path(path)
    }

    /// Enables explanations.
    pub fn with_explainer(mut self, explainer: Explainer) -> Self {
        self.explainer = Some(explainer);
        self
    }

    /// Active controls.
    pub fn controls(&self) -> &SearchControls {
        &self.controls
    }

    /// Current rule set; `None` while the configured table is unavailable.
    pub fn rules(&self) -> Option<Arc<RuleSet>> {
        self.rules.read().clone()
    }

    /// Current corpus snapshot.
    pub fn corpus(&self) -> Option<Arc<Corpus>> {
        self.corpus.snapshot()
    }

    /// True when explanations can be generated.
    pub fn can_explain(&self) -> bool {
        self.explainer.is_some()
    }

    /// Ranked, filtered results for `query`, at most `top_n` (or the
    /// configured default) long.
    pub async fn search(
        &self,
        query: &str,
        top_n: Option<usize>,
    ) -> Result<Vec<RankedCandidate>, SearchError> {
        Ok(self.run(query, top_n).await?.results)
    }

    /// Like [`search`](Self::search), with counts for each stage.
    pub async fn run(
        &self,
        query: &str,
        top_n: Option<usize>,
    ) -> Result<SearchReport, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let rules = self.rules().ok_or_else(|| {
            tracing::warn!(
                stage = %SearchStage::Filtering,
                "search failed: no filter rules loaded"
            );
            SearchError::RulesUnavailable
        })?;

        tracing::debug!(stage = %SearchStage::Embedding, "search started");
        let embedding = self.embed(query).await.map_err(|err| {
            tracing::warn!(stage = %SearchStage::Embedding, "search failed: {err}");
            SearchError::Embedding(err)
        })?;

        tracing::debug!(stage = %SearchStage::Ranking, dims = embedding.len());
        let corpus = self.corpus.snapshot().ok_or_else(|| {
            tracing::warn!(stage = %SearchStage::Ranking, "search failed: no corpus loaded");
            SearchError::CorpusUnavailable
        })?;
        let ranked = rank(
            &embedding,
            corpus.vectors(),
            &self.controls.rank_options(top_n),
        );

        tracing::debug!(stage = %SearchStage::Filtering, candidates = ranked.len());
        let bound = rules.bind(query);
        let ranked_count = ranked.len();
        let results: Vec<RankedCandidate> = ranked
            .into_iter()
            .filter(|candidate| bound.passes(&candidate.job))
            .collect();

        let report = SearchReport {
            ranked: ranked_count,
            rules_applied: bound.applicable().len(),
            excluded: ranked_count - results.len(),
            results,
        };
        tracing::debug!(
            stage = %SearchStage::Done,
            results = report.results.len(),
            excluded = report.excluded
        );
        Ok(report)
    }

    async fn embed(&self, query: &str) -> Result<Vec<f32>, UpstreamError> {
        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();
        let limit = self.controls.embed_timeout();
        let task = tokio::task::spawn_blocking(move || embedder.embed(&text));
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(UpstreamError::Task(join.to_string())),
            Err(_) => Err(UpstreamError::Timeout(limit)),
        }
    }

    /// Explains `candidates`; `None` when no explainer is configured.
    pub async fn explain(
        &self,
        query: &str,
        candidates: &[RankedCandidate],
    ) -> Option<Explanation> {
        let explainer = self.explainer.clone()?;
        let text = query.to_string();
        let owned = candidates.to_vec();
        match tokio::task::spawn_blocking(move || explainer.explain(&text, &owned)).await {
            Ok(explanation) => Some(explanation),
            Err(err) => {
                tracing::error!("explanation task failed: {err}");
                Some(Explanation::unavailable())
            }
        }
    }

    /// Postings matching `filter`, plus facet values over the whole corpus.
    pub fn browse(&self, filter: &BrowseFilter) -> Result<(Vec<JobRecord>, Facets), SearchError> {
        let corpus = self.corpus.snapshot().ok_or(SearchError::CorpusUnavailable)?;
        let facets = Facets::collect(corpus.jobs());
        let jobs = filter.apply(corpus.jobs()).into_iter().cloned().collect();
        Ok((jobs, facets))
    }

    /// Re-reads the corpus and, when configured, the rule table. Both are
    /// read before either is swapped in; any failure keeps what was loaded
    /// before.
    pub fn reload(&self) -> Result<ReloadSummary, DataError> {
        let corpus = self.corpus.read_source()?;
        let rules = match &self.rules_path {
            Some(path) => Some(Arc::new(load_rule_set(path)?)),
            None => None,
        };

        self.corpus.install(Arc::clone(&corpus));
        if let Some(rules) = &rules {
            *self.rules.write() = Some(Arc::clone(rules));
        }
        let rule_count = rules.or_else(|| self.rules()).map_or(0, |rules| rules.len());
        Ok(ReloadSummary {
            jobs: corpus.jobs().len(),
            vectors: corpus.len(),
            rules: rule_count,
        })
    }
}

/// Sizes after a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    /// Postings available for browsing.
    pub jobs: usize,
    /// Embedded postings.
    pub vectors: usize,
    /// Compiled rules.
    pub rules: usize,
}
