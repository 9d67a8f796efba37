//! Search tuning and provider settings shared across binaries.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use crate::corpus::CorpusSource;
use crate::embedder::remote::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::embedder::RemoteEmbedder;
use crate::error::UpstreamError;
use crate::explain::{
    ChatProvider, Explainer, ExplainerConfig, DEFAULT_FALLBACK_MODEL, DEFAULT_PRIMARY_MODEL,
};
use crate::ranker::{RankOptions, DEFAULT_DIMENSIONS, DEFAULT_MIN_SIMILARITY, DEFAULT_TOP_N};

/// Tunable knobs that bound a search.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchControls {
    top_n: usize,
    min_similarity: f32,
    dimensions: usize,
    embed_timeout: Duration,
}

impl SearchControls {
    /// Constructs a new set of search controls.
    pub fn new(
        top_n: usize,
        min_similarity: f32,
        dimensions: usize,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            top_n,
            min_similarity,
            dimensions,
            embed_timeout,
        }
    }

    /// Default number of results.
    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Similarity floor; results must score strictly above it.
    pub fn min_similarity(&self) -> f32 {
        self.min_similarity
    }

    /// Expected embedding width.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Upper bound on one embedding call.
    pub fn embed_timeout(&self) -> Duration {
        self.embed_timeout
    }

    /// Ranking options, with `top_n` overriding the default when given.
    pub fn rank_options(&self, top_n: Option<usize>) -> RankOptions {
        RankOptions {
            min_similarity: self.min_similarity,
            top_n: top_n.unwrap_or(self.top_n),
            dimensions: self.dimensions,
        }
    }
}

impl Default for SearchControls {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            dimensions: DEFAULT_DIMENSIONS,
            embed_timeout: Duration::from_secs(30),
        }
    }
}

/// Command-line arguments shared by binaries that build a search engine.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Job vector store (`.json` map or `.jsonl` rows)
    #[arg(long, env = "JOBSCOUT_VECTORS", default_value = "job_vectors.json")]
    pub vectors: PathBuf,

    /// Optional listing file used for browsing (defaults to the vector store postings)
    #[arg(long, env = "JOBSCOUT_JOBS")]
    pub jobs: Option<PathBuf>,

    /// Filter rule table (JSON); no rules are applied when unset
    #[arg(long, env = "JOBSCOUT_RULES")]
    pub rules: Option<PathBuf>,

    /// Maximum number of results
    #[arg(long, env = "JOBSCOUT_TOP_N", default_value_t = DEFAULT_TOP_N)]
    pub top_n: usize,

    /// Results must score strictly above this cosine similarity
    #[arg(long, env = "JOBSCOUT_MIN_SIMILARITY", default_value_t = DEFAULT_MIN_SIMILARITY)]
    pub min_similarity: f32,

    /// Embedding width expected from the model and the vector store
    #[arg(long, env = "JOBSCOUT_DIMENSIONS", default_value_t = DEFAULT_DIMENSIONS)]
    pub dimensions: usize,

    /// API key for the embedding and chat endpoints
    #[arg(long, env = "TOGETHER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "JOBSCOUT_API_BASE", default_value = DEFAULT_BASE_URL)]
    pub api_base: String,

    /// Embedding model identifier
    #[arg(long, env = "JOBSCOUT_EMBEDDING_MODEL", default_value = DEFAULT_MODEL)]
    pub embedding_model: String,

    /// Seconds to wait for one query embedding
    #[arg(long, env = "JOBSCOUT_EMBED_TIMEOUT", default_value_t = 30)]
    pub embed_timeout_secs: u64,

    /// Attempts per embedding request, including the first
    #[arg(long, env = "JOBSCOUT_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: usize,

    /// Chat model used for explanations
    #[arg(long, env = "JOBSCOUT_EXPLAIN_MODEL", default_value = DEFAULT_PRIMARY_MODEL)]
    pub explain_model: String,

    /// Chat model tried when the explanation model fails
    #[arg(long, env = "JOBSCOUT_FALLBACK_MODEL", default_value = DEFAULT_FALLBACK_MODEL)]
    pub fallback_model: String,

    /// Maximum results included in an explanation prompt
    #[arg(long, env = "JOBSCOUT_EXPLAIN_MAX_JOBS", default_value_t = 10)]
    pub explain_max_jobs: usize,

    /// Seconds to wait for one explanation reply
    #[arg(long, env = "JOBSCOUT_EXPLAIN_TIMEOUT", default_value_t = 120)]
    pub explain_timeout_secs: u64,
}

impl EngineArgs {
    /// Converts the parsed arguments into `SearchControls`.
    pub fn build_controls(&self) -> SearchControls {
        SearchControls::new(
            self.top_n,
            self.min_similarity,
            self.dimensions,
            Duration::from_secs(self.embed_timeout_secs),
        )
    }

    /// Files the corpus store reads from.
    pub fn corpus_source(&self) -> CorpusSource {
        CorpusSource {
            vectors: self.vectors.clone(),
            jobs: self.jobs.clone(),
        }
    }

    /// Builds the query embedder.
    pub fn build_embedder(&self) -> Result<RemoteEmbedder, UpstreamError> {
        RemoteEmbedder::new(
            self.api_key(),
            &self.api_base,
            self.embedding_model.clone(),
            Duration::from_secs(self.embed_timeout_secs),
            self.max_retries,
        )
    }

    /// Builds the explanation generator.
    pub fn build_explainer(&self) -> Result<Explainer, UpstreamError> {
        let provider = ChatProvider::new(
            self.api_key(),
            &self.api_base,
            Duration::from_secs(self.explain_timeout_secs),
        )?;
        Ok(Explainer::new(
            Arc::new(provider),
            ExplainerConfig {
                primary_model: self.explain_model.clone(),
                fallback_model: self.fallback_model.clone(),
                max_jobs: self.explain_max_jobs,
                ..ExplainerConfig::default()
            },
        ))
    }

    fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        engine: EngineArgs,
    }

    #[test]
    fn defaults_match_ranker_defaults() {
        let harness = Harness::parse_from(["test", "--api-key", "k"]);
        let controls = harness.engine.build_controls();
        assert_eq!(controls.top_n(), DEFAULT_TOP_N);
        assert_eq!(controls.dimensions(), DEFAULT_DIMENSIONS);
        assert_eq!(controls.rank_options(Some(3)).top_n, 3);
        assert_eq!(controls.rank_options(None).top_n, DEFAULT_TOP_N);
        assert_eq!(harness.engine.explain_model, DEFAULT_PRIMARY_MODEL);
    }

    #[test]
    fn missing_key_fails_provider_construction() {
        let harness = Harness::parse_from(["test", "--api-key", ""]);
        assert!(matches!(
            harness.engine.build_embedder(),
            Err(UpstreamError::Credential(_))
        ));
        assert!(matches!(
            harness.engine.build_explainer(),
            Err(UpstreamError::Credential(_))
        ));
    }
}
