#![warn(missing_docs)]
//! Semantic job search: embed a free-text query, rank postings by cosine
//! similarity, and drop the ones that violate query-triggered rules.

pub mod browse;
pub mod controls;
pub mod corpus;
pub mod embedder;
pub mod embeddings;
pub mod error;
pub mod explain;
pub mod limiter;
pub mod logging;
pub mod ranker;
pub mod search;

pub use browse::{BrowseFilter, Facets};
pub use controls::{EngineArgs, SearchControls};
pub use corpus::{Corpus, CorpusSource, CorpusStore, JobId, JobRecord};
pub use embedder::{CachedEmbedder, QueryEmbedder, RemoteEmbedder};
pub use embeddings::{load_vectors, JobVector};
pub use error::{DataError, UpstreamError};
pub use explain::{Explainer, Explanation};
pub use limiter::{Admission, RateLimiter};
pub use ranker::{cosine_similarity, rank, RankOptions, RankedCandidate};
pub use search::{
    load_rule_set, ReloadSummary, SearchEngine, SearchError, SearchReport, SearchStage,
};

pub use filter_rules;
