//! Cosine-similarity ranking of job vectors against a query vector.

use std::cmp::Ordering;

use serde::Serialize;

use crate::corpus::{JobId, JobRecord};
use crate::embeddings::JobVector;

/// Default similarity floor; only strictly greater scores survive.
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.5;
/// Default number of results.
pub const DEFAULT_TOP_N: usize = 10;
/// Output width of `BAAI/bge-large-en-v1.5`.
pub const DEFAULT_DIMENSIONS: usize = 1024;

/// Knobs for a single ranking pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankOptions {
    /// Candidates must score strictly above this.
    pub min_similarity: f32,
    /// Maximum number of candidates returned.
    pub top_n: usize,
    /// Required embedding width.
    pub dimensions: usize,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            min_similarity: DEFAULT_MIN_SIMILARITY,
            top_n: DEFAULT_TOP_N,
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

/// A job that cleared the similarity threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    /// Job identifier.
    pub job_id: JobId,
    /// Cosine similarity to the query.
    pub similarity: f32,
    /// Full posting.
    pub job: JobRecord,
}

/// Cosine similarity; zero-norm or mismatched inputs score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Scores every vector against `query`, keeps those strictly above
/// `min_similarity`, and returns the best `top_n` in descending order.
///
/// Vectors whose width differs from `options.dimensions` are skipped with a
/// warning. Equal scores keep their corpus order.
pub fn rank<'a, I>(query: &[f32], vectors: I, options: &RankOptions) -> Vec<RankedCandidate>
where
    I: IntoIterator<Item = &'a JobVector>,
{
    if query.len() != options.dimensions {
        tracing::warn!(
            expected = options.dimensions,
            actual = query.len(),
            "query embedding has the wrong width; nothing to rank"
        );
        return Vec::new();
    }

    let mut skipped = 0usize;
    let mut scored: Vec<(&JobVector, f32)> = Vec::new();
    for vector in vectors {
        if vector.dimensions() != options.dimensions {
            skipped += 1;
            tracing::warn!(
                job_id = %vector.id,
                expected = options.dimensions,
                actual = vector.dimensions(),
                "skipping job vector with mismatched dimensions"
            );
            continue;
        }
        let similarity = cosine_similarity(query, &vector.embedding);
        if similarity > options.min_similarity {
            scored.push((vector, similarity));
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "ranking ignored mismatched vectors");
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(options.top_n);
    scored
        .into_iter()
        .map(|(vector, similarity)| RankedCandidate {
            job_id: vector.id.clone(),
            similarity,
            job: vector.data.clone(),
        })
        .collect()
}
