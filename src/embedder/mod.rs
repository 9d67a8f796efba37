//! Query embedding adapters.

mod cache;
pub mod remote;

use crate::error::UpstreamError;

pub use cache::CachedEmbedder;
pub use remote::RemoteEmbedder;

/// Turns one query string into a dense vector.
///
/// Implementations are blocking; the search engine runs them on the blocking
/// pool under a timeout.
pub trait QueryEmbedder: Send + Sync {
    /// Embeds `query`, failing when the provider errors or returns no vector.
    fn embed(&self, query: &str) -> Result<Vec<f32>, UpstreamError>;
}
