use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use super::QueryEmbedder;
use crate::error::UpstreamError;

/// Keeps recent query embeddings in memory in front of another embedder.
///
/// Keys are the exact query text. Failures are not cached.
pub struct CachedEmbedder {
    inner: Arc<dyn QueryEmbedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachedEmbedder {
    /// Wraps `inner`; returns `inner` unchanged when `size` is zero.
    pub fn wrap(inner: Arc<dyn QueryEmbedder>, size: usize) -> Arc<dyn QueryEmbedder> {
        match NonZeroUsize::new(size) {
            Some(capacity) => Arc::new(Self {
                inner,
                cache: Mutex::new(LruCache::new(capacity)),
            }),
            None => inner,
        }
    }
}

impl QueryEmbedder for CachedEmbedder {
    fn embed(&self, query: &str) -> Result<Vec<f32>, UpstreamError> {
        if let Some(hit) = self.cache.lock().get(query).cloned() {
            return Ok(hit);
        }
        let embedding = self.inner.embed(query)?;
        self.cache.lock().put(query.to_string(), embedding.clone());
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl QueryEmbedder for Counting {
        fn embed(&self, query: &str) -> Result<Vec<f32>, UpstreamError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            if query == "fail" {
                return Err(UpstreamError::Empty);
            }
            Ok(vec![query.len() as f32])
        }
    }

    #[test]
    fn repeated_queries_hit_the_cache() {
        let inner = Arc::new(Counting::default());
        let cached = CachedEmbedder::wrap(inner.clone(), 2);
        assert_eq!(cached.embed("rust").expect("embed"), vec![4.0]);
        assert_eq!(cached.embed("rust").expect("embed"), vec![4.0]);
        assert!(cached.embed("fail").is_err());
        assert!(cached.embed("fail").is_err());
        assert_eq!(inner.0.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn zero_size_disables_caching() {
        let inner = Arc::new(Counting::default());
        let cached = CachedEmbedder::wrap(inner.clone(), 0);
        cached.embed("go").expect("embed");
        cached.embed("go").expect("embed");
        assert_eq!(inner.0.load(Ordering::SeqCst), 2);
    }
}
