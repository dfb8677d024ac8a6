pub mod snapshot;

use std::num::NonZeroUsize;

use lru::LruCache;
use tree_sitter::Tree;

/// Capacity for an LRU, treating zero as one.
pub(crate) fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

/// Bounded caches owned by one [`Pipeline`](crate::pipeline::Pipeline).
///
/// Holds the syntax trees of recently indexed files so callers can inspect
/// them after a run. Eviction only drops trees; graph contents are unaffected.
#[derive(Debug)]
pub struct CacheService {
    asts: LruCache<String, Tree>,
}

impl CacheService {
    pub fn new(ast_capacity: usize) -> Self {
        Self {
            asts: LruCache::new(capacity(ast_capacity)),
        }
    }

    pub fn store_ast(&mut self, path: &str, tree: Tree) {
        if let Some((evicted, _)) = self.asts.push(path.to_owned(), tree)
            && evicted != path
        {
            tracing::trace!("evicted syntax tree for {evicted}");
        }
    }

    pub fn ast(&self, path: &str) -> Option<&Tree> {
        self.asts.peek(path)
    }

    /// Paths with a cached tree, least recently stored first.
    pub fn ast_paths(&self) -> Vec<&str> {
        self.asts.iter().rev().map(|(k, _)| k.as_str()).collect()
    }

    pub fn clear(&mut self) {
        self.asts.clear();
    }
}
