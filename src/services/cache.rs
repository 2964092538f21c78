use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use tracing::debug;

use crate::models::learning::QuestionEffectivenessScore;

/// Bounded memo table with least-recently-used eviction.
pub struct MemoCache<K: Hash + Eq, V: Clone> {
    entries: Mutex<LruCache<K, V>>,
    name: &'static str,
}

impl<K: Hash + Eq, V: Clone> MemoCache<K, V> {
    /// A capacity of zero is raised to one.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            name,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        entries.get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
            debug!(target: "app::feedback", cache = self.name, "cache cleared");
        }
    }
}

pub type EffectivenessScoreCache = MemoCache<String, QuestionEffectivenessScore>;

impl EffectivenessScoreCache {
    pub fn with_capacity(capacity: usize) -> Self {
        MemoCache::new("question_effectiveness", capacity)
    }
}
