use lru::LruCache;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Stable key over `(normalized text, model, system prompt)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Whitespace runs in `text` collapse to one space, so reflowed selections
    /// share an entry.
    pub fn new(text: &str, model: &str, system_prompt: &str) -> Self {
        let normalized = WHITESPACE.replace_all(text.trim(), " ");
        let prompt_id = hex::encode(Sha256::digest(system_prompt.as_bytes()));

        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hasher.update([0u8]);
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(prompt_id.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: String,
    fetched_at: Instant,
}

/// In-memory cache of rewrite results.
///
/// Entries older than the TTL are treated as absent and dropped on lookup;
/// the least recently used entry is evicted once `capacity` is reached.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<Mutex<LruCache<CacheKey, CacheEntry>>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            ttl,
        }
    }

    /// Returns a fresh cached result for `key`.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => {
                return Some(entry.result.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    pub async fn insert(&self, key: CacheKey, result: String) {
        let mut entries = self.entries.lock().await;
        entries.put(
            key,
            CacheEntry {
                result,
                fetched_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
