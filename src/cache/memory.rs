//! In-process validation cache with TTL expiry and bounded size.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheError, CacheState, ValidationCache};
use crate::domain::RedemptionCode;

#[derive(Debug)]
struct Entry {
    state: CacheState,
    written_at: Instant,
}

/// Hit/miss counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    /// Lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that found nothing (or an expired entry).
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Entries dropped to make room.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

/// TTL cache held in a `RwLock<HashMap>`.
///
/// When full, the oldest entry is evicted. Eviction only costs latency: the
/// next scan of that code falls back to the store.
#[derive(Debug)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<RedemptionCode, Entry>>,
    ttl: Duration,
    max_entries: usize,
    stats: CacheStats,
    offline: AtomicBool,
}

impl InMemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            stats: CacheStats::default(),
            offline: AtomicBool::new(false),
        }
    }

    /// Counters for this cache.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of live and expired-but-unswept entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Fault injection: while `false`, every call fails with
    /// [`CacheError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), CacheError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("in-memory cache offline".to_string()));
        }
        Ok(())
    }

    fn evict_oldest(&self, entries: &mut HashMap<RedemptionCode, Entry>) {
        let oldest = entries
            .iter()
            .min_by_key(|(_, e)| e.written_at)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            entries.remove(&key);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl ValidationCache for InMemoryCache {
    async fn get(&self, code: &RedemptionCode) -> Result<CacheState, CacheError> {
        self.ensure_available()?;
        {
            let entries = self.entries.read().await;
            match entries.get(code) {
                Some(entry) if entry.written_at.elapsed() <= self.ttl => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.state);
                }
                Some(_) => {}
                None => {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    return Ok(CacheState::Unknown);
                }
            }
        }
        // Expired: drop it so the map does not grow with dead codes.
        self.entries.write().await.remove(code);
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        Ok(CacheState::Unknown)
    }

    async fn set(&self, code: &RedemptionCode, state: CacheState) -> Result<(), CacheError> {
        self.ensure_available()?;
        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries && !entries.contains_key(code) {
            self.evict_oldest(&mut entries);
        }
        entries.insert(
            code.clone(),
            Entry {
                state,
                written_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn invalidate(&self, code: &RedemptionCode) -> Result<(), CacheError> {
        self.ensure_available()?;
        self.entries.write().await.remove(code);
        Ok(())
    }
}
