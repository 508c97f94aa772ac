// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! TTL-based retrieval result caching
//!
//! Entries are keyed by a SHA-256 fingerprint of `(query, k)`. Expiry is lazy: an
//! entry older than the TTL is treated as absent and removed when looked up. Size
//! is bounded by evicting the oldest entry before inserting a new key at capacity.
//! Eviction is a linear scan, fine for tens to thousands of entries.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::vector::RetrievalResult;

/// Time source for expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().map(|o| *o).unwrap_or_default();
        self.start + offset
    }
}

/// Fingerprint of a retrieval request
///
/// The query is length-prefixed so distinct `(query, k)` pairs never collide on
/// concatenation.
pub fn fingerprint(query: &str, k: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update((query.len() as u64).to_le_bytes());
    hasher.update(query.as_bytes());
    hasher.update((k as u64).to_le_bytes());
    format!("{:x}", hasher.finalize())
}

struct CachedEntry {
    results: Vec<RetrievalResult>,
    inserted_at: Instant,
    /// Insertion order, breaks ties between equal timestamps
    seq: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CachedEntry>,
    next_seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries physically present, including expired ones not yet looked up
    pub size: usize,
    /// Expired entries (not yet removed)
    pub expired: usize,
    pub max_size: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Bounded TTL cache for ranked retrieval results
pub struct RetrievalCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    max_size: usize,
    normalize_queries: bool,
    clock: Arc<dyn Clock>,
}

impl RetrievalCache {
    /// Create a new retrieval cache
    ///
    /// # Arguments
    /// * `ttl` - Time-to-live for cache entries
    /// * `max_size` - Maximum number of entries to store (at least 1)
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
            max_size: max_size.max(1),
            normalize_queries: false,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let mut cache = Self::new(Duration::from_secs(config.ttl_secs), config.max_size);
        cache.normalize_queries = config.normalize_queries;
        cache
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Trim and lowercase queries before fingerprinting
    pub fn with_normalized_queries(mut self, normalize: bool) -> Self {
        self.normalize_queries = normalize;
        self
    }

    fn key(&self, query: &str, k: usize) -> String {
        if self.normalize_queries {
            fingerprint(&query.trim().to_lowercase(), k)
        } else {
            fingerprint(query, k)
        }
    }

    fn is_expired(&self, entry: &CachedEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) > self.ttl
    }

    /// Get cached results for a query
    ///
    /// Returns None if not found or expired. An expired entry is removed.
    pub fn get(&self, query: &str, k: usize) -> Option<Vec<RetrievalResult>> {
        let key = self.key(query, k);
        let now = self.clock.now();
        let mut state = self.state.lock().ok()?;

        let expired = match state.entries.get(&key) {
            None => {
                state.misses += 1;
                debug!("Retrieval cache miss (k={})", k);
                return None;
            }
            Some(entry) => self.is_expired(entry, now),
        };

        if expired {
            state.entries.remove(&key);
            state.misses += 1;
            debug!("Retrieval cache entry expired (k={})", k);
            return None;
        }

        state.hits += 1;
        debug!("Retrieval cache hit (k={})", k);
        state.entries.get(&key).map(|entry| entry.results.clone())
    }

    /// Insert results into cache
    ///
    /// Overwriting an existing key never evicts another entry.
    pub fn set(&self, query: &str, k: usize, results: Vec<RetrievalResult>) {
        let key = self.key(query, k);
        let now = self.clock.now();
        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(_) => {
                warn!("Retrieval cache lock poisoned, result not cached");
                return;
            }
        };

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_size {
            Self::evict_oldest(&mut state);
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key,
            CachedEntry {
                results,
                inserted_at: now,
                seq,
            },
        );
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.clear();
        }
    }

    /// Number of entries physically present
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let (size, expired, hits, misses, evictions) = match self.state.lock() {
            Ok(state) => (
                state.entries.len(),
                state
                    .entries
                    .values()
                    .filter(|e| self.is_expired(e, now))
                    .count(),
                state.hits,
                state.misses,
                state.evictions,
            ),
            Err(_) => (0, 0, 0, 0, 0),
        };

        CacheStats {
            size,
            expired,
            max_size: self.max_size,
            ttl_seconds: self.ttl.as_secs(),
            hits,
            misses,
            evictions,
        }
    }

    /// Evict the oldest entry from the cache
    fn evict_oldest(state: &mut CacheState) {
        if let Some(oldest_key) = state
            .entries
            .iter()
            .min_by_key(|(_, v)| (v.inserted_at, v.seq))
            .map(|(k, _)| k.clone())
        {
            state.entries.remove(&oldest_key);
            state.evictions += 1;
            debug!("Evicted oldest retrieval cache entry");
        }
    }
}

impl std::fmt::Debug for RetrievalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalCache")
            .field("ttl", &self.ttl)
            .field("max_size", &self.max_size)
            .field("normalize_queries", &self.normalize_queries)
            .finish()
    }
}
