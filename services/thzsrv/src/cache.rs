//! Block cache keyed by register address
//!
//! All fields of a block share one cached payload, so a burst of field reads
//! costs one handshake per block and TTL window.
//!
//! # Thread Safety
//! Uses `DashMap` for per-bucket locking. A hit never touches the link lock;
//! fetches are serialized by the caller holding that lock.

use bytes::Bytes;
use dashmap::DashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::Result;

/// Default block lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CacheEntry {
    fetched_at: Instant,
    payload: Bytes,
}

#[derive(Debug)]
pub struct BlockCache {
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

impl BlockCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Payload younger than the TTL
    #[inline]
    pub fn get_fresh(&self, key: &str) -> Option<Bytes> {
        self.entries
            .get(key)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.payload.clone())
    }

    pub fn insert(&self, key: &str, payload: Bytes) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                fetched_at: Instant::now(),
                payload,
            },
        );
    }

    /// Cached payload, or the result of `fetch` stored under `key`
    ///
    /// Fetch errors are returned unchanged and leave any stale entry in place.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes>>,
    {
        if let Some(payload) = self.get_fresh(key) {
            tracing::trace!("BlockCache: hit {}", key);
            return Ok(payload);
        }

        tracing::debug!("BlockCache: miss {}, fetching", key);
        let payload = fetch().await?;
        self.insert(key, payload.clone());
        Ok(payload)
    }

    pub fn invalidate(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            tracing::debug!("BlockCache: invalidated {}", key);
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
