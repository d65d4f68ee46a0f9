//! Aggregate cache holding merged non-price metadata per symbol

use crate::types::CachedAggregate;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Cache of merged metadata keyed by normalized symbol
///
/// Entries are replaced whole on `put` and disappear after their TTL.
#[async_trait]
pub trait AggregateCache: Send + Sync {
    /// Returns the live entry for `symbol`, if any
    async fn get(&self, symbol: &str) -> Option<CachedAggregate>;

    /// Stores `aggregate` for `symbol` for `ttl`
    async fn put(&self, symbol: &str, aggregate: CachedAggregate, ttl: Duration);

    /// Number of entries that have not yet expired
    async fn live_entries(&self) -> usize;
}

#[derive(Debug, Clone)]
struct CacheSlot {
    aggregate: CachedAggregate,
    expires_at: Instant,
}

impl CacheSlot {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory [`AggregateCache`]
///
/// Expired slots are skipped on read and swept on the next write.
pub struct MemoryAggregateCache {
    slots: RwLock<HashMap<String, CacheSlot>>,
}

impl MemoryAggregateCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryAggregateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AggregateCache for MemoryAggregateCache {
    async fn get(&self, symbol: &str) -> Option<CachedAggregate> {
        let slots = self.slots.read().await;
        let slot = slots.get(symbol)?;

        if slot.is_expired(Instant::now()) {
            tracing::debug!(symbol, "Cached aggregate expired");
            return None;
        }

        Some(slot.aggregate.clone())
    }

    async fn put(&self, symbol: &str, aggregate: CachedAggregate, ttl: Duration) {
        let now = Instant::now();
        let mut slots = self.slots.write().await;
        slots.retain(|_, slot| !slot.is_expired(now));
        slots.insert(
            symbol.to_string(),
            CacheSlot {
                aggregate,
                expires_at: now + ttl,
            },
        );
        tracing::debug!(symbol, ttl_secs = ttl.as_secs(), "Cached aggregate");
    }

    async fn live_entries(&self) -> usize {
        let now = Instant::now();
        let slots = self.slots.read().await;
        slots.values().filter(|slot| !slot.is_expired(now)).count()
    }
}
