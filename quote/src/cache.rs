//! Time-bounded caches with lazy expiry.

use std::hash::Hash;
use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use intentroute_common::{constants, Clock, IntentError, Quote, QuoteId, Result, Timestamp};
use tracing::{debug, info, warn};

/// Cached entry.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Timestamp,
}

impl<V> CacheEntry<V> {
    fn is_live_at(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

/// Concurrent map whose entries expire at a fixed instant.
///
/// Expired entries are invisible to readers and dropped when read. A full
/// cache sweeps expired entries before accepting an insert. Live entries are
/// never dropped, so `max_entries` is a soft bound.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a new cache.
    pub fn new(clock: Arc<dyn Clock>, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            max_entries: max_entries.max(1),
        }
    }

    /// Get a live value.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?;
        if entry.is_live_at(now) {
            return Some(entry.value.clone());
        }

        drop(entry);
        // Another writer may have refreshed the key in between.
        self.entries.remove_if(key, |_, e| !e.is_live_at(now));
        None
    }

    /// Insert a value live until `expires_at`. Last write wins.
    pub fn insert_until(&self, key: K, value: V, expires_at: Timestamp) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            let evicted = self.evict_expired();
            if self.entries.len() >= self.max_entries {
                warn!(
                    entries = self.entries.len(),
                    max_entries = self.max_entries,
                    evicted,
                    "Cache over capacity with only live entries"
                );
            }
        }
        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Insert a value live for `ttl` from now.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.insert_until(key, value, expires_at);
    }

    /// Remove a key.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, e)| e.value)
    }

    /// Drop every expired entry, returning how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live_at(now));
        before.saturating_sub(self.entries.len())
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let total = self.entries.len();
        let valid = self.entries.iter().filter(|e| e.is_live_at(now)).count();

        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
        }
    }
}

/// Configuration for the quote cache.
#[derive(Debug, Clone)]
pub struct QuoteCacheConfig {
    /// Maximum number of stored quotes.
    pub max_entries: usize,
    /// Interval of the optional background sweeper.
    pub sweep_interval: Duration,
}

impl Default for QuoteCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            sweep_interval: constants::cache_sweep_interval(),
        }
    }
}

/// Issued quotes, keyed by id, live until their own expiry.
pub struct QuoteCache {
    inner: TtlCache<QuoteId, Quote>,
    config: QuoteCacheConfig,
}

impl QuoteCache {
    /// Create a quote cache with default configuration.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(clock, QuoteCacheConfig::default())
    }

    /// Create a quote cache with custom configuration.
    pub fn with_config(clock: Arc<dyn Clock>, config: QuoteCacheConfig) -> Self {
        Self {
            inner: TtlCache::new(clock, config.max_entries),
            config,
        }
    }

    /// Store a quote until its `expires_at`.
    pub fn put(&self, quote: Quote) {
        debug!(quote_id = %quote.id, expires_at = %quote.expires_at, "Caching quote");
        let expires_at = quote.expires_at;
        self.inner.insert_until(quote.id, quote, expires_at);
    }

    /// Get a live quote.
    ///
    /// Unknown and expired ids are indistinguishable to the caller.
    pub fn get(&self, id: &QuoteId) -> Result<Quote> {
        self.inner
            .get(id)
            .ok_or(IntentError::QuoteExpiredOrInvalid(*id))
    }

    /// Drop expired quotes.
    pub fn evict_expired(&self) -> usize {
        self.inner.evict_expired()
    }

    /// Number of stored quotes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    /// Periodically sweep expired quotes. Never returns; spawn it.
    pub async fn run_sweeper(self: Arc<Self>) {
        let interval = self
            .config
            .sweep_interval
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60));
        loop {
            tokio::time::sleep(interval).await;
            let evicted = self.evict_expired();
            if evicted > 0 {
                info!(evicted, remaining = self.len(), "Swept expired quotes");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intentroute_common::{
        Address, AmountType, ManualClock, NetworkId, OperationParams, ProviderQuote, TokenInfo,
    };
    use rust_decimal_macros::dec;

    fn make_quote(clock: &ManualClock, ttl: Duration) -> Quote {
        let usdt = TokenInfo::new(Address::new("0x55d398326f99059ff775485246999027b3197955"), 18, "USDT");
        let cake = TokenInfo::new(Address::new("0x0e09fabb73bd3ade0a17ecc321fd13a19e81ce82"), 18, "CAKE");
        let params = OperationParams::swap(
            NetworkId::bnb(),
            usdt.address.as_str(),
            cake.address.as_str(),
            "10",
            AmountType::Input,
        )
        .unwrap();

        Quote::issue(
            ProviderQuote::new(usdt, cake, dec!(10), dec!(4)),
            "test",
            params,
            Address::new("0x00000000000000000000000000000000000000aa"),
            clock.now(),
            ttl,
        )
    }

    #[test]
    fn test_quote_cache_put_and_get() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = QuoteCache::new(clock.clone());
        let quote = make_quote(&clock, Duration::minutes(5));

        cache.put(quote.clone());

        let cached = cache.get(&quote.id).unwrap();
        assert_eq!(cached.id, quote.id);
        assert_eq!(cached.to_amount, dec!(4));
    }

    #[test]
    fn test_unknown_quote_is_invalid() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = QuoteCache::new(clock);

        let result = cache.get(&QuoteId::new());
        assert!(matches!(result, Err(IntentError::QuoteExpiredOrInvalid(_))));
    }

    #[test]
    fn test_expired_quote_is_invalid_and_dropped() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = QuoteCache::new(clock.clone());
        let quote = make_quote(&clock, Duration::minutes(5));
        cache.put(quote.clone());

        clock.advance(Duration::minutes(5) - Duration::milliseconds(1));
        assert!(cache.get(&quote.id).is_ok());

        clock.advance(Duration::milliseconds(1));
        assert!(matches!(
            cache.get(&quote.id),
            Err(IntentError::QuoteExpiredOrInvalid(id)) if id == quote.id
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache: TtlCache<&str, u32> = TtlCache::new(clock, 10);

        cache.insert_with_ttl("k", 1, Duration::seconds(30));
        cache.insert_with_ttl("k", 2, Duration::seconds(30));

        assert_eq!(cache.get(&"k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stats_and_sweep() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache: TtlCache<u32, u32> = TtlCache::new(clock.clone(), 10);
        cache.insert_with_ttl(1, 1, Duration::seconds(10));
        cache.insert_with_ttl(2, 2, Duration::seconds(60));

        clock.advance(Duration::seconds(30));

        assert_eq!(
            cache.stats(),
            CacheStats {
                total_entries: 2,
                valid_entries: 1,
                expired_entries: 1
            }
        );
        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_only_expired_entries() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache: TtlCache<u32, u32> = TtlCache::new(clock.clone(), 2);
        cache.insert_with_ttl(1, 1, Duration::seconds(10));
        cache.insert_with_ttl(2, 2, Duration::seconds(60));

        // Full of live entries: nothing is dropped.
        cache.insert_with_ttl(3, 3, Duration::seconds(60));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&1), Some(1));
        assert_eq!(cache.get(&2), Some(2));

        clock.advance(Duration::seconds(61));
        cache.insert_with_ttl(4, 4, Duration::seconds(60));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&4), Some(4));
    }

    #[test]
    fn test_full_quote_cache_keeps_live_quotes() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = QuoteCache::with_config(
            clock.clone(),
            QuoteCacheConfig {
                max_entries: 2,
                ..QuoteCacheConfig::default()
            },
        );
        let first = make_quote(&clock, Duration::minutes(5));
        cache.put(first.clone());
        cache.put(make_quote(&clock, Duration::minutes(6)));
        cache.put(make_quote(&clock, Duration::minutes(6)));

        assert!(first.is_live_at(clock.now()));
        assert_eq!(cache.get(&first.id).unwrap().id, first.id);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_concurrent_inserts() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = Arc::new(TtlCache::<u32, u32>::new(clock, 1000));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        cache.insert_with_ttl(t * 100 + i, i, Duration::seconds(30));
                        let _ = cache.get(&(t * 100));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 400);
    }
}
