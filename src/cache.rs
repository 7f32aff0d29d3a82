use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fetcher::{FetchError, JobFeed};
use crate::filters::NormalizedQuery;
use crate::models::JobListing;
use crate::store::KvStore;

pub const CACHE_KEY: &str = "jobsData";
pub const CACHE_TTL_MS: i64 = 3_600_000;

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Vec<JobListing>,
    pub timestamp: i64,
}

impl CacheEntry {
    // Stored timestamps are untrusted input; saturate rather than overflow.
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis.saturating_sub(self.timestamp)
    }

    pub fn is_expired(&self, now_millis: i64, ttl_ms: i64) -> bool {
        self.age_millis(now_millis) > ttl_ms
    }
}

pub struct ListingCache {
    store: Box<dyn KvStore>,
    clock: Box<dyn Clock>,
    key: String,
    ttl_ms: i64,
}

impl ListingCache {
    pub fn new(store: Box<dyn KvStore>) -> Self {
        Self {
            store,
            clock: Box::new(SystemClock),
            key: CACHE_KEY.to_string(),
            ttl_ms: CACHE_TTL_MS,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ttl(mut self, ttl_ms: i64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn entry(&self) -> Result<Option<CacheEntry>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(None);
        };
        let entry = serde_json::from_str(&raw)
            .with_context(|| format!("Cached '{}' entry is not valid JSON", self.key))?;
        Ok(Some(entry))
    }

    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        !entry.is_expired(self.now_millis(), self.ttl_ms)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(&self.key)
    }

    fn write(&self, data: &[JobListing]) -> Result<()> {
        let entry = CacheEntry {
            data: data.to_vec(),
            timestamp: self.now_millis(),
        };
        self.store.set(&self.key, &serde_json::to_string(&entry)?)
    }
}

pub struct CachedFetcher<F> {
    inner: F,
    cache: ListingCache,
}

impl<F: JobFeed> CachedFetcher<F> {
    pub fn new(inner: F, cache: ListingCache) -> Self {
        Self { inner, cache }
    }

    fn cacheable(query: &NormalizedQuery, page: u32) -> bool {
        page <= 1 && query.is_empty()
    }
}

impl<F: JobFeed> JobFeed for CachedFetcher<F> {
    fn fetch(&self, query: &NormalizedQuery, page: u32) -> Result<Vec<JobListing>, FetchError> {
        if !Self::cacheable(query, page) {
            return self.inner.fetch(query, page);
        }

        let key = &self.cache.key;
        match self.cache.entry() {
            Ok(Some(entry)) if self.cache.is_fresh(&entry) => {
                debug!(key = %key, count = entry.data.len(), "serving listings from cache");
                return Ok(entry.data);
            }
            Ok(Some(_)) => debug!(key = %key, "cache entry expired"),
            Ok(None) => debug!(key = %key, "cache miss"),
            Err(e) => warn!(key = %key, error = %e, "ignoring unreadable cache entry"),
        }

        let jobs = self.inner.fetch(query, page)?;
        if let Err(e) = self.cache.write(&jobs) {
            warn!(key = %key, error = %e, "failed to update listing cache");
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::testing::{listings, StubTransport};
    use crate::fetcher::Fetcher;
    use crate::filters::{normalize, DraftFilters};
    use crate::source::JobSource;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    struct FixedClock(Arc<AtomicI64>);

    impl Clock for FixedClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn cache(store: &Arc<MemoryStore>, now: &Arc<AtomicI64>) -> ListingCache {
        ListingCache::new(Box::new(Arc::clone(store))).with_clock(Box::new(FixedClock(Arc::clone(now))))
    }

    fn setup() -> (CachedFetcher<Fetcher>, StubTransport, Arc<MemoryStore>, Arc<AtomicI64>) {
        let stub = StubTransport::default();
        let store = Arc::new(MemoryStore::new());
        let now = Arc::new(AtomicI64::new(1_700_000_000_000));
        let fetcher = Fetcher::new(JobSource::Ats, Box::new(stub.clone()));
        let cached = CachedFetcher::new(fetcher, cache(&store, &now));
        (cached, stub, store, now)
    }

    #[test]
    fn test_fresh_entry_skips_network() {
        let (cached, stub, store, now) = setup();
        stub.respond(Ok(listings(2)));
        let query = NormalizedQuery::default();

        assert_eq!(cached.fetch(&query, 1).unwrap().len(), 2);
        assert_eq!(stub.calls(), 1);
        assert!(store.get(CACHE_KEY).unwrap().is_some());

        now.fetch_add(CACHE_TTL_MS, Ordering::SeqCst);
        assert_eq!(cached.fetch(&query, 1).unwrap().len(), 2);
        assert_eq!(stub.calls(), 1);
    }

    #[test]
    fn test_expired_entry_refetches_and_rewrites() {
        let (cached, stub, _store, now) = setup();
        stub.respond(Ok(listings(2)));
        stub.respond(Ok(listings(5)));
        let query = NormalizedQuery::default();

        cached.fetch(&query, 1).unwrap();
        now.fetch_add(CACHE_TTL_MS + 1, Ordering::SeqCst);
        assert_eq!(cached.fetch(&query, 1).unwrap().len(), 5);
        assert_eq!(stub.calls(), 2);

        let entry = cached.cache.entry().unwrap().unwrap();
        assert_eq!(entry.data.len(), 5);
        assert_eq!(entry.timestamp, now.load(Ordering::SeqCst));
    }

    #[test]
    fn test_filtered_and_later_pages_bypass_cache() {
        let (cached, stub, store, _now) = setup();
        let mut draft = DraftFilters::new(JobSource::Ats);
        draft.set("title_filter", "Rust").unwrap();

        cached.fetch(&normalize(&draft), 1).unwrap();
        cached.fetch(&NormalizedQuery::default(), 2).unwrap();
        cached.fetch(&NormalizedQuery::default(), 2).unwrap();
        assert_eq!(stub.calls(), 3);
        assert_eq!(store.get(CACHE_KEY).unwrap(), None);
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let (cached, stub, store, _now) = setup();
        store.set(CACHE_KEY, "{not json").unwrap();
        stub.respond(Ok(listings(1)));

        assert_eq!(cached.fetch(&NormalizedQuery::default(), 1).unwrap().len(), 1);
        assert_eq!(stub.calls(), 1);
        assert!(cached.cache.entry().unwrap().is_some());
    }

    #[test]
    fn test_failures_are_not_cached() {
        let (cached, stub, store, _now) = setup();
        stub.respond(Err(FetchError::Network("timeout".into())));
        assert!(cached.fetch(&NormalizedQuery::default(), 1).is_err());
        assert_eq!(store.get(CACHE_KEY).unwrap(), None);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let (cached, stub, store, now) = setup();
        store
            .set(CACHE_KEY, r#"{"data":[],"timestamp":-9223372036854775808}"#)
            .unwrap();
        stub.respond(Ok(listings(3)));

        assert_eq!(cached.fetch(&NormalizedQuery::default(), 1).unwrap().len(), 3);
        assert_eq!(stub.calls(), 1);

        let ancient = CacheEntry {
            data: Vec::new(),
            timestamp: i64::MIN,
        };
        assert_eq!(ancient.age_millis(now.load(Ordering::SeqCst)), i64::MAX);
        assert!(ancient.is_expired(now.load(Ordering::SeqCst), CACHE_TTL_MS));

        let future = CacheEntry {
            data: Vec::new(),
            timestamp: i64::MAX,
        };
        assert!(future.age_millis(-1) < 0);
        assert!(!future.is_expired(i64::MIN, CACHE_TTL_MS));
    }

    #[test]
    fn test_listing_cache_show_and_clear() {
        let store = Arc::new(MemoryStore::new());
        let now = Arc::new(AtomicI64::new(10_000));
        let cache = cache(&store, &now);
        assert_eq!(cache.entry().unwrap(), None);

        cache.write(&listings(2)).unwrap();
        now.fetch_add(2_500, Ordering::SeqCst);
        let entry = cache.entry().unwrap().unwrap();
        assert_eq!(entry.age_millis(cache.now_millis()), 2_500);
        assert!(cache.is_fresh(&entry));

        cache.clear().unwrap();
        assert_eq!(cache.entry().unwrap(), None);
    }
}
