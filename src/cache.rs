use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::record::ResultRecord;

/// One cached record set for a (source, query) fingerprint.
#[derive(Debug, Clone)]
struct CacheEntry {
    records: Vec<ResultRecord>,
    created_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at >= self.ttl
    }
}

/// Fingerprinted, TTL-bound cache of record sets.
///
/// Entries older than their ttl are treated as absent and evicted on the
/// read that observes them. Get/set go through the map's atomic entry
/// operations; last-writer-wins, since content for a fingerprint is
/// idempotent within the ttl window.
pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    default_ttl: Duration,
}

impl CacheStore {
    pub fn new(default_ttl_hours: i64) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl: Duration::hours(default_ttl_hours),
        }
    }

    /// Deterministic cache slot for a (source, normalized query) pair.
    pub fn fingerprint(source_id: &str, query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source_id.as_bytes());
        hasher.update(b":");
        hasher.update(normalize_query(query).as_bytes());
        format!("search:{}", hex::encode(hasher.finalize()))
    }

    /// Look up cached records; honors ttl and evicts expired entries.
    pub fn get(&self, source_id: &str, query: &str) -> Option<Vec<ResultRecord>> {
        let key = Self::fingerprint(source_id, query);

        if let Some(entry) = self.entries.get(&key) {
            if !entry.is_expired(Utc::now()) {
                debug!("Cache hit for source {} query {:?}", source_id, query);
                return Some(entry.records.clone());
            }
        }

        // Expired entry is treated as absent; purge it now.
        if self.entries.remove_if(&key, |_, e| e.is_expired(Utc::now())).is_some() {
            debug!("Evicted expired cache entry for source {}", source_id);
        }
        debug!("Cache miss for source {} query {:?}", source_id, query);
        None
    }

    /// Store records with the default ttl.
    pub fn set(&self, source_id: &str, query: &str, records: Vec<ResultRecord>) {
        self.set_with_ttl(source_id, query, records, self.default_ttl);
    }

    /// Store records with a custom ttl.
    pub fn set_with_ttl(
        &self,
        source_id: &str,
        query: &str,
        records: Vec<ResultRecord>,
        ttl: Duration,
    ) {
        let key = Self::fingerprint(source_id, query);
        debug!("Caching {} records for source {}", records.len(), source_id);
        self.entries.insert(
            key,
            CacheEntry { records, created_at: Utc::now(), ttl },
        );
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
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

/// Trim, lowercase and collapse internal whitespace so query variants
/// share one cache slot.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ResultRecord {
        let mut r = ResultRecord::new(name, "Test", "mcp_servers");
        r.url = format!("https://example.com/{name}");
        r
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  Memory   Server "), "memory server");
        assert_eq!(normalize_query("foo"), "foo");
    }

    #[test]
    fn test_fingerprint_ignores_query_formatting() {
        let a = CacheStore::fingerprint("src", "Memory  Server");
        let b = CacheStore::fingerprint("src", "memory server");
        let c = CacheStore::fingerprint("other", "memory server");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_set_get_round_trip() {
        let cache = CacheStore::new(24);
        cache.set("src", "memory", vec![record("Foo")]);

        let hit = cache.get("src", "Memory").expect("cache hit");
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].name, "Foo");
        assert!(cache.get("src", "other").is_none());
    }

    #[test]
    fn test_expired_entry_is_absent_and_purged() {
        let cache = CacheStore::new(24);
        cache.set_with_ttl("src", "memory", vec![record("Foo")], Duration::seconds(0));

        assert!(cache.get("src", "memory").is_none());
        // The read evicted the stale entry.
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired_sweep() {
        let cache = CacheStore::new(24);
        cache.set_with_ttl("a", "q", vec![record("A")], Duration::seconds(0));
        cache.set("b", "q", vec![record("B")]);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("b", "q").is_some());
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = CacheStore::new(24);
        cache.set("src", "q", vec![record("Old")]);
        cache.set("src", "q", vec![record("New")]);

        let hit = cache.get("src", "q").expect("cache hit");
        assert_eq!(hit[0].name, "New");
    }
}
