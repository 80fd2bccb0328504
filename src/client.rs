use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::config::{EngineConfig, SourceConfig, SourceRegistry};
use crate::error::{SearchError, SearchResult};
use crate::extract::{StrategyContext, StrategySet};
use crate::http::HttpTransport;
use crate::record::ResultRecord;

/// Per-source search executor.
///
/// Owns the HTTP transport and the strategy set; consults the cache before
/// any network access and keeps at most one live fetch in flight per
/// (source, query) fingerprint — concurrent identical requests join the
/// in-flight fetch instead of duplicating it.
pub struct SourceClient {
    config: Arc<EngineConfig>,
    registry: Arc<SourceRegistry>,
    transport: HttpTransport,
    cache: Arc<CacheStore>,
    strategies: StrategySet,
    in_flight: DashMap<String, Arc<OnceCell<Vec<ResultRecord>>>>,
}

impl SourceClient {
    pub fn new(
        config: Arc<EngineConfig>,
        registry: Arc<SourceRegistry>,
        cache: Arc<CacheStore>,
    ) -> SearchResult<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self {
            config,
            registry,
            transport,
            cache,
            strategies: StrategySet::new(),
            in_flight: DashMap::new(),
        })
    }

    /// Search one source. Never raises: any failure degrades to an empty
    /// result set.
    pub async fn search_once(&self, source_id: &str, query: &str) -> Vec<ResultRecord> {
        match self.fetch(source_id, query, false).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Search failed for {}: {} ({})", source_id, e, e.category());
                Vec::new()
            }
        }
    }

    /// Fallible variant used by the orchestrator, which needs to tell
    /// config-invalid sources (skip, never retry) apart from transient
    /// empties (retry once). `bypass_cache` forces a live fetch; results
    /// are still written through.
    pub(crate) async fn fetch(
        &self,
        source_id: &str,
        query: &str,
        bypass_cache: bool,
    ) -> SearchResult<Vec<ResultRecord>> {
        if !bypass_cache {
            if let Some(records) = self.cache.get(source_id, query) {
                return Ok(records);
            }
        }

        let source = self
            .registry
            .get(source_id)
            .ok_or_else(|| SearchError::config(format!("unknown source: {source_id}")))?;
        source.validate()?;

        let records = self.fetch_live(source, query).await;
        if !records.is_empty() {
            self.cache.set(source_id, query, records.clone());
        }
        Ok(records)
    }

    /// Run the source's strategy, coalescing concurrent identical fetches
    /// onto a single in-flight request per fingerprint.
    async fn fetch_live(&self, source: &SourceConfig, query: &str) -> Vec<ResultRecord> {
        let key = CacheStore::fingerprint(&source.id, query);
        let cell = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let records = cell
            .get_or_init(|| async {
                debug!(
                    "Live fetch for source {} ({}) query {:?}",
                    source.id,
                    source.mode.as_str(),
                    query
                );
                let ctx = StrategyContext { transport: &self.transport, config: &self.config };
                self.strategies.resolve(source.mode).extract(source, query, &ctx).await
            })
            .await
            .clone();

        // The fingerprint slot only guards the fetch itself; afterwards the
        // cache is the authority.
        self.in_flight.remove(&key);
        records
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalMode;

    fn client_with(sources: Vec<SourceConfig>) -> SourceClient {
        let config = Arc::new(EngineConfig::default());
        let cache = Arc::new(CacheStore::new(config.cache_ttl_hours));
        let registry = Arc::new(SourceRegistry::from_sources(sources));
        SourceClient::new(config, registry, cache).expect("client")
    }

    fn broken_source(id: &str) -> SourceConfig {
        // api mode without endpoint or url fails validation
        SourceConfig {
            id: id.to_string(),
            name: id.to_string(),
            category: "mcp_servers".to_string(),
            mode: RetrievalMode::Api,
            url: None,
            search_endpoint: None,
            repo: None,
            file_path: None,
            auth_token: None,
        }
    }

    #[tokio::test]
    async fn test_unknown_source_is_config_error_but_search_once_never_raises() {
        let client = client_with(vec![]);

        let err = client.fetch("missing", "memory", false).await.expect_err("config error");
        assert_eq!(err.category(), "config");
        assert!(!err.is_recoverable());

        assert!(client.search_once("missing", "memory").await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_source_config_is_skipped_without_network() {
        let client = client_with(vec![broken_source("broken")]);

        let err = client.fetch("broken", "memory", false).await.expect_err("config error");
        assert_eq!(err.category(), "config");
        assert!(client.search_once("broken", "memory").await.is_empty());
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits_fetch() {
        let source = SourceConfig {
            // Endpoint that would fail if actually fetched; a cache hit
            // must return before any network access.
            search_endpoint: Some("http://127.0.0.1:9/api?q={query}".to_string()),
            ..broken_source("cached")
        };
        let client = client_with(vec![source]);

        let mut record = ResultRecord::new("Foo", "cached", "mcp_servers");
        record.url = "https://example.com/foo".to_string();
        client.cache.set("cached", "memory", vec![record]);

        let records = client.fetch("cached", "memory", false).await.expect("hit");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Foo");
    }
}
