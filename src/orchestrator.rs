use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::client::SourceClient;
use crate::config::{EngineConfig, SourceRegistry};
use crate::error::SearchResult;
use crate::record::ResultRecord;

/// Category-level search coordinator.
///
/// Fans out over a category's sources with bounded parallelism, retries
/// first-pass empties once with a forced live fetch, and always returns
/// whatever partial results were collected — no single source failure
/// aborts a category search.
pub struct SearchOrchestrator {
    config: Arc<EngineConfig>,
    registry: Arc<SourceRegistry>,
    cache: Arc<CacheStore>,
    client: Arc<SourceClient>,
}

impl SearchOrchestrator {
    pub fn new(config: EngineConfig, registry: SourceRegistry) -> SearchResult<Self> {
        let config = Arc::new(config);
        let registry = Arc::new(registry);
        let cache = Arc::new(CacheStore::new(config.cache_ttl_hours));
        let client = Arc::new(SourceClient::new(
            config.clone(),
            registry.clone(),
            cache.clone(),
        )?);

        info!("Search engine initialized with {} sources", registry.len());
        Ok(Self { config, registry, cache, client })
    }

    /// Search every source of a category; the map carries only sources
    /// that produced at least one record.
    pub async fn search_category(
        &self,
        category: &str,
        query: &str,
    ) -> HashMap<String, Vec<ResultRecord>> {
        self.search_category_with_cancel(category, query, &CancellationToken::new())
            .await
    }

    /// Cancellable variant: when `cancel` fires, in-flight fetches are
    /// abandoned without blocking and results collected so far are
    /// returned as partial output.
    pub async fn search_category_with_cancel(
        &self,
        category: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> HashMap<String, Vec<ResultRecord>> {
        let sources = self.registry.category_sources(category).to_vec();
        if sources.is_empty() {
            warn!("No sources configured for category {:?}", category);
            return HashMap::new();
        }

        info!(
            "Searching category {:?} for {:?} across {} sources",
            category,
            query,
            sources.len()
        );

        let (mut results, pending) = self.run_pass(&sources, query, false, cancel).await;

        if !pending.is_empty() && !cancel.is_cancelled() {
            info!(
                "Retrying {} sources with a live fetch after {}s backoff",
                pending.len(),
                self.config.retry_backoff_seconds
            );
            let backoff = Duration::from_secs(self.config.retry_backoff_seconds);
            tokio::select! {
                _ = cancel.cancelled() => return results,
                _ = tokio::time::sleep(backoff) => {}
            }

            // Bypass the cache so a stale-negative entry cannot mask a
            // source that has recovered.
            let (retried, still_empty) = self.run_pass(&pending, query, true, cancel).await;
            results.extend(retried);
            if !still_empty.is_empty() {
                debug!("{} sources still empty after retry", still_empty.len());
            }
        }

        info!(
            "Category {:?} search finished: {} sources with results",
            category,
            results.len()
        );
        results
    }

    /// Single-source search, exposed for source testing.
    pub async fn search_once(&self, source_id: &str, query: &str) -> Vec<ResultRecord> {
        self.client.search_once(source_id, query).await
    }

    pub fn client(&self) -> &Arc<SourceClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// One fan-out pass. Returns the non-empty results and the sources
    /// worth retrying; config-invalid sources are logged and dropped.
    async fn run_pass(
        &self,
        sources: &[String],
        query: &str,
        bypass_cache: bool,
        cancel: &CancellationToken,
    ) -> (HashMap<String, Vec<ResultRecord>>, Vec<String>) {
        let limit = sources.len().min(self.config.max_concurrent_sources).max(1);
        let semaphore = Arc::new(Semaphore::new(limit));

        let mut fetches = FuturesUnordered::new();
        for source_id in sources {
            let source_id = source_id.clone();
            let semaphore = semaphore.clone();
            fetches.push(async move {
                let _permit = semaphore.acquire().await;
                let outcome = self.client.fetch(&source_id, query, bypass_cache).await;
                (source_id, outcome)
            });
        }

        let mut results = HashMap::new();
        let mut pending = Vec::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Search cancelled; abandoning {} in-flight fetches", fetches.len());
                    break;
                }
                next = fetches.next() => {
                    match next {
                        Some((source_id, Ok(records))) if !records.is_empty() => {
                            debug!("Source {} returned {} records", source_id, records.len());
                            results.insert(source_id, records);
                        }
                        Some((source_id, Ok(_))) => {
                            debug!("Source {} returned no records", source_id);
                            pending.push(source_id);
                        }
                        Some((source_id, Err(e))) => {
                            if e.is_recoverable() {
                                pending.push(source_id);
                            } else {
                                warn!("Skipping source {}: {} ({})", source_id, e, e.category());
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        (results, pending)
    }
}
