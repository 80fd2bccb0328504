use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{SearchError, SearchResult};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-request HTTP timeout
    pub request_timeout_seconds: u64,
    /// Upper bound on concurrent source fetches within one category search
    pub max_concurrent_sources: usize,
    /// Fixed backoff before the single retry pass
    pub retry_backoff_seconds: u64,
    /// Default cache TTL
    pub cache_ttl_hours: i64,
    /// User agent sent with every request
    pub user_agent: String,
    /// Base URL of the code-search / repository-content API.
    /// Overridable so tests can point it at a mock server.
    pub github_api_base: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 15,
            max_concurrent_sources: 4,
            retry_backoff_seconds: 2,
            cache_ttl_hours: 24,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            github_api_base: "https://api.github.com".to_string(),
        }
    }
}

/// How a source is queried and parsed.
///
/// Tags match the configuration vocabulary consumed from the external
/// configuration collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalMode {
    /// JSON API with a templated endpoint or `q` parameter
    #[serde(rename = "api")]
    Api,
    /// HTML search page with the query substituted into the URL
    #[serde(rename = "url_param")]
    UrlParam,
    /// Repository-scoped code search, one coarse record per repository
    #[serde(rename = "github_api")]
    CodeSearch,
    /// Curated markdown catalog fetched via the repository-content API
    #[serde(rename = "awesome_list")]
    CuratedList,
    /// Plain fetch of the listing page, generic HTML extraction
    #[serde(rename = "scrape")]
    Scrape,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::UrlParam => "url_param",
            Self::CodeSearch => "github_api",
            Self::CuratedList => "awesome_list",
            Self::Scrape => "scrape",
        }
    }
}

/// One configured source. Read-only to the engine; produced by the external
/// configuration collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub category: String,
    pub mode: RetrievalMode,
    /// Base / listing page URL
    #[serde(default)]
    pub url: Option<String>,
    /// Search endpoint template containing a `{query}` placeholder
    #[serde(default)]
    pub search_endpoint: Option<String>,
    /// `owner/name` repository id for repository-backed modes
    #[serde(default)]
    pub repo: Option<String>,
    /// File path within the repository; defaults to README.md
    #[serde(default)]
    pub file_path: Option<String>,
    /// Static bearer token for authenticated APIs
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl SourceConfig {
    /// Check that the fields this source's retrieval mode requires are set.
    pub fn validate(&self) -> SearchResult<()> {
        if self.id.trim().is_empty() {
            return Err(SearchError::config("source id is empty"));
        }

        match self.mode {
            RetrievalMode::Api | RetrievalMode::UrlParam => {
                if self.search_endpoint.as_deref().unwrap_or("").trim().is_empty()
                    && self.url.as_deref().unwrap_or("").trim().is_empty()
                {
                    return Err(SearchError::config(format!(
                        "source {} ({}) has neither search_endpoint nor url",
                        self.id,
                        self.mode.as_str()
                    )));
                }
            }
            RetrievalMode::CodeSearch | RetrievalMode::CuratedList => {
                if self.repo.as_deref().unwrap_or("").trim().is_empty() {
                    return Err(SearchError::config(format!(
                        "source {} ({}) has no repo configured",
                        self.id,
                        self.mode.as_str()
                    )));
                }
            }
            RetrievalMode::Scrape => {
                if self.url.as_deref().unwrap_or("").trim().is_empty() {
                    return Err(SearchError::config(format!(
                        "source {} (scrape) has no url configured",
                        self.id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Repository file path, defaulting to the conventional README.md
    pub fn file_path_or_default(&self) -> &str {
        self.file_path.as_deref().filter(|p| !p.is_empty()).unwrap_or("README.md")
    }
}

/// Immutable lookup over the configured sources, grouped by category.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, SourceConfig>,
    categories: HashMap<String, Vec<String>>,
}

impl SourceRegistry {
    /// Build the registry from a stream of source records. Insertion order
    /// within a category is preserved; a duplicated id keeps the last record.
    pub fn from_sources(sources: impl IntoIterator<Item = SourceConfig>) -> Self {
        let mut registry = Self::default();
        for source in sources {
            let ids = registry.categories.entry(source.category.clone()).or_default();
            if !ids.contains(&source.id) {
                ids.push(source.id.clone());
            }
            registry.sources.insert(source.id.clone(), source);
        }
        registry
    }

    pub fn get(&self, source_id: &str) -> Option<&SourceConfig> {
        self.sources.get(source_id)
    }

    /// Source ids configured for a category, in configuration order.
    pub fn category_sources(&self, category: &str) -> &[String] {
        self.categories.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
