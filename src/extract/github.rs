use async_trait::async_trait;
use base64::Engine as _;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::SourceConfig;
use crate::error::{SearchError, SearchResult};
use crate::extract::markdown::CatalogMatchers;
use crate::extract::{ExtractionStrategy, StrategyContext};
use crate::http::bearer_headers;
use crate::record::ResultRecord;

/// Strategy for `github_api` sources: a code search scoped to one
/// repository. The result is deliberately coarse — one record representing
/// the whole repository, no per-file extraction.
pub struct RepoCodeSearchStrategy;

#[async_trait]
impl ExtractionStrategy for RepoCodeSearchStrategy {
    async fn extract(
        &self,
        source: &SourceConfig,
        query: &str,
        ctx: &StrategyContext<'_>,
    ) -> Vec<ResultRecord> {
        match code_search(source, query, ctx).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Code search failed for {}: {} ({})", source.id, e, e.category());
                Vec::new()
            }
        }
    }
}

async fn code_search(
    source: &SourceConfig,
    query: &str,
    ctx: &StrategyContext<'_>,
) -> SearchResult<Vec<ResultRecord>> {
    let repo = required_repo(source)?;

    let mut search_terms = format!("{query} repo:{repo}");
    if let Some(file) = source.file_path.as_deref().filter(|f| !f.trim().is_empty()) {
        search_terms.push_str(&format!(" filename:{file}"));
    }

    let mut url = Url::parse(&format!("{}/search/code", ctx.config.github_api_base))
        .map_err(|e| SearchError::config(format!("bad API base: {e}")))?;
    url.query_pairs_mut()
        .append_pair("q", &search_terms)
        .append_pair("sort", "indexed")
        .append_pair("order", "desc");

    let headers = bearer_headers(source.auth_token.as_deref());
    let json = ctx.transport.get_json(url.as_str(), &headers).await?;

    let total = json
        .get("total_count")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| json.get("items").and_then(Value::as_array).map(|a| a.len() as u64).unwrap_or(0));

    if total == 0 {
        debug!("No code matches for {:?} in {}", query, repo);
        return Ok(Vec::new());
    }

    let repo_url = format!("https://github.com/{repo}");
    let mut record =
        ResultRecord::new(source.name.clone(), source.name.clone(), source.category.clone());
    record.description = format!("{total} code matches for \"{query}\" in {repo}");
    record.url = repo_url.clone();
    record.github_url = Some(repo_url);
    record.extra.insert("match_count".to_string(), total.to_string());

    Ok(vec![record])
}

/// Strategy for `awesome_list` sources: fetch one file through the
/// repository-content API, decode the base64 payload, and run the markdown
/// catalog extraction.
pub struct CuratedListStrategy {
    matchers: CatalogMatchers,
}

impl CuratedListStrategy {
    pub fn new() -> Self {
        Self { matchers: CatalogMatchers::new() }
    }
}

impl Default for CuratedListStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionStrategy for CuratedListStrategy {
    async fn extract(
        &self,
        source: &SourceConfig,
        query: &str,
        ctx: &StrategyContext<'_>,
    ) -> Vec<ResultRecord> {
        let document = match fetch_catalog(source, ctx).await {
            Ok(document) => document,
            Err(e) => {
                warn!("Catalog fetch failed for {}: {} ({})", source.id, e, e.category());
                return Vec::new();
            }
        };

        self.matchers.extract(&document, query, source)
    }
}

async fn fetch_catalog(source: &SourceConfig, ctx: &StrategyContext<'_>) -> SearchResult<String> {
    let repo = required_repo(source)?;
    let file_path = source.file_path_or_default();

    let url = format!("{}/repos/{}/contents/{}", ctx.config.github_api_base, repo, file_path);
    let headers = bearer_headers(source.auth_token.as_deref());
    let json = ctx.transport.get_json(&url, &headers).await?;

    let content = json
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| SearchError::format(format!("no content field for {repo}/{file_path}")))?;

    decode_content(content)
}

/// The content API wraps base64 payloads across lines.
fn decode_content(content: &str) -> SearchResult<String> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| SearchError::format(format!("base64 decode failed: {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn required_repo(source: &SourceConfig) -> SearchResult<&str> {
    source
        .repo
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| SearchError::config(format!("source {} has no repo", source.id)))
}
