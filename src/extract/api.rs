use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::SourceConfig;
use crate::error::{SearchError, SearchResult};
use crate::extract::{ExtractionStrategy, StrategyContext};
use crate::http::bearer_headers;
use crate::record::ResultRecord;

/// How many plain-text lines the degraded parse may emit.
const PLAIN_TEXT_LINE_CAP: usize = 10;

/// Keys that may hold the result array in a JSON response.
const RESULT_ARRAY_KEYS: &[&str] = &["results", "data", "items", "servers"];

/// Field aliases mapped into the canonical record, in priority order.
const NAME_KEYS: &[&str] = &["name", "title", "display_name"];
const DESCRIPTION_KEYS: &[&str] = &["description", "desc", "summary"];
const URL_KEYS: &[&str] = &["url", "link", "href", "homepage"];
const REPO_KEYS: &[&str] = &["github_url", "repository", "repo"];
const UPDATED_KEYS: &[&str] = &["updated_at", "last_updated"];

/// Strategy for `api` sources: JSON endpoint with a templated URL or a
/// `q` parameter, degrading to a line-based plain-text parse when the
/// response is not JSON.
pub struct DirectApiStrategy;

#[async_trait]
impl ExtractionStrategy for DirectApiStrategy {
    async fn extract(
        &self,
        source: &SourceConfig,
        query: &str,
        ctx: &StrategyContext<'_>,
    ) -> Vec<ResultRecord> {
        let request_url = match build_request_url(source, query) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot build API request for {}: {}", source.id, e);
                return Vec::new();
            }
        };

        let headers = bearer_headers(source.auth_token.as_deref());
        let body = match ctx.transport.get_text(&request_url, &headers).await {
            Ok(body) => body,
            Err(e) => {
                warn!("API fetch failed for {}: {}", source.id, e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Value>(&body) {
            Ok(json) => parse_json_results(&json, source),
            Err(e) => {
                debug!(
                    "API response for {} is not JSON ({}); using plain-text fallback",
                    source.id, e
                );
                plain_text_fallback(&body, &request_url, source)
            }
        }
    }
}

/// Substitute the query into the endpoint template, or fall back to a `q`
/// parameter when the endpoint carries no placeholder.
fn build_request_url(source: &SourceConfig, query: &str) -> SearchResult<String> {
    let endpoint = source
        .search_endpoint
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .or(source.url.as_deref())
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| SearchError::config(format!("source {} has no endpoint", source.id)))?;

    if endpoint.contains("{query}") {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        return Ok(endpoint.replace("{query}", &encoded));
    }

    let mut url = Url::parse(endpoint)
        .map_err(|e| SearchError::config(format!("bad endpoint for {}: {}", source.id, e)))?;
    url.query_pairs_mut().append_pair("q", query);
    Ok(url.to_string())
}

/// Map a JSON payload onto records via the field-alias tables.
fn parse_json_results(json: &Value, source: &SourceConfig) -> Vec<ResultRecord> {
    let Some(items) = locate_items(json) else {
        debug!("No result array in API response for {}", source.id);
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| record_from_item(item, source))
        .filter(ResultRecord::is_valid)
        .collect()
}

/// The result array sits either at the top level or under a known key.
fn locate_items(json: &Value) -> Option<&Vec<Value>> {
    if let Value::Array(items) = json {
        return Some(items);
    }
    RESULT_ARRAY_KEYS.iter().find_map(|key| json.get(key).and_then(Value::as_array))
}

fn record_from_item(item: &Value, source: &SourceConfig) -> Option<ResultRecord> {
    let name = first_string(item, NAME_KEYS)?;

    let mut record = ResultRecord::new(name, source.name.clone(), source.category.clone());
    record.description = first_string(item, DESCRIPTION_KEYS).unwrap_or_default();
    record.url = first_string(item, URL_KEYS).unwrap_or_default();
    record.github_url = first_string(item, REPO_KEYS).map(normalize_repo_link);
    record.last_updated = first_string(item, UPDATED_KEYS);

    Some(record)
}

fn first_string(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| item.get(key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// APIs report repositories either as full URLs or as bare `owner/name`.
fn normalize_repo_link(value: String) -> String {
    if value.starts_with("http") {
        value
    } else {
        format!("https://github.com/{}", value.trim_matches('/'))
    }
}

/// Degraded parse for endpoints that answered with something other than
/// JSON: the first few non-empty lines become low-confidence records.
fn plain_text_fallback(body: &str, request_url: &str, source: &SourceConfig) -> Vec<ResultRecord> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(PLAIN_TEXT_LINE_CAP)
        .map(|line| {
            let name: String = line.chars().take(120).collect();
            let mut record = ResultRecord::new(name, source.name.clone(), source.category.clone());
            record.description = format!("Unstructured response line from {}", source.name);
            record.url = request_url.to_string();
            record.extra.insert("confidence".to_string(), "low".to_string());
            record
        })
        .filter(ResultRecord::is_valid)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalMode;

    fn source(endpoint: &str) -> SourceConfig {
        SourceConfig {
            id: "api_test".to_string(),
            name: "API Test".to_string(),
            category: "mcp_servers".to_string(),
            mode: RetrievalMode::Api,
            url: None,
            search_endpoint: Some(endpoint.to_string()),
            repo: None,
            file_path: None,
            auth_token: None,
        }
    }

    #[test]
    fn test_build_url_from_template() {
        let url = build_request_url(&source("https://api.example.com/search?q={query}"), "mem srv")
            .expect("url");
        assert_eq!(url, "https://api.example.com/search?q=mem+srv");
    }

    #[test]
    fn test_build_url_appends_query_param() {
        let url =
            build_request_url(&source("https://api.example.com/search"), "memory").expect("url");
        assert_eq!(url, "https://api.example.com/search?q=memory");
    }

    #[test]
    fn test_json_field_aliases() {
        let json: Value = serde_json::from_str(
            r#"{"results": [
                {"name": "Alpha", "description": "First entry", "url": "https://example.com/a"},
                {"title": "Beta", "desc": "Second entry", "link": "https://example.com/b",
                 "repository": "owner/beta", "updated_at": "2025-11-02"},
                {"description": "nameless", "url": "https://example.com/x"}
            ]}"#,
        )
        .expect("json");

        let records = parse_json_results(&json, &source("https://api.example.com"));
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].name, "Alpha");
        assert_eq!(records[0].url, "https://example.com/a");

        assert_eq!(records[1].name, "Beta");
        assert_eq!(records[1].description, "Second entry");
        assert_eq!(records[1].github_url.as_deref(), Some("https://github.com/owner/beta"));
        assert_eq!(records[1].last_updated.as_deref(), Some("2025-11-02"));
    }

    #[test]
    fn test_top_level_array_accepted() {
        let json: Value =
            serde_json::from_str(r#"[{"name": "Solo", "url": "https://example.com/solo"}]"#)
                .expect("json");
        let records = parse_json_results(&json, &source("https://api.example.com"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Solo");
    }

    #[test]
    fn test_record_without_any_url_dropped() {
        let json: Value = serde_json::from_str(r#"{"items": [{"name": "NoUrl"}]}"#).expect("json");
        assert!(parse_json_results(&json, &source("https://api.example.com")).is_empty());
    }

    #[test]
    fn test_plain_text_fallback_caps_lines() {
        let body = (0..25).map(|i| format!("line {i}\n")).collect::<String>();
        let records =
            plain_text_fallback(&body, "https://api.example.com/search", &source("e"));

        assert_eq!(records.len(), PLAIN_TEXT_LINE_CAP);
        assert_eq!(records[0].name, "line 0");
        assert_eq!(records[0].url, "https://api.example.com/search");
        assert_eq!(records[0].extra.get("confidence").map(String::as_str), Some("low"));
    }

    #[test]
    fn test_plain_text_fallback_skips_blank_lines() {
        let records = plain_text_fallback("\n\n  \nfirst\n\nsecond\n", "https://e.com", &source("e"));
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
