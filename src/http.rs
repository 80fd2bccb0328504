use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{SearchError, SearchResult};

/// HTTP transport shared by every extraction strategy.
///
/// Owns the pooled client; applies the per-request timeout, default
/// headers, and optional custom headers (bearer tokens included).
/// Network calls are the engine's only suspension points.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &EngineConfig) -> SearchResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/json,application/xhtml+xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SearchError::network(format!("client build failed: {e}")))?;

        Ok(Self { client })
    }

    /// GET a URL and return the response body as text.
    ///
    /// Non-success statuses map onto the error taxonomy: 401/403 become
    /// Auth (when the request carried credentials) and everything else a
    /// recoverable Http error.
    pub async fn get_text(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> SearchResult<String> {
        let response = self.send_get(url, headers).await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            if headers.contains_key(AUTHORIZATION.as_str()) {
                return Err(SearchError::auth(url));
            }
            return Err(SearchError::Http { url: url.to_string(), status: status.as_u16() });
        }
        if !status.is_success() {
            return Err(SearchError::Http { url: url.to_string(), status: status.as_u16() });
        }

        Ok(response.text().await?)
    }

    /// GET a URL and decode the body as JSON.
    pub async fn get_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> SearchResult<serde_json::Value> {
        let body = self.get_text(url, headers).await?;
        serde_json::from_str(&body)
            .map_err(|e| SearchError::format(format!("JSON decode failed for {url}: {e}")))
    }

    /// Cheap reachability probe used by source validation.
    pub async fn check_url(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn send_get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> SearchResult<reqwest::Response> {
        debug!("HTTP GET {}", url);
        let mut request = self.client.get(url);

        for (name, value) in headers {
            if let (Ok(header_name), Ok(header_value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                request = request.header(header_name, header_value);
            }
        }

        Ok(request.send().await?)
    }
}

/// Header map carrying a static bearer token, for repository-mode sources.
pub fn bearer_headers(token: Option<&str>) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
        headers.insert(AUTHORIZATION.as_str().to_string(), format!("Bearer {token}"));
    }
    headers
}
