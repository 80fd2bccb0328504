use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::{candidate_from_node, derive_name_from_path, element_text, is_valid_description, Candidate};

/// A parser hard-coded to one website's DOM conventions, tried before the
/// generic heuristics.
pub trait SiteExtractor: Send + Sync {
    /// Substring matched against the page host.
    fn host_pattern(&self) -> &'static str;

    fn extract(&self, document: &Html, base: &Url) -> Vec<Candidate>;
}

/// Host-keyed lookup of site-aware extractors; the explicit extension
/// point replacing a growing conditional chain.
pub struct SiteRegistry {
    extractors: Vec<Box<dyn SiteExtractor>>,
}

impl SiteRegistry {
    pub fn with_defaults() -> Self {
        Self {
            extractors: vec![
                Box::new(CardGridExtractor),
                Box::new(LinkListExtractor),
                Box::new(SelectorCascadeExtractor),
            ],
        }
    }

    pub fn empty() -> Self {
        Self { extractors: Vec::new() }
    }

    /// Later registrations take precedence over earlier ones.
    pub fn register(&mut self, extractor: Box<dyn SiteExtractor>) {
        self.extractors.insert(0, extractor);
    }

    pub fn find(&self, host: &str) -> Option<&dyn SiteExtractor> {
        self.extractors
            .iter()
            .find(|extractor| host.contains(extractor.host_pattern()))
            .map(Box::as_ref)
    }
}

/// pulsemcp.com renders results as a card grid keyed by a test-id data
/// attribute. Cards can carry sponsored entries, so the extended
/// description denylist applies.
struct CardGridExtractor;

const CARD_GRID_SELECTOR: &str = r#"div[data-test-id*="mcp-server-grid-card"]"#;

impl SiteExtractor for CardGridExtractor {
    fn host_pattern(&self) -> &'static str {
        "pulsemcp.com"
    }

    fn extract(&self, document: &Html, base: &Url) -> Vec<Candidate> {
        let Ok(selector) = Selector::parse(CARD_GRID_SELECTOR) else { return Vec::new() };
        let candidates: Vec<_> = document
            .select(&selector)
            .filter_map(|card| candidate_from_node(&card, base, true))
            .collect();
        debug!("Card grid yielded {} candidates", candidates.len());
        candidates
    }
}

/// mcpservers.org lists results as bare links under /servers/ with no
/// separate title element; the display name is derived from the URL path.
/// Item links must be nested at least two segments deep — /servers/ itself
/// is an index page, not an item.
struct LinkListExtractor;

const LINK_LIST_SELECTOR: &str = r#"a[href*="/servers/"]"#;
const MIN_ITEM_PATH_DEPTH: usize = 2;

impl SiteExtractor for LinkListExtractor {
    fn host_pattern(&self) -> &'static str {
        "mcpservers.org"
    }

    fn extract(&self, document: &Html, base: &Url) -> Vec<Candidate> {
        let Ok(selector) = Selector::parse(LINK_LIST_SELECTOR) else { return Vec::new() };

        document
            .select(&selector)
            .filter_map(|link| {
                let href = link.value().attr("href")?;
                let url = base.join(href).ok()?;

                let depth = url
                    .path_segments()
                    .map(|segments| segments.filter(|s| !s.is_empty()).count())
                    .unwrap_or(0);
                if depth < MIN_ITEM_PATH_DEPTH {
                    return None;
                }

                let name = derive_name_from_path(&url);
                let text = element_text(&link);
                let description = if is_valid_description(&text, &name, false) {
                    text
                } else {
                    String::new()
                };

                Some(Candidate { name, description, url: url.to_string() })
            })
            .collect()
    }
}

/// mcpserverfinder.com has shipped several markups; try structural queries
/// in priority order and take the first that yields more than one match.
struct SelectorCascadeExtractor;

const CASCADE_SELECTORS: &[&str] = &[".server-card", ".result-item", ".search-result"];

impl SiteExtractor for SelectorCascadeExtractor {
    fn host_pattern(&self) -> &'static str {
        "mcpserverfinder.com"
    }

    fn extract(&self, document: &Html, base: &Url) -> Vec<Candidate> {
        for selector_str in CASCADE_SELECTORS {
            let Ok(selector) = Selector::parse(selector_str) else { continue };
            let nodes: Vec<_> = document.select(&selector).collect();
            if nodes.len() > 1 {
                debug!("Cascade selector {:?} matched {} nodes", selector_str, nodes.len());
                return nodes
                    .iter()
                    .filter_map(|node| candidate_from_node(node, base, false))
                    .collect();
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetrievalMode, SourceConfig};
    use crate::extract::html::HtmlPipeline;

    fn source(url: &str) -> SourceConfig {
        SourceConfig {
            id: "site_test".to_string(),
            name: "Site Test".to_string(),
            category: "mcp_servers".to_string(),
            mode: RetrievalMode::UrlParam,
            url: Some(url.to_string()),
            search_endpoint: None,
            repo: None,
            file_path: None,
            auth_token: None,
        }
    }

    #[test]
    fn test_registry_dispatch_by_host() {
        let registry = SiteRegistry::with_defaults();
        assert!(registry.find("www.pulsemcp.com").is_some());
        assert!(registry.find("mcpservers.org").is_some());
        assert!(registry.find("example.com").is_none());
    }

    #[test]
    fn test_card_grid_extraction() {
        let html = r#"
            <html><body>
              <div data-test-id="mcp-server-grid-card-1">
                <h3>Memory Server</h3>
                <p>Persistent memory backend for conversations.</p>
                <a href="/servers/memory">open</a>
              </div>
              <div data-test-id="mcp-server-grid-card-2">
                <h3>Promo Card</h3>
                <p>Sponsored listing placed between results.</p>
                <a href="/servers/promo">open</a>
              </div>
            </body></html>"#;

        let records = HtmlPipeline::new().extract(
            html,
            "https://www.pulsemcp.com/search?q=memory",
            &source("https://www.pulsemcp.com/"),
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Memory Server");
        assert!(records[0].description.contains("Persistent"));
        // Extended denylist rejects the sponsored blurb but keeps the card.
        assert_eq!(records[1].name, "Promo Card");
        assert!(records[1].description.is_empty());
    }

    #[test]
    fn test_link_list_names_derived_from_path() {
        let html = r#"
            <html><body>
              <a href="/servers/">All servers</a>
              <a href="/servers/fast-memory">fast-memory</a>
              <a href="https://mcpservers.org/servers/web_search">search the web</a>
            </body></html>"#;

        let records = HtmlPipeline::new().extract(
            html,
            "https://mcpservers.org/search?q=x",
            &source("https://mcpservers.org/"),
        );

        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        // The index link (/servers/) fails the path-depth rule.
        assert_eq!(names, vec!["fast memory", "web search"]);
    }

    #[test]
    fn test_selector_cascade_takes_first_plural_match() {
        let html = r#"
            <html><body>
              <div class="server-card"><a href="/servers/only-one">Only One</a></div>
              <div class="result-item"><a href="/servers/alpha">Alpha Entry</a></div>
              <div class="result-item"><a href="/servers/beta">Beta Entry</a></div>
            </body></html>"#;

        let records = HtmlPipeline::new().extract(
            html,
            "https://mcpserverfinder.com/search?q=x",
            &source("https://mcpserverfinder.com/"),
        );

        // .server-card matched once only; .result-item wins the cascade.
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha Entry", "Beta Entry"]);
    }

    #[test]
    fn test_custom_registration_takes_precedence() {
        struct Custom;
        impl SiteExtractor for Custom {
            fn host_pattern(&self) -> &'static str {
                "pulsemcp.com"
            }
            fn extract(&self, _document: &Html, base: &Url) -> Vec<Candidate> {
                vec![Candidate {
                    name: "Custom".to_string(),
                    description: String::new(),
                    url: base.join("/servers/custom").unwrap().to_string(),
                }]
            }
        }

        let mut pipeline = HtmlPipeline::new();
        pipeline.register_site(Box::new(Custom));
        let records = pipeline.extract(
            "<html></html>",
            "https://pulsemcp.com/search",
            &source("https://pulsemcp.com/"),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Custom");
    }
}
