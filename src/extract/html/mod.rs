use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::config::SourceConfig;
use crate::extract::{ExtractionStrategy, StrategyContext};
use crate::record::ResultRecord;

pub mod sites;

pub use sites::{SiteExtractor, SiteRegistry};

/// Upper bound on candidates per extraction call; bounds the cost of
/// pathological pages.
const MAX_CANDIDATES: usize = 50;
const MIN_NAME_LEN: usize = 3;
const MIN_LINK_TEXT_LEN: usize = 4;
const MIN_DESCRIPTION_LEN: usize = 12;
const MIN_DESCRIPTION_WORDS: usize = 4;

/// Structural container selectors, tried in priority order; the first one
/// yielding more than one node wins.
const CONTAINER_SELECTORS: &[&str] = &[
    ".server-card",
    ".result-card",
    ".search-result",
    ".result-item",
    "article",
    ".card",
    "div[class*='card']",
    "div[class*='result']",
];

/// Heading/title selectors for candidate names, in priority order.
const NAME_SELECTORS: &[&str] = &[
    "h1", "h2", "h3", "h4", ".title", ".name", "[class*='title']", "[class*='name']",
];

/// Description selectors, in priority order.
const DESCRIPTION_SELECTORS: &[&str] =
    &["p", ".description", ".desc", ".summary", ".excerpt", "[class*='desc']", "span"];

/// URL path fragments marking result-like links.
const RESULT_PATH_FRAGMENTS: &[&str] =
    &["/server", "/tool", "/agent", "/mcp", "/project", "/repo"];

/// Boilerplate phrases that are never descriptions.
const DESCRIPTION_DENYLIST: &[&str] = &[
    "view details",
    "learn more",
    "read more",
    "click here",
    "get started",
    "sign up",
    "see more",
];

/// Extra phrases excluded by sites that mix sponsored entries into results.
const EXTENDED_DESCRIPTION_DENYLIST: &[&str] =
    &["sponsored", "advertisement", "promoted", "featured listing"];

/// Utility paths that are site chrome, never results.
const UTILITY_PATH_DENYLIST: &[&str] = &[
    "/new", "/create", "/search", "/filter", "/login", "/signup", "/register", "/settings",
];

/// Generic words that make a candidate name navigational noise.
const GENERIC_NAME_DENYLIST: &[&str] = &[
    "home", "about", "search", "login", "sign in", "sign up", "register", "browse", "more",
    "next", "previous", "back", "menu", "categories", "servers", "tools", "agents",
];

/// An extraction candidate before source attribution and final filtering.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub description: String,
    pub url: String,
}

/// Site-aware / generic HTML extraction pipeline.
///
/// Dispatches by page host to a registered site-aware extractor, falling
/// back to the generic container/link heuristics.
pub struct HtmlPipeline {
    sites: SiteRegistry,
}

impl HtmlPipeline {
    pub fn new() -> Self {
        Self { sites: SiteRegistry::with_defaults() }
    }

    /// Register an additional site-aware extractor; later registrations
    /// take precedence over the defaults.
    pub fn register_site(&mut self, extractor: Box<dyn SiteExtractor>) {
        self.sites.register(extractor);
    }

    /// Extract records from an HTML document fetched from `page_url`.
    pub fn extract(&self, html: &str, page_url: &str, source: &SourceConfig) -> Vec<ResultRecord> {
        let base = match Url::parse(page_url) {
            Ok(base) => base,
            Err(e) => {
                warn!("Unparseable page URL {}: {}", page_url, e);
                return Vec::new();
            }
        };

        let document = Html::parse_document(html);
        let host = base.host_str().unwrap_or("");

        let candidates = match self.sites.find(host) {
            Some(extractor) => {
                debug!("Using site-aware extractor for host {}", host);
                extractor.extract(&document, &base)
            }
            None => generic_extract(&document, &base),
        };

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(passes_final_filter)
            .filter(|c| seen.insert(c.url.clone()))
            .take(MAX_CANDIDATES)
            .map(|c| finalize(c, source))
            .filter(ResultRecord::is_valid)
            .collect()
    }
}

impl Default for HtmlPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Generic pipeline: container-selector cascade, then the hyperlink scan.
fn generic_extract(document: &Html, base: &Url) -> Vec<Candidate> {
    for selector_str in CONTAINER_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else { continue };
        let nodes: Vec<_> = document.select(&selector).collect();
        // A single match is usually a page-level wrapper, not a result.
        if nodes.len() > 1 {
            debug!("Container selector {:?} matched {} nodes", selector_str, nodes.len());
            return nodes
                .iter()
                .filter_map(|node| candidate_from_node(node, base, false))
                .collect();
        }
    }

    link_scan(document, base)
}

/// Fallback: keep hyperlinks whose path or text looks result-like.
fn link_scan(document: &Html, base: &Url) -> Vec<Candidate> {
    let Ok(selector) = Selector::parse("a[href]") else { return Vec::new() };

    document
        .select(&selector)
        .filter(|link| {
            let text = element_text(link);
            if text.chars().count() < MIN_LINK_TEXT_LEN {
                return false;
            }
            let href = link.value().attr("href").unwrap_or("");
            let text_lower = text.to_lowercase();
            RESULT_PATH_FRAGMENTS.iter().any(|fragment| {
                href.contains(fragment) || text_lower.contains(fragment.trim_start_matches('/'))
            })
        })
        .filter_map(|link| candidate_from_node(&link, base, false))
        .collect()
}

/// Assemble a candidate from one container node.
pub(crate) fn candidate_from_node(
    node: &ElementRef<'_>,
    base: &Url,
    extended_denylist: bool,
) -> Option<Candidate> {
    let url = pick_url(node, base)?;
    let name = pick_name(node, &url);
    let description = pick_description(node, &name, extended_denylist);

    Some(Candidate { name, description, url: url.to_string() })
}

/// Prefer the first link with a result-like path fragment, else the first
/// link present; relative hrefs resolve against the page base.
fn pick_url(node: &ElementRef<'_>, base: &Url) -> Option<Url> {
    let mut hrefs = Vec::new();
    if node.value().name() == "a" {
        if let Some(href) = node.value().attr("href") {
            hrefs.push(href);
        }
    }
    if let Ok(selector) = Selector::parse("a[href]") {
        for link in node.select(&selector) {
            if let Some(href) = link.value().attr("href") {
                hrefs.push(href);
            }
        }
    }

    let preferred = hrefs
        .iter()
        .find(|href| RESULT_PATH_FRAGMENTS.iter().any(|f| href.contains(f)))
        .or_else(|| hrefs.first());

    preferred.and_then(|href| base.join(href).ok())
}

/// First non-empty text among the title-like selectors; else the node's own
/// link text; else derived from the trailing URL path segment.
fn pick_name(node: &ElementRef<'_>, url: &Url) -> String {
    for selector_str in NAME_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else { continue };
        if let Some(found) = node.select(&selector).next() {
            let text = element_text(&found);
            if !text.is_empty() {
                return text;
            }
        }
    }

    if node.value().name() == "a" {
        let text = element_text(node);
        if !text.is_empty() {
            return text;
        }
    } else if let Ok(selector) = Selector::parse("a") {
        if let Some(link) = node.select(&selector).next() {
            let text = element_text(&link);
            if !text.is_empty() {
                return text;
            }
        }
    }

    derive_name_from_path(url)
}

/// First description candidate passing the validity filter.
fn pick_description(node: &ElementRef<'_>, name: &str, extended_denylist: bool) -> String {
    for selector_str in DESCRIPTION_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else { continue };
        for found in node.select(&selector) {
            let text = element_text(&found);
            if is_valid_description(&text, name, extended_denylist) {
                return text;
            }
        }
    }
    String::new()
}

/// Validity filter for description candidates.
pub(crate) fn is_valid_description(text: &str, name: &str, extended_denylist: bool) -> bool {
    let text = text.trim();
    if text.chars().count() < MIN_DESCRIPTION_LEN {
        return false;
    }
    if text.eq_ignore_ascii_case(name.trim()) {
        return false;
    }
    // Bare URLs are link targets, not prose.
    if text.starts_with("http") && !text.contains(' ') {
        return false;
    }
    if text.split_whitespace().count() < MIN_DESCRIPTION_WORDS {
        return false;
    }

    let lower = text.to_lowercase();
    if DESCRIPTION_DENYLIST.iter().any(|phrase| lower == *phrase) {
        return false;
    }
    if extended_denylist && EXTENDED_DESCRIPTION_DENYLIST.iter().any(|p| lower.contains(p)) {
        return false;
    }

    true
}

/// Derive a display name from the trailing URL path segment when the page
/// offers no title element.
pub(crate) fn derive_name_from_path(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(String::from))
        .map(|segment| segment.replace(['-', '_'], " ").trim().to_string())
        .unwrap_or_default()
}

/// Final validity filter on an assembled candidate.
fn passes_final_filter(candidate: &Candidate) -> bool {
    let Ok(url) = Url::parse(&candidate.url) else { return false };
    let path = url.path();
    if UTILITY_PATH_DENYLIST
        .iter()
        .any(|denied| path == *denied || path.starts_with(&format!("{denied}/")))
    {
        return false;
    }

    let name = candidate.name.trim().to_lowercase();
    if name.chars().count() < MIN_NAME_LEN {
        return false;
    }
    if GENERIC_NAME_DENYLIST.contains(&name.as_str()) {
        return false;
    }

    true
}

fn finalize(candidate: Candidate, source: &SourceConfig) -> ResultRecord {
    let mut record =
        ResultRecord::new(candidate.name, source.name.clone(), source.category.clone());
    record.description = candidate.description;
    if candidate.url.contains("github.com") {
        record.github_url = Some(candidate.url.clone());
    }
    record.url = candidate.url;
    record
}

/// Element text with collapsed whitespace.
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strategy for `url_param` sources: substitute the query into the search
/// URL template and run the HTML pipeline on the response.
pub struct UrlParamHtmlStrategy {
    pipeline: Arc<HtmlPipeline>,
}

impl UrlParamHtmlStrategy {
    pub fn new(pipeline: Arc<HtmlPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl ExtractionStrategy for UrlParamHtmlStrategy {
    async fn extract(
        &self,
        source: &SourceConfig,
        query: &str,
        ctx: &StrategyContext<'_>,
    ) -> Vec<ResultRecord> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let search_url = match source.search_endpoint.as_deref() {
            Some(template) if !template.trim().is_empty() => template.replace("{query}", &encoded),
            _ => {
                warn!("Source {} has no search endpoint", source.id);
                return Vec::new();
            }
        };

        let body = match ctx.transport.get_text(&search_url, &HashMap::new()).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Search page fetch failed for {}: {}", source.id, e);
                return Vec::new();
            }
        };

        self.pipeline.extract(&body, &search_url, source)
    }
}

/// Strategy for `scrape` sources: fetch the listing page and apply the
/// substring relevance filter post-extraction, since nothing upstream has
/// scoped the page to the query.
pub struct GenericHtmlStrategy {
    pipeline: Arc<HtmlPipeline>,
}

impl GenericHtmlStrategy {
    pub fn new(pipeline: Arc<HtmlPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl ExtractionStrategy for GenericHtmlStrategy {
    async fn extract(
        &self,
        source: &SourceConfig,
        query: &str,
        ctx: &StrategyContext<'_>,
    ) -> Vec<ResultRecord> {
        let Some(page_url) = source.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            warn!("Source {} has no url", source.id);
            return Vec::new();
        };

        let body = match ctx.transport.get_text(page_url, &HashMap::new()).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Listing page fetch failed for {}: {}", source.id, e);
                return Vec::new();
            }
        };

        self.pipeline
            .extract(&body, page_url, source)
            .into_iter()
            .filter(|record| record.matches_query(query))
            .collect()
    }
}
