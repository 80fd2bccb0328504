use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EngineConfig, RetrievalMode, SourceConfig};
use crate::http::HttpTransport;
use crate::record::ResultRecord;

pub mod api;
pub mod github;
pub mod html;
pub mod markdown;

pub use api::DirectApiStrategy;
pub use github::{CuratedListStrategy, RepoCodeSearchStrategy};
pub use html::{GenericHtmlStrategy, HtmlPipeline, SiteExtractor, UrlParamHtmlStrategy};
pub use markdown::CatalogMatchers;

/// Shared dependencies handed to every strategy invocation.
pub struct StrategyContext<'a> {
    pub transport: &'a HttpTransport,
    pub config: &'a EngineConfig,
}

/// One fetch+parse unit.
///
/// Contract: never propagates an error outward. An unrecoverable failure
/// yields an empty sequence; every returned record satisfies the
/// [`ResultRecord::is_valid`] invariant.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    async fn extract(
        &self,
        source: &SourceConfig,
        query: &str,
        ctx: &StrategyContext<'_>,
    ) -> Vec<ResultRecord>;
}

/// The full strategy complement, resolved by retrieval-mode tag.
pub struct StrategySet {
    api: DirectApiStrategy,
    url_param: UrlParamHtmlStrategy,
    code_search: RepoCodeSearchStrategy,
    curated: CuratedListStrategy,
    generic: GenericHtmlStrategy,
}

impl StrategySet {
    pub fn new() -> Self {
        let pipeline = Arc::new(HtmlPipeline::new());
        Self {
            api: DirectApiStrategy,
            url_param: UrlParamHtmlStrategy::new(pipeline.clone()),
            code_search: RepoCodeSearchStrategy,
            curated: CuratedListStrategy::new(),
            generic: GenericHtmlStrategy::new(pipeline),
        }
    }

    pub fn resolve(&self, mode: RetrievalMode) -> &dyn ExtractionStrategy {
        match mode {
            RetrievalMode::Api => &self.api,
            RetrievalMode::UrlParam => &self.url_param,
            RetrievalMode::CodeSearch => &self.code_search,
            RetrievalMode::CuratedList => &self.curated,
            RetrievalMode::Scrape => &self.generic,
        }
    }
}

impl Default for StrategySet {
    fn default() -> Self {
        Self::new()
    }
}
