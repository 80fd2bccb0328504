use thiserror::Error;

/// Error types for the search engine.
///
/// None of these ever cross the `SourceClient` boundary: a failing source
/// degrades to an empty result set. The taxonomy exists so the orchestrator
/// can tell transient failures (worth one retry) apart from configuration
/// mistakes (skip, never retry).
#[derive(Error, Debug)]
pub enum SearchError {
    // Network errors
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("HTTP request failed: {url} - {status}")]
    Http { url: String, status: u16 },

    #[error("Request timeout: {url}")]
    Timeout { url: String },

    // Response shape errors
    #[error("Format error: {message}")]
    Format { message: String },

    // Source configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Authentication errors
    #[error("Authentication failed for source: {source_name}")]
    Auth { source_name: String },
}

impl SearchError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format { message: message.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an authentication error
    pub fn auth(source: impl Into<String>) -> Self {
        Self::Auth { source_name: source.into() }
    }

    /// Whether a retry pass may plausibly succeed.
    ///
    /// Configuration and authentication problems do not fix themselves
    /// between two passes of the same search.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Http { .. } | Self::Timeout { .. } => true,
            Self::Format { .. } | Self::Config { .. } | Self::Auth { .. } => false,
        }
    }

    /// Error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            Self::Network { .. } | Self::Http { .. } | Self::Timeout { .. } => "network",
            Self::Format { .. } => "format",
            Self::Config { .. } => "config",
            Self::Auth { .. } => "auth",
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        if err.is_timeout() {
            Self::Timeout { url }
        } else if let Some(status) = err.status() {
            Self::Http { url, status: status.as_u16() }
        } else if err.is_decode() {
            Self::Format { message: err.to_string() }
        } else {
            Self::Network { message: err.to_string() }
        }
    }
}

/// Result type alias for engine internals
pub type SearchResult<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        let network = SearchError::network("connection reset");
        assert!(network.is_recoverable());
        assert_eq!(network.category(), "network");

        let timeout = SearchError::Timeout { url: "https://example.com".into() };
        assert!(timeout.is_recoverable());
        assert_eq!(timeout.category(), "network");
    }

    #[test]
    fn test_non_recoverable_errors() {
        let config = SearchError::config("missing search_endpoint");
        assert!(!config.is_recoverable());
        assert_eq!(config.category(), "config");

        let auth = SearchError::auth("github_code_search");
        assert!(!auth.is_recoverable());
        assert_eq!(auth.category(), "auth");

        let format = SearchError::format("unexpected JSON shape");
        assert!(!format.is_recoverable());
    }
}
