use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical search result entity.
///
/// Every extraction strategy normalizes its source format into this shape.
/// Records are immutable once built; invalid ones are dropped at extraction
/// time via [`ResultRecord::is_valid`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: String,
    pub description: String,
    /// Primary URL (listing page, homepage, API-provided link)
    pub url: String,
    /// Repository link when it is distinct from the listing page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    /// Display name of the source that produced this record
    pub source: String,
    /// Category label of the source
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// Open-ended auxiliary data (confidence markers, match counts, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl ResultRecord {
    /// Create a record with the mandatory identity fields; URLs and the
    /// description are filled by the strategy before validation.
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            url: String::new(),
            github_url: None,
            source: source.into(),
            category: category.into(),
            last_updated: None,
            extra: HashMap::new(),
        }
    }

    /// Invariant: name non-empty and at least one of url/github_url present.
    pub fn is_valid(&self) -> bool {
        if self.name.trim().is_empty() {
            return false;
        }
        !self.url.trim().is_empty()
            || self
                .github_url
                .as_deref()
                .map(|u| !u.trim().is_empty())
                .unwrap_or(false)
    }

    /// Case-insensitive substring relevance check over name and description.
    ///
    /// Substring matching is the contract; no stemming or ranking.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, url: &str, github: Option<&str>) -> ResultRecord {
        let mut r = ResultRecord::new(name, "Test Source", "mcp_servers");
        r.url = url.to_string();
        r.github_url = github.map(String::from);
        r
    }

    #[test]
    fn test_valid_record() {
        assert!(record("Foo", "https://example.com/foo", None).is_valid());
        assert!(record("Foo", "", Some("https://github.com/a/foo")).is_valid());
    }

    #[test]
    fn test_invalid_records_dropped() {
        assert!(!record("", "https://example.com", None).is_valid());
        assert!(!record("   ", "https://example.com", None).is_valid());
        assert!(!record("Foo", "", None).is_valid());
        assert!(!record("Foo", "  ", Some(" ")).is_valid());
    }

    #[test]
    fn test_matches_query_is_substring_only() {
        let mut r = record("Memory Server", "https://example.com", None);
        r.description = "Persistent key-value storage".to_string();

        assert!(r.matches_query("memory"));
        assert!(r.matches_query("MEMORY"));
        assert!(r.matches_query("key-value"));
        assert!(!r.matches_query("memories")); // no stemming
    }

    #[test]
    fn test_serializes_to_plain_json() {
        let mut r = record("Foo", "https://example.com/foo", None);
        r.description = "bar".to_string();

        let json = serde_json::to_value(&r).expect("serialize");
        assert_eq!(json["name"], "Foo");
        assert_eq!(json["url"], "https://example.com/foo");
        // Empty optional fields stay out of the wire shape
        assert!(json.get("github_url").is_none());
        assert!(json.get("extra").is_none());
    }
}
