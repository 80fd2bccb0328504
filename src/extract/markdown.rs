use regex::Regex;
use tracing::debug;

use crate::config::SourceConfig;
use crate::record::ResultRecord;

/// Phrases marking navigational/meta lines in curated lists. A list item
/// whose name or trailing text contains one of these is never a catalog
/// entry.
pub(crate) const NOISE_VOCABULARY: &[&str] = &[
    "table of contents",
    "contributing",
    "license",
    "readme",
    "back to top",
    "see also",
    "documentation",
    "wiki",
    "homepage",
    "getting started",
    "changelog",
    "faq",
];

/// Ordered list-item patterns, evaluated first-match-wins per line.
/// Each captures (display name, target url, trailing text).
const LIST_ITEM_PATTERNS: &[&str] = &[
    // dash/asterisk bullet + markdown link + optional trailing text
    r"^[-*]\s+\[([^\]]+)\]\(([^)\s]+)\)\s*(?:[-–—:|]\s*)?(.*)$",
    // bold-emphasized link variant
    r"^[-*]\s+\*\*\[([^\]]+)\]\(([^)\s]+)\)\*\*\s*(?:[-–—:|]\s*)?(.*)$",
    // numbered-list variant
    r"^\d+\.\s+\[([^\]]+)\]\(([^)\s]+)\)\s*(?:[-–—:|]\s*)?(.*)$",
];

/// Markdown catalog extractor (curated "awesome list" documents).
///
/// Curated lists have no machine-readable schema; these heuristics trade
/// recall for precision, preferring missed items over navigation leakage.
pub struct CatalogMatchers {
    patterns: Vec<Regex>,
}

impl CatalogMatchers {
    pub fn new() -> Self {
        Self {
            patterns: LIST_ITEM_PATTERNS
                .iter()
                .map(|p| Regex::new(p).unwrap())
                .collect(),
        }
    }

    /// Extract catalog entries matching `query` from a markdown document.
    pub fn extract(&self, text: &str, query: &str, source: &SourceConfig) -> Vec<ResultRecord> {
        let query = query.trim().to_lowercase();
        let mut records = Vec::new();

        // Current section is scan state threaded through the walk.
        let mut section = String::new();

        for line in text.lines() {
            let line = line.trim();

            if let Some(heading) = line.strip_prefix('#') {
                section = heading.trim_start_matches('#').trim().to_string();
                continue;
            }

            let Some((name, target, trailing)) = self.match_item(line) else {
                continue;
            };

            if name.chars().count() < 2 || target.starts_with('#') {
                continue;
            }
            if is_noise(&name) || is_noise(&trailing) {
                continue;
            }

            let description = clean_trailing_text(&trailing);

            let matches = name.to_lowercase().contains(&query)
                || description.to_lowercase().contains(&query)
                || section.to_lowercase().contains(&query);
            if !matches {
                continue;
            }

            let description = if description.is_empty() {
                synthesize_description(&section)
            } else {
                description
            };

            let mut record = ResultRecord::new(name, source.name.clone(), source.category.clone());
            record.description = description;
            record.url = target.clone();
            if target.contains("github.com") {
                record.github_url = Some(target);
            }

            if record.is_valid() {
                records.push(record);
            }
        }

        debug!(
            "Markdown catalog {} yielded {} records for {:?}",
            source.id,
            records.len(),
            query
        );
        records
    }

    /// Try the pattern table in priority order; first match wins.
    fn match_item(&self, line: &str) -> Option<(String, String, String)> {
        for pattern in &self.patterns {
            if let Some(caps) = pattern.captures(line) {
                return Some((
                    caps[1].trim().to_string(),
                    caps[2].trim().to_string(),
                    caps[3].trim().to_string(),
                ));
            }
        }
        None
    }
}

impl Default for CatalogMatchers {
    fn default() -> Self {
        Self::new()
    }
}

fn is_noise(text: &str) -> bool {
    let text = text.to_lowercase();
    NOISE_VOCABULARY.iter().any(|noise| text.contains(noise))
}

/// Strip markdown emphasis markers and trailing punctuation.
fn clean_trailing_text(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '*' | '_' | '`'))
        .collect::<String>()
        .trim()
        .trim_end_matches(['.', ',', ';', ':'])
        .trim()
        .to_string()
}

/// The description is never left empty.
fn synthesize_description(section: &str) -> String {
    if section.is_empty() {
        "From curated list".to_string()
    } else {
        format!("From {section} category")
    }
}
