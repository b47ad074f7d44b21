//! Documentation summaries shown next to the chat and cited by the built-in generator.

use chrono::{DateTime, Duration, Utc};
use di::{inject, injectable};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    Moderate,
    Stale,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub title: String,
    pub summary: String,
    pub last_updated: DateTime<Utc>,
    /// 0-100
    pub trust_score: u8,
    pub freshness: Freshness,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentCatalog {
    documents: Vec<DocumentSummary>,
}

#[injectable]
impl DocumentCatalog {
    #[inject]
    pub fn create() -> DocumentCatalog {
        DocumentCatalog::default()
    }
}

impl DocumentCatalog {
    pub fn new(documents: Vec<DocumentSummary>) -> Self {
        DocumentCatalog { documents }
    }

    pub fn documents(&self) -> &[DocumentSummary] {
        &self.documents
    }

    /// Documents whose title or summary shares a significant word with `question`,
    /// in catalog order.
    pub fn matching(&self, question: &str) -> Vec<&DocumentSummary> {
        let terms = significant_words(question);
        if terms.is_empty() {
            return Vec::new();
        }

        self.documents
            .iter()
            .filter(|doc| {
                let haystack = significant_words(&format!("{} {}", doc.title, doc.summary));
                terms.iter().any(|term| haystack.contains(term))
            })
            .collect()
    }
}

impl Default for DocumentCatalog {
    fn default() -> Self {
        let now = Utc::now();

        DocumentCatalog::new(vec![
            DocumentSummary {
                title: "API Authentication Guide".to_owned(),
                summary: "Comprehensive guide covering API keys, OAuth 2.0, and best practices for secure authentication".to_owned(),
                last_updated: now - Duration::hours(2),
                trust_score: 95,
                freshness: Freshness::Fresh,
                warnings: Vec::new(),
            },
            DocumentSummary {
                title: "Rate Limiting Documentation".to_owned(),
                summary: "Details about API rate limits, quotas, and handling rate limit errors".to_owned(),
                last_updated: now - Duration::days(3),
                trust_score: 78,
                freshness: Freshness::Stale,
                warnings: vec![
                    "Information may be outdated".to_owned(),
                    "No recent updates from API team".to_owned(),
                ],
            },
            DocumentSummary {
                title: "SDK Integration Guide".to_owned(),
                summary: "Step-by-step integration guides for Python, Node.js, and Go SDKs".to_owned(),
                last_updated: now - Duration::weeks(1),
                trust_score: 85,
                freshness: Freshness::Moderate,
                warnings: vec!["Missing recent SDK updates".to_owned()],
            },
        ])
    }
}

// Words shorter than four letters ("api", "how", "the") match nearly everything.
fn significant_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() > 3)
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_by_summary_words() {
        let catalog = DocumentCatalog::default();
        let titles: Vec<&str> = catalog
            .matching("What are the current rate limits?")
            .iter()
            .map(|d| d.title.as_str())
            .collect();

        assert_eq!(titles, vec!["Rate Limiting Documentation"]);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let catalog = DocumentCatalog::default();
        let found = catalog.matching("How do I set up OAUTH?");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "API Authentication Guide");
    }

    #[test]
    fn test_short_words_never_match() {
        let catalog = DocumentCatalog::default();
        assert!(catalog.matching("how is the api").is_empty());
        assert!(catalog.matching("").is_empty());
    }
}
