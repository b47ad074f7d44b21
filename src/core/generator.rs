//! Answer generation.
//!
//! The store only sees the [`AnswerGenerator`] trait. [`DocsAnswerGenerator`] is the
//! built-in implementation: it waits a fixed delay, cites catalog documents related to
//! the latest question and renders its reply from a template.

use crate::config::AssistantConfig;
use crate::core::conversation::{Message, Role, SuggestionDraft, SuggestionKind};
use crate::core::documents::{DocumentCatalog, DocumentSummary, Freshness};
use crate::errors::GenerationError;
use async_trait::async_trait;
use di::{Ref, inject, injectable};
use log::debug;
use std::time::Duration;

const FALLBACK_SOURCES: [&str; 2] = ["API Documentation", "User Guide"];

const REPLY_TEMPLATE: &str = r#"{% if sources %}Based on {{ sources | join(", ") }}, here is what I found about "{{ question }}".{% else %}I couldn't find a document that covers "{{ question }}" directly.{% endif %}
{% for doc in stale %}
Note: {{ doc.title }} was last updated {{ doc.age }} and has a trust score of {{ doc.trust_score }}%.
{% endfor %}
This is turn {{ turn }} of our conversation."#;

/// Output of a successful generator call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub content: String,
    pub sources: Vec<String>,
    pub suggestions: Vec<SuggestionDraft>,
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Produces the next assistant turn from the full history, oldest first.
    async fn generate(&self, history: &[Message]) -> Result<Reply, GenerationError>;
}

pub struct DocsAnswerGenerator {
    catalog: DocumentCatalog,
    delay: Duration,
    templates: minijinja::Environment<'static>,
}

#[injectable(AnswerGenerator)]
impl DocsAnswerGenerator {
    #[inject]
    pub fn create(config: Ref<AssistantConfig>, catalog: Ref<DocumentCatalog>) -> DocsAnswerGenerator {
        Self::new((*catalog).clone(), config.reply_delay)
    }
}

impl DocsAnswerGenerator {
    pub fn new(catalog: DocumentCatalog, delay: Duration) -> Self {
        let mut templates = minijinja::Environment::new();
        templates.set_trim_blocks(true);

        DocsAnswerGenerator {
            catalog,
            delay,
            templates,
        }
    }

    fn render(&self, question: &str, turn: usize, cited: &[&DocumentSummary]) -> Result<String, GenerationError> {
        let sources: Vec<&str> = cited.iter().map(|doc| doc.title.as_str()).collect();
        let stale: Vec<minijinja::Value> = cited
            .iter()
            .filter(|doc| doc.freshness != Freshness::Fresh)
            .map(|doc| {
                minijinja::context! {
                    title => doc.title,
                    trust_score => doc.trust_score,
                    age => describe_age(doc),
                }
            })
            .collect();

        self.templates
            .render_str(
                REPLY_TEMPLATE,
                minijinja::context! {
                    question => question,
                    sources => sources,
                    stale => stale,
                    turn => turn,
                },
            )
            .map_err(|e| GenerationError::Failed(format!("reply template: {e}")))
    }
}

#[async_trait]
impl AnswerGenerator for DocsAnswerGenerator {
    async fn generate(&self, history: &[Message]) -> Result<Reply, GenerationError> {
        tokio::time::sleep(self.delay).await;

        let question = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.trim())
            .ok_or_else(|| GenerationError::Failed("no question to answer".to_owned()))?;
        let turn = history.iter().filter(|m| m.role == Role::User).count();

        let cited = self.catalog.matching(question);
        debug!("answering {question:?} with {} cited documents", cited.len());

        let content = self.render(question, turn, &cited)?;
        let suggestions = cited
            .iter()
            .filter(|doc| doc.freshness != Freshness::Fresh)
            .map(|doc| SuggestionDraft {
                kind: SuggestionKind::Warning,
                title: "Potentially Outdated Information".to_owned(),
                description: match doc.warnings.first() {
                    Some(warning) => format!("{}: {}", doc.title, warning),
                    None => format!("{} may need verification", doc.title),
                },
                action: Some(format!("Review {}", doc.title)),
                confidence: doc.trust_score,
            })
            .collect();

        let sources = if cited.is_empty() {
            FALLBACK_SOURCES.iter().map(|s| s.to_string()).collect()
        } else {
            cited.iter().map(|doc| doc.title.clone()).collect()
        };

        Ok(Reply {
            content,
            sources,
            suggestions,
        })
    }
}

fn describe_age(doc: &DocumentSummary) -> String {
    let age = chrono::Utc::now() - doc.last_updated;
    if age.num_days() >= 7 {
        format!("{} week(s) ago", age.num_weeks())
    } else if age.num_days() >= 1 {
        format!("{} day(s) ago", age.num_days())
    } else {
        format!("{} hour(s) ago", age.num_hours())
    }
}
