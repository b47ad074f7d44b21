//! Conversation log entities: messages, suggestions and their decision lifecycle.

use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

pub type MessageId = Uuid;
pub type SuggestionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Improvement,
    Warning,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl SuggestionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SuggestionStatus::Pending)
    }
}

impl Display for SuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Accepted => "accepted",
            SuggestionStatus::Rejected => "rejected",
        })
    }
}

/// The reviewer's verdict on a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Rejected,
}

impl From<Decision> for SuggestionStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accepted => SuggestionStatus::Accepted,
            Decision::Rejected => SuggestionStatus::Rejected,
        }
    }
}

/// Suggestion as proposed by an answer generator, before the store owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionDraft {
    pub kind: SuggestionKind,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub kind: SuggestionKind,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub confidence: u8,
    pub status: SuggestionStatus,
}

impl Suggestion {
    /// Adopts a draft. Status always starts at `Pending` and confidence is capped at 100.
    pub fn from_draft(id: SuggestionId, draft: SuggestionDraft) -> Self {
        Suggestion {
            id,
            kind: draft.kind,
            title: draft.title,
            description: draft.description,
            action: draft.action,
            confidence: draft.confidence.min(100),
            status: SuggestionStatus::Pending,
        }
    }

    /// One-shot transition out of `Pending`.
    pub fn decide(&mut self, decision: Decision) -> Result<(), StoreError> {
        if self.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                suggestion_id: self.id.clone(),
                current: self.status,
                requested: decision.into(),
            });
        }

        self.status = decision.into();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Suggestion>,
}

impl Message {
    pub fn user(content: String) -> Self {
        Message {
            id: Uuid::new_v4(),
            role: Role::User,
            content,
            created_at: Utc::now(),
            sources: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Builds an assistant message, numbering suggestions `s1`, `s2`, ... in draft order.
    pub fn assistant(content: String, sources: Vec<String>, drafts: Vec<SuggestionDraft>) -> Self {
        let suggestions = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| Suggestion::from_draft(format!("s{}", index + 1), draft))
            .collect();

        Message {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content,
            created_at: Utc::now(),
            sources,
            suggestions,
        }
    }

    pub fn suggestion_mut(&mut self, suggestion_id: &str) -> Option<&mut Suggestion> {
        self.suggestions.iter_mut().find(|s| s.id == suggestion_id)
    }
}
