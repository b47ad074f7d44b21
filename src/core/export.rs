//! Chat export.

use crate::core::conversation::{Message, Role, SuggestionStatus};
use serde::Deserialize;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

pub fn export(messages: &[Message], format: ExportFormat) -> Result<String, serde_json::Error> {
    match format {
        ExportFormat::Markdown => Ok(to_markdown(messages)),
        ExportFormat::Json => serde_json::to_string_pretty(messages),
    }
}

pub fn to_markdown(messages: &[Message]) -> String {
    let mut out = String::from("# Conversation\n");

    for message in messages {
        let speaker = match message.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "\n## {speaker} ({})\n\n{}\n",
            message.created_at.format("%Y-%m-%d %H:%M UTC"),
            message.content.trim_end()
        );

        if !message.sources.is_empty() {
            let _ = writeln!(out, "\nSources: {}", message.sources.join(", "));
        }

        if !message.suggestions.is_empty() {
            out.push_str("\nSuggestions:\n");
            for s in &message.suggestions {
                let mark = match s.status {
                    SuggestionStatus::Pending => " ",
                    SuggestionStatus::Accepted => "x",
                    SuggestionStatus::Rejected => "-",
                };
                let _ = writeln!(
                    out,
                    "- [{mark}] {} ({}%, {}): {}",
                    s.title, s.confidence, s.status, s.description
                );
            }
        }
    }

    out
}
