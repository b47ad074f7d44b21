//! Error types shared by the store, the answer generator and the service layer.

use crate::core::conversation::{MessageId, SuggestionStatus};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Rejections raised by conversation store operations. Nothing is mutated when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("message {0} not found")]
    MessageNotFound(MessageId),

    #[error("suggestion `{suggestion_id}` not found on message {message_id}")]
    SuggestionNotFound {
        message_id: MessageId,
        suggestion_id: String,
    },

    #[error("suggestion `{suggestion_id}` is already {current}, cannot become {requested}")]
    InvalidTransition {
        suggestion_id: String,
        current: SuggestionStatus,
        requested: SuggestionStatus,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::MessageNotFound(_) | StoreError::SuggestionNotFound { .. }
        )
    }
}

/// Failure of an answer generator call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation failed: {0}")]
    Failed(String),

    #[error("generation timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("conversation {0} not found")]
    ConversationNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("export failed: {0}")]
    Export(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ServiceError::ConversationNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ServiceError::Store(e) if e.is_not_found() => (StatusCode::NOT_FOUND, "not_found"),
            ServiceError::Store(_) => (StatusCode::CONFLICT, "invalid_transition"),
            ServiceError::Export(_) => (StatusCode::INTERNAL_SERVER_ERROR, "export_failed"),
        };

        (
            status,
            Json(ErrorBody {
                error,
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}
