//! Conversations endpoints

use crate::api::conversations::schemas::{
    CancelResult, ConversationList, CreateConversation, CreateMessage, DecideSuggestion,
    ExportQuery,
};
use crate::core::conversation::{Message, MessageId, Suggestion};
use crate::core::store::{StoreEvent, StoreStatus};
use crate::core::traits::ConversationService;
use crate::errors::ServiceError;
use async_stream::stream;
use axum::extract::{Path, Query};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use di_axum::Inject;
use futures_util::Stream;
use log::{error, warn};
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_conversations).post(new_conversation))
        .route("/:id", delete(delete_conversation))
        .route(
            "/:id/messages",
            get(conversation_messages).post(post_message),
        )
        .route(
            "/:id/messages/:message_id/suggestions/:suggestion_id",
            post(decide_suggestion),
        )
        .route("/:id/status", get(conversation_status))
        .route("/:id/cancel", post(cancel_replies))
        .route("/:id/reset", post(reset_conversation))
        .route("/:id/export", get(export_conversation))
        .route("/:id/events", get(conversation_events))
}

async fn list_conversations(
    Inject(conversation_service): Inject<dyn ConversationService>,
) -> Json<ConversationList> {
    let conversations = conversation_service.list_conversations().await;

    Json(ConversationList {
        conversations: conversations
            .into_iter()
            .map(schemas::ConversationSummary::from)
            .collect(),
    })
}

async fn new_conversation(
    Inject(conversation_service): Inject<dyn ConversationService>,
    create_conversation: Option<Json<CreateConversation>>,
) -> Result<(StatusCode, Json<schemas::Conversation>), ServiceError> {
    let conversation = conversation_service.create_conversation().await;

    if let Some(Json(CreateConversation {
        message: Some(text),
    })) = create_conversation
    {
        conversation_service
            .post_user_message(conversation.id, text)
            .await?;
    }

    Ok((
        StatusCode::CREATED,
        Json(schemas::Conversation {
            id: conversation.id,
            created_at: conversation.created_at,
            messages: conversation.store.messages(),
        }),
    ))
}

async fn delete_conversation(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    conversation_service
        .delete_conversation(conversation_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn conversation_messages(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<schemas::MessagesList>, ServiceError> {
    let messages = conversation_service.list_messages(conversation_id).await?;
    Ok(Json(schemas::MessagesList { messages }))
}

async fn post_message(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<Uuid>,
    Json(message): Json<CreateMessage>,
) -> Result<Response, ServiceError> {
    match conversation_service
        .post_user_message(conversation_id, message.text)
        .await?
    {
        Some(message) => Ok((StatusCode::ACCEPTED, Json::<Message>(message)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn decide_suggestion(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path((conversation_id, message_id, suggestion_id)): Path<(Uuid, MessageId, String)>,
    Json(body): Json<DecideSuggestion>,
) -> Result<Json<Suggestion>, ServiceError> {
    let suggestion = conversation_service
        .decide_suggestion(conversation_id, message_id, suggestion_id, body.decision)
        .await?;
    Ok(Json(suggestion))
}

async fn conversation_status(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<StoreStatus>, ServiceError> {
    Ok(Json(conversation_service.status(conversation_id).await?))
}

async fn cancel_replies(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<CancelResult>, ServiceError> {
    let cancelled = conversation_service.cancel_replies(conversation_id).await?;
    Ok(Json(CancelResult { cancelled }))
}

async fn reset_conversation(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    conversation_service
        .reset_conversation(conversation_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export_conversation(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ServiceError> {
    let body = conversation_service
        .export_conversation(conversation_id, query.format)
        .await?;

    Ok(([(header::CONTENT_TYPE, query.format.content_type())], body).into_response())
}

async fn conversation_events(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServiceError> {
    let mut receiver = conversation_service.subscribe(conversation_id).await?;

    let stream = stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => match Event::default().event(event_name(&event)).json_data(&event) {
                    Ok(sse_event) => yield Ok(sse_event),
                    Err(e) => error!("failed to encode store event: {e}"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("event stream for {conversation_id} lagged, {skipped} events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn event_name(event: &StoreEvent) -> &'static str {
    match event {
        StoreEvent::MessageAppended { .. } => "message_appended",
        StoreEvent::SuggestionDecided { .. } => "suggestion_decided",
        StoreEvent::PendingChanged { .. } => "pending_changed",
        StoreEvent::GenerationFailed(_) => "generation_failed",
        StoreEvent::ReplyCancelled { .. } => "reply_cancelled",
        StoreEvent::Reset => "reset",
    }
}

pub mod schemas {
    use crate::core::conversation::{Decision, Message};
    use crate::core::export::ExportFormat;
    use crate::infrastructure::entities;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Deserialize, Debug, Default)]
    pub struct CreateConversation {
        #[serde(default)]
        pub message: Option<String>,
    }

    #[derive(Serialize, Debug)]
    pub struct Conversation {
        pub id: Uuid,
        pub created_at: DateTime<Utc>,
        pub messages: Vec<Message>,
    }

    #[derive(Serialize, Debug)]
    pub struct ConversationSummary {
        pub id: Uuid,
        pub created_at: DateTime<Utc>,
        pub message_count: usize,
        pub pending: bool,
    }

    impl From<entities::Conversation> for ConversationSummary {
        fn from(conversation: entities::Conversation) -> Self {
            ConversationSummary {
                id: conversation.id,
                created_at: conversation.created_at,
                message_count: conversation.store.len(),
                pending: conversation.store.is_pending(),
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct ConversationList {
        pub conversations: Vec<ConversationSummary>,
    }

    #[derive(Serialize, Debug, Default)]
    pub struct MessagesList {
        pub messages: Vec<Message>,
    }

    #[derive(Deserialize, Debug)]
    pub struct CreateMessage {
        pub text: String,
    }

    #[derive(Deserialize, Debug)]
    pub struct DecideSuggestion {
        pub decision: Decision,
    }

    #[derive(Serialize, Debug)]
    pub struct CancelResult {
        pub cancelled: usize,
    }

    #[derive(Deserialize, Debug, Default)]
    pub struct ExportQuery {
        #[serde(default)]
        pub format: ExportFormat,
    }
}
