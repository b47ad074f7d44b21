//! DI "Interfaces"

use crate::core::conversation::{Decision, Message, MessageId, Suggestion};
use crate::core::export::ExportFormat;
use crate::core::store::{StoreEvent, StoreStatus};
use crate::errors::ServiceError;
use crate::infrastructure::entities;
use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Lists all live conversations.
    async fn list_conversations(&self) -> Vec<entities::Conversation>;

    /// Creates a new conversation, seeded with the configured greeting.
    async fn create_conversation(&self) -> entities::Conversation;

    /// Cancels any outstanding replies and forgets the conversation.
    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<(), ServiceError>;

    /// The message log, oldest first.
    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, ServiceError>;

    /// Appends a user message and queues the assistant reply.
    ///
    /// Returns `Ok(None)` when the text is blank and nothing was appended.
    async fn post_user_message(
        &self,
        conversation_id: Uuid,
        text: String,
    ) -> Result<Option<Message>, ServiceError>;

    /// Accepts or rejects one pending suggestion.
    async fn decide_suggestion(
        &self,
        conversation_id: Uuid,
        message_id: MessageId,
        suggestion_id: String,
        decision: Decision,
    ) -> Result<Suggestion, ServiceError>;

    async fn status(&self, conversation_id: Uuid) -> Result<StoreStatus, ServiceError>;

    /// Cancels every outstanding reply, returning how many were cancelled.
    async fn cancel_replies(&self, conversation_id: Uuid) -> Result<usize, ServiceError>;

    /// Clears the chat.
    async fn reset_conversation(&self, conversation_id: Uuid) -> Result<(), ServiceError>;

    async fn export_conversation(
        &self,
        conversation_id: Uuid,
        format: ExportFormat,
    ) -> Result<String, ServiceError>;

    async fn subscribe(
        &self,
        conversation_id: Uuid,
    ) -> Result<broadcast::Receiver<StoreEvent>, ServiceError>;
}
