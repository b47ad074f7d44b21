//! Infrastructure traits, used for DI on higher levels

use crate::infrastructure::entities;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait ConversationRegistry: Send + Sync {
    /// All live conversations, oldest first.
    async fn list_conversations(&self) -> Vec<entities::Conversation>;

    async fn insert_conversation(&self, conversation: entities::Conversation);

    async fn get_conversation(&self, conversation_id: Uuid) -> Option<entities::Conversation>;

    /// Removes a conversation, returning it if it existed.
    async fn remove_conversation(&self, conversation_id: Uuid) -> Option<entities::Conversation>;
}
