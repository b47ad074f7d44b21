//! Process-local conversation registry. Nothing outlives the process.

use crate::infrastructure::entities::Conversation;
use crate::infrastructure::traits::ConversationRegistry;
use async_trait::async_trait;
use di::{inject, injectable};
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct InMemoryConversationRegistry {
    conversations: RwLock<HashMap<Uuid, Conversation>>,
}

#[injectable(ConversationRegistry)]
impl InMemoryConversationRegistry {
    #[inject]
    pub fn create() -> InMemoryConversationRegistry {
        InMemoryConversationRegistry {
            conversations: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ConversationRegistry for InMemoryConversationRegistry {
    async fn list_conversations(&self) -> Vec<Conversation> {
        let mut conversations: Vec<Conversation> =
            self.conversations.read().await.values().cloned().collect();
        conversations.sort_by_key(|c| c.created_at);
        conversations
    }

    async fn insert_conversation(&self, conversation: Conversation) {
        debug!("registering conversation {}", conversation.id);
        self.conversations
            .write()
            .await
            .insert(conversation.id, conversation);
    }

    async fn get_conversation(&self, conversation_id: Uuid) -> Option<Conversation> {
        self.conversations
            .read()
            .await
            .get(&conversation_id)
            .cloned()
    }

    async fn remove_conversation(&self, conversation_id: Uuid) -> Option<Conversation> {
        self.conversations.write().await.remove(&conversation_id)
    }
}
