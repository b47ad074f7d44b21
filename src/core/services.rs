//! Implementations for the service the app needs.
//!

use crate::config::AssistantConfig;
use crate::core::conversation::{Decision, Message, MessageId, Suggestion};
use crate::core::export::{self, ExportFormat};
use crate::core::generator::AnswerGenerator;
use crate::core::store::{ConversationStore, StoreEvent, StoreOptions, StoreStatus};
use crate::core::traits::ConversationService;
use crate::errors::ServiceError;
use crate::infrastructure::entities::Conversation;
use crate::infrastructure::traits::ConversationRegistry;
use async_trait::async_trait;
use chrono::Utc;
use di::{Ref, injectable};
use log::{error, info};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

#[injectable(ConversationService)]
pub struct DocsConversationService {
    registry: Ref<dyn ConversationRegistry>,
    generator: Ref<dyn AnswerGenerator>,
    config: Ref<AssistantConfig>,
}

impl DocsConversationService {
    async fn store(&self, conversation_id: Uuid) -> Result<Arc<ConversationStore>, ServiceError> {
        self.registry
            .get_conversation(conversation_id)
            .await
            .map(|c| c.store)
            .ok_or(ServiceError::ConversationNotFound(conversation_id))
    }
}

#[async_trait]
impl ConversationService for DocsConversationService {
    async fn list_conversations(&self) -> Vec<Conversation> {
        self.registry.list_conversations().await
    }

    async fn create_conversation(&self) -> Conversation {
        let store = ConversationStore::new(
            self.generator.clone(),
            StoreOptions::from(&*self.config),
        );
        let conversation = Conversation {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            store: Arc::new(store),
        };

        self.registry.insert_conversation(conversation.clone()).await;
        info!("created conversation {}", conversation.id);
        conversation
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<(), ServiceError> {
        let conversation = self
            .registry
            .remove_conversation(conversation_id)
            .await
            .ok_or(ServiceError::ConversationNotFound(conversation_id))?;

        let cancelled = conversation.store.cancel_all();
        info!("deleted conversation {conversation_id}, {cancelled} replies cancelled");
        Ok(())
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, ServiceError> {
        Ok(self.store(conversation_id).await?.messages())
    }

    async fn post_user_message(
        &self,
        conversation_id: Uuid,
        text: String,
    ) -> Result<Option<Message>, ServiceError> {
        let store = self.store(conversation_id).await?;
        Ok(store
            .append_user_message(&text)
            .and_then(|message_id| store.message(message_id)))
    }

    async fn decide_suggestion(
        &self,
        conversation_id: Uuid,
        message_id: MessageId,
        suggestion_id: String,
        decision: Decision,
    ) -> Result<Suggestion, ServiceError> {
        let store = self.store(conversation_id).await?;
        Ok(store.set_suggestion_status(message_id, &suggestion_id, decision)?)
    }

    async fn status(&self, conversation_id: Uuid) -> Result<StoreStatus, ServiceError> {
        Ok(self.store(conversation_id).await?.status())
    }

    async fn cancel_replies(&self, conversation_id: Uuid) -> Result<usize, ServiceError> {
        Ok(self.store(conversation_id).await?.cancel_all())
    }

    async fn reset_conversation(&self, conversation_id: Uuid) -> Result<(), ServiceError> {
        self.store(conversation_id).await?.reset();
        Ok(())
    }

    async fn export_conversation(
        &self,
        conversation_id: Uuid,
        format: ExportFormat,
    ) -> Result<String, ServiceError> {
        let messages = self.store(conversation_id).await?.messages();
        export::export(&messages, format).map_err(|e| {
            error!("export of {conversation_id} failed: {e}");
            ServiceError::Export(e.to_string())
        })
    }

    async fn subscribe(
        &self,
        conversation_id: Uuid,
    ) -> Result<broadcast::Receiver<StoreEvent>, ServiceError> {
        Ok(self.store(conversation_id).await?.subscribe())
    }
}
