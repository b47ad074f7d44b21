//! Registry entities

use crate::core::store::ConversationStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct Conversation {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub store: Arc<ConversationStore>,
}
