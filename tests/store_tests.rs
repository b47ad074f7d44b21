//! Conversation store behaviour driven through a hand-controlled answer generator.
//!
//! The generator blocks until the test hands it a reply, so each test decides exactly
//! when (and with what) a generation resolves.

use async_trait::async_trait;
use docs_assistant_api::core::conversation::{
    Decision, Message, Role, SuggestionDraft, SuggestionKind, SuggestionStatus,
};
use docs_assistant_api::core::generator::{AnswerGenerator, Reply};
use docs_assistant_api::core::store::{ConversationStore, StoreOptions, TurnState};
use docs_assistant_api::errors::{GenerationError, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

/// Hands out whatever the test pushes into its channel, one reply per call.
struct ManualGenerator {
    replies: Mutex<mpsc::UnboundedReceiver<Result<Reply, GenerationError>>>,
    questions: std::sync::Mutex<Vec<String>>,
}

impl ManualGenerator {
    fn new() -> (Arc<Self>, mpsc::UnboundedSender<Result<Reply, GenerationError>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let generator = Arc::new(ManualGenerator {
            replies: Mutex::new(receiver),
            questions: std::sync::Mutex::new(Vec::new()),
        });
        (generator, sender)
    }

    fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerGenerator for ManualGenerator {
    async fn generate(&self, history: &[Message]) -> Result<Reply, GenerationError> {
        self.questions
            .lock()
            .unwrap()
            .push(history.last().unwrap().content.clone());

        self.replies
            .lock()
            .await
            .recv()
            .await
            .unwrap_or_else(|| Err(GenerationError::Failed("test finished".to_string())))
    }
}

fn store(generator: Arc<ManualGenerator>) -> ConversationStore {
    ConversationStore::new(
        generator,
        StoreOptions {
            reply_timeout: Duration::from_secs(60),
            event_capacity: 64,
            greeting: None,
        },
    )
}

fn text_reply(content: &str) -> Result<Reply, GenerationError> {
    Ok(Reply {
        content: content.to_string(),
        ..Reply::default()
    })
}

/// Lets the worker task run until it blocks again.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn test_oauth_end_to_end() {
    let (generator, replies) = ManualGenerator::new();
    let store = store(generator);

    store.append_user_message("How do I set up OAuth?").unwrap();
    let log = store.messages();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].role, Role::User);

    replies
        .send(Ok(Reply {
            content: "Use the authorize endpoint...".to_string(),
            sources: Vec::new(),
            suggestions: vec![SuggestionDraft {
                kind: SuggestionKind::Improvement,
                title: "Add PKCE".to_string(),
                description: "Proof Key for Code Exchange examples".to_string(),
                action: None,
                confidence: 88,
            }],
        }))
        .unwrap();
    store.wait_until_idle().await;

    let log = store.messages();
    assert_eq!(log.len(), 2);
    let reply = &log[1];
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.suggestions.len(), 1);
    assert_eq!(reply.suggestions[0].status, SuggestionStatus::Pending);
    let suggestion_id = reply.suggestions[0].id.clone();

    let accepted = store
        .set_suggestion_status(reply.id, &suggestion_id, Decision::Accepted)
        .unwrap();
    assert_eq!(accepted.status, SuggestionStatus::Accepted);

    let err = store
        .set_suggestion_status(reply.id, &suggestion_id, Decision::Rejected)
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
    assert_eq!(
        store.message(reply.id).unwrap().suggestions[0].status,
        SuggestionStatus::Accepted
    );
}

#[tokio::test]
async fn test_non_blank_inputs_grow_the_log_by_one() {
    let (generator, _replies) = ManualGenerator::new();
    let store = store(generator);

    for (i, text) in ["a", "  padded  ", "multi\nline", "ünïcode ✓"].iter().enumerate() {
        let before = store.len();
        let id = store.append_user_message(text).unwrap();
        assert_eq!(store.len(), before + 1);
        assert_eq!(store.messages()[i].id, id);
        assert_eq!(store.message(id).unwrap().role, Role::User);
    }
}

#[tokio::test]
async fn test_blank_inputs_leave_the_log_unchanged() {
    let (generator, _replies) = ManualGenerator::new();
    let store = store(generator);
    store.append_user_message("seed").unwrap();

    for text in ["", " ", "\t", "\n\n", " \r\n "] {
        assert!(store.append_user_message(text).is_none());
        assert_eq!(store.len(), 1);
    }
}

#[tokio::test]
async fn test_second_message_is_queued_behind_the_first() {
    let (generator, replies) = ManualGenerator::new();
    let store = store(generator.clone());

    store.append_user_message("A").unwrap();
    store.append_user_message("B").unwrap();
    settle().await;

    assert_eq!(store.turn_state(), TurnState::AwaitingReply { queued: 1 });
    // Only A has reached the generator.
    assert_eq!(generator.questions(), vec!["A"]);

    replies.send(text_reply("answer A")).unwrap();
    settle().await;
    assert_eq!(store.turn_state(), TurnState::AwaitingReply { queued: 0 });
    assert_eq!(generator.questions(), vec!["A", "B"]);

    replies.send(text_reply("answer B")).unwrap();
    store.wait_until_idle().await;

    let contents: Vec<String> = store.messages().into_iter().map(|m| m.content).collect();
    assert_eq!(contents, vec!["A", "B", "answer A", "answer B"]);
}

#[tokio::test]
async fn test_cancelled_reply_is_never_appended() {
    let (generator, replies) = ManualGenerator::new();
    let store = store(generator);

    let id = store.append_user_message("A").unwrap();
    settle().await;

    assert!(store.cancel_reply(id));
    assert!(!store.is_pending());

    // The generator resolving afterwards must not change anything.
    replies.send(text_reply("too late")).unwrap();
    settle().await;

    assert_eq!(store.len(), 1);
    assert!(store.last_failure().is_none());
}

#[tokio::test]
async fn test_failure_is_recoverable_with_a_fresh_message() {
    let (generator, replies) = ManualGenerator::new();
    let store = store(generator);

    store.append_user_message("A").unwrap();
    replies
        .send(Err(GenerationError::Failed("backend down".to_string())))
        .unwrap();
    store.wait_until_idle().await;

    assert_eq!(store.len(), 1);
    assert_eq!(store.turn_state(), TurnState::Idle);
    assert!(store.last_failure().unwrap().reason.contains("backend down"));

    store.append_user_message("A again").unwrap();
    replies.send(text_reply("works now")).unwrap();
    store.wait_until_idle().await;

    assert_eq!(store.messages().last().unwrap().content, "works now");
}

#[tokio::test]
async fn test_pending_signal_subscription() {
    let (generator, replies) = ManualGenerator::new();
    let store = store(generator);
    let mut pending = store.subscribe_pending();

    assert!(!*pending.borrow());

    store.append_user_message("A").unwrap();
    pending.changed().await.unwrap();
    assert!(*pending.borrow_and_update());

    replies.send(text_reply("done")).unwrap();
    pending.changed().await.unwrap();
    assert!(!*pending.borrow_and_update());
}
