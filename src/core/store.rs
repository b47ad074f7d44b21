//! Conversation store: the message log of one conversation and every mutation to it.
//!
//! User messages are appended synchronously. Each one enqueues a reply request for the
//! store's background worker, which calls the [`AnswerGenerator`] one request at a time,
//! in the order the user messages were accepted. Suggestion decisions are one-shot and
//! checked here, not by callers.

use crate::config::AssistantConfig;
use crate::core::conversation::{Decision, Message, MessageId, Suggestion};
use crate::core::generator::{AnswerGenerator, Reply};
use crate::errors::{GenerationError, StoreError};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use log::{debug, info, warn};
use serde::Serialize;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub reply_timeout: Duration,
    pub event_capacity: usize,
    pub greeting: Option<String>,
}

impl From<&AssistantConfig> for StoreOptions {
    fn from(config: &AssistantConfig) -> Self {
        StoreOptions {
            reply_timeout: config.reply_timeout,
            event_capacity: config.event_capacity,
            greeting: config.greeting.clone(),
        }
    }
}

/// Mirrors [`AssistantConfig::default`], so stores built from it start with the
/// greeting message already in the log. Set `greeting: None` for an empty log.
impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions::from(&AssistantConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    /// A reply is being generated; `queued` more are waiting behind it.
    AwaitingReply { queued: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStatus {
    pub pending: bool,
    pub turn: TurnState,
    pub last_failure: Option<GenerationFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationFailure {
    pub user_message_id: MessageId,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    MessageAppended {
        message: Message,
    },
    SuggestionDecided {
        message_id: MessageId,
        suggestion: Suggestion,
    },
    PendingChanged {
        pending: bool,
    },
    GenerationFailed(GenerationFailure),
    ReplyCancelled {
        user_message_id: MessageId,
    },
    Reset,
}

struct ReplyRequest {
    user_message_id: MessageId,
    token: CancellationToken,
}

struct Outstanding {
    user_message_id: MessageId,
    token: CancellationToken,
}

#[derive(Default)]
struct StoreState {
    messages: Vec<Message>,
    /// Unresolved reply requests, oldest (in flight) first.
    outstanding: VecDeque<Outstanding>,
    last_failure: Option<GenerationFailure>,
}

struct Shared {
    state: Mutex<StoreState>,
    events: broadcast::Sender<StoreEvent>,
    pending: watch::Sender<bool>,
    greeting: Option<String>,
    shutdown: CancellationToken,
}

pub struct ConversationStore {
    shared: Arc<Shared>,
    requests: mpsc::UnboundedSender<ReplyRequest>,
}

impl ConversationStore {
    /// Creates the store and spawns its reply worker; must be called within a Tokio runtime.
    pub fn new(generator: Arc<dyn AnswerGenerator>, options: StoreOptions) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        let (pending, _) = watch::channel(false);
        let (requests, receiver) = mpsc::unbounded_channel();

        let mut state = StoreState::default();
        if let Some(greeting) = &options.greeting {
            state
                .messages
                .push(Message::assistant(greeting.clone(), Vec::new(), Vec::new()));
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            events,
            pending,
            greeting: options.greeting,
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(reply_worker(
            shared.clone(),
            generator,
            options.reply_timeout,
            receiver,
        ));

        ConversationStore { shared, requests }
    }

    /// Appends a user message and queues a reply for it.
    ///
    /// Blank input is ignored and yields `None`.
    pub fn append_user_message(&self, text: &str) -> Option<MessageId> {
        if text.trim().is_empty() {
            debug!("ignoring blank user message");
            return None;
        }

        let message = Message::user(text.to_owned());
        let message_id = message.id;
        let token = self.shared.shutdown.child_token();

        let mut state = self.shared.lock();
        state.messages.push(message.clone());
        self.shared.emit(StoreEvent::MessageAppended { message });

        if self
            .requests
            .send(ReplyRequest {
                user_message_id: message_id,
                token: token.clone(),
            })
            .is_err()
        {
            // Worker gone: keep the message, report the reply as failed.
            self.shared.fail(
                &mut state,
                message_id,
                "reply worker is not running".to_owned(),
            );
            return Some(message_id);
        }

        state.outstanding.push_back(Outstanding {
            user_message_id: message_id,
            token,
        });
        debug!(
            "queued reply for {message_id}, {} outstanding",
            state.outstanding.len()
        );
        self.shared.publish_pending(&state);

        Some(message_id)
    }

    /// Records a decision on one pending suggestion and returns the updated suggestion.
    pub fn set_suggestion_status(
        &self,
        message_id: MessageId,
        suggestion_id: &str,
        decision: Decision,
    ) -> Result<Suggestion, StoreError> {
        let mut state = self.shared.lock();

        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or(StoreError::MessageNotFound(message_id))?;

        let suggestion =
            message
                .suggestion_mut(suggestion_id)
                .ok_or_else(|| StoreError::SuggestionNotFound {
                    message_id,
                    suggestion_id: suggestion_id.to_owned(),
                })?;

        suggestion.decide(decision)?;
        let suggestion = suggestion.clone();
        debug!("suggestion {suggestion_id} on {message_id} is now {}", suggestion.status);

        self.shared.emit(StoreEvent::SuggestionDecided {
            message_id,
            suggestion: suggestion.clone(),
        });
        Ok(suggestion)
    }

    /// Cancels the reply requested by `user_message_id`, queued or in flight.
    ///
    /// Returns `false` if that reply already resolved or was never requested.
    pub fn cancel_reply(&self, user_message_id: MessageId) -> bool {
        let mut state = self.shared.lock();

        let Some(position) = state
            .outstanding
            .iter()
            .position(|o| o.user_message_id == user_message_id)
        else {
            return false;
        };

        if let Some(outstanding) = state.outstanding.remove(position) {
            outstanding.token.cancel();
        }
        debug!("cancelled reply for {user_message_id}");
        self.shared
            .emit(StoreEvent::ReplyCancelled { user_message_id });
        self.shared.publish_pending(&state);
        true
    }

    /// Cancels every outstanding reply and returns how many there were.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.shared.lock();
        let cancelled = self.shared.cancel_outstanding(&mut state);
        self.shared.publish_pending(&state);
        cancelled
    }

    /// Clears the chat: cancels outstanding replies and starts a fresh log.
    pub fn reset(&self) {
        let mut state = self.shared.lock();
        let cancelled = self.shared.cancel_outstanding(&mut state);

        state.messages.clear();
        state.last_failure = None;
        if let Some(greeting) = &self.shared.greeting {
            state
                .messages
                .push(Message::assistant(greeting.clone(), Vec::new(), Vec::new()));
        }

        info!("conversation reset, {cancelled} replies cancelled");
        self.shared.emit(StoreEvent::Reset);
        self.shared.publish_pending(&state);
    }

    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock().messages.clone()
    }

    pub fn message(&self, message_id: MessageId) -> Option<Message> {
        self.shared
            .lock()
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The pending signal: `true` while any reply is queued or being generated.
    pub fn is_pending(&self) -> bool {
        *self.shared.pending.borrow()
    }

    pub fn turn_state(&self) -> TurnState {
        self.status().turn
    }

    pub fn status(&self) -> StoreStatus {
        let state = self.shared.lock();
        StoreStatus {
            pending: !state.outstanding.is_empty(),
            turn: match state.outstanding.len() {
                0 => TurnState::Idle,
                n => TurnState::AwaitingReply { queued: n - 1 },
            },
            last_failure: state.last_failure.clone(),
        }
    }

    pub fn last_failure(&self) -> Option<GenerationFailure> {
        self.shared.lock().last_failure.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.shared.events.subscribe()
    }

    pub fn subscribe_pending(&self) -> watch::Receiver<bool> {
        self.shared.pending.subscribe()
    }

    /// Resolves once no reply is outstanding.
    pub async fn wait_until_idle(&self) {
        let mut pending = self.shared.pending.subscribe();
        // Only fails if the sender is dropped, which `self` prevents.
        let _ = pending.wait_for(|pending| !*pending).await;
    }
}

impl Drop for ConversationStore {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish_pending(&self, state: &StoreState) {
        let pending = !state.outstanding.is_empty();
        let changed = self.pending.send_if_modified(|current| {
            let changed = *current != pending;
            *current = pending;
            changed
        });
        if changed {
            self.emit(StoreEvent::PendingChanged { pending });
        }
    }

    fn cancel_outstanding(&self, state: &mut StoreState) -> usize {
        let cancelled = state.outstanding.len();
        for outstanding in state.outstanding.drain(..) {
            outstanding.token.cancel();
            self.emit(StoreEvent::ReplyCancelled {
                user_message_id: outstanding.user_message_id,
            });
        }
        cancelled
    }

    fn fail(&self, state: &mut StoreState, user_message_id: MessageId, reason: String) {
        warn!("reply for {user_message_id} failed: {reason}");
        let failure = GenerationFailure {
            user_message_id,
            reason,
            at: Utc::now(),
        };
        state.last_failure = Some(failure.clone());
        self.emit(StoreEvent::GenerationFailed(failure));
    }

    /// History handed to the generator: the log up to and including the triggering message.
    fn history_for(&self, user_message_id: MessageId) -> Option<Vec<Message>> {
        let state = self.lock();
        let end = state.messages.iter().position(|m| m.id == user_message_id)?;
        Some(state.messages[..=end].to_vec())
    }

    fn resolve(&self, request: &ReplyRequest, outcome: Result<Reply, GenerationError>) {
        let mut state = self.lock();

        // Cancellation removes the request under this same lock, so a late result is dropped here.
        if request.token.is_cancelled() {
            debug!("discarding reply for cancelled {}", request.user_message_id);
            return;
        }
        state
            .outstanding
            .retain(|o| o.user_message_id != request.user_message_id);

        match outcome {
            Ok(reply) => {
                let message = Message::assistant(reply.content, reply.sources, reply.suggestions);
                debug!(
                    "reply {} for {} with {} suggestions",
                    message.id,
                    request.user_message_id,
                    message.suggestions.len()
                );
                state.messages.push(message.clone());
                self.emit(StoreEvent::MessageAppended { message });
            }
            Err(e) => self.fail(&mut state, request.user_message_id, e.to_string()),
        }

        self.publish_pending(&state);
    }
}

async fn reply_worker(
    shared: Arc<Shared>,
    generator: Arc<dyn AnswerGenerator>,
    reply_timeout: Duration,
    mut requests: mpsc::UnboundedReceiver<ReplyRequest>,
) {
    while let Some(request) = requests.recv().await {
        if request.token.is_cancelled() {
            continue;
        }

        let Some(history) = shared.history_for(request.user_message_id) else {
            shared.resolve(
                &request,
                Err(GenerationError::Failed("message is no longer in the log".to_owned())),
            );
            continue;
        };

        let outcome = tokio::select! {
            biased;
            _ = request.token.cancelled() => continue,
            result = tokio::time::timeout(
                reply_timeout,
                AssertUnwindSafe(generator.generate(&history)).catch_unwind(),
            ) => {
                match result {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(panic)) => {
                        let reason = panic_reason(panic.as_ref());
                        warn!("generator panicked on {}: {reason}", request.user_message_id);
                        Err(GenerationError::Failed(format!("generator panicked: {reason}")))
                    }
                    Err(_) => Err(GenerationError::TimedOut(reply_timeout)),
                }
            }
        };

        shared.resolve(&request, outcome);
    }

    debug!("reply worker stopped");
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_owned()
    }
}
