//! Ordered conversation log.

use super::normalize::normalize_content;
use super::{Message, MessageContent, MessageId, Role};
use crate::api::QueryResponse;
use crate::deal::Deal;
use crate::util::lock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Reply appended when a query fails.
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

/// Raw assistant reply, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantPayload {
    /// Reply content as received.
    pub content: Value,
    /// Raw deals as received.
    pub deals: Option<Value>,
    /// Server-assigned message id.
    pub message_id: Option<String>,
}

impl AssistantPayload {
    /// A text reply without deals.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Value::String(content.into()),
            ..Self::default()
        }
    }
}

impl From<QueryResponse> for AssistantPayload {
    fn from(response: QueryResponse) -> Self {
        Self {
            content: response.response,
            deals: response.deals,
            message_id: response.message_id,
        }
    }
}

/// A message together with its expanded flag.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEntry {
    /// The message.
    pub message: Message,
    /// Whether its product list is shown.
    pub expanded: bool,
}

#[derive(Debug, Default)]
struct Log {
    messages: Vec<Message>,
    expanded: HashMap<MessageId, bool>,
}

impl Log {
    fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| m.id() == id)
    }

    fn push(&mut self, message: Message) -> Message {
        if message.has_products() {
            self.expanded.insert(message.id().clone(), true);
        }
        debug!(
            message_id = %message.id(),
            role = %message.role(),
            products = message.products().len(),
            "message appended"
        );
        self.messages.push(message.clone());
        message
    }
}

/// Owns the message log and the per-message expanded flags.
///
/// Appends are atomic with respect to each other, so concurrent replies land
/// in the order they resolve.
#[derive(Debug, Default)]
pub struct ConversationStore {
    log: Mutex<Log>,
}

impl ConversationStore {
    /// An empty conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the user's query text.
    pub fn append_user_message(&self, text: &str) -> Message {
        let message = Message::new(
            MessageId::generate(),
            Role::User,
            MessageContent::Text(text.trim().to_string()),
            Vec::new(),
        );
        lock(&self.log).push(message)
    }

    /// Append an assistant reply, normalizing content and deals.
    ///
    /// A reply carrying deals starts expanded.
    pub fn append_assistant_message(&self, payload: AssistantPayload) -> Message {
        let content = normalize_content(&payload.content);
        let products = Deal::list_from_value(payload.deals.as_ref());

        let mut log = lock(&self.log);
        let id = payload
            .message_id
            .map(MessageId::from)
            .filter(|id| !log.contains(id))
            .unwrap_or_else(MessageId::generate);
        log.push(Message::new(id, Role::Assistant, content, products))
    }

    /// Append the fixed apology reply used when a query fails.
    pub fn append_error_reply(&self) -> Message {
        let message = Message::new(
            MessageId::generate(),
            Role::Assistant,
            MessageContent::Text(APOLOGY.to_string()),
            Vec::new(),
        );
        lock(&self.log).push(message)
    }

    /// Flip the expanded flag of `id`, returning the new value.
    ///
    /// Returns `None` if no such message exists.
    pub fn toggle_expanded(&self, id: &MessageId) -> Option<bool> {
        let mut log = lock(&self.log);
        if !log.contains(id) {
            return None;
        }
        let flag = log.expanded.entry(id.clone()).or_insert(false);
        *flag = !*flag;
        Some(*flag)
    }

    /// Whether the product list of `id` is shown.
    #[must_use]
    pub fn is_expanded(&self, id: &MessageId) -> bool {
        lock(&self.log).expanded.get(id).copied().unwrap_or(false)
    }

    /// Look up a message.
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<Message> {
        lock(&self.log)
            .messages
            .iter()
            .find(|m| m.id() == id)
            .cloned()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.log).messages.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every message and flag.
    pub fn clear_all(&self) {
        let mut log = lock(&self.log);
        debug!(count = log.messages.len(), "conversation cleared");
        *log = Log::default();
    }

    /// Messages in order, with their expanded flags.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConversationEntry> {
        let log = lock(&self.log);
        log.messages
            .iter()
            .map(|message| ConversationEntry {
                expanded: log.expanded.get(message.id()).copied().unwrap_or(false),
                message: message.clone(),
            })
            .collect()
    }
}
