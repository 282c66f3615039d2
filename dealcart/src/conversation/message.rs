//! Conversation messages.

use crate::deal::Deal;
use crate::util::{generate_id, timestamp_ms};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique message identifier within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an existing id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id.
    #[must_use]
    pub fn generate() -> Self {
        Self(generate_id("msg"))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The shopper.
    User,
    /// The assistant, including synthesized error replies.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        })
    }
}

/// Display-safe message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum MessageContent {
    /// Text as the author sent it, cleaned up.
    Text(String),
    /// A stand-in for content that was not plain text.
    Fallback(String),
}

impl MessageContent {
    /// The text to display, whichever variant.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) | Self::Fallback(text) => text,
        }
    }

    /// Whether the original content had to be replaced.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

impl fmt::Display for MessageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the conversation log.
///
/// Messages are immutable once appended; the expanded flag is tracked by the
/// store, not here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: MessageContent,
    products: Vec<Deal>,
    timestamp: u64,
}

impl Message {
    pub(crate) fn new(
        id: MessageId,
        role: Role,
        content: MessageContent,
        products: Vec<Deal>,
    ) -> Self {
        Self {
            id,
            role,
            content,
            products,
            timestamp: timestamp_ms(),
        }
    }

    /// Message id.
    #[must_use]
    pub const fn id(&self) -> &MessageId {
        &self.id
    }

    /// Author.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Normalized content.
    #[must_use]
    pub const fn content(&self) -> &MessageContent {
        &self.content
    }

    /// Content as display text.
    #[must_use]
    pub fn text(&self) -> &str {
        self.content.as_str()
    }

    /// Attached deals, in server order.
    #[must_use]
    pub fn products(&self) -> &[Deal] {
        &self.products
    }

    /// Whether deals are attached.
    #[must_use]
    pub fn has_products(&self) -> bool {
        !self.products.is_empty()
    }

    /// Creation time (Unix milliseconds).
    #[must_use]
    pub const fn timestamp(&self) -> u64 {
        self.timestamp
    }
}
