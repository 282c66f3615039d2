//! Conversation log.
//!
//! - [`ConversationStore`]: ordered messages and expanded flags
//! - [`normalize_content`]: the single place raw reply content is coerced
//! - [`Message`]: immutable log entry

mod message;
mod normalize;
mod store;

pub use message::{Message, MessageContent, MessageId, Role};
pub use normalize::{DEFAULT_REPLY, RENDER_FALLBACK, clean_text, normalize_content};
pub use store::{APOLOGY, AssistantPayload, ConversationEntry, ConversationStore};
