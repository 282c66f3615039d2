//! Dealcart - the client-side state engine of a conversational shopping
//! assistant.
//!
//! A shopper asks for products in natural language, gets replies that may
//! carry deals, and adds deals to a cart kept on the server. This crate
//! owns the state behind that: the anonymous session, the conversation log
//! and the cached cart, and keeps them coherent when requests fail or
//! resolve out of order.
//!
//! # Architecture
//!
//! - **Session** ([`session`]) - first-writer-wins session id, persisted
//! - **Cart** ([`cart`]) - remote cart mutations with single-flight latches
//! - **Conversation** ([`conversation`]) - ordered messages, content
//!   normalization, expanded flags
//! - **Dispatcher** ([`dispatcher`]) - query round trips into the log
//! - **Reconciler** ([`reconcile`]) - cached cart count bookkeeping
//! - **Transport** ([`api`]) - the service boundary, over HTTP or in memory
//!
//! [`ShoppingAssistant`] wires them together around one shared session.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use dealcart::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let assistant = ShoppingAssistant::builder().build().await?;
//!     let outcome = assistant.submit_query("blue running shoes").await?;
//!     for entry in assistant.conversation() {
//!         println!("{}: {}", entry.message.role(), entry.message.text());
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod assistant;
pub mod cart;
pub mod config;
pub mod conversation;
pub mod deal;
pub mod dispatcher;
pub mod error;
pub mod feedback;
pub mod reconcile;
pub mod session;
pub mod util;

pub use assistant::{AssistantBuilder, ShoppingAssistant};
pub use error::{Error, Result};

/// Prelude module for convenient imports.
pub mod prelude {
    // Error types
    pub use crate::error::{
        ApiError, ApiResult, ConfigError, ConfigResult, DisplayError, Error, Result,
        StorageError, StorageResult,
    };

    // Facade
    pub use crate::assistant::{AssistantBuilder, ShoppingAssistant};

    // Transport
    pub use crate::api::{
        CredentialSource, HttpShopApi, MemoryShopApi, Operation, RemoveTarget, ShopApi,
        StaticToken,
    };

    // Cart
    pub use crate::cart::{AddOutcome, CartClient, CartItem, CartSnapshot};

    // Conversation
    pub use crate::conversation::{
        AssistantPayload, ConversationEntry, ConversationStore, Message, MessageContent,
        MessageId, Role,
    };
    pub use crate::dispatcher::{QueryDispatcher, QueryOutcome, QueryPhase};

    // Config
    pub use crate::config::{
        ApiConfig, ClientConfig, FeedbackConfig, ResponseOrdering, StorageConfig, config_path,
        load_config, save_config,
    };

    // Session
    pub use crate::session::{FileStorage, KeyValueStorage, MemoryStorage, SessionStore};

    // Misc
    pub use crate::deal::Deal;
    pub use crate::feedback::OpState;
}
