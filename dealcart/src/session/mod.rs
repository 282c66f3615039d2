//! Session identity and durable local storage.
//!
//! One [`SessionStore`] per client correlates the conversation and the cart
//! with the server. It is shared by reference between the cart client and
//! the query dispatcher rather than kept in a global.

mod storage;
mod store;

pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StoredEntry};
pub use store::{SessionStore, SessionUpdate};
