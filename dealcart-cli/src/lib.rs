//! Terminal front end for the dealcart shopping assistant.
//!
//! Provides the chat loop, plain-text rendering of engine snapshots and the
//! demo catalog behind `--offline`.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

pub mod chat;
pub mod demo;
pub mod render;

pub use chat::{ChatCommand, ChatSession};
