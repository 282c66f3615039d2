//! Shopping cart.
//!
//! The cart lives on the server. [`CartClient`] mutates it remotely and
//! keeps a cached copy whose total and count are derived from the cached
//! items, never taken on trust from a response.

mod client;
mod item;

pub use client::{
    ADD_FAILED, AddOutcome, CLEAR_FAILED, CartClient, CartSnapshot, LOAD_FAILED, REMOVE_FAILED,
};
pub use item::CartItem;
