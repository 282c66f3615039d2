//! Cached cart count bookkeeping.
//!
//! The count shown next to the cart (the badge) is not always the length of
//! the cached item list: an add reports the server's count without returning
//! the list. [`Reconciler`] decides which source wins:
//!
//! - while an add is in flight it counts optimistically, and rolls back if
//!   the add fails;
//! - a successful add takes the count from the response, or adds one when
//!   the response carries none;
//! - a cart fetch replaces the count, unless an add completed while the
//!   fetch was in flight, in which case the fetched list may predate it and
//!   the count never drops below what the add reported.

use tracing::debug;

/// Taken when a fetch starts, compared when it resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchMark(u64);

/// Badge count state. Lives next to the cart cache it reconciles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciler {
    confirmed: usize,
    pending: usize,
    adds_completed: u64,
}

impl Reconciler {
    /// A reconciler showing zero items.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count to display, in-flight adds included.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.confirmed + self.pending
    }

    /// Count confirmed by the server.
    #[must_use]
    pub const fn confirmed(&self) -> usize {
        self.confirmed
    }

    /// An add was submitted.
    pub const fn add_started(&mut self) {
        self.pending += 1;
    }

    /// An add succeeded, reporting `item_count` if the server sent one.
    pub fn add_succeeded(&mut self, item_count: Option<usize>) {
        self.pending = self.pending.saturating_sub(1);
        self.confirmed = item_count.unwrap_or(self.confirmed + 1);
        self.adds_completed += 1;
        debug!(count = self.confirmed, reported = item_count.is_some(), "add reconciled");
    }

    /// An add failed; undo its optimistic count.
    pub const fn add_failed(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    /// A fetch is starting.
    #[must_use]
    pub const fn fetch_started(&self) -> FetchMark {
        FetchMark(self.adds_completed)
    }

    /// A fetch started at `mark` returned `len` items.
    ///
    /// Returns whether the fetched list is current, i.e. no add completed
    /// since the fetch started.
    pub fn fetch_resolved(&mut self, mark: FetchMark, len: usize) -> bool {
        if mark.0 == self.adds_completed {
            self.confirmed = len;
            true
        } else {
            debug!(
                fetched = len,
                count = self.confirmed,
                "add completed during fetch, keeping the larger count"
            );
            self.confirmed = self.confirmed.max(len);
            false
        }
    }

    /// An item was removed. `remaining` is the cached list length when that
    /// list is known to be current.
    pub fn removed(&mut self, remaining: Option<usize>) {
        self.confirmed = remaining.unwrap_or_else(|| self.confirmed.saturating_sub(1));
    }

    /// The cart was emptied.
    pub const fn cleared(&mut self) {
        self.confirmed = 0;
    }
}
