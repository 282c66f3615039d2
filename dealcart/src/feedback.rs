//! Transient operation feedback.
//!
//! Every user-triggered mutation runs through an [`OpTracker`]: a small
//! state machine per operand (`Idle -> Pending -> {Succeeded, Failed}`) whose
//! terminal states fall back to `Idle` once the feedback window has passed.
//! Expired outcomes are dropped whenever the tracker is touched, so nothing
//! has to be polled or spawned.
//!
//! [`Notice`] is the same idea for a single banner message.

use crate::error::{Error, Result};
use crate::util::lock;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Visible state of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OpState {
    /// Nothing to show.
    #[default]
    Idle,
    /// Request in flight; the affordance is disabled.
    Pending,
    /// Completed; shown until the window passes.
    Succeeded,
    /// Failed with a user-facing message; shown until the window passes.
    Failed(String),
}

impl OpState {
    /// Whether an operation is in flight.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[derive(Debug)]
struct Slot {
    state: OpState,
    until: Option<Instant>,
}

impl Slot {
    fn expired(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now >= until)
    }
}

fn evict_expired<K>(slots: &mut HashMap<K, Slot>) {
    let now = Instant::now();
    slots.retain(|_, slot| !slot.expired(now));
}

/// Per-operand single-flight latch with self-clearing outcome.
#[derive(Debug)]
pub struct OpTracker<K> {
    window: Duration,
    slots: Mutex<HashMap<K, Slot>>,
}

impl<K> OpTracker<K>
where
    K: Eq + Hash + Clone + Display,
{
    /// Create a tracker whose outcomes stay visible for `window`.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Current state for `key`.
    #[must_use]
    pub fn state(&self, key: &K) -> OpState {
        let mut slots = lock(&self.slots);
        let expired = match slots.get(key) {
            None => return OpState::Idle,
            Some(slot) => slot.expired(Instant::now()),
        };
        if expired {
            slots.remove(key);
            return OpState::Idle;
        }
        slots.get(key).map(|slot| slot.state.clone()).unwrap_or_default()
    }

    /// Whether an operation for `key` is in flight.
    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        self.state(key).is_pending()
    }

    /// Keys with an operation in flight.
    #[must_use]
    pub fn pending(&self) -> Vec<K> {
        let mut slots = lock(&self.slots);
        evict_expired(&mut slots);
        slots
            .iter()
            .filter(|(_, slot)| slot.state.is_pending())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Start an operation for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if one is already in flight for `key`.
    pub fn begin(&self, key: K) -> Result<OpTicket<'_, K>> {
        let mut slots = lock(&self.slots);
        evict_expired(&mut slots);
        if slots.get(&key).is_some_and(|slot| slot.state.is_pending()) {
            debug!(%key, "operation already in flight");
            return Err(Error::busy(format!("{key} is already in progress")));
        }
        slots.insert(
            key.clone(),
            Slot {
                state: OpState::Pending,
                until: None,
            },
        );
        Ok(OpTicket {
            tracker: self,
            key: Some(key),
        })
    }

    fn resolve(&self, key: &K, state: OpState) {
        let mut slots = lock(&self.slots);
        if state == OpState::Idle {
            slots.remove(key);
        } else {
            let until = Some(Instant::now() + self.window);
            slots.insert(key.clone(), Slot { state, until });
        }
    }
}

/// An in-flight operation. Dropping it unresolved returns the key to idle.
#[must_use = "dropping the ticket releases the latch immediately"]
#[derive(Debug)]
pub struct OpTicket<'a, K>
where
    K: Eq + Hash + Clone + Display,
{
    tracker: &'a OpTracker<K>,
    key: Option<K>,
}

impl<K> OpTicket<'_, K>
where
    K: Eq + Hash + Clone + Display,
{
    /// Show success for the feedback window.
    pub fn succeed(mut self) {
        self.settle(OpState::Succeeded);
    }

    /// Show `message` for the feedback window.
    pub fn fail(mut self, message: impl Into<String>) {
        self.settle(OpState::Failed(message.into()));
    }

    /// Return to idle without showing an outcome.
    pub fn finish(mut self) {
        self.settle(OpState::Idle);
    }

    fn settle(&mut self, state: OpState) {
        if let Some(key) = self.key.take() {
            self.tracker.resolve(&key, state);
        }
    }
}

impl<K> Drop for OpTicket<'_, K>
where
    K: Eq + Hash + Clone + Display,
{
    fn drop(&mut self) {
        self.settle(OpState::Idle);
    }
}

/// A banner message that clears itself after a window.
#[derive(Debug)]
pub struct Notice {
    window: Duration,
    current: Mutex<Option<(String, Instant)>>,
}

impl Notice {
    /// Create a notice shown for `window` after each [`set`](Self::set).
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            current: Mutex::new(None),
        }
    }

    /// Show `message`, replacing any current one.
    pub fn set(&self, message: impl Into<String>) {
        *lock(&self.current) = Some((message.into(), Instant::now() + self.window));
    }

    /// The message, if still within its window.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        let mut current = lock(&self.current);
        match current.as_ref() {
            Some((_, until)) if Instant::now() >= *until => {
                *current = None;
                None
            }
            Some((message, _)) => Some(message.clone()),
            None => None,
        }
    }

    /// Dismiss the message.
    pub fn clear(&self) {
        *lock(&self.current) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(2);

    #[tokio::test(start_paused = true)]
    async fn test_failed_clears_after_window() {
        let tracker = OpTracker::new(WINDOW);
        let ticket = tracker.begin("d1".to_string()).unwrap();
        assert_eq!(tracker.state(&"d1".to_string()), OpState::Pending);

        ticket.fail("Failed to add");
        assert_eq!(
            tracker.state(&"d1".to_string()),
            OpState::Failed("Failed to add".into())
        );

        tokio::time::advance(Duration::from_millis(1999)).await;
        assert!(matches!(tracker.state(&"d1".to_string()), OpState::Failed(_)));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(tracker.state(&"d1".to_string()), OpState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeded_clears_after_window() {
        let tracker = OpTracker::new(WINDOW);
        tracker.begin("d1".to_string()).unwrap().succeed();
        assert_eq!(tracker.state(&"d1".to_string()), OpState::Succeeded);
        tokio::time::advance(WINDOW).await;
        assert_eq!(tracker.state(&"d1".to_string()), OpState::Idle);
    }

    #[test]
    fn test_single_flight_per_key() {
        let tracker = OpTracker::new(WINDOW);
        let first = tracker.begin("d1".to_string()).unwrap();
        assert!(matches!(
            tracker.begin("d1".to_string()),
            Err(Error::Busy(_))
        ));
        let other = tracker.begin("d2".to_string()).unwrap();
        assert_eq!(tracker.pending().len(), 2);

        drop(first);
        assert_eq!(tracker.state(&"d1".to_string()), OpState::Idle);
        other.finish();
        assert!(tracker.pending().is_empty());
    }

    #[test]
    fn test_retry_allowed_while_outcome_shown() {
        let tracker = OpTracker::new(WINDOW);
        tracker.begin("d1".to_string()).unwrap().fail("nope");
        let retry = tracker.begin("d1".to_string()).unwrap();
        assert!(tracker.is_pending(&"d1".to_string()));
        retry.succeed();
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_outcomes_are_evicted() {
        let tracker = OpTracker::new(WINDOW);
        for key in ["d1", "d2", "d3"] {
            tracker.begin(key.to_string()).unwrap().fail("nope");
        }
        tracker.begin("d4".to_string()).unwrap().succeed();
        assert_eq!(lock(&tracker.slots).len(), 4);

        tokio::time::advance(WINDOW).await;
        assert!(tracker.pending().is_empty());
        assert!(lock(&tracker.slots).is_empty());

        tracker.begin("d5".to_string()).unwrap().fail("nope");
        tokio::time::advance(WINDOW).await;
        let ticket = tracker.begin("d6".to_string()).unwrap();
        assert_eq!(lock(&tracker.slots).len(), 1);
        ticket.finish();
    }

    #[tokio::test(start_paused = true)]
    async fn test_notice_expires() {
        let notice = Notice::new(WINDOW);
        assert_eq!(notice.get(), None);
        notice.set("Failed to clear cart.");
        assert_eq!(notice.get().as_deref(), Some("Failed to clear cart."));
        tokio::time::advance(WINDOW).await;
        assert_eq!(notice.get(), None);

        notice.set("again");
        notice.clear();
        assert_eq!(notice.get(), None);
    }
}
