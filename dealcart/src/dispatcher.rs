//! Query submission.
//!
//! Each submission walks `Idle -> Submitting -> {Succeeded, Failed} -> Idle`.
//! The user's text is echoed into the conversation before the request goes
//! out; the reply (or an apology) is appended when it resolves. Submissions
//! never wait on each other.

use crate::api::{QueryRequest, ShopApi};
use crate::config::{FeedbackConfig, ResponseOrdering};
use crate::conversation::{ConversationStore, Message};
use crate::error::{ApiError, Error, Result};
use crate::feedback::Notice;
use crate::session::SessionStore;
use crate::util::lock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Shown when a query is empty.
pub const EMPTY_QUERY: &str = "Please enter what you're looking for.";

/// Shown when a query fails and the server gave no reason.
pub const QUERY_FAILED: &str = "An error occurred while processing your query.";

/// Where a submission stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    /// No submission in flight.
    Idle,
    /// At least one submission in flight.
    Submitting,
    /// The reply was received.
    Succeeded,
    /// The request failed; an apology was appended.
    Failed,
}

/// What happened to one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// Submission order, starting at 1.
    pub sequence: u64,
    /// The echoed user message.
    pub user_message: Message,
    /// The appended reply or apology. `None` if it was discarded as stale.
    pub reply: Option<Message>,
    /// The transport failure, if the request failed.
    pub error: Option<ApiError>,
}

impl QueryOutcome {
    /// Terminal phase of this submission.
    #[must_use]
    pub const fn phase(&self) -> QueryPhase {
        if self.error.is_some() {
            QueryPhase::Failed
        } else {
            QueryPhase::Succeeded
        }
    }
}

/// Decrements the in-flight counter when a submission ends, however it ends.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sends queries and records the conversation.
pub struct QueryDispatcher {
    api: Arc<dyn ShopApi>,
    session: Arc<SessionStore>,
    conversation: Arc<ConversationStore>,
    ordering: ResponseOrdering,
    draft: Mutex<String>,
    next_sequence: AtomicU64,
    latest_applied: Mutex<u64>,
    in_flight: AtomicUsize,
    notice: Notice,
}

impl std::fmt::Debug for QueryDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryDispatcher")
            .field("ordering", &self.ordering)
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl QueryDispatcher {
    /// Create a dispatcher writing into `conversation`.
    #[must_use]
    pub fn new(
        api: Arc<dyn ShopApi>,
        session: Arc<SessionStore>,
        conversation: Arc<ConversationStore>,
        ordering: ResponseOrdering,
        feedback: &FeedbackConfig,
    ) -> Self {
        Self {
            api,
            session,
            conversation,
            ordering,
            draft: Mutex::new(String::new()),
            next_sequence: AtomicU64::new(0),
            latest_applied: Mutex::new(0),
            in_flight: AtomicUsize::new(0),
            notice: Notice::new(feedback.notice_window()),
        }
    }

    /// `Submitting` while any query is in flight, else `Idle`.
    #[must_use]
    pub fn phase(&self) -> QueryPhase {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            QueryPhase::Submitting
        } else {
            QueryPhase::Idle
        }
    }

    /// Transient error text, if any.
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        self.notice.get()
    }

    /// Replace the input draft.
    pub fn set_draft(&self, text: impl Into<String>) {
        *lock(&self.draft) = text.into();
    }

    /// Current input draft.
    #[must_use]
    pub fn draft(&self) -> String {
        lock(&self.draft).clone()
    }

    /// Submit the current draft.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub async fn submit_draft(&self) -> Result<QueryOutcome> {
        let text = self.draft();
        self.submit(&text).await
    }

    /// Submit `text` as a query.
    ///
    /// Transport failures do not return `Err`: they end in
    /// [`QueryPhase::Failed`] with an apology appended, so the log stays
    /// coherent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `text` is blank. Nothing is appended
    /// and no request is sent in that case.
    pub async fn submit(&self, text: &str) -> Result<QueryOutcome> {
        let query = text.trim();
        if query.is_empty() {
            self.notice.set(EMPTY_QUERY);
            return Err(Error::validation(EMPTY_QUERY));
        }

        let _in_flight = InFlight::enter(&self.in_flight);
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let user_message = self.conversation.append_user_message(query);
        lock(&self.draft).clear();
        self.notice.clear();

        let request = QueryRequest {
            query: query.to_string(),
            conversation_id: self.session.session_id().await,
        };
        debug!(sequence, "query submitted");

        match self.api.user_query(&request).await {
            Ok(response) => {
                self.session
                    .adopt(response.conversation_id.as_deref())
                    .await;
                let reply = self
                    .accept(sequence)
                    .then(|| self.conversation.append_assistant_message(response.into()));
                info!(sequence, appended = reply.is_some(), "query answered");
                Ok(QueryOutcome {
                    sequence,
                    user_message,
                    reply,
                    error: None,
                })
            }
            Err(e) => {
                let message = e.server_message().unwrap_or(QUERY_FAILED).to_string();
                warn!(sequence, error = %e, "query failed");
                self.notice.set(message);
                let reply = self
                    .accept(sequence)
                    .then(|| self.conversation.append_error_reply());
                Ok(QueryOutcome {
                    sequence,
                    user_message,
                    reply,
                    error: Some(e),
                })
            }
        }
    }

    /// Whether the result of `sequence` may be appended.
    fn accept(&self, sequence: u64) -> bool {
        let mut latest = lock(&self.latest_applied);
        if self.ordering == ResponseOrdering::DiscardStale && sequence < *latest {
            debug!(sequence, latest = *latest, "discarding stale reply");
            return false;
        }
        *latest = (*latest).max(sequence);
        true
    }
}
