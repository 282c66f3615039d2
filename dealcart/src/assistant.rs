//! The engine facade used by front ends.

use crate::api::{HttpShopApi, ShopApi};
use crate::cart::{AddOutcome, CartClient, CartSnapshot};
use crate::config::ClientConfig;
use crate::conversation::{ConversationEntry, ConversationStore, MessageId};
use crate::deal::Deal;
use crate::dispatcher::{QueryDispatcher, QueryOutcome, QueryPhase};
use crate::error::{Error, Result};
use crate::feedback::OpState;
use crate::session::{FileStorage, KeyValueStorage, SessionStore};
use std::sync::Arc;
use tracing::{debug, info};

/// Builder for [`ShoppingAssistant`].
#[derive(Default)]
pub struct AssistantBuilder {
    config: ClientConfig,
    api: Option<Arc<dyn ShopApi>>,
    storage: Option<Arc<dyn KeyValueStorage>>,
}

impl std::fmt::Debug for AssistantBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantBuilder")
            .field("config", &self.config)
            .field("custom_api", &self.api.is_some())
            .field("custom_storage", &self.storage.is_some())
            .finish()
    }
}

impl AssistantBuilder {
    /// Start from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config`.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `api` instead of an HTTP client built from the configuration.
    #[must_use]
    pub fn api(mut self, api: Arc<dyn ShopApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Use `storage` instead of files under the configured state directory.
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Build the assistant, restoring any persisted session.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the HTTP client
    /// cannot be built, or the persisted session cannot be read.
    pub async fn build(self) -> Result<ShoppingAssistant> {
        let config = self.config;
        config.validate()?;

        let api: Arc<dyn ShopApi> = match self.api {
            Some(api) => api,
            None => Arc::new(HttpShopApi::from_config(&config.api)?),
        };
        let storage: Arc<dyn KeyValueStorage> = self
            .storage
            .unwrap_or_else(|| Arc::new(FileStorage::new(config.storage.dir.clone())));
        let session = Arc::new(SessionStore::open(storage, config.storage.session_key.clone()).await?);
        let conversation = Arc::new(ConversationStore::new());

        let cart = CartClient::new(Arc::clone(&api), Arc::clone(&session), &config.feedback);
        let dispatcher = QueryDispatcher::new(
            api,
            Arc::clone(&session),
            Arc::clone(&conversation),
            config.ordering,
            &config.feedback,
        );
        debug!(ordering = ?config.ordering, "assistant ready");

        Ok(ShoppingAssistant {
            config,
            session,
            conversation,
            cart,
            dispatcher,
        })
    }
}

/// One shopping assistant session: conversation, cart and identity.
///
/// Every component shares the same [`SessionStore`], so an id issued by any
/// response is used by all later requests.
///
/// # Example
///
/// ```rust,ignore
/// let assistant = ShoppingAssistant::builder().config(config).build().await?;
/// let outcome = assistant.submit_query("blue running shoes").await?;
/// if let Some(reply) = outcome.reply {
///     assistant.add_from_message(reply.id(), 0).await?;
/// }
/// ```
#[derive(Debug)]
pub struct ShoppingAssistant {
    config: ClientConfig,
    session: Arc<SessionStore>,
    conversation: Arc<ConversationStore>,
    cart: CartClient,
    dispatcher: QueryDispatcher,
}

impl ShoppingAssistant {
    /// Create a builder.
    #[must_use]
    pub fn builder() -> AssistantBuilder {
        AssistantBuilder::new()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The active session id, if any.
    pub async fn session_id(&self) -> Option<String> {
        self.session.session_id().await
    }

    // ========================================================================
    // Conversation
    // ========================================================================

    /// Submit a query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank query.
    pub async fn submit_query(&self, text: &str) -> Result<QueryOutcome> {
        self.dispatcher.submit(text).await
    }

    /// Replace the input draft.
    pub fn set_draft(&self, text: impl Into<String>) {
        self.dispatcher.set_draft(text);
    }

    /// Current input draft.
    #[must_use]
    pub fn draft(&self) -> String {
        self.dispatcher.draft()
    }

    /// Submit the input draft.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank draft.
    pub async fn submit_draft(&self) -> Result<QueryOutcome> {
        self.dispatcher.submit_draft().await
    }

    /// `Submitting` while a query is in flight.
    #[must_use]
    pub fn query_phase(&self) -> QueryPhase {
        self.dispatcher.phase()
    }

    /// Transient query error text.
    #[must_use]
    pub fn query_notice(&self) -> Option<String> {
        self.dispatcher.notice()
    }

    /// Show or hide the product list of a message.
    pub fn toggle_product_expansion(&self, id: &MessageId) -> Option<bool> {
        self.conversation.toggle_expanded(id)
    }

    /// Start over with an empty conversation. The session and cart stay.
    pub fn start_new_conversation(&self) {
        self.conversation.clear_all();
        info!("new conversation");
    }

    /// Messages in order, with their expanded flags.
    #[must_use]
    pub fn conversation(&self) -> Vec<ConversationEntry> {
        self.conversation.snapshot()
    }

    // ========================================================================
    // Cart
    // ========================================================================

    /// Add `deal` to the cart. The add button is identified by the deal id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if this deal's add is in flight, or the API
    /// error if the add failed.
    pub async fn add_to_cart(&self, deal: &Deal) -> Result<AddOutcome> {
        self.cart.add_item(&deal.id, deal).await
    }

    /// Add the `index`-th deal of message `id` to the cart.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the message or deal does not exist,
    /// otherwise as [`add_to_cart`](Self::add_to_cart).
    pub async fn add_from_message(&self, id: &MessageId, index: usize) -> Result<AddOutcome> {
        let deal = self
            .conversation
            .get(id)
            .and_then(|message| message.products().get(index).cloned())
            .ok_or_else(|| Error::validation(format!("no deal #{index} in message {id}")))?;
        self.cart
            .add_item(&Self::button_key(id, index), &deal)
            .await
    }

    /// Feedback state of the add button of the `index`-th deal of message `id`.
    #[must_use]
    pub fn add_state(&self, id: &MessageId, index: usize) -> OpState {
        self.cart.add_state(&Self::button_key(id, index))
    }

    /// Feedback state of the add button of `deal`.
    #[must_use]
    pub fn deal_add_state(&self, deal: &Deal) -> OpState {
        self.cart.add_state(&deal.id)
    }

    /// Remove one cart line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if this line's removal is in flight, or the API
    /// error if the removal failed.
    pub async fn remove_from_cart(&self, item_id: &str) -> Result<CartSnapshot> {
        self.cart.remove_item(item_id).await
    }

    /// Empty the cart. Front ends confirm with the user first.
    ///
    /// # Errors
    ///
    /// Returns the API error if the clear failed.
    pub async fn clear_cart(&self) -> Result<CartSnapshot> {
        self.cart.clear_cart().await
    }

    /// Fetch the cart from the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CartUnavailable`] if the fetch failed; the cached
    /// cart is kept.
    pub async fn refresh_cart(&self) -> Result<CartSnapshot> {
        self.cart.fetch_cart().await
    }

    /// Cached cart state.
    #[must_use]
    pub fn cart(&self) -> CartSnapshot {
        self.cart.snapshot()
    }

    /// Forget the session id and the cached cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted id could not be removed.
    pub async fn forget_session(&self) -> Result<()> {
        self.session.clear_session_id().await?;
        self.cart.reset();
        self.conversation.clear_all();
        Ok(())
    }

    fn button_key(id: &MessageId, index: usize) -> String {
        format!("{id}:{index}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MemoryShopApi, Operation};
    use crate::cart::ADD_FAILED;
    use crate::config::ResponseOrdering;
    use crate::conversation::{APOLOGY, MessageContent, Role};
    use crate::error::ApiError;
    use crate::session::MemoryStorage;
    use serde_json::json;
    use std::time::Duration;

    async fn assistant_with(api: &Arc<MemoryShopApi>) -> ShoppingAssistant {
        ShoppingAssistant::builder()
            .api(api.clone())
            .storage(Arc::new(MemoryStorage::new()))
            .build()
            .await
            .unwrap()
    }

    fn assert_cart_consistent(cart: &CartSnapshot) {
        let sum: f64 = cart.items.iter().map(|item| item.price).sum();
        assert!((cart.total_price - sum).abs() < 1e-9, "total drifted");
        assert_eq!(cart.item_count, cart.items.len());
    }

    #[tokio::test]
    async fn test_scenario_a_query_with_deals() {
        let api = Arc::new(MemoryShopApi::new());
        api.script_reply(json!({
            "response": "Here are some sneakers",
            "deals": [{"name": "Sneaker A", "currentPrice": 49.99}],
            "has_products": true
        }));
        let assistant = assistant_with(&api).await;

        let outcome = assistant.submit_query("blue shoes").await.unwrap();
        let entries = assistant.conversation();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].message.role(), Role::User);
        assert_eq!(entries[0].message.text(), "blue shoes");

        let reply = &entries[1];
        assert_eq!(reply.message.role(), Role::Assistant);
        assert!(reply.message.has_products());
        assert_eq!(reply.message.products().len(), 1);
        assert!(reply.expanded);
        assert_eq!(outcome.reply.as_ref(), Some(&reply.message));
    }

    #[tokio::test]
    async fn test_scenario_b_add_then_remove() {
        let api = Arc::new(MemoryShopApi::new());
        let assistant = assistant_with(&api).await;
        let before = assistant.refresh_cart().await.unwrap();

        let deal = Deal::from_value(&json!({"id": "d1", "price": "19.99", "title": "Widget"}));
        assistant.add_to_cart(&deal).await.unwrap();
        assert_eq!(assistant.cart().badge_count, before.badge_count + 1);

        let fetched = assistant.refresh_cart().await.unwrap();
        let item = fetched.items.iter().find(|item| item.id == "d1").unwrap();
        assert_eq!(item.title, "Widget");
        assert!((item.price - 19.99).abs() < 1e-9);
        assert_cart_consistent(&fetched);

        let after = assistant.remove_from_cart("d1").await.unwrap();
        assert!((fetched.total_price - after.total_price - 19.99).abs() < 1e-9);
        assert!(after.items.iter().all(|item| item.id != "d1"));
        assert_cart_consistent(&after);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_c_failed_add_self_clears() {
        let api = Arc::new(MemoryShopApi::new());
        let assistant = assistant_with(&api).await;
        assistant.refresh_cart().await.unwrap();
        let before = assistant.cart().badge_count;

        api.fail_next(Operation::AddItem, ApiError::network("connection reset"));
        let deal = Deal::new("d1", "Widget", 19.99);
        assert!(assistant.add_to_cart(&deal).await.is_err());

        let cart = assistant.cart();
        assert_eq!(cart.badge_count, before);
        assert_eq!(cart.notice.as_deref(), Some(ADD_FAILED));
        assert_eq!(
            assistant.deal_add_state(&deal),
            OpState::Failed(ADD_FAILED.into())
        );

        tokio::time::advance(Duration::from_millis(
            assistant.config().feedback.notice_window_ms,
        ))
        .await;
        assert_eq!(assistant.deal_add_state(&deal), OpState::Idle);
        assert_eq!(assistant.cart().notice, None);
    }

    #[tokio::test]
    async fn test_scenario_d_object_content() {
        let api = Arc::new(MemoryShopApi::new());
        api.script_reply(json!({
            "response": {"summary": "shoes", "count": 1},
            "deals": [{"name": "Sneaker A"}]
        }));
        api.script_reply(json!({"response": {"summary": "nothing"}, "deals": []}));
        let assistant = assistant_with(&api).await;

        let with_deals = assistant.submit_query("shoes").await.unwrap().reply.unwrap();
        assert!(matches!(with_deals.content(), MessageContent::Fallback(_)));
        assert!(with_deals.has_products());

        let without = assistant.submit_query("more").await.unwrap().reply.unwrap();
        assert!(without.content().is_fallback());
        assert!(!without.has_products());
    }

    #[tokio::test]
    async fn test_scenario_e_clear_from_any_state() {
        let api = Arc::new(MemoryShopApi::new());
        let assistant = assistant_with(&api).await;

        // Never fetched, no session yet.
        let cart = assistant.clear_cart().await.unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.badge_count, 0);

        assistant.add_to_cart(&Deal::new("a", "A", 3.0)).await.unwrap();
        assistant.add_to_cart(&Deal::new("b", "B", 4.5)).await.unwrap();
        assistant.refresh_cart().await.unwrap();

        let cart = assistant.clear_cart().await.unwrap();
        assert!(cart.items.is_empty());
        assert!(cart.total_price.abs() < f64::EPSILON);
        assert_eq!(cart.item_count, 0);
        assert_eq!(cart.badge_count, 0);
    }

    #[tokio::test]
    async fn test_add_from_message() {
        let api = Arc::new(MemoryShopApi::with_catalog(vec![
            Deal::new("s1", "Blue Running Shoes", 49.99),
            Deal::new("s2", "Blue Walking Shoes", 39.99),
        ]));
        let assistant = assistant_with(&api).await;

        let reply = assistant
            .submit_query("blue shoes")
            .await
            .unwrap()
            .reply
            .unwrap();
        assert_eq!(reply.products().len(), 2);

        let outcome = assistant.add_from_message(reply.id(), 1).await.unwrap();
        assert_eq!(outcome.item_id.as_deref(), Some("s2"));
        assert_eq!(assistant.add_state(reply.id(), 1), OpState::Succeeded);
        assert_eq!(assistant.add_state(reply.id(), 0), OpState::Idle);

        let err = assistant.add_from_message(reply.id(), 5).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_session_never_switches_without_clear() {
        let api = Arc::new(MemoryShopApi::new());
        api.script_reply(json!({"response": "hi", "conversation_id": "first"}));
        api.script_reply(json!({"response": "hi", "conversation_id": "second"}));
        let assistant = assistant_with(&api).await;

        assistant.submit_query("one").await.unwrap();
        assistant.submit_query("two").await.unwrap();
        assistant.refresh_cart().await.unwrap();
        assert_eq!(assistant.session_id().await.as_deref(), Some("first"));

        assistant.forget_session().await.unwrap();
        assert_eq!(assistant.session_id().await, None);
        assert!(assistant.conversation().is_empty());
        assert!(!assistant.cart().loaded);

        assistant.refresh_cart().await.unwrap();
        let fresh = assistant.session_id().await.unwrap();
        assert_ne!(fresh, "first");
    }

    #[tokio::test]
    async fn test_session_restored_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MemoryShopApi::new());
        let mut config = ClientConfig::default();
        config.storage.dir = dir.path().to_path_buf();

        let first = ShoppingAssistant::builder()
            .config(config.clone())
            .api(api.clone())
            .build()
            .await
            .unwrap();
        first.add_to_cart(&Deal::new("d1", "Widget", 2.0)).await.unwrap();
        let session = first.session_id().await.unwrap();
        drop(first);

        let second = ShoppingAssistant::builder()
            .config(config)
            .api(api.clone())
            .build()
            .await
            .unwrap();
        assert_eq!(second.session_id().await, Some(session));
        let cart = second.refresh_cart().await.unwrap();
        assert_eq!(cart.item_count, 1);
    }

    #[tokio::test]
    async fn test_new_conversation_keeps_cart_and_session() {
        let api = Arc::new(MemoryShopApi::new());
        let assistant = assistant_with(&api).await;
        api.fail_next(Operation::UserQuery, ApiError::status(500, None));

        let outcome = assistant.submit_query("anything").await.unwrap();
        assert_eq!(outcome.phase(), QueryPhase::Failed);
        assert_eq!(outcome.reply.unwrap().text(), APOLOGY);

        assistant.add_to_cart(&Deal::new("d1", "Widget", 2.0)).await.unwrap();
        let session = assistant.session_id().await;
        assistant.start_new_conversation();

        assert!(assistant.conversation().is_empty());
        assert_eq!(assistant.session_id().await, session);
        assert_eq!(assistant.cart().badge_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cart_invariants_under_interleaving() {
        let api = Arc::new(MemoryShopApi::new());
        let assistant = assistant_with(&api).await;
        assistant.refresh_cart().await.unwrap();
        api.set_latency(Operation::AddItem, Duration::from_millis(30));
        api.set_latency(Operation::ViewCart, Duration::from_millis(10));

        let deals: Vec<Deal> = (0..4)
            .map(|i| Deal::new(format!("d{i}"), format!("Deal {i}"), f64::from(i) + 0.5))
            .collect();
        let (adds, fetched) = tokio::join!(
            futures::future::join_all(deals.iter().map(|d| assistant.add_to_cart(d))),
            assistant.refresh_cart()
        );
        assert!(adds.iter().all(Result::is_ok));
        let fetched = fetched.unwrap();
        assert_cart_consistent(&fetched);

        // The fetch resolved before the adds; none of them may be lost.
        let cart = assistant.cart();
        assert_eq!(cart.badge_count, 4);
        assert!(cart.stale);

        let cart = assistant.refresh_cart().await.unwrap();
        assert_eq!(cart.item_count, 4);
        assert_eq!(cart.badge_count, 4);
        assert_cart_consistent(&cart);

        let cart = assistant.remove_from_cart("d2").await.unwrap();
        assert_cart_consistent(&cart);
        assert_eq!(cart.badge_count, 3);
    }

    #[tokio::test]
    async fn test_discard_stale_config() {
        let api = Arc::new(MemoryShopApi::new());
        let config = ClientConfig {
            ordering: ResponseOrdering::DiscardStale,
            ..ClientConfig::default()
        };
        let assistant = ShoppingAssistant::builder()
            .config(config)
            .api(api.clone())
            .storage(Arc::new(MemoryStorage::new()))
            .build()
            .await
            .unwrap();
        let outcome = assistant.submit_query("hats").await.unwrap();
        assert!(outcome.reply.is_some());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = ClientConfig::default();
        config.feedback.notice_window_ms = 0;
        let err = ShoppingAssistant::builder()
            .config(config)
            .storage(Arc::new(MemoryStorage::new()))
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
