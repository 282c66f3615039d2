//! Cart operations and the local cart cache.

use super::CartItem;
use crate::api::{AddItemRequest, RemoveItemRequest, RemoveTarget, ShopApi};
use crate::config::FeedbackConfig;
use crate::deal::Deal;
use crate::error::{Error, Result};
use crate::feedback::{Notice, OpState, OpTracker};
use crate::reconcile::Reconciler;
use crate::session::SessionStore;
use crate::util::lock;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Shown when a cart fetch fails.
pub const LOAD_FAILED: &str = "Failed to load your cart. Please try again.";
/// Shown when an add fails.
pub const ADD_FAILED: &str = "Failed to add";
/// Shown when a single removal fails.
pub const REMOVE_FAILED: &str = "Failed to remove item from cart.";
/// Shown when emptying the cart fails.
pub const CLEAR_FAILED: &str = "Failed to clear cart.";

/// Read-only view of the cart for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshot {
    /// Cached items in server order.
    pub items: Vec<CartItem>,
    /// Sum of `items` prices.
    pub total_price: f64,
    /// Always `items.len()`.
    pub item_count: usize,
    /// Count for the cart badge; see [`Reconciler`].
    pub badge_count: usize,
    /// Whether the cart has been fetched at least once.
    pub loaded: bool,
    /// Whether the server cart may have changed since the last fetch.
    pub stale: bool,
    /// Transient banner message.
    pub notice: Option<String>,
    /// Item ids with a removal in flight.
    pub removing: Vec<String>,
    /// Whether a clear is in flight.
    pub clearing: bool,
}

/// Result of a successful add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    /// Badge count after the add.
    pub badge_count: usize,
    /// Line id the server assigned, if reported.
    pub item_id: Option<String>,
}

#[derive(Debug, Default)]
struct CartState {
    items: Vec<CartItem>,
    total_price: f64,
    loaded: bool,
    stale: bool,
    badge: Reconciler,
}

impl CartState {
    fn replace(&mut self, items: Vec<CartItem>) {
        self.items = items;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.total_price = self.items.iter().map(|item| item.price).sum();
    }
}

/// An optimistic badge increment. Dropping it unsettled rolls it back, so an
/// add abandoned mid-flight does not leave the badge inflated.
struct PendingAdd<'a> {
    state: &'a Mutex<CartState>,
    armed: bool,
}

impl<'a> PendingAdd<'a> {
    fn start(state: &'a Mutex<CartState>) -> Self {
        lock(state).badge.add_started();
        Self { state, armed: true }
    }

    /// Commit the add and return the new badge count.
    fn succeed(mut self, item_count: Option<usize>) -> usize {
        self.armed = false;
        let mut state = lock(self.state);
        state.badge.add_succeeded(item_count);
        state.stale = true;
        state.badge.count()
    }

    fn roll_back(mut self) {
        self.armed = false;
        lock(self.state).badge.add_failed();
    }
}

impl Drop for PendingAdd<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.state).badge.add_failed();
            debug!("add abandoned before it resolved, badge rolled back");
        }
    }
}

/// Client-side cart: remote mutations plus a read-through cache.
///
/// Totals are always recomputed from the cached list. Adds are latched per
/// button key and removals per target, so a repeated click while a request
/// is in flight returns [`Error::Busy`] without touching the network.
pub struct CartClient {
    api: Arc<dyn ShopApi>,
    session: Arc<SessionStore>,
    state: Mutex<CartState>,
    adds: OpTracker<String>,
    removals: OpTracker<RemoveTarget>,
    notice: Notice,
}

impl std::fmt::Debug for CartClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartClient")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl CartClient {
    /// Create a cart client sharing `session` with the rest of the engine.
    #[must_use]
    pub fn new(api: Arc<dyn ShopApi>, session: Arc<SessionStore>, feedback: &FeedbackConfig) -> Self {
        let window = feedback.notice_window();
        Self {
            api,
            session,
            state: Mutex::new(CartState::default()),
            adds: OpTracker::new(window),
            removals: OpTracker::new(window),
            notice: Notice::new(window),
        }
    }

    /// Current cart state.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        let state = lock(&self.state);
        let mut removing: Vec<String> = self
            .removals
            .pending()
            .into_iter()
            .filter_map(|target| match target {
                RemoveTarget::Item(id) => Some(id),
                RemoveTarget::All => None,
            })
            .collect();
        removing.sort();
        CartSnapshot {
            items: state.items.clone(),
            total_price: state.total_price,
            item_count: state.items.len(),
            badge_count: state.badge.count(),
            loaded: state.loaded,
            stale: state.stale,
            notice: self.notice.get(),
            removing,
            clearing: self.removals.is_pending(&RemoveTarget::All),
        }
    }

    /// Feedback state of the add button `button`.
    #[must_use]
    pub fn add_state(&self, button: &str) -> OpState {
        self.adds.state(&button.to_string())
    }

    /// Whether a removal of `item_id` is in flight.
    #[must_use]
    pub fn is_removing(&self, item_id: &str) -> bool {
        self.removals
            .is_pending(&RemoveTarget::Item(item_id.to_string()))
    }

    /// Transient banner message, if any.
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        self.notice.get()
    }

    /// Drop the cached cart, e.g. after the session was forgotten.
    pub fn reset(&self) {
        *lock(&self.state) = CartState::default();
        self.notice.clear();
    }

    /// Fetch the cart and replace the cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CartUnavailable`] if the fetch fails. The cache keeps
    /// its last known contents.
    pub async fn fetch_cart(&self) -> Result<CartSnapshot> {
        let session_id = self.session.session_id().await;
        let mark = lock(&self.state).badge.fetch_started();

        let view = match self.api.view_cart(session_id.as_deref()).await {
            Ok(view) => view,
            Err(e) => {
                warn!(error = %e, "cart fetch failed, keeping cached cart");
                self.notice.set(LOAD_FAILED);
                return Err(Error::CartUnavailable(e));
            }
        };
        self.session.adopt(view.session_id.as_deref()).await;

        {
            let mut state = lock(&self.state);
            let count = view.items.len();
            state.replace(view.items);
            if (state.total_price - view.total_price).abs() > 0.005 {
                debug!(
                    server = view.total_price,
                    local = state.total_price,
                    "server total differs, using local sum"
                );
            }
            let current = state.badge.fetch_resolved(mark, count);
            state.loaded = true;
            state.stale = !current;
            debug!(count, "cart fetched");
        }
        Ok(self.snapshot())
    }

    /// Add `deal` to the cart from the add button `button`.
    ///
    /// The button shows success or failure for the feedback window after
    /// the request resolves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if this button already has an add in flight,
    /// or the API error if the add failed; the optimistic count is rolled
    /// back in that case, and also when the returned future is dropped
    /// before it completes.
    pub async fn add_item(&self, button: &str, deal: &Deal) -> Result<AddOutcome> {
        let ticket = self.adds.begin(button.to_string())?;
        let session_id = self.session.session_id().await;
        let request = AddItemRequest::new(deal, session_id);
        let pending = PendingAdd::start(&self.state);

        match self.api.add_item(&request).await {
            Ok(response) => {
                let badge_count = pending.succeed(response.item_count);
                self.session.adopt(response.session_id.as_deref()).await;
                info!(item_id = %deal.id, count = badge_count, "added to cart");
                ticket.succeed();
                Ok(AddOutcome {
                    badge_count,
                    item_id: response.item_id,
                })
            }
            Err(e) => {
                pending.roll_back();
                warn!(item_id = %deal.id, error = %e, "add to cart failed, rolled back");
                ticket.fail(ADD_FAILED);
                self.notice.set(ADD_FAILED);
                Err(e.into())
            }
        }
    }

    /// Remove the cart line `item_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if a removal of the same item is in flight,
    /// or the API error if the removal failed; the cache is unchanged then.
    pub async fn remove_item(&self, item_id: &str) -> Result<CartSnapshot> {
        let target = RemoveTarget::Item(item_id.to_string());
        let ticket = self.removals.begin(target.clone())?;
        self.remove(&target, REMOVE_FAILED).await?;
        ticket.finish();

        {
            let mut state = lock(&self.state);
            state.items.retain(|item| item.id != item_id);
            state.recompute();
            let remaining = (state.loaded && !state.stale).then_some(state.items.len());
            state.badge.removed(remaining);
        }
        info!(item_id, "removed from cart");
        Ok(self.snapshot())
    }

    /// Remove every line from the cart.
    ///
    /// Destructive: front ends confirm with the user before calling this.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if a clear is already in flight, or the API
    /// error if it failed; the cache is unchanged then.
    pub async fn clear_cart(&self) -> Result<CartSnapshot> {
        let ticket = self.removals.begin(RemoveTarget::All)?;
        self.remove(&RemoveTarget::All, CLEAR_FAILED).await?;
        ticket.finish();

        {
            let mut state = lock(&self.state);
            state.replace(Vec::new());
            state.loaded = true;
            state.stale = false;
            state.badge.cleared();
        }
        info!("cart cleared");
        Ok(self.snapshot())
    }

    async fn remove(&self, target: &RemoveTarget, failure: &str) -> Result<()> {
        let session_id = self.session.session_id().await;
        let request = RemoveItemRequest::new(target, session_id);
        self.api.remove_item(&request).await.map_err(|e| {
            warn!(%target, error = %e, "cart removal failed");
            self.notice.set(failure);
            Error::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        AddItemResponse, CartView, MemoryShopApi, Operation, QueryRequest, QueryResponse,
        ensure_success,
    };
    use crate::error::{ApiError, ApiResult};
    use crate::session::MemoryStorage;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::time::Duration;

    struct Fixture {
        api: Arc<MemoryShopApi>,
        session: Arc<SessionStore>,
        cart: CartClient,
    }

    fn fixture() -> Fixture {
        let api = Arc::new(MemoryShopApi::new());
        let session = Arc::new(SessionStore::empty(
            Arc::new(MemoryStorage::new()),
            "dealSessionId",
        ));
        let shop: Arc<dyn ShopApi> = api.clone();
        let cart = CartClient::new(shop, Arc::clone(&session), &FeedbackConfig::default());
        Fixture { api, session, cart }
    }

    /// Serves one cart with a single line, then answers every call the way
    /// the service reports a failure: status 200 with an `error` field.
    struct ErrorBodies {
        views: Mutex<VecDeque<Value>>,
    }

    impl ErrorBodies {
        fn new() -> Self {
            let loaded = json!({
                "items": [{"id": "d1", "title": "Widget", "price": 5.0}],
                "total_price": 5.0,
                "item_count": 1,
                "session_id": "s1"
            });
            Self {
                views: Mutex::new(VecDeque::from([loaded])),
            }
        }
    }

    #[async_trait]
    impl ShopApi for ErrorBodies {
        async fn view_cart(&self, _session_id: Option<&str>) -> ApiResult<CartView> {
            let body = lock(&self.views).pop_front().unwrap_or_else(|| {
                json!({
                    "error": "Failed to retrieve cart",
                    "items": [],
                    "total_price": 0,
                    "item_count": 0,
                    "session_id": "s1"
                })
            });
            CartView::from_value(&body)
        }

        async fn add_item(&self, _request: &AddItemRequest) -> ApiResult<AddItemResponse> {
            AddItemResponse::from_value(&json!({
                "message": "Item could not be added",
                "error": "Database unavailable",
                "is_new": false,
                "item_count": 0
            }))
        }

        async fn remove_item(&self, _request: &RemoveItemRequest) -> ApiResult<()> {
            let body = json!({
                "message": "Failed to remove item",
                "error": "Database unavailable",
                "item_count": 0
            });
            ensure_success(&body, "remove item")
        }

        async fn user_query(&self, _request: &QueryRequest) -> ApiResult<QueryResponse> {
            Ok(QueryResponse::text("ok"))
        }
    }

    async fn loaded_error_cart() -> (CartClient, CartSnapshot) {
        let api: Arc<dyn ShopApi> = Arc::new(ErrorBodies::new());
        let session = Arc::new(SessionStore::empty(
            Arc::new(MemoryStorage::new()),
            "dealSessionId",
        ));
        let cart = CartClient::new(api, session, &FeedbackConfig::default());
        let loaded = cart.fetch_cart().await.unwrap();
        assert_eq!(loaded.item_count, 1);
        assert_eq!(loaded.badge_count, 1);
        (cart, loaded)
    }

    fn assert_consistent(snapshot: &CartSnapshot) {
        let sum: f64 = snapshot.items.iter().map(|item| item.price).sum();
        assert!((snapshot.total_price - sum).abs() < 1e-9);
        assert_eq!(snapshot.item_count, snapshot.items.len());
    }

    #[tokio::test]
    async fn test_fetch_adopts_session_and_is_idempotent() {
        let fx = fixture();
        let first = fx.cart.fetch_cart().await.unwrap();
        assert!(fx.session.session_id().await.is_some());
        let second = fx.cart.fetch_cart().await.unwrap();
        assert_eq!(first.items, second.items);
        assert_eq!(first.item_count, second.item_count);
        assert!((first.total_price - second.total_price).abs() < f64::EPSILON);
        assert_consistent(&second);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_cache() {
        let fx = fixture();
        fx.cart.add_item("d1", &Deal::new("d1", "Widget", 5.0)).await.unwrap();
        let loaded = fx.cart.fetch_cart().await.unwrap();
        assert_eq!(loaded.item_count, 1);

        fx.api
            .fail_next(Operation::ViewCart, ApiError::network("offline"));
        let err = fx.cart.fetch_cart().await.unwrap_err();
        assert!(matches!(err, Error::CartUnavailable(_)));
        assert!(err.is_retryable());

        let snapshot = fx.cart.snapshot();
        assert_eq!(snapshot.items, loaded.items);
        assert_eq!(snapshot.notice.as_deref(), Some(LOAD_FAILED));
    }

    #[tokio::test]
    async fn test_fetch_error_body_keeps_cache() {
        let (cart, loaded) = loaded_error_cart().await;

        let err = cart.fetch_cart().await.unwrap_err();
        assert!(matches!(err, Error::CartUnavailable(ApiError::Rejected(_))));
        assert_eq!(err.server_message(), Some("Failed to retrieve cart"));

        let snapshot = cart.snapshot();
        assert_eq!(snapshot.items, loaded.items);
        assert_eq!(snapshot.badge_count, 1);
        assert_eq!(snapshot.notice.as_deref(), Some(LOAD_FAILED));
    }

    #[tokio::test]
    async fn test_fetch_reads_existing_server_cart() {
        let fx = fixture();
        fx.session.set_session_id("s1").await.unwrap();
        let kettle = Deal::new("k1", "Kettle", 30.0);
        fx.api
            .seed_cart("s1", vec![CartItem::from_deal("line-7", &kettle)]);

        let snapshot = fx.cart.fetch_cart().await.unwrap();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].id, "line-7");
        assert_eq!(snapshot.badge_count, 1);
        assert!((snapshot.total_price - 30.0).abs() < 1e-9);
        assert_eq!(fx.session.session_id().await.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn test_add_then_fetch_round_trip() {
        let fx = fixture();
        let deal = Deal::new("d1", "Widget", 19.99);
        let outcome = fx.cart.add_item("d1", &deal).await.unwrap();
        assert_eq!(outcome.badge_count, 1);
        assert_eq!(fx.cart.add_state("d1"), OpState::Succeeded);
        assert!(fx.cart.snapshot().stale);

        let snapshot = fx.cart.fetch_cart().await.unwrap();
        assert!(!snapshot.stale);
        assert_eq!(snapshot.items.len(), 1);
        let item = &snapshot.items[0];
        assert_eq!(item.id, "d1");
        assert_eq!(item.title, "Widget");
        assert!((item.price - 19.99).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_add_without_reported_count_increments() {
        let fx = fixture();
        fx.api.omit_item_count(true);
        fx.cart.fetch_cart().await.unwrap();
        fx.cart.add_item("a", &Deal::new("a", "A", 1.0)).await.unwrap();
        let outcome = fx.cart.add_item("b", &Deal::new("b", "B", 1.0)).await.unwrap();
        assert_eq!(outcome.badge_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_click_is_latched() {
        let fx = fixture();
        fx.api
            .set_latency(Operation::AddItem, Duration::from_millis(100));
        let deal = Deal::new("d1", "Widget", 1.0);

        let (first, second) = tokio::join!(
            fx.cart.add_item("d1", &deal),
            fx.cart.add_item("d1", &deal)
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::Busy(_))));
        assert_eq!(fx.api.calls(Operation::AddItem), 1);
        assert_eq!(fx.cart.snapshot().badge_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_add_is_optimistic() {
        let fx = fixture();
        fx.api
            .set_latency(Operation::AddItem, Duration::from_millis(100));
        let deal = Deal::new("d1", "Widget", 1.0);

        let mut add = tokio_test::task::spawn(fx.cart.add_item("d1", &deal));
        tokio_test::assert_pending!(add.poll());
        assert_eq!(fx.cart.add_state("d1"), OpState::Pending);
        assert_eq!(fx.cart.snapshot().badge_count, 1);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(add.is_woken());
        let outcome = tokio_test::assert_ready_ok!(add.poll());
        assert_eq!(outcome.badge_count, 1);
        assert_eq!(fx.cart.add_state("d1"), OpState::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_buttons_run_concurrently() {
        let fx = fixture();
        fx.api
            .set_latency(Operation::AddItem, Duration::from_millis(100));
        let deal = Deal::new("d1", "Widget", 1.0);
        // Establish the session first so both adds land in one cart.
        fx.cart.fetch_cart().await.unwrap();

        let (a, b) = tokio::join!(
            fx.cart.add_item("msg-1:0", &deal),
            fx.cart.add_item("msg-2:0", &deal)
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(fx.api.calls(Operation::AddItem), 2);
        // The same deal twice is two cart lines.
        let snapshot = fx.cart.fetch_cart().await.unwrap();
        assert_eq!(snapshot.item_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_add_rolls_back_and_clears() {
        let fx = fixture();
        fx.api
            .fail_next(Operation::AddItem, ApiError::network("offline"));
        let before = fx.cart.snapshot().badge_count;

        let err = fx
            .cart
            .add_item("d1", &Deal::new("d1", "Widget", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::Network(_))));
        assert_eq!(fx.cart.snapshot().badge_count, before);
        assert_eq!(fx.cart.add_state("d1"), OpState::Failed(ADD_FAILED.into()));

        tokio::time::advance(FeedbackConfig::default().notice_window()).await;
        assert_eq!(fx.cart.add_state("d1"), OpState::Idle);
        assert_eq!(fx.cart.notice(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_error_body_rolls_back() {
        let (cart, _) = loaded_error_cart().await;

        let err = cart
            .add_item("d2", &Deal::new("d2", "Gadget", 3.0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::Rejected(_))));
        assert_eq!(err.server_message(), Some("Database unavailable"));
        assert_eq!(cart.snapshot().badge_count, 1);
        assert!(!cart.snapshot().stale);
        assert_eq!(cart.add_state("d2"), OpState::Failed(ADD_FAILED.into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_add_rolls_back_badge() {
        let fx = fixture();
        fx.api
            .set_latency(Operation::AddItem, Duration::from_millis(100));
        let deal = Deal::new("d1", "Widget", 1.0);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), fx.cart.add_item("d1", &deal)).await;
        assert!(abandoned.is_err());
        assert_eq!(fx.cart.snapshot().badge_count, 0);
        assert_eq!(fx.cart.add_state("d1"), OpState::Idle);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(fx.cart.snapshot().badge_count, 0);

        let outcome = fx.cart.add_item("d1", &deal).await.unwrap();
        assert_eq!(outcome.badge_count, 1);
        assert_eq!(fx.api.calls(Operation::AddItem), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_remove_rejected() {
        let fx = fixture();
        fx.cart.add_item("d1", &Deal::new("d1", "Widget", 1.0)).await.unwrap();
        fx.cart.fetch_cart().await.unwrap();
        fx.api
            .set_latency(Operation::RemoveItem, Duration::from_millis(100));

        let (first, second) = tokio::join!(fx.cart.remove_item("d1"), async {
            tokio::task::yield_now().await;
            assert!(fx.cart.is_removing("d1"));
            assert_eq!(fx.cart.snapshot().removing, vec!["d1".to_string()]);
            fx.cart.remove_item("d1").await
        });
        let snapshot = first.unwrap();
        assert!(matches!(second, Err(Error::Busy(_))));
        assert_eq!(fx.api.calls(Operation::RemoveItem), 1);
        assert!(snapshot.items.is_empty());
        assert!(!fx.cart.is_removing("d1"));
    }

    #[tokio::test]
    async fn test_remove_recomputes_total() {
        let fx = fixture();
        fx.cart.add_item("a", &Deal::new("a", "A", 19.99)).await.unwrap();
        fx.cart.add_item("b", &Deal::new("b", "B", 5.0)).await.unwrap();
        let before = fx.cart.fetch_cart().await.unwrap();

        let after = fx.cart.remove_item("a").await.unwrap();
        assert!((before.total_price - after.total_price - 19.99).abs() < 1e-9);
        assert_eq!(after.item_count, 1);
        assert_eq!(after.badge_count, 1);
        assert_consistent(&after);
    }

    #[tokio::test]
    async fn test_remove_failure_keeps_cache() {
        let fx = fixture();
        fx.cart.add_item("a", &Deal::new("a", "A", 2.0)).await.unwrap();
        let before = fx.cart.fetch_cart().await.unwrap();

        let err = fx.cart.remove_item("missing").await.unwrap_err();
        assert_eq!(err.server_message(), Some("Item not found"));
        let after = fx.cart.snapshot();
        assert_eq!(after.items, before.items);
        assert_eq!(after.notice.as_deref(), Some(REMOVE_FAILED));
    }

    #[tokio::test]
    async fn test_remove_error_body_keeps_item() {
        let (cart, loaded) = loaded_error_cart().await;

        let err = cart.remove_item("d1").await.unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::Rejected(_))));
        let after = cart.snapshot();
        assert_eq!(after.items, loaded.items);
        assert_eq!(after.badge_count, 1);
        assert_eq!(after.notice.as_deref(), Some(REMOVE_FAILED));
        assert!(!cart.is_removing("d1"));
    }

    #[tokio::test]
    async fn test_clear_empties_everything() {
        let fx = fixture();
        fx.cart.add_item("a", &Deal::new("a", "A", 2.0)).await.unwrap();
        fx.cart.add_item("b", &Deal::new("b", "B", 3.0)).await.unwrap();
        fx.cart.fetch_cart().await.unwrap();

        let snapshot = fx.cart.clear_cart().await.unwrap();
        assert!(snapshot.items.is_empty());
        assert!(snapshot.total_price.abs() < f64::EPSILON);
        assert_eq!(snapshot.item_count, 0);
        assert_eq!(snapshot.badge_count, 0);
        let session = fx.session.session_id().await.unwrap();
        assert!(fx.api.cart_items(&session).is_empty());
    }

    #[tokio::test]
    async fn test_clear_failure_sets_notice() {
        let fx = fixture();
        fx.api
            .fail_next(Operation::RemoveItem, ApiError::status(500, None));
        assert!(fx.cart.clear_cart().await.is_err());
        assert_eq!(fx.cart.notice().as_deref(), Some(CLEAR_FAILED));
        assert!(!fx.cart.snapshot().clearing);
    }
}
