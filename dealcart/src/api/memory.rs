//! In-process shopping service.
//!
//! [`MemoryShopApi`] keeps carts per session and answers queries from a
//! script or a small catalog. Failures and latency can be injected per
//! operation, which is what the engine's tests lean on.

use super::{
    AddItemRequest, AddItemResponse, CartView, QueryRequest, QueryResponse, RemoveItemRequest,
    RemoveTarget, ShopApi,
};
use crate::cart::CartItem;
use crate::deal::Deal;
use crate::error::{ApiError, ApiResult};
use crate::util::{generate_id, lock};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// The service operations, for targeting injected behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `cart/view`.
    ViewCart,
    /// `cart/add_item`.
    AddItem,
    /// `cart/remove_item`.
    RemoveItem,
    /// `user-query`.
    UserQuery,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ViewCart => "view_cart",
            Self::AddItem => "add_item",
            Self::RemoveItem => "remove_item",
            Self::UserQuery => "user_query",
        })
    }
}

#[derive(Debug, Default)]
struct Inner {
    carts: HashMap<String, Vec<CartItem>>,
    catalog: Vec<Deal>,
    replies: VecDeque<Value>,
    failures: HashMap<Operation, VecDeque<ApiError>>,
    latency: HashMap<Operation, Duration>,
    calls: HashMap<Operation, usize>,
    queries: Vec<QueryRequest>,
    omit_item_count: bool,
}

impl Inner {
    fn session(&mut self, requested: Option<&str>) -> String {
        let id = requested
            .map(str::to_string)
            .unwrap_or_else(|| generate_id("sess"));
        self.carts.entry(id.clone()).or_default();
        id
    }
}

/// [`ShopApi`] served from memory.
#[derive(Debug, Default)]
pub struct MemoryShopApi {
    inner: Mutex<Inner>,
}

impl MemoryShopApi {
    /// An empty service with no catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A service answering unscripted queries from `catalog`.
    #[must_use]
    pub fn with_catalog(catalog: Vec<Deal>) -> Self {
        let api = Self::new();
        lock(&api.inner).catalog = catalog;
        api
    }

    /// Queue a raw `user-query` reply body. Scripted replies are served in
    /// order before falling back to the catalog.
    pub fn script_reply(&self, body: Value) {
        lock(&self.inner).replies.push_back(body);
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: ApiError) {
        lock(&self.inner)
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Delay every call of `operation` by `delay`.
    pub fn set_latency(&self, operation: Operation, delay: Duration) {
        lock(&self.inner).latency.insert(operation, delay);
    }

    /// Leave `item_count` out of add responses.
    pub fn omit_item_count(&self, omit: bool) {
        lock(&self.inner).omit_item_count = omit;
    }

    /// Put `items` into the cart of `session_id`, replacing its contents.
    pub fn seed_cart(&self, session_id: &str, items: Vec<CartItem>) {
        lock(&self.inner).carts.insert(session_id.to_string(), items);
    }

    /// Number of calls received for `operation`, failed ones included.
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        lock(&self.inner)
            .calls
            .get(&operation)
            .copied()
            .unwrap_or_default()
    }

    /// Current server-side contents of a session's cart.
    #[must_use]
    pub fn cart_items(&self, session_id: &str) -> Vec<CartItem> {
        lock(&self.inner)
            .carts
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// The most recent query received.
    #[must_use]
    pub fn last_query(&self) -> Option<QueryRequest> {
        lock(&self.inner).queries.last().cloned()
    }

    /// Count the call, wait out any latency, then report an injected failure.
    async fn enter(&self, operation: Operation) -> ApiResult<()> {
        let (delay, failure) = {
            let mut inner = lock(&self.inner);
            *inner.calls.entry(operation).or_default() += 1;
            let failure = inner
                .failures
                .get_mut(&operation)
                .and_then(VecDeque::pop_front);
            (inner.latency.get(&operation).copied(), failure)
        };
        if let Some(delay) = delay.filter(|d| !d.is_zero()) {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(error) => {
                debug!(%operation, %error, "injected failure");
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn search(catalog: &[Deal], query: &str) -> Vec<Deal> {
        let words: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .filter(|w| w.len() > 2)
            .collect();
        catalog
            .iter()
            .filter(|deal| {
                let name = deal.name.to_lowercase();
                words.iter().any(|w| name.contains(w.as_str()))
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ShopApi for MemoryShopApi {
    async fn view_cart(&self, session_id: Option<&str>) -> ApiResult<CartView> {
        self.enter(Operation::ViewCart).await?;
        let mut inner = lock(&self.inner);
        let session = inner.session(session_id);
        let items = inner.carts.get(&session).cloned().unwrap_or_default();
        Ok(CartView {
            total_price: items.iter().map(|item| item.price).sum(),
            item_count: items.len(),
            items,
            session_id: Some(session),
        })
    }

    async fn add_item(&self, request: &AddItemRequest) -> ApiResult<AddItemResponse> {
        self.enter(Operation::AddItem).await?;
        let mut inner = lock(&self.inner);
        let session = inner.session(request.session_id.as_deref());
        let omit_count = inner.omit_item_count;
        let cart = inner.carts.entry(session.clone()).or_default();

        let mut item_id = request.product_id.clone();
        let mut n = 1;
        while cart.iter().any(|item| item.id == item_id) {
            n += 1;
            item_id = format!("{}-{n}", request.product_id);
        }

        let mut item = CartItem::from_deal(item_id.clone(), &request.deal);
        item.title.clone_from(&request.title);
        item.price = request.price.max(0.0);
        cart.push(item);

        Ok(AddItemResponse {
            item_count: (!omit_count).then_some(cart.len()),
            session_id: Some(session),
            item_id: Some(item_id),
        })
    }

    async fn remove_item(&self, request: &RemoveItemRequest) -> ApiResult<()> {
        self.enter(Operation::RemoveItem).await?;
        let mut inner = lock(&self.inner);
        let session = inner.session(request.session_id.as_deref());
        let cart = inner.carts.entry(session).or_default();
        match request.target() {
            RemoveTarget::All => cart.clear(),
            RemoveTarget::Item(id) => {
                let before = cart.len();
                cart.retain(|item| item.id != id);
                if cart.len() == before {
                    return Err(ApiError::status(404, Some("Item not found".into())));
                }
            }
        }
        Ok(())
    }

    async fn user_query(&self, request: &QueryRequest) -> ApiResult<QueryResponse> {
        self.enter(Operation::UserQuery).await?;
        let mut inner = lock(&self.inner);
        inner.queries.push(request.clone());
        let session = inner.session(request.conversation_id.as_deref());

        if let Some(body) = inner.replies.pop_front() {
            let mut response = QueryResponse::from_value(&body)?;
            if response.conversation_id.is_none() {
                response.conversation_id = Some(session);
            }
            return Ok(response);
        }

        let found = Self::search(&inner.catalog, &request.query);
        let text = if found.is_empty() {
            format!("I couldn't find any deals for \"{}\".", request.query)
        } else {
            format!("Found {} deals for \"{}\".", found.len(), request.query)
        };
        let deals =
            serde_json::to_value(&found).map_err(|e| ApiError::malformed(e.to_string()))?;
        QueryResponse::from_value(&json!({
            "response": text,
            "deals": deals,
            "message_id": generate_id("msg"),
            "conversation_id": session,
            "has_products": !found.is_empty(),
        }))
    }
}
