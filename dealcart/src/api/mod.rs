//! Remote shopping service boundary.
//!
//! [`ShopApi`] is the seam between the engine and whatever carries requests
//! to the service. [`HttpShopApi`] talks JSON over HTTP; [`MemoryShopApi`]
//! plays the service in-process for tests and offline use.
//!
//! Responses are decoded leniently: unknown fields are ignored, numbers may
//! arrive as strings and ids as numbers. A body that is not a JSON object is
//! a [`ApiError::MalformedBody`]. The cart endpoints report some failures
//! inside a success body (`{"error": "...", "item_count": 0}`); those decode
//! to [`ApiError::Rejected`].

mod http;
mod memory;

pub use http::{CredentialSource, HttpShopApi, HttpShopApiBuilder, StaticToken};
pub use memory::{MemoryShopApi, Operation};

use crate::cart::CartItem;
use crate::deal::Deal;
use crate::error::{ApiError, ApiResult};
use crate::util::{first_field, first_string, json_id, json_number, json_price};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Endpoint path of the cart view.
pub const CART_VIEW_PATH: &str = "cart/view/";
/// Endpoint path for adding a cart item.
pub const CART_ADD_PATH: &str = "cart/add_item/";
/// Endpoint path for removing cart items.
pub const CART_REMOVE_PATH: &str = "cart/remove_item/";
/// Endpoint path for assistant queries.
pub const USER_QUERY_PATH: &str = "user-query/";

/// Operations offered by the remote shopping service.
#[async_trait]
pub trait ShopApi: Send + Sync {
    /// `GET cart/view`.
    async fn view_cart(&self, session_id: Option<&str>) -> ApiResult<CartView>;

    /// `POST cart/add_item`.
    async fn add_item(&self, request: &AddItemRequest) -> ApiResult<AddItemResponse>;

    /// `POST cart/remove_item`.
    async fn remove_item(&self, request: &RemoveItemRequest) -> ApiResult<()>;

    /// `POST user-query`.
    async fn user_query(&self, request: &QueryRequest) -> ApiResult<QueryResponse>;
}

fn expect_object(value: &Value, what: &str) -> ApiResult<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ApiError::malformed(format!("{what}: expected a JSON object")))
    }
}

/// Check that a success body is an object without a non-null `error` field.
///
/// # Errors
///
/// Returns [`ApiError::MalformedBody`] for a non-object body and
/// [`ApiError::Rejected`] when the body reports a failure.
pub fn ensure_success(value: &Value, what: &str) -> ApiResult<()> {
    expect_object(value, what)?;
    match value.get("error") {
        None | Some(Value::Null) => Ok(()),
        Some(error) => {
            let message = error
                .as_str()
                .map(str::to_string)
                .or_else(|| first_string(value, &["message"]))
                .unwrap_or_else(|| format!("{what} failed"));
            Err(ApiError::rejected(message))
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn json_count(value: Option<&Value>) -> Option<usize> {
    value
        .and_then(json_number)
        .filter(|n| *n >= 0.0)
        .map(|n| n.round() as usize)
}

// ============================================================================
// Cart view
// ============================================================================

/// Response of `cart/view`.
#[derive(Debug, Clone, PartialEq)]
pub struct CartView {
    /// Items in server order.
    pub items: Vec<CartItem>,
    /// Total as computed by the server.
    pub total_price: f64,
    /// Count as reported by the server.
    pub item_count: usize,
    /// Session id issued or confirmed by the server.
    pub session_id: Option<String>,
}

impl CartView {
    /// Decode a cart view body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MalformedBody`] if the body is not an object and
    /// [`ApiError::Rejected`] if it carries an `error`.
    pub fn from_value(value: &Value) -> ApiResult<Self> {
        ensure_success(value, "cart view")?;
        let items: Vec<CartItem> = value
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .map(|(position, item)| CartItem::from_value(item, position))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            total_price: json_price(value.get("total_price")),
            item_count: json_count(value.get("item_count")).unwrap_or(items.len()),
            session_id: value.get("session_id").and_then(json_id),
            items,
        })
    }
}

// ============================================================================
// Add item
// ============================================================================

/// Body of `cart/add_item`: the deal flattened, plus cart-side aliases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddItemRequest {
    /// The deal's own fields.
    #[serde(flatten)]
    pub deal: Deal,
    /// Alias of the deal id.
    pub product_id: String,
    /// Alias of the deal name.
    pub title: String,
    /// Alias of the current price.
    pub price: f64,
    /// Alias of the product link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    /// Active session id, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl AddItemRequest {
    /// Flatten a deal into the shape the service expects.
    #[must_use]
    pub fn new(deal: &Deal, session_id: Option<String>) -> Self {
        Self {
            product_id: deal.id.clone(),
            title: deal.name.clone(),
            price: deal.current_price,
            product_url: deal.product_link.clone(),
            deal: deal.clone(),
            session_id,
        }
    }
}

/// Response of `cart/add_item`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddItemResponse {
    /// Cart size after the add, when reported.
    pub item_count: Option<usize>,
    /// Session id issued or confirmed by the server.
    pub session_id: Option<String>,
    /// Id the server assigned to the new cart line.
    pub item_id: Option<String>,
}

impl AddItemResponse {
    /// Decode an add-item body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MalformedBody`] if the body is not an object and
    /// [`ApiError::Rejected`] if it carries an `error`.
    pub fn from_value(value: &Value) -> ApiResult<Self> {
        ensure_success(value, "add item")?;
        Ok(Self {
            // A successful add never leaves an empty cart; 0 only fills the
            // count of a failed add.
            item_count: json_count(value.get("item_count")).filter(|n| *n > 0),
            session_id: value.get("session_id").and_then(json_id),
            item_id: value.get("item_id").and_then(json_id),
        })
    }
}

// ============================================================================
// Remove item
// ============================================================================

/// What a removal targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoveTarget {
    /// One cart line.
    Item(String),
    /// The whole cart.
    All,
}

impl std::fmt::Display for RemoveTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Item(id) => write!(f, "item {id}"),
            Self::All => f.write_str("all items"),
        }
    }
}

/// Body of `cart/remove_item`.
///
/// Serializes to `{item_id, session_id}` or `{remove_all: true, session_id}`
/// so the server can tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveItemRequest {
    /// Line to remove.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    /// Remove every line.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub remove_all: bool,
    /// Active session id.
    pub session_id: Option<String>,
}

impl RemoveItemRequest {
    /// Build the request for a target.
    #[must_use]
    pub fn new(target: &RemoveTarget, session_id: Option<String>) -> Self {
        match target {
            RemoveTarget::Item(id) => Self {
                item_id: Some(id.clone()),
                remove_all: false,
                session_id,
            },
            RemoveTarget::All => Self {
                item_id: None,
                remove_all: true,
                session_id,
            },
        }
    }

    /// The target this request describes.
    #[must_use]
    pub fn target(&self) -> RemoveTarget {
        match (&self.item_id, self.remove_all) {
            (_, true) | (None, false) => RemoveTarget::All,
            (Some(id), false) => RemoveTarget::Item(id.clone()),
        }
    }
}

// ============================================================================
// User query
// ============================================================================

/// Body of `user-query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    /// The user's query text.
    pub query: String,
    /// Conversation (session) id, if one is held.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Response of `user-query`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    /// Reply content; usually a string but not guaranteed.
    pub response: Value,
    /// Raw deals, normalized later by the conversation store.
    pub deals: Option<Value>,
    /// Server-assigned message id.
    pub message_id: Option<String>,
    /// Conversation id issued or confirmed by the server.
    pub conversation_id: Option<String>,
    /// The server's own product flag. Informational only.
    pub has_products: Option<bool>,
}

impl QueryResponse {
    /// Decode a query body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MalformedBody`] if the body is not an object.
    pub fn from_value(value: &Value) -> ApiResult<Self> {
        expect_object(value, "user query")?;
        Ok(Self {
            response: value.get("response").cloned().unwrap_or(Value::Null),
            deals: value.get("deals").cloned(),
            message_id: value.get("message_id").and_then(json_id),
            conversation_id: first_field(value, &["conversation_id", "session_id"])
                .and_then(json_id),
            has_products: value.get("has_products").and_then(Value::as_bool),
        })
    }

    /// A plain text reply without deals.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            response: Value::String(content.into()),
            deals: None,
            message_id: None,
            conversation_id: None,
            has_products: Some(false),
        }
    }
}

/// Pull the `error` text out of a failure body.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    first_string(&value, &["error", "detail", "message"])
}
