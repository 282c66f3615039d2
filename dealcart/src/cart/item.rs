//! Server-side cart lines.

use crate::deal::{Deal, PLACEHOLDER_NAME};
use crate::util::{first_field, first_string, json_id, json_price};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A deal committed to the server-side cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Cart line id, used for removal.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Price, never negative.
    pub price: f64,
    /// Product image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Retailer name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retailer: Option<String>,
    /// Link to the retailer's product page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
}

impl CartItem {
    /// Build a cart line from a deal under the given line id.
    #[must_use]
    pub fn from_deal(id: impl Into<String>, deal: &Deal) -> Self {
        Self {
            id: id.into(),
            title: deal.name.clone(),
            price: deal.current_price,
            image_url: Some(deal.image_url.clone()),
            retailer: deal.retailer.clone(),
            product_url: deal.product_link.clone(),
        }
    }

    /// Decode the cart line at `position`, defaulting anything missing or
    /// invalid.
    ///
    /// A line without any id is named after its position, so decoding the
    /// same cart twice yields the same ids.
    #[must_use]
    pub fn from_value(value: &Value, position: usize) -> Self {
        Self {
            id: first_field(value, &["id", "item_id", "product_id"])
                .and_then(json_id)
                .unwrap_or_else(|| format!("item-{position}")),
            title: first_string(value, &["title", "name"])
                .unwrap_or_else(|| PLACEHOLDER_NAME.to_string()),
            price: json_price(first_field(value, &["price", "currentPrice"])),
            image_url: first_string(value, &["image_url", "imageUrl", "thumbnail"]),
            retailer: first_string(value, &["retailer", "source"]),
            product_url: first_string(value, &["product_url", "productLink", "link"]),
        }
    }
}
