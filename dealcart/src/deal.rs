//! Product deals surfaced by the assistant.
//!
//! Deals arrive as loosely-typed JSON. [`Deal::from_value`] is the only way
//! the crate turns them into typed values, and it never fails: every field
//! has a fallback.

use crate::util::{first_field, first_string, generate_id, json_id, json_number, json_price};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Image shown for deals that come without one.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/600x400/orange/white?text=Product";

/// Name shown for deals that come without one.
pub const PLACEHOLDER_NAME: &str = "Product";

/// Highest rating a deal can carry.
pub const MAX_RATING: f64 = 5.0;

/// Savings advertised on a deal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Savings {
    /// Absolute saving in the deal's currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Saving as a percentage of the original price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

impl Savings {
    fn from_value(value: &Value) -> Option<Self> {
        let savings = Self {
            amount: value.get("amount").and_then(json_number),
            percentage: value.get("percentage").and_then(json_number),
        };
        (savings.amount.is_some() || savings.percentage.is_some()).then_some(savings)
    }
}

/// A product candidate attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    /// Deal id, generated when the service sent none.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current price, never negative.
    pub current_price: f64,
    /// Price before the discount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    /// Advertised savings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings: Option<Savings>,
    /// Rating in `[0, 5]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Retailer name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retailer: Option<String>,
    /// Product image.
    #[serde(rename = "image_url")]
    pub image_url: String,
    /// Link to the retailer's product page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_link: Option<String>,
}

impl Deal {
    /// Create a deal with the required fields.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, current_price: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            current_price: sanitize_price(current_price),
            original_price: None,
            savings: None,
            rating: None,
            retailer: None,
            image_url: PLACEHOLDER_IMAGE_URL.to_string(),
            product_link: None,
        }
    }

    /// Set the retailer.
    #[must_use]
    pub fn with_retailer(mut self, retailer: impl Into<String>) -> Self {
        self.retailer = Some(retailer.into());
        self
    }

    /// Set the original price.
    #[must_use]
    pub fn with_original_price(mut self, price: f64) -> Self {
        self.original_price = Some(sanitize_price(price));
        self
    }

    /// Set the product link.
    #[must_use]
    pub fn with_product_link(mut self, link: impl Into<String>) -> Self {
        self.product_link = Some(link.into());
        self
    }

    /// Build a deal from service JSON, backfilling anything missing.
    ///
    /// Accepts both deal naming (`name`, `currentPrice`) and cart naming
    /// (`title`, `price`). Non-object values yield a placeholder deal.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let id = first_field(value, &["id", "product_id"])
            .and_then(json_id)
            .unwrap_or_else(|| generate_id("deal"));
        let name = first_string(value, &["name", "title"])
            .unwrap_or_else(|| PLACEHOLDER_NAME.to_string());
        let current_price = json_price(first_field(value, &["currentPrice", "price"]));
        let original_price = first_field(value, &["originalPrice", "original_price"])
            .and_then(json_number)
            .map(sanitize_price);
        let rating = value
            .get("rating")
            .and_then(json_number)
            .map(|r| r.clamp(0.0, MAX_RATING));

        Self {
            id,
            name,
            current_price,
            original_price,
            savings: value.get("savings").and_then(Savings::from_value),
            rating,
            retailer: first_string(value, &["retailer", "source"]),
            image_url: first_string(value, &["image_url", "imageUrl", "thumbnail"])
                .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string()),
            product_link: first_string(value, &["productLink", "product_url", "link"]),
        }
    }

    /// Normalize a list of deals. Anything but an array yields no deals.
    #[must_use]
    pub fn list_from_value(value: Option<&Value>) -> Vec<Self> {
        value
            .and_then(Value::as_array)
            .map(|deals| deals.iter().map(Self::from_value).collect())
            .unwrap_or_default()
    }
}

fn sanitize_price(price: f64) -> f64 {
    if price.is_finite() { price.max(0.0) } else { 0.0 }
}
