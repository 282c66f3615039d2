//! Plain-text rendering of engine snapshots.

use dealcart::cart::CartSnapshot;
use dealcart::conversation::{ConversationEntry, Role};
use dealcart::deal::Deal;
use dealcart::feedback::OpState;
use std::fmt::Write;

/// Format an amount as dollars.
#[must_use]
pub fn format_price(amount: f64) -> String {
    format!("${amount:.2}")
}

/// One line describing a deal.
#[must_use]
pub fn render_deal(index: usize, deal: &Deal, state: &OpState) -> String {
    let mut line = format!("  {index}. {} - {}", deal.name, format_price(deal.current_price));
    if let Some(original) = deal.original_price
        && original > deal.current_price
    {
        let _ = write!(line, " (was {})", format_price(original));
    }
    if let Some(retailer) = &deal.retailer {
        let _ = write!(line, " at {retailer}");
    }
    if let Some(rating) = deal.rating {
        let _ = write!(line, " [{rating:.1}/5]");
    }
    match state {
        OpState::Pending => line.push_str("  adding..."),
        OpState::Succeeded => line.push_str("  added"),
        OpState::Failed(reason) => {
            let _ = write!(line, "  {reason}");
        }
        OpState::Idle => {}
    }
    line
}

/// A conversation entry, with its deals when expanded.
///
/// `states` yields the add-button state of each deal by index.
#[must_use]
pub fn render_entry(entry: &ConversationEntry, states: impl Fn(usize) -> OpState) -> String {
    let message = &entry.message;
    let who = match message.role() {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let mut out = format!("[{}] {who}: {}", message.id(), message.text());

    if message.has_products() {
        if entry.expanded {
            for (index, deal) in message.products().iter().enumerate() {
                out.push('\n');
                out.push_str(&render_deal(index, deal, &states(index)));
            }
        } else {
            let _ = write!(
                out,
                "\n  ({} deals hidden, /toggle {} to show)",
                message.products().len(),
                message.id()
            );
        }
    }
    out
}

/// The cart as a table-ish listing.
#[must_use]
pub fn render_cart(cart: &CartSnapshot) -> String {
    if !cart.loaded {
        return format!("Cart not loaded ({} item(s) added).", cart.badge_count);
    }
    if cart.items.is_empty() {
        return "Your cart is empty.".to_string();
    }

    let mut out = String::new();
    for item in &cart.items {
        let _ = write!(out, "  {} - {} - {}", item.id, item.title, format_price(item.price));
        if cart.removing.contains(&item.id) {
            out.push_str("  removing...");
        }
        out.push('\n');
    }
    let _ = write!(
        out,
        "{} item(s), total {}",
        cart.item_count,
        format_price(cart.total_price)
    );
    if cart.stale {
        out.push_str(" (may be out of date)");
    }
    out
}
