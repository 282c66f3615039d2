//! Catalog served by `--offline` mode.

use dealcart::deal::{Deal, Savings};

fn deal(id: &str, name: &str, price: f64, original: f64, retailer: &str, rating: f64) -> Deal {
    let mut deal = Deal::new(id, name, price)
        .with_original_price(original)
        .with_retailer(retailer)
        .with_product_link(format!("https://shop.example.com/p/{id}"));
    deal.rating = Some(rating);
    deal.savings = Some(Savings {
        amount: Some(original - price),
        percentage: Some(((original - price) / original * 100.0).round()),
    });
    deal
}

/// A small fixed catalog of deals.
#[must_use]
pub fn catalog() -> Vec<Deal> {
    vec![
        deal("shoe-001", "Blue Running Shoes", 49.99, 79.99, "Stride", 4.5),
        deal("shoe-002", "Trail Running Shoes", 89.00, 120.00, "Peak Outfitters", 4.7),
        deal("shoe-003", "Canvas Sneakers", 24.99, 39.99, "Urban Feet", 4.1),
        deal("hat-001", "Wool Winter Hat", 14.50, 22.00, "Northwear", 4.3),
        deal("bag-001", "Waterproof Backpack", 59.95, 85.00, "Carry Co", 4.6),
        deal("head-001", "Wireless Headphones", 79.00, 129.00, "Soundly", 4.4),
        deal("mug-001", "Insulated Travel Mug", 18.75, 25.00, "Brew Gear", 4.8),
    ]
}
