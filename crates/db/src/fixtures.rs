//! Deterministic seed data for demos and store tests.

use vendi_core::domain::article::ArticleId;
use vendi_core::domain::inventory::{InventoryItem, VendorId};
use vendi_core::StoreError;

use crate::repositories::SqlInventoryStore;

pub fn demo_items() -> Vec<InventoryItem> {
    [
        ("21may25-1", "Blue Shirt", "soft cotton, relaxed fit", 1999),
        ("21may25-2", "Red Hat", "wool blend, one size", 1450),
        ("21may25-3", "Denim Jacket", "stonewashed blue denim", 5400),
        ("22may25-1", "Canvas Tote", "natural canvas with inner pocket", 900),
        ("22may25-2", "Linen Scarf", "lightweight summer linen", 1200),
    ]
    .into_iter()
    .map(|(raw_id, name, description, price_cents)| InventoryItem {
        article_id: ArticleId::parse(raw_id).expect("fixture article ids are well-formed"),
        name: name.to_owned(),
        description: description.to_owned(),
        price_cents,
        locked_at: None,
        locked_until: None,
    })
    .collect()
}

/// Seed the demo items for one vendor; returns how many were written.
pub async fn seed_demo_inventory(
    store: &SqlInventoryStore,
    vendor_id: &VendorId,
) -> Result<usize, StoreError> {
    let items = demo_items();
    for item in &items {
        store.upsert(vendor_id, item).await?;
    }
    Ok(items.len())
}
