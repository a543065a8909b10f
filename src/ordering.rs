//! Display order of a shared collection's items

use std::collections::{HashMap, HashSet};

use crate::models::{ItemId, WishlistItem};

/// Ids to resolve for a collection: `item_order` first, then any `item_ids`
/// it does not mention.
pub fn lookup_ids(item_ids: &[ItemId], item_order: &[ItemId]) -> Vec<ItemId> {
    let mut seen = HashSet::new();
    item_order
        .iter()
        .chain(item_ids.iter())
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Orders resolved items for display.
///
/// Every id in `item_order` that resolved comes first, in that order. Items
/// listed in `item_ids` but missing from `item_order` follow in their
/// `item_ids` order. Ids that did not resolve are dropped and each item
/// appears once.
pub fn order_collection_items(
    item_ids: &[ItemId],
    item_order: &[ItemId],
    resolved: Vec<WishlistItem>,
) -> Vec<WishlistItem> {
    let mut by_id: HashMap<ItemId, WishlistItem> =
        resolved.into_iter().map(|item| (item.id, item)).collect();

    let mut ordered = Vec::with_capacity(by_id.len());
    for id in item_order.iter().chain(item_ids.iter()) {
        if let Some(item) = by_id.remove(id) {
            ordered.push(item);
        }
    }
    ordered
}
