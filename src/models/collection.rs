use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{double_option, put, ItemId, ItemRow, RowPatch, WishlistItem};

pub type CollectionId = Uuid;

/// A named, ordered view over some of the creator's items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedCollection {
    pub id: CollectionId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub item_ids: Vec<ItemId>,
    pub item_order: Vec<ItemId>,
    pub creator_id: Uuid,
    /// Captured when the collection was created; not kept in sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_name: Option<String>,
    pub is_public: bool,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `shared_collections` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRow {
    pub id: CollectionId,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub item_ids: Option<Vec<ItemId>>,
    #[serde(default)]
    pub item_order: Option<Vec<ItemId>>,
    pub creator_id: Uuid,
    pub creator_name: Option<String>,
    pub is_public: bool,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CollectionRow> for SharedCollection {
    fn from(row: CollectionRow) -> Self {
        SharedCollection {
            id: row.id,
            title: row.title,
            description: row.description,
            item_ids: row.item_ids.unwrap_or_default(),
            item_order: row.item_order.unwrap_or_default(),
            creator_id: row.creator_id,
            creator_name: row.creator_name,
            is_public: row.is_public,
            slug: row.slug,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Input for creating a collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCollection {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub item_ids: Vec<ItemId>,
    /// Defaults to `item_ids` when left empty.
    #[serde(default)]
    pub item_order: Vec<ItemId>,
    #[serde(default)]
    pub is_public: bool,
}

impl NewCollection {
    pub fn new(title: impl Into<String>, item_ids: Vec<ItemId>) -> Self {
        Self {
            title: title.into(),
            item_ids,
            ..Self::default()
        }
    }

    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    pub fn with_order(mut self, item_order: Vec<ItemId>) -> Self {
        self.item_order = item_order;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCollectionRow {
    pub title: String,
    pub description: Option<String>,
    pub item_ids: Vec<ItemId>,
    pub item_order: Vec<ItemId>,
    pub creator_id: Uuid,
    pub creator_name: Option<String>,
    pub is_public: bool,
    pub slug: String,
}

impl NewCollectionRow {
    pub fn new(
        creator_id: Uuid,
        creator_name: Option<String>,
        slug: String,
        collection: NewCollection,
    ) -> Self {
        let item_order = if collection.item_order.is_empty() {
            collection.item_ids.clone()
        } else {
            collection.item_order
        };
        NewCollectionRow {
            title: collection.title.trim().to_string(),
            description: collection
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            item_ids: collection.item_ids,
            item_order,
            creator_id,
            creator_name,
            is_public: collection.is_public,
            slug,
        }
    }
}

/// Sparse change to a collection; the slug is never patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_ids: Option<Vec<ItemId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_order: Option<Vec<ItemId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

impl CollectionPatch {
    pub fn is_empty(&self) -> bool {
        self == &CollectionPatch::default()
    }

    pub fn to_row(&self) -> RowPatch {
        let mut patch = RowPatch::new();
        if let Some(title) = &self.title {
            put(&mut patch, "title", title.trim());
        }
        if let Some(description) = &self.description {
            put(&mut patch, "description", description);
        }
        if let Some(ids) = &self.item_ids {
            put(&mut patch, "item_ids", ids);
        }
        if let Some(order) = &self.item_order {
            put(&mut patch, "item_order", order);
        }
        if let Some(is_public) = self.is_public {
            put(&mut patch, "is_public", is_public);
        }
        patch
    }
}

/// A public collection with its items already in display order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedCollectionView {
    pub collection: SharedCollection,
    pub items: Vec<WishlistItem>,
}

/// Body returned by the public lookup function
#[derive(Debug, Clone, Deserialize)]
pub struct PublicCollectionRows {
    pub collection: CollectionRow,
    #[serde(default)]
    pub items: Vec<ItemRow>,
}

impl From<PublicCollectionRows> for SharedCollectionView {
    fn from(rows: PublicCollectionRows) -> Self {
        SharedCollectionView {
            collection: rows.collection.into(),
            items: rows.items.into_iter().map(WishlistItem::from).collect(),
        }
    }
}
