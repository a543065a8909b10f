//! The signed-in user's wishlist items

use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::ReconcileStrategy;
use crate::error::{GatewayError, Result, StoreError};
use crate::gateway::ItemGateway;
use crate::loading::Loading;
use crate::models::{ItemId, ItemPatch, NewItem, NewItemRow, WishlistItem};
use crate::notify::{Notification, Notifier};
use crate::session::{Principal, SessionProvider};
use crate::validation::{validate_item_patch, validate_new_item};

/// Local cache of the principal's items plus the writes that keep it in sync
pub struct ItemStore {
    gateway: Arc<dyn ItemGateway>,
    session: Arc<dyn SessionProvider>,
    notifier: Arc<dyn Notifier>,
    reconcile: ReconcileStrategy,
    items: RwLock<Vec<WishlistItem>>,
    in_flight: AtomicUsize,
}

impl ItemStore {
    pub fn new(
        gateway: Arc<dyn ItemGateway>,
        session: Arc<dyn SessionProvider>,
        notifier: Arc<dyn Notifier>,
        reconcile: ReconcileStrategy,
    ) -> Self {
        Self {
            gateway,
            session,
            notifier,
            reconcile,
            items: RwLock::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Snapshot of the cache, newest first.
    pub fn items(&self) -> Vec<WishlistItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Cache lookup only; never fetches.
    pub fn get_by_id(&self, id: ItemId) -> Option<WishlistItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    fn replace(&self, items: Vec<WishlistItem>) {
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = items;
    }

    fn require_session(&self) -> Result<Principal> {
        self.session.principal().ok_or_else(|| {
            self.notifier.notify(Notification::error(
                "Not signed in",
                "Please sign in to manage your bucket list",
            ));
            StoreError::NoSession
        })
    }

    fn gateway_failure(&self, title: &str, err: GatewayError) -> StoreError {
        tracing::error!("{}: {}", title, err);
        self.notifier.notify(Notification::error(title, &err.message));
        StoreError::Gateway(err)
    }

    /// Replaces the cache with the principal's items. Without a session the
    /// cache is emptied; on failure it is left as it was.
    pub async fn fetch_all(&self) -> Vec<WishlistItem> {
        let Some(principal) = self.session.principal() else {
            self.clear();
            return Vec::new();
        };

        let _loading = Loading::start(&self.in_flight);
        match self.gateway.list_items(&principal).await {
            Ok(rows) => {
                let items: Vec<WishlistItem> = rows.into_iter().map(WishlistItem::from).collect();
                tracing::debug!(count = items.len(), "item cache refreshed");
                self.replace(items.clone());
                items
            }
            Err(err) => {
                tracing::warn!("failed to fetch items: {}", err);
                self.notifier
                    .notify(Notification::error("Could not load your items", &err.message));
                self.items()
            }
        }
    }

    /// Direct single-row lookup that bypasses and does not touch the cache.
    pub async fn fetch_by_id(&self, id: ItemId) -> Result<Option<WishlistItem>> {
        let principal = self.session.principal().ok_or(StoreError::NoSession)?;
        let row = self.gateway.get_item(&principal, id).await?;
        Ok(row.map(WishlistItem::from))
    }

    /// Creates an item and returns its server-assigned id.
    pub async fn add(&self, item: NewItem) -> Result<ItemId> {
        let principal = self.require_session()?;
        let item = item.normalized();
        validate_new_item(&item)?;

        let row = self
            .gateway
            .insert_item(&principal, NewItemRow::new(principal.id, item))
            .await
            .map_err(|e| self.gateway_failure("Could not add item", e))?;
        let created = WishlistItem::from(row);
        let id = created.id;

        match self.reconcile {
            ReconcileStrategy::Refetch => {
                self.fetch_all().await;
            }
            ReconcileStrategy::MergeReturned => {
                self.items
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(0, created);
            }
        }
        self.notifier
            .notify(Notification::success("Item added", "Added to your bucket list"));
        Ok(id)
    }

    /// Sends only the keys present in `patch` and returns the stored item.
    /// An empty patch makes no call and returns the cached copy, if any.
    pub async fn update(&self, id: ItemId, patch: ItemPatch) -> Result<Option<WishlistItem>> {
        let principal = self.require_session()?;
        let patch = patch.normalized();
        validate_item_patch(&patch)?;
        if patch.is_empty() {
            return Ok(self.get_by_id(id));
        }

        let row = self
            .gateway
            .update_item(&principal, id, patch.to_row())
            .await
            .map_err(|e| self.gateway_failure("Could not update item", e))?;
        let Some(row) = row else {
            self.notifier.notify(Notification::error(
                "Could not update item",
                "The item does not exist or is not yours",
            ));
            return Err(StoreError::NotFound);
        };
        let updated = WishlistItem::from(row);

        match self.reconcile {
            ReconcileStrategy::Refetch => {
                self.fetch_all().await;
            }
            ReconcileStrategy::MergeReturned => {
                let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
                match items.iter_mut().find(|item| item.id == id) {
                    Some(slot) => *slot = updated.clone(),
                    None => items.insert(0, updated.clone()),
                }
            }
        }
        self.notifier
            .notify(Notification::success("Item updated", &updated.title));
        Ok(Some(updated))
    }

    /// Marks an item done (or not done) by setting its completion timestamp.
    pub async fn set_completed(&self, id: ItemId, completed: bool) -> Result<Option<WishlistItem>> {
        let patch = ItemPatch {
            completed_at: Some(completed.then(Utc::now)),
            ..ItemPatch::default()
        };
        self.update(id, patch).await
    }

    /// Deletes server-side, then drops the item from the cache without refetching.
    pub async fn delete(&self, id: ItemId) -> Result<()> {
        let principal = self.require_session()?;
        let deleted = self
            .gateway
            .delete_item(&principal, id)
            .await
            .map_err(|e| self.gateway_failure("Could not delete item", e))?;
        if !deleted {
            self.notifier.notify(Notification::error(
                "Could not delete item",
                "The item does not exist or is not yours",
            ));
            return Err(StoreError::NotFound);
        }

        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|item| item.id != id);
        self.notifier
            .notify(Notification::success("Item deleted", "Removed from your bucket list"));
        Ok(())
    }
}
