use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use super::{CollectionGateway, GatewayResult, ItemGateway, ProfileGateway, SquadGateway};
use crate::error::GatewayError;
use crate::models::{
    CollectionId, CollectionRow, ItemId, ItemRow, NewCollectionRow, NewItemRow, NewProfileRow,
    ProfileRow, PublicCollectionRows, RelationshipId, RelationshipStatus, RowPatch,
    SquadRelationshipRow, WishlistItem,
};
use crate::ordering::{lookup_ids, order_collection_items};
use crate::session::Principal;

#[derive(Debug, Default)]
struct MemoryState {
    items: HashMap<ItemId, ItemRow>,
    collections: HashMap<CollectionId, CollectionRow>,
    profiles: HashMap<Uuid, ProfileRow>,
    relationships: HashMap<RelationshipId, SquadRelationshipRow>,
    /// Items that listings do not return yet, like a lagging replica
    unlisted: HashSet<ItemId>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl MemoryState {
    /// Strictly increasing timestamps keep newest-first ordering stable.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + ChronoDuration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn publicly_listed(&self, item: &ItemRow) -> bool {
        self.collections.values().any(|c| {
            c.is_public
                && c.creator_id == item.user_id
                && c.item_ids
                    .iter()
                    .chain(c.item_order.iter())
                    .flatten()
                    .any(|id| *id == item.id)
        })
    }
}

/// In-process gateway with the backend's ownership and uniqueness rules
///
/// Every call can be slowed down with [`MemoryGateway::set_latency`] or made
/// to fail with [`MemoryGateway::set_failing`] / [`MemoryGateway::fail_next`],
/// and is counted per operation name.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
    latency_ms: AtomicU64,
    failing: AtomicBool,
    fail_next: AtomicUsize,
    calls: Mutex<HashMap<&'static str, usize>>,
}

fn sorted_newest_first<T: Clone>(rows: Vec<&T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut rows: Vec<T> = rows.into_iter().cloned().collect();
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    rows
}

/// Merges `patch` into the row's columns the way a PATCH would.
fn apply_patch<T: Serialize + DeserializeOwned>(
    row: &T,
    patch: &RowPatch,
    updated_at: DateTime<Utc>,
) -> GatewayResult<T> {
    let mut value = serde_json::to_value(row).map_err(GatewayError::decode)?;
    let Value::Object(columns) = &mut value else {
        return Err(GatewayError::decode("row is not an object"));
    };
    for (column, new_value) in patch {
        if !columns.contains_key(column) {
            return Err(GatewayError::bad_request(format!(
                "column {} does not exist",
                column
            )));
        }
        if matches!(column.as_str(), "id" | "created_at") {
            return Err(GatewayError::bad_request(format!(
                "column {} cannot be updated",
                column
            )));
        }
        columns.insert(column.clone(), new_value.clone());
    }
    if columns.contains_key("updated_at") {
        columns.insert(
            "updated_at".to_string(),
            serde_json::to_value(updated_at).map_err(GatewayError::decode)?,
        );
    }
    serde_json::from_value(value).map_err(GatewayError::bad_request)
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Every call fails with a network error while set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The next `count` calls fail with a network error.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// How many times `operation` was called, e.g. `"list_items"`.
    pub fn calls(&self, operation: &str) -> usize {
        self.lock_calls().get(operation).copied().unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.lock_calls().clear();
    }

    /// Keeps `id` out of `list_items` results while still readable by id.
    pub fn hide_from_listing(&self, id: ItemId) {
        self.lock().unlisted.insert(id);
    }

    pub fn item_count(&self) -> usize {
        self.lock().items.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.lock().relationships.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_calls(&self) -> MutexGuard<'_, HashMap<&'static str, usize>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the call, waits out the latency, then applies failure switches.
    async fn enter(&self, operation: &'static str) -> GatewayResult<()> {
        *self.lock_calls().entry(operation).or_insert(0) += 1;

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let scheduled = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scheduled || self.failing.load(Ordering::SeqCst) {
            tracing::debug!(operation, "memory gateway failing call");
            return Err(GatewayError::network(format!("{} failed", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl ItemGateway for MemoryGateway {
    async fn list_items(&self, principal: &Principal) -> GatewayResult<Vec<ItemRow>> {
        self.enter("list_items").await?;
        let state = self.lock();
        let rows: Vec<&ItemRow> = state
            .items
            .values()
            .filter(|row| row.user_id == principal.id && !state.unlisted.contains(&row.id))
            .collect();
        Ok(sorted_newest_first(rows, |row: &ItemRow| row.created_at))
    }

    async fn get_item(&self, principal: &Principal, id: ItemId) -> GatewayResult<Option<ItemRow>> {
        self.enter("get_item").await?;
        let state = self.lock();
        Ok(state
            .items
            .get(&id)
            .filter(|row| row.user_id == principal.id)
            .cloned())
    }

    async fn insert_item(&self, principal: &Principal, row: NewItemRow) -> GatewayResult<ItemRow> {
        self.enter("insert_item").await?;
        if row.user_id != principal.id {
            return Err(GatewayError::permission_denied(
                "new row violates row-level security policy for table wishlist_items",
            ));
        }
        let mut state = self.lock();
        let now = state.now();
        let stored = ItemRow {
            id: Uuid::new_v4(),
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            item_type: row.item_type,
            activity_category: row.activity_category,
            travel_companion: row.travel_companion,
            timeframe_type: Some(row.timeframe_type),
            target_date: row.target_date,
            target_week: row.target_week,
            target_month: row.target_month,
            target_year: row.target_year,
            budget: row.budget,
            destination: row.destination,
            link: row.link,
            notes: row.notes,
            tags: Some(row.tags),
            squad_members: Some(row.squad_members),
            image_url: row.image_url,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        state.items.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_item(
        &self,
        principal: &Principal,
        id: ItemId,
        patch: RowPatch,
    ) -> GatewayResult<Option<ItemRow>> {
        self.enter("update_item").await?;
        if patch.contains_key("user_id") {
            return Err(GatewayError::permission_denied("item owner cannot change"));
        }
        let mut state = self.lock();
        let Some(current) = state.items.get(&id).filter(|row| row.user_id == principal.id) else {
            return Ok(None);
        };
        let current = current.clone();
        let now = state.now();
        let updated = apply_patch(&current, &patch, now)?;
        state.items.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_item(&self, principal: &Principal, id: ItemId) -> GatewayResult<bool> {
        self.enter("delete_item").await?;
        let mut state = self.lock();
        let owned = state
            .items
            .get(&id)
            .is_some_and(|row| row.user_id == principal.id);
        if owned {
            state.items.remove(&id);
        }
        Ok(owned)
    }
}

#[async_trait]
impl CollectionGateway for MemoryGateway {
    async fn list_collections(&self, principal: &Principal) -> GatewayResult<Vec<CollectionRow>> {
        self.enter("list_collections").await?;
        let state = self.lock();
        let rows: Vec<&CollectionRow> = state
            .collections
            .values()
            .filter(|row| row.creator_id == principal.id)
            .collect();
        Ok(sorted_newest_first(rows, |row: &CollectionRow| row.created_at))
    }

    // Rows are returned whatever their visibility; access is decided by the caller.
    async fn get_collection(
        &self,
        _principal: Option<&Principal>,
        id: CollectionId,
    ) -> GatewayResult<Option<CollectionRow>> {
        self.enter("get_collection").await?;
        Ok(self.lock().collections.get(&id).cloned())
    }

    async fn public_collection_by_slug(&self, slug: &str) -> GatewayResult<Option<CollectionRow>> {
        self.enter("public_collection_by_slug").await?;
        let state = self.lock();
        Ok(state
            .collections
            .values()
            .find(|row| row.slug == slug && row.is_public)
            .cloned())
    }

    async fn public_collection_items(&self, ids: &[ItemId]) -> GatewayResult<Vec<ItemRow>> {
        self.enter("public_collection_items").await?;
        let state = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.items.get(id))
            .filter(|row| state.publicly_listed(row))
            .cloned()
            .collect())
    }

    async fn public_collection_view(
        &self,
        slug: &str,
    ) -> GatewayResult<Option<PublicCollectionRows>> {
        self.enter("public_collection_view").await?;
        let state = self.lock();
        let Some(collection) = state
            .collections
            .values()
            .find(|row| row.slug == slug && row.is_public)
            .cloned()
        else {
            return Ok(None);
        };

        let item_ids = collection.item_ids.clone().unwrap_or_default();
        let item_order = collection.item_order.clone().unwrap_or_default();
        let resolved: Vec<WishlistItem> = lookup_ids(&item_ids, &item_order)
            .iter()
            .filter_map(|id| state.items.get(id))
            .filter(|row| row.user_id == collection.creator_id)
            .cloned()
            .map(WishlistItem::from)
            .collect();
        let ordered = order_collection_items(&item_ids, &item_order, resolved);
        let ordered_ids: Vec<ItemId> = ordered.iter().map(|item| item.id).collect();
        let items = ordered_ids
            .iter()
            .filter_map(|id| state.items.get(id))
            .cloned()
            .collect();
        Ok(Some(PublicCollectionRows { collection, items }))
    }

    async fn insert_collection(
        &self,
        principal: &Principal,
        row: NewCollectionRow,
    ) -> GatewayResult<CollectionRow> {
        self.enter("insert_collection").await?;
        if row.creator_id != principal.id {
            return Err(GatewayError::permission_denied(
                "new row violates row-level security policy for table shared_collections",
            ));
        }
        let mut state = self.lock();
        if state.collections.values().any(|c| c.slug == row.slug) {
            return Err(GatewayError::unique_violation(
                "duplicate key value violates unique constraint \"shared_collections_slug_key\"",
            ));
        }
        let now = state.now();
        let stored = CollectionRow {
            id: Uuid::new_v4(),
            title: row.title,
            description: row.description,
            item_ids: Some(row.item_ids),
            item_order: Some(row.item_order),
            creator_id: row.creator_id,
            creator_name: row.creator_name,
            is_public: row.is_public,
            slug: row.slug,
            created_at: now,
            updated_at: now,
        };
        state.collections.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_collection(
        &self,
        principal: &Principal,
        id: CollectionId,
        patch: RowPatch,
    ) -> GatewayResult<Option<CollectionRow>> {
        self.enter("update_collection").await?;
        if patch.contains_key("slug") || patch.contains_key("creator_id") {
            return Err(GatewayError::permission_denied(
                "slug and creator cannot change",
            ));
        }
        let mut state = self.lock();
        let Some(current) = state
            .collections
            .get(&id)
            .filter(|row| row.creator_id == principal.id)
        else {
            return Ok(None);
        };
        let current = current.clone();
        let now = state.now();
        let updated = apply_patch(&current, &patch, now)?;
        state.collections.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_collection(
        &self,
        principal: &Principal,
        id: CollectionId,
    ) -> GatewayResult<bool> {
        self.enter("delete_collection").await?;
        let mut state = self.lock();
        let owned = state
            .collections
            .get(&id)
            .is_some_and(|row| row.creator_id == principal.id);
        if owned {
            state.collections.remove(&id);
        }
        Ok(owned)
    }
}

#[async_trait]
impl ProfileGateway for MemoryGateway {
    async fn get_profile(
        &self,
        _principal: &Principal,
        id: Uuid,
    ) -> GatewayResult<Option<ProfileRow>> {
        self.enter("get_profile").await?;
        Ok(self.lock().profiles.get(&id).cloned())
    }

    async fn profile_by_username(
        &self,
        _principal: &Principal,
        username: &str,
    ) -> GatewayResult<Option<ProfileRow>> {
        self.enter("profile_by_username").await?;
        let state = self.lock();
        Ok(state
            .profiles
            .values()
            .find(|row| row.username == username)
            .cloned())
    }

    async fn profiles_by_ids(
        &self,
        _principal: &Principal,
        ids: &[Uuid],
    ) -> GatewayResult<Vec<ProfileRow>> {
        self.enter("profiles_by_ids").await?;
        let state = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.profiles.get(id))
            .cloned()
            .collect())
    }

    async fn search_profiles(
        &self,
        _principal: &Principal,
        query: &str,
        limit: usize,
    ) -> GatewayResult<Vec<ProfileRow>> {
        self.enter("search_profiles").await?;
        let needle = query.to_lowercase();
        let state = self.lock();
        let mut rows: Vec<ProfileRow> = state
            .profiles
            .values()
            .filter(|row| {
                row.username.to_lowercase().contains(&needle)
                    || row
                        .display_name
                        .as_deref()
                        .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.username.cmp(&b.username));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn insert_profile(
        &self,
        principal: &Principal,
        row: NewProfileRow,
    ) -> GatewayResult<ProfileRow> {
        self.enter("insert_profile").await?;
        if row.id != principal.id {
            return Err(GatewayError::permission_denied(
                "new row violates row-level security policy for table profiles",
            ));
        }
        let mut state = self.lock();
        if state.profiles.contains_key(&row.id) {
            return Err(GatewayError::unique_violation(
                "duplicate key value violates unique constraint \"profiles_pkey\"",
            ));
        }
        if state
            .profiles
            .values()
            .any(|p| p.username.eq_ignore_ascii_case(&row.username))
        {
            return Err(GatewayError::unique_violation(
                "duplicate key value violates unique constraint \"profiles_username_key\"",
            ));
        }
        let now = state.now();
        let stored = ProfileRow {
            id: row.id,
            username: row.username,
            display_name: Some(row.display_name),
            bio: None,
            avatar_url: row.avatar_url,
            created_at: now,
            updated_at: now,
        };
        state.profiles.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_profile(
        &self,
        principal: &Principal,
        patch: RowPatch,
    ) -> GatewayResult<Option<ProfileRow>> {
        self.enter("update_profile").await?;
        if patch.contains_key("username") {
            return Err(GatewayError::permission_denied("username cannot change"));
        }
        let mut state = self.lock();
        let Some(current) = state.profiles.get(&principal.id).cloned() else {
            return Ok(None);
        };
        let now = state.now();
        let updated = apply_patch(&current, &patch, now)?;
        state.profiles.insert(principal.id, updated.clone());
        Ok(Some(updated))
    }
}

#[async_trait]
impl SquadGateway for MemoryGateway {
    async fn squad_relationships(
        &self,
        principal: &Principal,
    ) -> GatewayResult<Vec<SquadRelationshipRow>> {
        self.enter("squad_relationships").await?;
        let state = self.lock();
        let rows: Vec<&SquadRelationshipRow> = state
            .relationships
            .values()
            .filter(|row| row.requester_id == principal.id || row.recipient_id == principal.id)
            .collect();
        Ok(sorted_newest_first(rows, |row: &SquadRelationshipRow| {
            row.created_at
        }))
    }

    async fn pending_requests(
        &self,
        principal: &Principal,
    ) -> GatewayResult<Vec<SquadRelationshipRow>> {
        self.enter("pending_requests").await?;
        let state = self.lock();
        let rows: Vec<&SquadRelationshipRow> = state
            .relationships
            .values()
            .filter(|row| {
                row.recipient_id == principal.id && row.status == RelationshipStatus::Pending
            })
            .collect();
        Ok(sorted_newest_first(rows, |row: &SquadRelationshipRow| {
            row.created_at
        }))
    }

    async fn send_squad_request(
        &self,
        principal: &Principal,
        recipient: Uuid,
    ) -> GatewayResult<SquadRelationshipRow> {
        self.enter("send_squad_request").await?;
        if recipient == principal.id {
            return Err(GatewayError::bad_request("cannot send a request to yourself"));
        }
        let mut state = self.lock();
        let exists = state.relationships.values().any(|row| {
            (row.requester_id == principal.id && row.recipient_id == recipient)
                || (row.requester_id == recipient && row.recipient_id == principal.id)
        });
        if exists {
            return Err(GatewayError::unique_violation(
                "duplicate key value violates unique constraint \"squad_relationships_pair_key\"",
            ));
        }
        let now = state.now();
        let stored = SquadRelationshipRow {
            id: Uuid::new_v4(),
            requester_id: principal.id,
            recipient_id: recipient,
            status: RelationshipStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.relationships.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_request_status(
        &self,
        principal: &Principal,
        id: RelationshipId,
        status: RelationshipStatus,
    ) -> GatewayResult<SquadRelationshipRow> {
        self.enter("update_request_status").await?;
        let mut state = self.lock();
        let now = state.now();
        let Some(row) = state.relationships.get_mut(&id) else {
            return Err(GatewayError::not_found("squad request not found"));
        };
        if row.recipient_id != principal.id {
            return Err(GatewayError::permission_denied(
                "only the recipient can respond to a squad request",
            ));
        }
        if row.status != RelationshipStatus::Pending || status == RelationshipStatus::Pending {
            return Err(GatewayError::bad_request("squad request was already answered"));
        }
        row.status = status;
        row.updated_at = now;
        Ok(row.clone())
    }
}
