//! The remote data gateway the stores talk to
//!
//! One trait per concern. [`SupabaseGateway`] speaks to a hosted project over
//! PostgREST and edge functions; [`MemoryGateway`] keeps everything in process
//! and enforces the same ownership and uniqueness rules.

mod memory;
mod supabase;

pub use memory::MemoryGateway;
pub use supabase::SupabaseGateway;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::models::{
    CollectionId, CollectionRow, ItemId, ItemRow, NewCollectionRow, NewItemRow, NewProfileRow,
    ProfileRow, PublicCollectionRows, RelationshipId, RelationshipStatus, RowPatch,
    SquadRelationshipRow,
};
use crate::session::Principal;

pub type GatewayResult<T> = Result<T, GatewayError>;

pub const PROFILES_TABLE: &str = "profiles";
pub const ITEMS_TABLE: &str = "wishlist_items";
pub const COLLECTIONS_TABLE: &str = "shared_collections";

/// Profile search input with the characters that would break out of a
/// PostgREST `or=(...)` filter removed. Minimum-length checks apply to this.
pub fn search_term(query: &str) -> String {
    query
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '"'))
        .collect::<String>()
        .trim()
        .to_string()
}

pub const RPC_SQUAD_RELATIONSHIPS: &str = "get_squad_relationships";
pub const RPC_PENDING_REQUESTS: &str = "get_pending_squad_requests";
pub const RPC_SEND_REQUEST: &str = "send_squad_request";
pub const RPC_UPDATE_REQUEST_STATUS: &str = "update_squad_request_status";

#[async_trait]
pub trait ItemGateway: Send + Sync {
    /// Items owned by the principal, newest first.
    async fn list_items(&self, principal: &Principal) -> GatewayResult<Vec<ItemRow>>;

    /// `None` when the row does not exist or is not visible to the principal.
    async fn get_item(&self, principal: &Principal, id: ItemId) -> GatewayResult<Option<ItemRow>>;

    async fn insert_item(&self, principal: &Principal, row: NewItemRow) -> GatewayResult<ItemRow>;

    /// Applies exactly the keys in `patch`. `None` when no visible row matched.
    async fn update_item(
        &self,
        principal: &Principal,
        id: ItemId,
        patch: RowPatch,
    ) -> GatewayResult<Option<ItemRow>>;

    /// `false` when no visible row matched.
    async fn delete_item(&self, principal: &Principal, id: ItemId) -> GatewayResult<bool>;
}

#[async_trait]
pub trait CollectionGateway: Send + Sync {
    /// Collections created by the principal, newest first.
    async fn list_collections(&self, principal: &Principal) -> GatewayResult<Vec<CollectionRow>>;

    async fn get_collection(
        &self,
        principal: Option<&Principal>,
        id: CollectionId,
    ) -> GatewayResult<Option<CollectionRow>>;

    /// Only public collections are ever returned.
    async fn public_collection_by_slug(&self, slug: &str) -> GatewayResult<Option<CollectionRow>>;

    /// Items readable through some public collection, in no particular order.
    async fn public_collection_items(&self, ids: &[ItemId]) -> GatewayResult<Vec<ItemRow>>;

    /// Collection and items in one call, as the public HTTP function serves them.
    async fn public_collection_view(
        &self,
        slug: &str,
    ) -> GatewayResult<Option<PublicCollectionRows>>;

    async fn insert_collection(
        &self,
        principal: &Principal,
        row: NewCollectionRow,
    ) -> GatewayResult<CollectionRow>;

    async fn update_collection(
        &self,
        principal: &Principal,
        id: CollectionId,
        patch: RowPatch,
    ) -> GatewayResult<Option<CollectionRow>>;

    async fn delete_collection(&self, principal: &Principal, id: CollectionId)
        -> GatewayResult<bool>;
}

#[async_trait]
pub trait ProfileGateway: Send + Sync {
    async fn get_profile(&self, principal: &Principal, id: Uuid)
        -> GatewayResult<Option<ProfileRow>>;

    async fn profile_by_username(
        &self,
        principal: &Principal,
        username: &str,
    ) -> GatewayResult<Option<ProfileRow>>;

    async fn profiles_by_ids(
        &self,
        principal: &Principal,
        ids: &[Uuid],
    ) -> GatewayResult<Vec<ProfileRow>>;

    /// Case-insensitive substring match on username or display name.
    async fn search_profiles(
        &self,
        principal: &Principal,
        query: &str,
        limit: usize,
    ) -> GatewayResult<Vec<ProfileRow>>;

    async fn insert_profile(
        &self,
        principal: &Principal,
        row: NewProfileRow,
    ) -> GatewayResult<ProfileRow>;

    /// Patches the principal's own profile.
    async fn update_profile(
        &self,
        principal: &Principal,
        patch: RowPatch,
    ) -> GatewayResult<Option<ProfileRow>>;
}

#[async_trait]
pub trait SquadGateway: Send + Sync {
    /// Every edge the principal is on, in either direction.
    async fn squad_relationships(
        &self,
        principal: &Principal,
    ) -> GatewayResult<Vec<SquadRelationshipRow>>;

    /// Pending edges addressed to the principal.
    async fn pending_requests(
        &self,
        principal: &Principal,
    ) -> GatewayResult<Vec<SquadRelationshipRow>>;

    /// Creates a pending edge principal → recipient. A second edge for the
    /// same pair, in either direction, fails with a unique violation.
    async fn send_squad_request(
        &self,
        principal: &Principal,
        recipient: Uuid,
    ) -> GatewayResult<SquadRelationshipRow>;

    /// Moves a pending edge addressed to the principal to `status`.
    async fn update_request_status(
        &self,
        principal: &Principal,
        id: RelationshipId,
        status: RelationshipStatus,
    ) -> GatewayResult<SquadRelationshipRow>;
}

/// Profile and squad calls together
pub trait UserGateway: ProfileGateway + SquadGateway {}

impl<T: ProfileGateway + SquadGateway + ?Sized> UserGateway for T {}

/// Everything the composition root needs from one backend
pub trait Gateway: ItemGateway + CollectionGateway + ProfileGateway + SquadGateway {}

impl<T: ItemGateway + CollectionGateway + ProfileGateway + SquadGateway + ?Sized> Gateway for T {}
