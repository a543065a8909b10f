use async_trait::async_trait;
use bucketnest_functions::{FunctionsClient, FunctionsError};
use bucketnest_postgrest::{PostgrestClient, SortOrder};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{
    search_term, CollectionGateway, GatewayResult, ItemGateway, ProfileGateway, SquadGateway,
    COLLECTIONS_TABLE, ITEMS_TABLE, PROFILES_TABLE, RPC_PENDING_REQUESTS, RPC_SEND_REQUEST,
    RPC_SQUAD_RELATIONSHIPS, RPC_UPDATE_REQUEST_STATUS,
};
use crate::config::ClientOptions;
use crate::error::GatewayError;
use crate::models::{
    CollectionId, CollectionRow, ItemId, ItemRow, NewCollectionRow, NewItemRow, NewProfileRow,
    ProfileRow, PublicCollectionRows, RelationshipId, RelationshipStatus, RowPatch,
    SquadRelationshipRow,
};
use crate::session::Principal;

/// Gateway backed by a hosted Supabase project
#[derive(Debug, Clone)]
pub struct SupabaseGateway {
    url: String,
    anon_key: String,
    http_client: Client,
    functions: FunctionsClient,
    public_function: String,
    search_min_chars: usize,
}

impl SupabaseGateway {
    pub fn new(url: &str, anon_key: &str, http_client: Client, options: &ClientOptions) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            functions: FunctionsClient::new(url, anon_key, http_client.clone()),
            http_client,
            public_function: options.public_function.clone(),
            search_min_chars: options.search_min_chars,
        }
    }

    /// Table client sending the principal's token, so row security applies.
    fn table(&self, table: &str, principal: &Principal) -> GatewayResult<PostgrestClient> {
        Ok(
            PostgrestClient::new(&self.url, &self.anon_key, table, self.http_client.clone())?
                .with_auth(&principal.access_token)?,
        )
    }

    /// Table client for the anonymous role.
    fn public_table(&self, table: &str) -> GatewayResult<PostgrestClient> {
        Ok(
            PostgrestClient::new(&self.url, &self.anon_key, table, self.http_client.clone())?
                .with_auth(&self.anon_key)?,
        )
    }

    fn rpc(&self, function: &str, principal: &Principal, params: Value) -> GatewayResult<PostgrestClient> {
        Ok(PostgrestClient::rpc(
            &self.url,
            &self.anon_key,
            function,
            params,
            self.http_client.clone(),
        )?
        .with_auth(&principal.access_token)?)
    }
}

/// First row of a `return=representation` body.
fn first_row<T: DeserializeOwned>(value: Value) -> GatewayResult<Option<T>> {
    let row = match value {
        Value::Array(rows) => rows.into_iter().next(),
        Value::Null => None,
        other => Some(other),
    };
    row.map(serde_json::from_value)
        .transpose()
        .map_err(GatewayError::decode)
}

fn returned_row<T: DeserializeOwned>(value: Value, operation: &str) -> GatewayResult<T> {
    first_row(value)?.ok_or_else(|| GatewayError::decode(format!("{} returned no row", operation)))
}

/// Escapes `ilike` wildcards so the term matches literally.
fn ilike_literal(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn id_list(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}

#[async_trait]
impl ItemGateway for SupabaseGateway {
    async fn list_items(&self, principal: &Principal) -> GatewayResult<Vec<ItemRow>> {
        Ok(self
            .table(ITEMS_TABLE, principal)?
            .select("*")
            .eq("user_id", &principal.id.to_string())
            .order("created_at", SortOrder::Descending)
            .execute::<ItemRow>()
            .await?)
    }

    async fn get_item(&self, principal: &Principal, id: ItemId) -> GatewayResult<Option<ItemRow>> {
        let rows = self
            .table(ITEMS_TABLE, principal)?
            .select("*")
            .eq("id", &id.to_string())
            .limit(1)
            .execute::<ItemRow>()
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_item(&self, principal: &Principal, row: NewItemRow) -> GatewayResult<ItemRow> {
        let value = self.table(ITEMS_TABLE, principal)?.insert(&row).await?;
        returned_row(value, "item insert")
    }

    async fn update_item(
        &self,
        principal: &Principal,
        id: ItemId,
        patch: RowPatch,
    ) -> GatewayResult<Option<ItemRow>> {
        let value = self
            .table(ITEMS_TABLE, principal)?
            .eq("id", &id.to_string())
            .update(&patch)
            .await?;
        first_row(value)
    }

    async fn delete_item(&self, principal: &Principal, id: ItemId) -> GatewayResult<bool> {
        let value = self
            .table(ITEMS_TABLE, principal)?
            .eq("id", &id.to_string())
            .delete()
            .await?;
        Ok(first_row::<Value>(value)?.is_some())
    }
}

#[async_trait]
impl CollectionGateway for SupabaseGateway {
    async fn list_collections(&self, principal: &Principal) -> GatewayResult<Vec<CollectionRow>> {
        Ok(self
            .table(COLLECTIONS_TABLE, principal)?
            .select("*")
            .eq("creator_id", &principal.id.to_string())
            .order("created_at", SortOrder::Descending)
            .execute::<CollectionRow>()
            .await?)
    }

    async fn get_collection(
        &self,
        principal: Option<&Principal>,
        id: CollectionId,
    ) -> GatewayResult<Option<CollectionRow>> {
        let client = match principal {
            Some(principal) => self.table(COLLECTIONS_TABLE, principal)?,
            None => self.public_table(COLLECTIONS_TABLE)?,
        };
        let rows = client
            .select("*")
            .eq("id", &id.to_string())
            .limit(1)
            .execute::<CollectionRow>()
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn public_collection_by_slug(&self, slug: &str) -> GatewayResult<Option<CollectionRow>> {
        let rows = self
            .public_table(COLLECTIONS_TABLE)?
            .select("*")
            .eq("slug", slug)
            .eq("is_public", "true")
            .limit(1)
            .execute::<CollectionRow>()
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn public_collection_items(&self, ids: &[ItemId]) -> GatewayResult<Vec<ItemRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = id_list(ids);
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .public_table(ITEMS_TABLE)?
            .select("*")
            .in_list("id", &refs)
            .execute::<ItemRow>()
            .await?)
    }

    async fn public_collection_view(
        &self,
        slug: &str,
    ) -> GatewayResult<Option<PublicCollectionRows>> {
        match self
            .functions
            .get::<PublicCollectionRows>(&self.public_function, &[("slug", slug)], None)
            .await
        {
            Ok(rows) => Ok(Some(rows)),
            Err(FunctionsError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_collection(
        &self,
        principal: &Principal,
        row: NewCollectionRow,
    ) -> GatewayResult<CollectionRow> {
        let value = self.table(COLLECTIONS_TABLE, principal)?.insert(&row).await?;
        returned_row(value, "collection insert")
    }

    async fn update_collection(
        &self,
        principal: &Principal,
        id: CollectionId,
        patch: RowPatch,
    ) -> GatewayResult<Option<CollectionRow>> {
        let value = self
            .table(COLLECTIONS_TABLE, principal)?
            .eq("id", &id.to_string())
            .update(&patch)
            .await?;
        first_row(value)
    }

    async fn delete_collection(
        &self,
        principal: &Principal,
        id: CollectionId,
    ) -> GatewayResult<bool> {
        let value = self
            .table(COLLECTIONS_TABLE, principal)?
            .eq("id", &id.to_string())
            .delete()
            .await?;
        Ok(first_row::<Value>(value)?.is_some())
    }
}

#[async_trait]
impl ProfileGateway for SupabaseGateway {
    async fn get_profile(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> GatewayResult<Option<ProfileRow>> {
        let rows = self
            .table(PROFILES_TABLE, principal)?
            .select("*")
            .eq("id", &id.to_string())
            .limit(1)
            .execute::<ProfileRow>()
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn profile_by_username(
        &self,
        principal: &Principal,
        username: &str,
    ) -> GatewayResult<Option<ProfileRow>> {
        let rows = self
            .table(PROFILES_TABLE, principal)?
            .select("*")
            .eq("username", username)
            .limit(1)
            .execute::<ProfileRow>()
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn profiles_by_ids(
        &self,
        principal: &Principal,
        ids: &[Uuid],
    ) -> GatewayResult<Vec<ProfileRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = id_list(ids);
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .table(PROFILES_TABLE, principal)?
            .select("*")
            .in_list("id", &refs)
            .execute::<ProfileRow>()
            .await?)
    }

    async fn search_profiles(
        &self,
        principal: &Principal,
        query: &str,
        limit: usize,
    ) -> GatewayResult<Vec<ProfileRow>> {
        let term = search_term(query);
        if term.is_empty() || term.chars().count() < self.search_min_chars {
            return Ok(Vec::new());
        }
        let pattern = ilike_literal(&term);
        let by_username = format!("username.ilike.*{}*", pattern);
        let by_name = format!("display_name.ilike.*{}*", pattern);
        Ok(self
            .table(PROFILES_TABLE, principal)?
            .select("*")
            .or(&[&by_username, &by_name])
            .limit(limit)
            .execute::<ProfileRow>()
            .await?)
    }

    async fn insert_profile(
        &self,
        principal: &Principal,
        row: NewProfileRow,
    ) -> GatewayResult<ProfileRow> {
        let value = self.table(PROFILES_TABLE, principal)?.insert(&row).await?;
        returned_row(value, "profile insert")
    }

    async fn update_profile(
        &self,
        principal: &Principal,
        patch: RowPatch,
    ) -> GatewayResult<Option<ProfileRow>> {
        let value = self
            .table(PROFILES_TABLE, principal)?
            .eq("id", &principal.id.to_string())
            .update(&patch)
            .await?;
        first_row(value)
    }
}

#[async_trait]
impl SquadGateway for SupabaseGateway {
    async fn squad_relationships(
        &self,
        principal: &Principal,
    ) -> GatewayResult<Vec<SquadRelationshipRow>> {
        let rows: Option<Vec<SquadRelationshipRow>> = self
            .rpc(RPC_SQUAD_RELATIONSHIPS, principal, json!({}))?
            .call_rpc()
            .await?;
        Ok(rows.unwrap_or_default())
    }

    async fn pending_requests(
        &self,
        principal: &Principal,
    ) -> GatewayResult<Vec<SquadRelationshipRow>> {
        let rows: Option<Vec<SquadRelationshipRow>> = self
            .rpc(RPC_PENDING_REQUESTS, principal, json!({}))?
            .call_rpc()
            .await?;
        Ok(rows.unwrap_or_default())
    }

    async fn send_squad_request(
        &self,
        principal: &Principal,
        recipient: Uuid,
    ) -> GatewayResult<SquadRelationshipRow> {
        let value: Value = self
            .rpc(RPC_SEND_REQUEST, principal, json!({ "recipient_id": recipient }))?
            .call_rpc()
            .await?;
        returned_row(value, RPC_SEND_REQUEST)
    }

    async fn update_request_status(
        &self,
        principal: &Principal,
        id: RelationshipId,
        status: RelationshipStatus,
    ) -> GatewayResult<SquadRelationshipRow> {
        let value: Value = self
            .rpc(
                RPC_UPDATE_REQUEST_STATUS,
                principal,
                json!({ "request_id": id, "new_status": status }),
            )?
            .call_rpc()
            .await?;
        returned_row(value, RPC_UPDATE_REQUEST_STATUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_cannot_escape_the_or_filter() {
        assert_eq!(search_term(" ab),id.eq.(x* "), "abid.eq.x");
        assert_eq!(search_term("a()"), "a");
    }

    #[test]
    fn wildcards_match_literally() {
        assert_eq!(ilike_literal("___"), r"\_\_\_");
        assert_eq!(ilike_literal("100%"), r"100\%");
        assert_eq!(ilike_literal(r"a\b"), r"a\\b");
        assert_eq!(ilike_literal("plain"), "plain");
    }

    #[test]
    fn first_row_accepts_object_or_array() {
        let id = Uuid::new_v4();
        let row: Option<Value> = first_row(json!([{ "id": id }])).unwrap();
        assert_eq!(row.unwrap()["id"], id.to_string());
        let row: Option<Value> = first_row(json!({ "id": id })).unwrap();
        assert!(row.is_some());
        assert!(first_row::<Value>(json!([])).unwrap().is_none());
        assert!(first_row::<Value>(Value::Null).unwrap().is_none());
    }
}
