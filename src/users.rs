//! Profiles and the squad (friend-request) graph

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

use crate::config::ClientOptions;
use crate::error::{GatewayError, GatewayErrorKind, Result, StoreError};
use crate::gateway::{search_term, UserGateway};
use crate::legacy::LegacyProfileCache;
use crate::models::{
    accepted_members, NewProfileRow, ProfilePatch, RelationshipId, RelationshipStatus,
    SquadRelationship, UserProfile,
};
use crate::notify::{Notification, Notifier};
use crate::session::{Principal, SessionProvider};
use crate::slug::generate_username;
use crate::validation::validate_profile_patch;

pub struct UserStore {
    gateway: Arc<dyn UserGateway>,
    session: Arc<dyn SessionProvider>,
    notifier: Arc<dyn Notifier>,
    legacy: Option<LegacyProfileCache>,
    search_min_chars: usize,
    search_limit: usize,
    profile: RwLock<Option<UserProfile>>,
    relationships: RwLock<Vec<SquadRelationship>>,
}

impl UserStore {
    pub fn new(
        gateway: Arc<dyn UserGateway>,
        session: Arc<dyn SessionProvider>,
        notifier: Arc<dyn Notifier>,
        options: &ClientOptions,
    ) -> Self {
        Self {
            gateway,
            session,
            notifier,
            legacy: options
                .legacy_profile_path
                .as_ref()
                .map(|path| LegacyProfileCache::new(path.clone())),
            search_min_chars: options.search_min_chars,
            search_limit: options.search_limit,
            profile: RwLock::new(None),
            relationships: RwLock::new(Vec::new()),
        }
    }

    /// The hydrated profile of the signed-in principal.
    pub fn current(&self) -> Option<UserProfile> {
        self.profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cached edges the principal is on.
    pub fn relationships(&self) -> Vec<SquadRelationship> {
        self.relationships
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        *self.profile.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.relationships
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn set_profile(&self, profile: UserProfile) {
        *self.profile.write().unwrap_or_else(PoisonError::into_inner) = Some(profile);
    }

    fn require_session(&self) -> Result<Principal> {
        self.session.principal().ok_or_else(|| {
            self.notifier.notify(Notification::error(
                "Not signed in",
                "Please sign in to manage your squad",
            ));
            StoreError::NoSession
        })
    }

    fn gateway_failure(&self, title: &str, err: GatewayError) -> StoreError {
        tracing::error!("{}: {}", title, err);
        self.notifier.notify(Notification::error(title, &err.message));
        StoreError::Gateway(err)
    }

    /// Name for a profile created on first sign-in.
    async fn seed_display_name(&self, principal: &Principal) -> Option<String> {
        if let Some(name) = principal
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            return Some(name.to_string());
        }
        let legacy = self.legacy.as_ref()?.load().await?;
        legacy.display_name().map(str::to_string)
    }

    /// Looks the principal's profile up and creates it when missing. Safe to
    /// call on every sign-in.
    pub async fn ensure_profile(&self, principal: &Principal) -> Result<UserProfile> {
        let existing = self
            .gateway
            .get_profile(principal, principal.id)
            .await
            .map_err(|e| self.gateway_failure("Could not load your profile", e))?;
        if let Some(row) = existing {
            let profile = UserProfile::from(row);
            self.set_profile(profile.clone());
            return Ok(profile);
        }

        let display_name = self.seed_display_name(principal).await;
        let username = generate_username(display_name.as_deref());
        let row = NewProfileRow {
            id: principal.id,
            display_name: display_name.unwrap_or_else(|| username.clone()),
            username,
            avatar_url: None,
        };
        tracing::debug!(username = %row.username, "creating profile");

        let created = match self.gateway.insert_profile(principal, row).await {
            Ok(row) => row,
            Err(err) if err.is(GatewayErrorKind::UniqueViolation) => {
                // Another sign-in may have created it first.
                match self.gateway.get_profile(principal, principal.id).await {
                    Ok(Some(row)) => row,
                    _ => return Err(self.gateway_failure("Could not create your profile", err)),
                }
            }
            Err(err) => return Err(self.gateway_failure("Could not create your profile", err)),
        };
        let profile = UserProfile::from(created);
        self.set_profile(profile.clone());
        Ok(profile)
    }

    /// Changes the display name and/or bio. The username is fixed.
    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<UserProfile> {
        let principal = self.require_session()?;
        validate_profile_patch(&patch)?;
        if patch.is_empty() {
            return match self.current() {
                Some(profile) => Ok(profile),
                None => self.ensure_profile(&principal).await,
            };
        }

        let row = self
            .gateway
            .update_profile(&principal, patch.to_row())
            .await
            .map_err(|e| self.gateway_failure("Could not update your profile", e))?
            .ok_or(StoreError::NotFound)?;
        let profile = UserProfile::from(row);
        self.set_profile(profile.clone());
        self.notifier
            .notify(Notification::success("Profile updated", &profile.display_name));
        Ok(profile)
    }

    /// Case-insensitive match on username or display name. Queries shorter
    /// than the configured minimum return nothing without a call.
    pub async fn search_users(&self, query: &str) -> Vec<UserProfile> {
        let term = search_term(query);
        if term.is_empty() || term.chars().count() < self.search_min_chars {
            return Vec::new();
        }
        let Some(principal) = self.session.principal() else {
            return Vec::new();
        };
        match self
            .gateway
            .search_profiles(&principal, &term, self.search_limit)
            .await
        {
            Ok(rows) => rows
                .into_iter()
                .take(self.search_limit)
                .map(UserProfile::from)
                .collect(),
            Err(err) => {
                tracing::warn!("user search failed: {}", err);
                self.notifier
                    .notify(Notification::error("Search failed", &err.message));
                Vec::new()
            }
        }
    }

    /// Sends a squad request to `username`.
    pub async fn send_request(&self, username: &str) -> Result<SquadRelationship> {
        let principal = self.require_session()?;
        let target = self
            .gateway
            .profile_by_username(&principal, username.trim())
            .await
            .map_err(|e| self.gateway_failure("Could not send squad request", e))?;
        let Some(target) = target else {
            self.notifier.notify(Notification::error(
                "User not found",
                format!("Nobody is called {}", username.trim()),
            ));
            return Err(StoreError::NotFound);
        };
        if target.id == principal.id {
            self.notifier.notify(Notification::error(
                "Could not send squad request",
                StoreError::SelfRequest,
            ));
            return Err(StoreError::SelfRequest);
        }

        let row = match self.gateway.send_squad_request(&principal, target.id).await {
            Ok(row) => row,
            Err(err) if err.is(GatewayErrorKind::UniqueViolation) => {
                self.notifier.notify(Notification::info(
                    "Already requested",
                    StoreError::DuplicateRequest,
                ));
                return Err(StoreError::DuplicateRequest);
            }
            Err(err) => return Err(self.gateway_failure("Could not send squad request", err)),
        };
        let relationship = SquadRelationship::from(row);
        self.refresh_squad().await;
        self.notifier.notify(Notification::success(
            "Squad request sent",
            format!("Waiting for {} to respond", target.username),
        ));
        Ok(relationship)
    }

    /// Accepts or rejects a pending request addressed to the principal.
    pub async fn respond_to_request(
        &self,
        id: RelationshipId,
        accept: bool,
    ) -> Result<SquadRelationship> {
        let principal = self.require_session()?;
        let status = if accept {
            RelationshipStatus::Accepted
        } else {
            RelationshipStatus::Rejected
        };

        let row = match self
            .gateway
            .update_request_status(&principal, id, status)
            .await
        {
            Ok(row) => row,
            Err(err) if err.is(GatewayErrorKind::NotFound) => {
                self.notifier.notify(Notification::error(
                    "Could not respond",
                    "That squad request no longer exists",
                ));
                return Err(StoreError::NotFound);
            }
            Err(err) if err.is(GatewayErrorKind::PermissionDenied) => {
                self.notifier.notify(Notification::error(
                    "Could not respond",
                    "That squad request is not addressed to you",
                ));
                return Err(StoreError::Forbidden);
            }
            Err(err) => return Err(self.gateway_failure("Could not respond", err)),
        };
        let relationship = SquadRelationship::from(row);
        self.refresh_squad().await;
        let message = if accept {
            "You are now squad mates"
        } else {
            "Request declined"
        };
        self.notifier
            .notify(Notification::success("Squad updated", message));
        Ok(relationship)
    }

    /// Re-reads every edge the principal is on; keeps the cache on failure.
    pub async fn refresh_squad(&self) -> Vec<SquadRelationship> {
        let Some(principal) = self.session.principal() else {
            self.relationships
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            return Vec::new();
        };
        match self.gateway.squad_relationships(&principal).await {
            Ok(rows) => {
                let relationships: Vec<SquadRelationship> =
                    rows.into_iter().map(SquadRelationship::from).collect();
                tracing::debug!(count = relationships.len(), "squad refreshed");
                *self
                    .relationships
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = relationships.clone();
                relationships
            }
            Err(err) => {
                tracing::warn!("failed to fetch squad: {}", err);
                self.notifier
                    .notify(Notification::error("Could not load your squad", &err.message));
                self.relationships()
            }
        }
    }

    /// Pending requests addressed to the principal.
    pub async fn pending_requests(&self) -> Vec<SquadRelationship> {
        let Some(principal) = self.session.principal() else {
            return Vec::new();
        };
        match self.gateway.pending_requests(&principal).await {
            Ok(rows) => rows.into_iter().map(SquadRelationship::from).collect(),
            Err(err) => {
                tracing::warn!("failed to fetch pending squad requests: {}", err);
                self.notifier
                    .notify(Notification::error("Could not load squad requests", &err.message));
                Vec::new()
            }
        }
    }

    /// Everyone sharing an accepted edge with the principal, from the cache.
    pub fn accepted_members(&self) -> BTreeSet<Uuid> {
        match self.session.principal() {
            Some(principal) => accepted_members(principal.id, &self.relationships()),
            None => BTreeSet::new(),
        }
    }

    /// Profiles of the accepted squad members.
    pub async fn squad_profiles(&self) -> Vec<UserProfile> {
        let Some(principal) = self.session.principal() else {
            return Vec::new();
        };
        let members: Vec<Uuid> = self.accepted_members().into_iter().collect();
        if members.is_empty() {
            return Vec::new();
        }
        match self.gateway.profiles_by_ids(&principal, &members).await {
            Ok(rows) => rows.into_iter().map(UserProfile::from).collect(),
            Err(err) => {
                tracing::warn!("failed to fetch squad profiles: {}", err);
                self.notifier
                    .notify(Notification::error("Could not load your squad", &err.message));
                Vec::new()
            }
        }
    }
}
