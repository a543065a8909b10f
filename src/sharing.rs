//! Shareable collections: named, ordered subsets of a user's items

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{ClientOptions, PublicLookup, ReconcileStrategy};
use crate::error::{GatewayError, Result, StoreError};
use crate::gateway::{CollectionGateway, ProfileGateway};
use crate::loading::Loading;
use crate::models::{
    CollectionId, CollectionPatch, NewCollection, NewCollectionRow, SharedCollection,
    SharedCollectionView, UserProfile, WishlistItem,
};
use crate::notify::{Notification, Notifier};
use crate::ordering::{lookup_ids, order_collection_items};
use crate::session::{Principal, SessionProvider};
use crate::slug::generate_slug;
use crate::validation::{validate_collection_patch, validate_new_collection};

pub struct SharingStore {
    gateway: Arc<dyn CollectionGateway>,
    profiles: Arc<dyn ProfileGateway>,
    session: Arc<dyn SessionProvider>,
    notifier: Arc<dyn Notifier>,
    reconcile: ReconcileStrategy,
    public_lookup: PublicLookup,
    slug_length: usize,
    collections: RwLock<Vec<SharedCollection>>,
    in_flight: AtomicUsize,
}

impl SharingStore {
    pub fn new(
        gateway: Arc<dyn CollectionGateway>,
        profiles: Arc<dyn ProfileGateway>,
        session: Arc<dyn SessionProvider>,
        notifier: Arc<dyn Notifier>,
        options: &ClientOptions,
    ) -> Self {
        Self {
            gateway,
            profiles,
            session,
            notifier,
            reconcile: options.reconcile,
            public_lookup: options.public_lookup,
            slug_length: options.slug_length,
            collections: RwLock::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn collections(&self) -> Vec<SharedCollection> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    fn replace(&self, collections: Vec<SharedCollection>) {
        *self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner) = collections;
    }

    fn merge(&self, collection: SharedCollection) {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match collections.iter_mut().find(|c| c.id == collection.id) {
            Some(slot) => *slot = collection,
            None => collections.insert(0, collection),
        }
    }

    fn require_session(&self) -> Result<Principal> {
        self.session.principal().ok_or_else(|| {
            self.notifier.notify(Notification::error(
                "Not signed in",
                "Please sign in to share collections",
            ));
            StoreError::NoSession
        })
    }

    fn gateway_failure(&self, title: &str, err: GatewayError) -> StoreError {
        tracing::error!("{}: {}", title, err);
        self.notifier.notify(Notification::error(title, &err.message));
        StoreError::Gateway(err)
    }

    pub async fn fetch_all(&self) -> Vec<SharedCollection> {
        let Some(principal) = self.session.principal() else {
            self.clear();
            return Vec::new();
        };

        let _loading = Loading::start(&self.in_flight);
        match self.gateway.list_collections(&principal).await {
            Ok(rows) => {
                let collections: Vec<SharedCollection> =
                    rows.into_iter().map(SharedCollection::from).collect();
                tracing::debug!(count = collections.len(), "collection cache refreshed");
                self.replace(collections.clone());
                collections
            }
            Err(err) => {
                tracing::warn!("failed to fetch collections: {}", err);
                self.notifier.notify(Notification::error(
                    "Could not load your collections",
                    &err.message,
                ));
                self.collections()
            }
        }
    }

    /// Display name to stamp on a new collection.
    async fn creator_name(&self, principal: &Principal) -> Option<String> {
        match self.profiles.get_profile(principal, principal.id).await {
            Ok(Some(row)) => Some(UserProfile::from(row).display_name),
            Ok(None) => principal.display_name.clone(),
            Err(err) => {
                tracing::warn!("could not read creator profile: {}", err);
                principal.display_name.clone()
            }
        }
    }

    /// Creates a collection under a fresh random slug.
    pub async fn create(&self, collection: NewCollection) -> Result<SharedCollection> {
        let principal = self.require_session()?;
        validate_new_collection(&collection)?;

        let creator_name = self.creator_name(&principal).await;
        let slug = generate_slug(self.slug_length);
        let row = NewCollectionRow::new(principal.id, creator_name, slug, collection);
        let created = self
            .gateway
            .insert_collection(&principal, row)
            .await
            .map_err(|e| self.gateway_failure("Could not create collection", e))?;
        let created = SharedCollection::from(created);

        match self.reconcile {
            ReconcileStrategy::Refetch => {
                self.fetch_all().await;
            }
            ReconcileStrategy::MergeReturned => self.merge(created.clone()),
        }
        self.notifier
            .notify(Notification::success("Collection created", &created.title));
        Ok(created)
    }

    pub async fn update(&self, id: CollectionId, patch: CollectionPatch) -> Result<SharedCollection> {
        let principal = self.require_session()?;
        validate_collection_patch(&patch)?;
        if patch.is_empty() {
            return self.get_by_id(id).await;
        }

        let row = self
            .gateway
            .update_collection(&principal, id, patch.to_row())
            .await
            .map_err(|e| self.gateway_failure("Could not update collection", e))?;
        let Some(row) = row else {
            self.notifier.notify(Notification::error(
                "Could not update collection",
                "The collection does not exist or is not yours",
            ));
            return Err(StoreError::NotFound);
        };
        let updated = SharedCollection::from(row);

        match self.reconcile {
            ReconcileStrategy::Refetch => {
                self.fetch_all().await;
            }
            ReconcileStrategy::MergeReturned => self.merge(updated.clone()),
        }
        self.notifier
            .notify(Notification::success("Collection updated", &updated.title));
        Ok(updated)
    }

    pub async fn delete(&self, id: CollectionId) -> Result<()> {
        let principal = self.require_session()?;
        let deleted = self
            .gateway
            .delete_collection(&principal, id)
            .await
            .map_err(|e| self.gateway_failure("Could not delete collection", e))?;
        if !deleted {
            self.notifier.notify(Notification::error(
                "Could not delete collection",
                "The collection does not exist or is not yours",
            ));
            return Err(StoreError::NotFound);
        }

        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|c| c.id != id);
        self.notifier
            .notify(Notification::success("Collection deleted", "The share link no longer works"));
        Ok(())
    }

    /// Public lookup, no session needed.
    ///
    /// Absent, private and failed lookups all come back as `None` so a private
    /// collection's existence is never confirmed.
    pub async fn get_by_slug(&self, slug: &str) -> Option<SharedCollectionView> {
        let result = match self.public_lookup {
            PublicLookup::Table => self.view_from_tables(slug).await,
            PublicLookup::EdgeFunction => self.view_from_function(slug).await,
        };
        match result {
            Ok(view) => view,
            Err(err) => {
                tracing::warn!(slug, "public collection lookup failed: {}", err);
                self.notifier.notify(Notification::error(
                    "Could not load collection",
                    "This collection is unavailable right now",
                ));
                None
            }
        }
    }

    async fn view_from_tables(
        &self,
        slug: &str,
    ) -> std::result::Result<Option<SharedCollectionView>, GatewayError> {
        let Some(row) = self.gateway.public_collection_by_slug(slug).await? else {
            return Ok(None);
        };
        let collection = SharedCollection::from(row);
        let ids = lookup_ids(&collection.item_ids, &collection.item_order);
        let resolved: Vec<WishlistItem> = self
            .gateway
            .public_collection_items(&ids)
            .await?
            .into_iter()
            .map(WishlistItem::from)
            .collect();
        let items = order_collection_items(&collection.item_ids, &collection.item_order, resolved);
        Ok(Some(SharedCollectionView { collection, items }))
    }

    async fn view_from_function(
        &self,
        slug: &str,
    ) -> std::result::Result<Option<SharedCollectionView>, GatewayError> {
        let Some(rows) = self.gateway.public_collection_view(slug).await? else {
            return Ok(None);
        };
        let SharedCollectionView { collection, items } = rows.into();
        if !collection.is_public {
            return Ok(None);
        }
        let items = order_collection_items(&collection.item_ids, &collection.item_order, items);
        Ok(Some(SharedCollectionView { collection, items }))
    }

    /// Access-controlled lookup: public collections for anyone, private ones
    /// only for their creator.
    pub async fn get_by_id(&self, id: CollectionId) -> Result<SharedCollection> {
        let principal = self.session.principal();
        let row = self
            .gateway
            .get_collection(principal.as_ref(), id)
            .await
            .map_err(|e| self.gateway_failure("Could not load collection", e))?;
        let Some(row) = row else {
            return Err(StoreError::NotFound);
        };
        let collection = SharedCollection::from(row);
        let is_creator = principal.is_some_and(|p| p.id == collection.creator_id);
        if collection.is_public || is_creator {
            Ok(collection)
        } else {
            Err(StoreError::Forbidden)
        }
    }
}
