//! BucketNest sync core
//!
//! Client-side data layer for the BucketNest wishlist tracker: caches of the
//! signed-in user's items and shared collections, single-item resolution for
//! detail views, and the profile and squad graph. Everything is persisted by
//! a Supabase project reached through the `bucketnest-*` gateway crates.

pub mod config;
pub mod error;
pub mod gateway;
pub mod items;
pub mod legacy;
mod loading;
pub mod models;
pub mod notify;
pub mod ordering;
pub mod resolve;
pub mod session;
pub mod sharing;
pub mod slug;
pub mod users;
pub mod validation;

use bucketnest_auth::{Auth, AuthOptions};
use reqwest::Client;
use std::sync::Arc;

use crate::config::{BucketNestConfig, ClientOptions, ConfigError};
use crate::error::{Result, StoreError};
use crate::gateway::{Gateway, SupabaseGateway};
use crate::items::ItemStore;
use crate::models::{ItemId, UserProfile};
use crate::notify::{Notifier, TracingNotifier};
use crate::resolve::ItemResolver;
use crate::session::SessionProvider;
use crate::sharing::SharingStore;
use crate::users::UserStore;

pub use crate::config::{PublicLookup, ReconcileStrategy};

/// Composition root: one set of stores per signed-in client
pub struct BucketNest {
    options: ClientOptions,
    auth: Option<Auth>,
    session: Arc<dyn SessionProvider>,
    notifier: Arc<dyn Notifier>,
    items: Arc<ItemStore>,
    sharing: Arc<SharingStore>,
    users: Arc<UserStore>,
}

impl BucketNest {
    /// Wires the stores to a hosted project.
    ///
    /// # Example
    ///
    /// ```
    /// use bucketnest::BucketNest;
    /// use bucketnest::config::{BucketNestConfig, ClientOptions};
    ///
    /// let config = BucketNestConfig::new(
    ///     "https://your-project-url.supabase.co",
    ///     "your-anon-key",
    ///     ClientOptions::default(),
    /// )?;
    /// let app = BucketNest::new(config)?;
    /// assert!(app.auth().is_some());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(config: BucketNestConfig) -> std::result::Result<Self, ConfigError> {
        Self::with_notifier(config, Arc::new(TracingNotifier))
    }

    /// Like [`BucketNest::new`], reading `SUPABASE_URL` and `SUPABASE_ANON_KEY`.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::new(BucketNestConfig::from_env()?)
    }

    pub fn with_notifier(
        config: BucketNestConfig,
        notifier: Arc<dyn Notifier>,
    ) -> std::result::Result<Self, ConfigError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let auth = Auth::new(
            &config.url,
            &config.anon_key,
            http_client.clone(),
            AuthOptions::default(),
        );
        let gateway = Arc::new(SupabaseGateway::new(
            &config.url,
            &config.anon_key,
            http_client,
            &config.options,
        ));

        let mut app = Self::with_parts(
            gateway,
            Arc::new(auth.clone()),
            notifier,
            config.options,
        );
        app.auth = Some(auth);
        Ok(app)
    }

    /// Builds the stores over any gateway and session source.
    pub fn with_parts<G: Gateway + 'static>(
        gateway: Arc<G>,
        session: Arc<dyn SessionProvider>,
        notifier: Arc<dyn Notifier>,
        options: ClientOptions,
    ) -> Self {
        let items = Arc::new(ItemStore::new(
            gateway.clone(),
            session.clone(),
            notifier.clone(),
            options.reconcile,
        ));
        let sharing = Arc::new(SharingStore::new(
            gateway.clone(),
            gateway.clone(),
            session.clone(),
            notifier.clone(),
            &options,
        ));
        let users = Arc::new(UserStore::new(
            gateway,
            session.clone(),
            notifier.clone(),
            &options,
        ));
        Self {
            options,
            auth: None,
            session,
            notifier,
            items,
            sharing,
            users,
        }
    }

    /// Auth client, when wired to a hosted project.
    pub fn auth(&self) -> Option<&Auth> {
        self.auth.as_ref()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        self.notifier.clone()
    }

    pub fn items(&self) -> Arc<ItemStore> {
        self.items.clone()
    }

    pub fn sharing(&self) -> Arc<SharingStore> {
        self.sharing.clone()
    }

    pub fn users(&self) -> Arc<UserStore> {
        self.users.clone()
    }

    /// Mounts a single-item resolver for a detail view.
    pub fn resolver(&self, id: ItemId) -> ItemResolver {
        ItemResolver::new(self.items.clone(), id, &self.options)
    }

    /// Makes sure the profile exists, then loads items, collections and squad.
    pub async fn on_sign_in(&self) -> Result<UserProfile> {
        let principal = self.session.principal().ok_or(StoreError::NoSession)?;
        let profile = self.users.ensure_profile(&principal).await?;
        tokio::join!(
            self.items.fetch_all(),
            self.sharing.fetch_all(),
            self.users.refresh_squad(),
        );
        tracing::info!(username = %profile.username, "signed in");
        Ok(profile)
    }

    /// Drops every cache; the session itself is owned by the auth client.
    pub fn on_sign_out(&self) {
        self.items.clear();
        self.sharing.clear();
        self.users.clear();
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::{BucketNestConfig, ClientOptions};
    pub use crate::error::{GatewayError, GatewayErrorKind, StoreError};
    pub use crate::gateway::{Gateway, MemoryGateway, SupabaseGateway};
    pub use crate::models::*;
    pub use crate::notify::{Notification, NotificationLevel, NotificationQueue, Notifier};
    pub use crate::resolve::{ItemResolver, ResolveState};
    pub use crate::session::{Principal, SessionProvider, StaticSession};
    pub use crate::BucketNest;
}
