//! Resolving one item for a detail view when the bulk cache may be cold
//!
//! Each call to [`ItemResolver::step`] is one re-evaluation by the view: check
//! the cache, run a bulk fetch, or issue the single direct lookup. A wall-clock
//! deadline is armed when the resolver is created. Fetches run on their own
//! task, so when the deadline passes or the view unmounts the call keeps going
//! and its result is dropped.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ClientOptions;
use crate::items::ItemStore;
use crate::models::{ItemId, WishlistItem};

/// Where a resolution is
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveState {
    CheckCache,
    BulkFetch { attempt: u32 },
    DirectFetch,
    Resolved(WishlistItem),
    NotFound(ItemId),
    TimedOut,
    /// The view went away before the item resolved
    Unmounted,
}

impl ResolveState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResolveState::Resolved(_)
                | ResolveState::NotFound(_)
                | ResolveState::TimedOut
                | ResolveState::Unmounted
        )
    }
}

/// Shared flag the view clears when it unmounts
#[derive(Debug, Clone)]
pub struct MountHandle(Arc<AtomicBool>);

impl MountHandle {
    fn new() -> Self {
        MountHandle(Arc::new(AtomicBool::new(true)))
    }

    pub fn unmount(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum Outcome<T> {
    Done(T),
    Panicked,
    Expired,
}

pub struct ItemResolver {
    store: Arc<ItemStore>,
    id: ItemId,
    max_bulk_attempts: u32,
    bulk_attempts: u32,
    deadline: Instant,
    mount: MountHandle,
    state: ResolveState,
}

impl ItemResolver {
    /// Mounts a resolver for `id`; the timeout starts now.
    pub fn new(store: Arc<ItemStore>, id: ItemId, options: &ClientOptions) -> Self {
        Self::with_limits(
            store,
            id,
            options.bulk_fetch_attempts,
            options.resolve_timeout,
        )
    }

    pub fn with_limits(
        store: Arc<ItemStore>,
        id: ItemId,
        max_bulk_attempts: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            id,
            max_bulk_attempts,
            bulk_attempts: 0,
            deadline: Instant::now() + timeout,
            mount: MountHandle::new(),
            state: ResolveState::CheckCache,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn state(&self) -> &ResolveState {
        &self.state
    }

    pub fn bulk_attempts(&self) -> u32 {
        self.bulk_attempts
    }

    pub fn mount_handle(&self) -> MountHandle {
        self.mount.clone()
    }

    /// Runs `fetch` on its own task and waits for it or the deadline.
    async fn race_deadline<F>(&self, fetch: F) -> Outcome<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let task = tokio::spawn(fetch);
        tokio::select! {
            joined = task => match joined {
                Ok(value) => Outcome::Done(value),
                Err(e) => {
                    tracing::error!("item fetch task failed: {}", e);
                    Outcome::Panicked
                }
            },
            _ = tokio::time::sleep_until(self.deadline) => Outcome::Expired,
        }
    }

    fn next_after_miss(&self) -> ResolveState {
        let bulk_allowed = self.bulk_attempts == 0
            || (self.store.is_empty() && self.bulk_attempts < self.max_bulk_attempts);
        if bulk_allowed {
            ResolveState::BulkFetch {
                attempt: self.bulk_attempts + 1,
            }
        } else {
            ResolveState::DirectFetch
        }
    }

    /// Advances one step and returns the new state. Terminal states stick.
    pub async fn step(&mut self) -> &ResolveState {
        if self.state.is_terminal() {
            return &self.state;
        }
        if !self.mount.is_mounted() {
            self.state = ResolveState::Unmounted;
            return &self.state;
        }
        if Instant::now() >= self.deadline {
            tracing::warn!(id = %self.id, "item resolution timed out");
            self.state = ResolveState::TimedOut;
            return &self.state;
        }

        let next = match self.state {
            ResolveState::CheckCache => match self.store.get_by_id(self.id) {
                Some(item) => ResolveState::Resolved(item),
                None => self.next_after_miss(),
            },
            ResolveState::BulkFetch { attempt } => {
                self.bulk_attempts = attempt;
                tracing::debug!(id = %self.id, attempt, "bulk fetch for item");
                let store = self.store.clone();
                match self.race_deadline(async move { store.fetch_all().await }).await {
                    Outcome::Expired => ResolveState::TimedOut,
                    Outcome::Done(_) | Outcome::Panicked => ResolveState::CheckCache,
                }
            }
            ResolveState::DirectFetch => {
                tracing::debug!(id = %self.id, "direct fetch for item");
                let store = self.store.clone();
                let id = self.id;
                match self.race_deadline(async move { store.fetch_by_id(id).await }).await {
                    Outcome::Expired => ResolveState::TimedOut,
                    Outcome::Done(Ok(Some(item))) => ResolveState::Resolved(item),
                    Outcome::Done(Ok(None)) | Outcome::Panicked => ResolveState::NotFound(self.id),
                    Outcome::Done(Err(err)) => {
                        tracing::warn!(id = %self.id, "direct item fetch failed: {}", err);
                        ResolveState::NotFound(self.id)
                    }
                }
            }
            _ => return &self.state,
        };

        // A result that lands after unmount is discarded.
        self.state = if self.mount.is_mounted() {
            next
        } else {
            ResolveState::Unmounted
        };
        &self.state
    }

    /// Steps until a terminal state.
    pub async fn run(&mut self) -> ResolveState {
        while !self.state.is_terminal() {
            self.step().await;
        }
        self.state.clone()
    }
}
