//! Who the stores act for

use bucketnest_auth::Auth;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// The authenticated user a store call runs as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub access_token: String,
    /// Name the auth provider knows the user by, if any
    pub display_name: Option<String>,
}

impl Principal {
    pub fn new(id: Uuid, access_token: impl Into<String>) -> Self {
        Self {
            id,
            access_token: access_token.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Source of the current principal
pub trait SessionProvider: Send + Sync {
    fn principal(&self) -> Option<Principal>;
}

impl SessionProvider for Auth {
    fn principal(&self) -> Option<Principal> {
        let session = self.get_session()?;
        let id = match Uuid::parse_str(&session.user.id) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("session user id {} is not a uuid: {}", session.user.id, e);
                return None;
            }
        };
        Some(Principal {
            id,
            access_token: session.access_token,
            display_name: session.user.display_name(),
        })
    }
}

/// A session set by hand, for tests and offline use
#[derive(Debug, Default)]
pub struct StaticSession {
    current: RwLock<Option<Principal>>,
}

impl StaticSession {
    pub fn new(principal: Option<Principal>) -> Self {
        Self {
            current: RwLock::new(principal),
        }
    }

    pub fn signed_in(principal: Principal) -> Self {
        Self::new(Some(principal))
    }

    pub fn anonymous() -> Self {
        Self::new(None)
    }

    pub fn set(&self, principal: Option<Principal>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = principal;
    }
}

impl SessionProvider for StaticSession {
    fn principal(&self) -> Option<Principal> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_session_switches_principal() {
        let session = StaticSession::anonymous();
        assert!(session.principal().is_none());

        let alice = Principal::new(Uuid::new_v4(), "token-a").with_display_name("Alice");
        session.set(Some(alice.clone()));
        assert_eq!(session.principal(), Some(alice));
    }
}
