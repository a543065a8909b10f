#![allow(dead_code)]

use std::sync::Arc;

use bucketnest::config::ClientOptions;
use bucketnest::gateway::MemoryGateway;
use bucketnest::notify::{Notification, NotificationLevel, NotificationQueue};
use bucketnest::session::{Principal, StaticSession};
use bucketnest::BucketNest;
use uuid::Uuid;

/// One client (stores + session + toasts) over a shared in-memory backend
pub struct Client {
    pub gateway: Arc<MemoryGateway>,
    pub session: Arc<StaticSession>,
    pub toasts: Arc<NotificationQueue>,
    pub app: BucketNest,
}

impl Client {
    pub fn errors(&self) -> Vec<Notification> {
        self.toasts
            .drain()
            .into_iter()
            .filter(|n| n.level == NotificationLevel::Error)
            .collect()
    }
}

pub fn principal(name: &str) -> Principal {
    Principal::new(Uuid::new_v4(), format!("token-{}", name)).with_display_name(name)
}

pub fn client(gateway: &Arc<MemoryGateway>, principal: Option<Principal>) -> Client {
    client_with(gateway, principal, ClientOptions::default())
}

pub fn client_with(
    gateway: &Arc<MemoryGateway>,
    principal: Option<Principal>,
    options: ClientOptions,
) -> Client {
    let session = Arc::new(StaticSession::new(principal));
    let toasts = Arc::new(NotificationQueue::new());
    let app = BucketNest::with_parts(gateway.clone(), session.clone(), toasts.clone(), options);
    Client {
        gateway: gateway.clone(),
        session,
        toasts,
        app,
    }
}

/// A fresh backend with one signed-in client.
pub fn signed_in(name: &str) -> (Client, Principal) {
    let gateway = Arc::new(MemoryGateway::new());
    let me = principal(name);
    (client(&gateway, Some(me.clone())), me)
}
