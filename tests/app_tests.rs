mod common;

use bucketnest::error::StoreError;
use bucketnest::models::{ItemType, NewCollection, NewItem};
use common::{client, principal, signed_in};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn sign_in_loads_every_cache() {
    let (me, principal) = signed_in("quinn");
    assert_ok!(me.app.items().add(NewItem::new("Lofoten", ItemType::Place)).await);
    assert_ok!(
        me.app
            .sharing()
            .create(NewCollection::new("Norway", Vec::new()))
            .await
    );
    me.app.on_sign_out();
    assert!(me.app.items().items().is_empty());
    assert!(me.app.sharing().collections().is_empty());
    assert!(me.app.users().current().is_none());

    let profile = assert_ok!(me.app.on_sign_in().await);
    assert_eq!(profile.id, principal.id);
    assert_eq!(me.app.items().items().len(), 1);
    assert_eq!(me.app.sharing().collections().len(), 1);
    assert_eq!(me.app.users().current(), Some(profile));
    assert_eq!(me.gateway.calls("squad_relationships"), 1);
}

#[tokio::test]
async fn sign_in_without_a_session_fails() {
    let gateway = Arc::new(bucketnest::gateway::MemoryGateway::new());
    let anonymous = client(&gateway, None);

    assert_eq!(
        assert_err!(anonymous.app.on_sign_in().await),
        StoreError::NoSession
    );
    assert_eq!(gateway.calls("get_profile"), 0);
}

#[tokio::test]
async fn switching_principals_never_leaks_the_previous_cache() {
    let gateway = Arc::new(bucketnest::gateway::MemoryGateway::new());
    let first = principal("rae");
    let second = principal("sol");
    let shared = client(&gateway, Some(first.clone()));

    assert_ok!(shared.app.on_sign_in().await);
    assert_ok!(shared.app.items().add(NewItem::new("Rae's trip", ItemType::Place)).await);

    shared.app.on_sign_out();
    shared.session.set(Some(second.clone()));
    let profile = assert_ok!(shared.app.on_sign_in().await);

    assert_eq!(profile.id, second.id);
    assert!(shared.app.items().items().is_empty());
}
