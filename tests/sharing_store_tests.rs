mod common;

use bucketnest::config::{ClientOptions, PublicLookup};
use bucketnest::error::StoreError;
use bucketnest::gateway::MemoryGateway;
use bucketnest::models::{CollectionPatch, ItemType, NewCollection, NewItem, ProfilePatch};
use common::{client, client_with, principal, signed_in, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

async fn add_items(owner: &Client, titles: &[&str]) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for title in titles {
        let id = owner
            .app
            .items()
            .add(NewItem::new(*title, ItemType::Place))
            .await
            .unwrap();
        ids.push(id);
    }
    ids
}

fn titles(view: &bucketnest::models::SharedCollectionView) -> Vec<String> {
    view.items.iter().map(|i| i.title.clone()).collect()
}

#[tokio::test]
async fn create_assigns_a_slug_and_captures_the_creator_name() {
    let gateway = Arc::new(MemoryGateway::new());
    let me = principal("Rosa");
    let owner = client(&gateway, Some(me.clone()));

    let collection = assert_ok!(
        owner
            .app
            .sharing()
            .create(NewCollection::new("Italy 2026", Vec::new()).public(true))
            .await
    );
    assert_eq!(collection.slug.len(), 10);
    assert!(collection
        .slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    assert_eq!(collection.creator_id, me.id);
    assert_eq!(collection.creator_name.as_deref(), Some("Rosa"));
    assert_eq!(owner.app.sharing().collections().len(), 1);

    // Later renames do not touch existing collections.
    assert_ok!(owner.app.users().ensure_profile(&me).await);
    let patch = ProfilePatch {
        display_name: Some("Rosa M.".to_string()),
        ..ProfilePatch::default()
    };
    assert_ok!(owner.app.users().update_profile(patch).await);
    let second = assert_ok!(
        owner
            .app
            .sharing()
            .create(NewCollection::new("Japan", Vec::new()))
            .await
    );
    assert_eq!(second.creator_name.as_deref(), Some("Rosa M."));
    assert_ne!(second.slug, collection.slug);

    let refreshed = owner.app.sharing().fetch_all().await;
    let first = refreshed.iter().find(|c| c.id == collection.id).unwrap();
    assert_eq!(first.creator_name.as_deref(), Some("Rosa"));
}

#[tokio::test]
async fn slug_view_puts_ordered_items_first() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = client(&gateway, Some(principal("sam")));
    let visitor = client(&gateway, None);
    let ids = add_items(&owner, &["x", "y", "z"]).await;
    let (x, y, z) = (ids[0], ids[1], ids[2]);

    let collection = assert_ok!(
        owner
            .app
            .sharing()
            .create(
                NewCollection::new("Road trip", vec![x, y, z])
                    .with_order(vec![z, x])
                    .public(true)
            )
            .await
    );

    let view = visitor
        .app
        .sharing()
        .get_by_slug(&collection.slug)
        .await
        .expect("public collection resolves");
    assert_eq!(titles(&view), vec!["z", "x", "y"]);
    assert_eq!(view.collection.id, collection.id);
}

#[tokio::test]
async fn empty_collection_has_no_items() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = client(&gateway, Some(principal("tess")));
    let collection = assert_ok!(
        owner
            .app
            .sharing()
            .create(NewCollection::new("Someday", Vec::new()).public(true))
            .await
    );

    let view = client(&gateway, None)
        .app
        .sharing()
        .get_by_slug(&collection.slug)
        .await
        .unwrap();
    assert!(view.items.is_empty());
}

#[tokio::test]
async fn private_collections_look_absent_by_slug() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = client(&gateway, Some(principal("uma")));
    let ids = add_items(&owner, &["secret spot"]).await;
    let collection = assert_ok!(
        owner
            .app
            .sharing()
            .create(NewCollection::new("Private", ids))
            .await
    );
    owner.toasts.drain();

    let stranger = client(&gateway, Some(principal("vic")));
    let anonymous = client(&gateway, None);
    for viewer in [&owner, &stranger, &anonymous] {
        assert!(viewer
            .app
            .sharing()
            .get_by_slug(&collection.slug)
            .await
            .is_none());
        assert!(viewer.toasts.is_empty());
    }
    assert!(anonymous.app.sharing().get_by_slug("nosuchslug").await.is_none());
}

#[tokio::test]
async fn get_by_id_separates_forbidden_from_not_found() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = client(&gateway, Some(principal("wren")));
    let stranger = client(&gateway, Some(principal("xavi")));
    let anonymous = client(&gateway, None);

    let private = assert_ok!(
        owner
            .app
            .sharing()
            .create(NewCollection::new("Mine only", Vec::new()))
            .await
    );
    let public = assert_ok!(
        owner
            .app
            .sharing()
            .create(NewCollection::new("Everyone", Vec::new()).public(true))
            .await
    );

    assert_ok!(owner.app.sharing().get_by_id(private.id).await);
    assert_eq!(
        assert_err!(stranger.app.sharing().get_by_id(private.id).await),
        StoreError::Forbidden
    );
    assert_eq!(
        assert_err!(anonymous.app.sharing().get_by_id(private.id).await),
        StoreError::Forbidden
    );
    assert_ok!(stranger.app.sharing().get_by_id(public.id).await);
    assert_ok!(anonymous.app.sharing().get_by_id(public.id).await);
    assert_eq!(
        assert_err!(owner.app.sharing().get_by_id(Uuid::new_v4()).await),
        StoreError::NotFound
    );
}

#[tokio::test]
async fn only_the_creator_updates_and_the_slug_stays() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = client(&gateway, Some(principal("yara")));
    let stranger = client(&gateway, Some(principal("zed")));
    let ids = add_items(&owner, &["a", "b"]).await;
    let collection = assert_ok!(
        owner
            .app
            .sharing()
            .create(NewCollection::new("Draft", ids.clone()))
            .await
    );

    let patch = CollectionPatch {
        title: Some("Final".to_string()),
        item_order: Some(vec![ids[1], ids[0]]),
        is_public: Some(true),
        ..CollectionPatch::default()
    };
    let err = assert_err!(stranger.app.sharing().update(collection.id, patch.clone()).await);
    assert!(err.is_not_found());

    let updated = assert_ok!(owner.app.sharing().update(collection.id, patch).await);
    assert_eq!(updated.title, "Final");
    assert_eq!(updated.slug, collection.slug);
    assert_eq!(updated.item_ids, ids);

    let view = client(&gateway, None)
        .app
        .sharing()
        .get_by_slug(&collection.slug)
        .await
        .unwrap();
    assert_eq!(titles(&view), vec!["b", "a"]);
}

#[tokio::test]
async fn invalid_collection_is_rejected_locally() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = client(&gateway, Some(principal("abe")));

    let err = assert_err!(
        owner
            .app
            .sharing()
            .create(NewCollection::new("   ", Vec::new()))
            .await
    );
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(gateway.calls("insert_collection"), 0);
}

#[tokio::test]
async fn delete_removes_the_share() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = client(&gateway, Some(principal("bea")));
    let collection = assert_ok!(
        owner
            .app
            .sharing()
            .create(NewCollection::new("Gone soon", Vec::new()).public(true))
            .await
    );

    assert_ok!(owner.app.sharing().delete(collection.id).await);
    assert!(owner.app.sharing().collections().is_empty());
    assert!(owner
        .app
        .sharing()
        .get_by_slug(&collection.slug)
        .await
        .is_none());

    let err = assert_err!(owner.app.sharing().delete(collection.id).await);
    assert!(err.is_not_found());
}

#[tokio::test]
async fn unresolvable_and_drifted_ids() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = client(&gateway, Some(principal("cy")));
    let other = client(&gateway, Some(principal("di")));
    let ids = add_items(&owner, &["kept", "deleted", "only in order"]).await;
    let foreign = add_items(&other, &["not yours"]).await[0];

    let collection = assert_ok!(
        owner
            .app
            .sharing()
            .create(
                NewCollection::new("Messy", vec![ids[0], ids[1], foreign])
                    .with_order(vec![ids[2], ids[1], ids[0]])
                    .public(true)
            )
            .await
    );
    assert_ok!(owner.app.items().delete(ids[1]).await);

    let view = client(&gateway, None)
        .app
        .sharing()
        .get_by_slug(&collection.slug)
        .await
        .unwrap();
    assert_eq!(titles(&view), vec!["only in order", "kept"]);
}

#[tokio::test]
async fn failed_slug_lookup_reads_as_absent() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = client(&gateway, Some(principal("eve")));
    let collection = assert_ok!(
        owner
            .app
            .sharing()
            .create(NewCollection::new("Flaky", Vec::new()).public(true))
            .await
    );

    let visitor = client(&gateway, None);
    gateway.set_failing(true);
    assert!(visitor
        .app
        .sharing()
        .get_by_slug(&collection.slug)
        .await
        .is_none());
    assert_eq!(visitor.errors().len(), 1);
}

#[tokio::test]
async fn edge_function_lookup_matches_table_lookup() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = client(&gateway, Some(principal("flo")));
    let ids = add_items(&owner, &["one", "two", "three"]).await;
    let public = assert_ok!(
        owner
            .app
            .sharing()
            .create(
                NewCollection::new("Via function", ids.clone())
                    .with_order(vec![ids[2]])
                    .public(true)
            )
            .await
    );
    let private = assert_ok!(
        owner
            .app
            .sharing()
            .create(NewCollection::new("Hidden", ids))
            .await
    );

    let visitor = client_with(
        &gateway,
        None,
        ClientOptions::default().with_public_lookup(PublicLookup::EdgeFunction),
    );
    let view = visitor
        .app
        .sharing()
        .get_by_slug(&public.slug)
        .await
        .unwrap();
    assert_eq!(titles(&view), vec!["three", "one", "two"]);
    assert_eq!(gateway.calls("public_collection_view"), 1);
    assert_eq!(gateway.calls("public_collection_by_slug"), 0);

    assert!(visitor
        .app
        .sharing()
        .get_by_slug(&private.slug)
        .await
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn abandoned_fetch_does_not_leave_the_store_loading() {
    let (me, _) = signed_in("quinn");
    let sharing = me.app.sharing();
    me.gateway.set_latency(Duration::from_millis(200));

    let abandoned = tokio::time::timeout(Duration::from_millis(20), sharing.fetch_all()).await;
    assert!(abandoned.is_err());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!sharing.is_loading());

    me.gateway.set_latency(Duration::ZERO);
    assert!(sharing.fetch_all().await.is_empty());
    assert!(!sharing.is_loading());
}
