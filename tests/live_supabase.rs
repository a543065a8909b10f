//! Round trip against a real project. Needs `SUPABASE_URL`, `SUPABASE_ANON_KEY`
//! and the BucketNest schema; run with `cargo test -- --ignored`.

use bucketnest::models::{ItemType, NewCollection, NewItem};
use bucketnest::BucketNest;
use dotenv::dotenv;
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn sign_up_add_share_and_view() {
    dotenv().ok();
    let app = BucketNest::from_env().expect("SUPABASE_URL and SUPABASE_ANON_KEY must be set");
    let auth = app.auth().expect("hosted client has auth");

    let email = format!("test-{}@example.com", Uuid::new_v4());
    auth.sign_up(&email, "test_password123", Some("Live Tester"))
        .await
        .expect("sign up");

    let profile = app.on_sign_in().await.expect("profile on sign in");
    assert_eq!(profile.display_name, "Live Tester");

    let id = app
        .items()
        .add(NewItem::new("Integration test item", ItemType::Other))
        .await
        .expect("add item");
    let collection = app
        .sharing()
        .create(NewCollection::new("Integration test share", vec![id]).public(true))
        .await
        .expect("create collection");

    let view = app
        .sharing()
        .get_by_slug(&collection.slug)
        .await
        .expect("public collection resolves");
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].id, id);

    app.sharing().delete(collection.id).await.expect("delete collection");
    app.items().delete(id).await.expect("delete item");
    auth.sign_out().await.ok();
    app.on_sign_out();
    assert!(app.items().items().is_empty());
}
