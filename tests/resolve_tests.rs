mod common;

use bucketnest::models::{ItemType, NewItem};
use bucketnest::resolve::{ItemResolver, ResolveState};
use common::signed_in;
use std::time::Duration;
use tokio_test::assert_ok;
use uuid::Uuid;

#[tokio::test(start_paused = true)]
async fn cached_item_resolves_without_a_call() {
    let (me, _) = signed_in("ana");
    let id = assert_ok!(me.app.items().add(NewItem::new("Aurora", ItemType::Place)).await);
    me.gateway.reset_calls();

    let mut resolver = me.app.resolver(id);
    match resolver.run().await {
        ResolveState::Resolved(item) => assert_eq!(item.id, id),
        other => panic!("Expected resolved item, got {:?}", other),
    }
    assert_eq!(me.gateway.calls("list_items"), 0);
    assert_eq!(me.gateway.calls("get_item"), 0);
}

#[tokio::test(start_paused = true)]
async fn cold_cache_takes_one_bulk_fetch() {
    let (me, _) = signed_in("ben");
    let id = assert_ok!(me.app.items().add(NewItem::new("Bali", ItemType::Place)).await);
    me.app.items().clear();
    me.gateway.reset_calls();

    let mut resolver = me.app.resolver(id);
    assert_eq!(*resolver.step().await, ResolveState::BulkFetch { attempt: 1 });
    assert_eq!(*resolver.step().await, ResolveState::CheckCache);
    assert!(matches!(resolver.step().await, ResolveState::Resolved(_)));

    assert_eq!(me.gateway.calls("list_items"), 1);
    assert_eq!(me.gateway.calls("get_item"), 0);
    assert_eq!(resolver.bulk_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_from_a_populated_list_goes_direct() {
    let (me, _) = signed_in("cam");
    let items = me.app.items();
    assert_ok!(items.add(NewItem::new("Listed", ItemType::Other)).await);
    let id = assert_ok!(items.add(NewItem::new("Lagging replica", ItemType::Other)).await);
    me.gateway.hide_from_listing(id);
    items.clear();
    me.gateway.reset_calls();

    let mut resolver = me.app.resolver(id);
    match resolver.run().await {
        ResolveState::Resolved(item) => assert_eq!(item.title, "Lagging replica"),
        other => panic!("Expected resolved item, got {:?}", other),
    }
    assert_eq!(me.gateway.calls("list_items"), 1);
    assert_eq!(me.gateway.calls("get_item"), 1);
    // The direct hit is not written back into the cache.
    assert!(items.get_by_id(id).is_none());
}

#[tokio::test(start_paused = true)]
async fn empty_account_retries_bulk_then_gives_up() {
    let (me, _) = signed_in("dee");
    let id = Uuid::new_v4();

    let mut resolver = me.app.resolver(id);
    assert_eq!(resolver.run().await, ResolveState::NotFound(id));
    assert_eq!(me.gateway.calls("list_items"), 3);
    assert_eq!(me.gateway.calls("get_item"), 1);
    assert_eq!(resolver.bulk_attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn bulk_attempts_are_configurable() {
    let (me, _) = signed_in("eda");
    let id = Uuid::new_v4();

    let mut resolver =
        ItemResolver::with_limits(me.app.items(), id, 1, Duration::from_secs(10));
    assert_eq!(resolver.run().await, ResolveState::NotFound(id));
    assert_eq!(me.gateway.calls("list_items"), 1);
    assert_eq!(me.gateway.calls("get_item"), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_in_bulk() {
    let (me, _) = signed_in("fay");
    let id = assert_ok!(me.app.items().add(NewItem::new("Flaky wifi", ItemType::Other)).await);
    me.app.items().clear();
    me.gateway.reset_calls();
    me.toasts.drain();
    me.gateway.fail_next(2);

    let mut resolver = me.app.resolver(id);
    assert!(matches!(resolver.run().await, ResolveState::Resolved(_)));
    assert_eq!(me.gateway.calls("list_items"), 3);
    assert_eq!(me.gateway.calls("get_item"), 0);
    assert_eq!(me.errors().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_backend_times_out() {
    let (me, _) = signed_in("gus");
    let id = assert_ok!(me.app.items().add(NewItem::new("Slow boat", ItemType::Other)).await);
    me.app.items().clear();
    me.gateway.set_latency(Duration::from_secs(4));

    let mut resolver =
        ItemResolver::with_limits(me.app.items(), id, 3, Duration::from_secs(2));
    assert_eq!(resolver.run().await, ResolveState::TimedOut);

    // Stepping again keeps the terminal state.
    assert_eq!(*resolver.step().await, ResolveState::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn unmounting_discards_the_result() {
    let (me, _) = signed_in("hap");
    let id = assert_ok!(me.app.items().add(NewItem::new("Hot springs", ItemType::Place)).await);
    me.app.items().clear();
    me.gateway.set_latency(Duration::from_secs(1));

    let mut resolver = me.app.resolver(id);
    let mount = resolver.mount_handle();
    let task = tokio::spawn(async move { resolver.run().await });

    tokio::time::sleep(Duration::from_millis(500)).await;
    mount.unmount();
    assert!(!mount.is_mounted());

    assert_eq!(task.await.unwrap(), ResolveState::Unmounted);
}

#[tokio::test(start_paused = true)]
async fn unmounted_before_start() {
    let (me, _) = signed_in("ira");
    let mut resolver = me.app.resolver(Uuid::new_v4());
    resolver.mount_handle().unmount();

    assert_eq!(resolver.run().await, ResolveState::Unmounted);
    assert_eq!(me.gateway.calls("list_items"), 0);
}

#[tokio::test(start_paused = true)]
async fn direct_failure_reads_as_not_found() {
    let (me, _) = signed_in("jo");
    let items = me.app.items();
    assert_ok!(items.add(NewItem::new("Visible", ItemType::Other)).await);
    let id = assert_ok!(items.add(NewItem::new("Hidden", ItemType::Other)).await);
    me.gateway.hide_from_listing(id);
    items.clear();

    let mut resolver = me.app.resolver(id);
    assert_eq!(*resolver.step().await, ResolveState::BulkFetch { attempt: 1 });
    assert_eq!(*resolver.step().await, ResolveState::CheckCache);
    assert_eq!(*resolver.step().await, ResolveState::DirectFetch);

    me.gateway.set_failing(true);
    assert_eq!(*resolver.step().await, ResolveState::NotFound(id));
}
