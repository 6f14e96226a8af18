mod common;

use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::{sleep, Instant};

use common::init_logging;
use zcash_monkey::store::{
    AddressPatch, Contribution, ContributionPatch, Emit, EntityStore, PagePatch, StateField,
};

fn patches() -> Vec<AddressPatch> {
    vec![
        AddressPatch {
            address: "t1a".to_string(),
            balance: Some(1.0),
            ..Default::default()
        },
        AddressPatch {
            address: "t1a".to_string(),
            account: Some("savings".to_string()),
            ..Default::default()
        },
        AddressPatch {
            address: "t1b".to_string(),
            in_wallet: Some(true),
            is_mine: Some(false),
            ..Default::default()
        },
        AddressPatch {
            address: "t1a".to_string(),
            balance: Some(0.0),
            is_mine: Some(true),
            ..Default::default()
        },
    ]
}

#[test]
fn test_merge_sequence_is_idempotent_per_patch() {
    init_logging();
    let store = EntityStore::new(Duration::from_millis(100));

    for patch in patches() {
        store.merge_entity(patch.clone(), Emit::Silent);
        let once = store.read();
        store.merge_entity(patch, Emit::Silent);
        assert_eq!(once.addresses, store.read().addresses);
    }
}

#[test]
fn test_merge_sequence_keeps_unspecified_fields() {
    let store = EntityStore::new(Duration::from_millis(100));
    for patch in patches() {
        store.merge_entity(patch, Emit::Silent);
    }

    let state = store.read();
    let a = &state.addresses["t1a"];
    assert_eq!(a.balance, 0.0);
    assert_eq!(a.account, "savings");
    assert!(a.is_mine);
    assert!(!a.in_wallet);

    let b = &state.addresses["t1b"];
    assert!(b.in_wallet);
    assert_eq!(b.account, "");
}

#[test]
fn test_page_follows_map_on_recompute() {
    let store = EntityStore::new(Duration::from_millis(100));
    for (address, balance) in [("t1a", 1.0), ("t1b", 3.0), ("t1c", 2.0)] {
        store.merge_entity(
            ContributionPatch {
                address: address.to_string(),
                balance: Some(balance),
                ..Default::default()
            },
            Emit::Silent,
        );
    }

    let items = store.paginate::<Contribution>(0, 2);
    store.replace_page(PagePatch::full(items, 0, 2), Emit::Immediate);
    let state = store.read();
    let shown: Vec<_> = state
        .contribution_page
        .items
        .iter()
        .map(|c| c.address.as_str())
        .collect();
    assert_eq!(shown, vec!["t1b", "t1c"]);
}

#[tokio::test(start_paused = true)]
async fn test_throttled_changes_reach_subscribers_leading_and_trailing() {
    init_logging();
    let store = EntityStore::new(Duration::from_millis(100));
    let mut changes = store.subscribe();
    let start = Instant::now();

    store.set_scalar(StateField::Status("t0".to_string()), Emit::Throttled);
    sleep(Duration::from_millis(50)).await;
    store.set_scalar(StateField::Status("t50".to_string()), Emit::Throttled);
    sleep(Duration::from_millis(40)).await;
    store.set_scalar(StateField::Status("t90".to_string()), Emit::Throttled);
    sleep(Duration::from_millis(19)).await;

    let leading = changes.try_recv().unwrap();
    assert_eq!(leading.state.status, "t0");
    assert_eq!(leading.prev.status, "");
    let trailing = changes.try_recv().unwrap();
    assert_eq!(trailing.state.status, "t90");
    assert_eq!(trailing.prev.status, "t50");
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));

    sleep(Duration::from_millis(1)).await;
    assert!(start.elapsed() >= Duration::from_millis(110));
    store.set_scalar(StateField::Status("t110".to_string()), Emit::Throttled);
    assert_eq!(changes.try_recv().unwrap().state.status, "t110");
}

#[tokio::test(start_paused = true)]
async fn test_silent_changes_leave_throttle_window_alone() {
    let store = EntityStore::new(Duration::from_millis(100));
    let mut changes = store.subscribe();

    store.set_scalar(StateField::Status("quiet".to_string()), Emit::Silent);
    store.set_scalar(StateField::Status("loud".to_string()), Emit::Throttled);

    // Leading edge, so the silent update did not open the window
    assert_eq!(changes.try_recv().unwrap().state.status, "loud");
    sleep(Duration::from_millis(150)).await;
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
}
