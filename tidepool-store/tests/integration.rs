use tidepool_sdk::store::TradeStore;
use tidepool_sdk::{Coin, TradeRecord, TradeStatus};
use tidepool_store::{StoreError, TidepoolStore};

fn record(id: u8, status: TradeStatus) -> TradeRecord {
    TradeRecord {
        trade_id: [id; 32],
        created_at: 1_700_000_000 + id as u64,
        accepted_at: (id % 2 == 0).then(|| 1_700_000_100 + id as u64),
        confirmed_at_height: 0,
        is_my_offer: id % 2 == 1,
        offer: vec![0x01, id, 0xff],
        coins_of_interest: vec![
            Coin::new([id; 32], [0x10; 32], 100),
            Coin::new([id.wrapping_add(1); 32], [0x11; 32], 7),
        ],
        status,
        sent_to: vec![format!("peer-{id}")],
    }
}

#[test]
fn open_runs_migrations_and_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trades.sqlite");
    let path = path.to_str().unwrap();

    {
        let mut store = TidepoolStore::open(path).unwrap();
        store
            .add_trade_record(&record(1, TradeStatus::PendingAccept))
            .unwrap();
    }

    let mut store = TidepoolStore::open(path).unwrap();
    let trades = store.get_all_trades().unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].trade_id, [1; 32]);
}

#[test]
fn round_trip_preserves_every_field() {
    let mut store = TidepoolStore::open_in_memory().unwrap();
    let original = record(3, TradeStatus::PendingConfirm);
    store.add_trade_record(&original).unwrap();

    let loaded = store.get_trade_record(&original.trade_id).unwrap().unwrap();
    assert_eq!(loaded, original);
}

#[test]
fn missing_trade_is_none() {
    let mut store = TidepoolStore::open_in_memory().unwrap();
    assert!(store.get_trade_record(&[9; 32]).unwrap().is_none());
}

#[test]
fn add_is_an_upsert_keyed_by_trade_id() {
    let mut store = TidepoolStore::open_in_memory().unwrap();
    let mut r = record(1, TradeStatus::PendingAccept);
    store.add_trade_record(&r).unwrap();
    store.add_trade_record(&r).unwrap();
    assert_eq!(store.get_all_trades().unwrap().len(), 1);

    r.sent_to = vec!["another-peer".to_string()];
    store.add_trade_record(&r).unwrap();
    let loaded = store.get_trade_record(&r.trade_id).unwrap().unwrap();
    assert_eq!(loaded.sent_to, vec!["another-peer".to_string()]);
}

#[test]
fn status_scan_returns_only_matching_trades() {
    let mut store = TidepoolStore::open_in_memory().unwrap();
    store
        .add_trade_record(&record(1, TradeStatus::PendingAccept))
        .unwrap();
    store
        .add_trade_record(&record(2, TradeStatus::PendingAccept))
        .unwrap();
    store
        .add_trade_record(&record(3, TradeStatus::Confirmed))
        .unwrap();

    let pending = store
        .get_trades_with_status(TradeStatus::PendingAccept)
        .unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|t| t.status == TradeStatus::PendingAccept));

    let cancelled = store
        .get_trades_with_status(TradeStatus::Cancelled)
        .unwrap();
    assert!(cancelled.is_empty());
}

#[test]
fn set_status_updates_status_and_height() {
    let mut store = TidepoolStore::open_in_memory().unwrap();
    let r = record(4, TradeStatus::PendingConfirm);
    store.add_trade_record(&r).unwrap();

    store
        .set_status(&r.trade_id, TradeStatus::Confirmed, Some(1234))
        .unwrap();
    let loaded = store.get_trade_record(&r.trade_id).unwrap().unwrap();
    assert_eq!(loaded.status, TradeStatus::Confirmed);
    assert_eq!(loaded.confirmed_at_height, 1234);

    // Without a height the previous confirmation height is kept.
    store
        .set_status(&r.trade_id, TradeStatus::Confirmed, None)
        .unwrap();
    let loaded = store.get_trade_record(&r.trade_id).unwrap().unwrap();
    assert_eq!(loaded.confirmed_at_height, 1234);
}

#[test]
fn set_status_on_unknown_trade_errors() {
    let mut store = TidepoolStore::open_in_memory().unwrap();
    let err = store
        .set_status(&[7; 32], TradeStatus::Cancelled, None)
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
}

#[test]
fn usable_through_the_trade_store_trait() {
    let mut store: Box<dyn TradeStore> = Box::new(TidepoolStore::open_in_memory().unwrap());
    let r = record(5, TradeStatus::PendingAccept);
    store.add_trade_record(&r).unwrap();
    store
        .set_status(&r.trade_id, TradeStatus::Cancelled, None)
        .unwrap();
    let loaded = store.get_trade_record(&r.trade_id).unwrap().unwrap();
    assert_eq!(loaded.status, TradeStatus::Cancelled);
    assert!(store.get_all_trades().unwrap().len() == 1);
}
