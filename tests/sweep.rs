//! Expiry sweep over a populated store.

use std::sync::Arc;

use dialback::clock::MockClock;
use dialback::protocol::REPLAY_WINDOW_MS;
use dialback::errors::StoreError;
use dialback::jobs::sweep::run_once;
use dialback::models::TokenRecord;
use dialback::store::tokens::{RECENT_INDEX, RECORD_TABLE};
use dialback::store::{Databank, MemoryBank, TokenStore};

const NOW: i64 = 1_700_000_000_000;
const DAY_MS: i64 = 86_400_000;

#[tokio::test]
async fn test_sweep_evicts_exactly_the_stale_hundred() {
    let bank = Arc::new(MemoryBank::new());
    let store = TokenStore::new(bank.clone());

    let mut stale = Vec::new();
    let mut fresh = Vec::new();
    for i in 0..100 {
        let old = TokenRecord::new("http://b.example/resource", "a.example", format!("old{}", i), NOW - DAY_MS);
        let new = TokenRecord::new("http://b.example/resource", "a.example", format!("new{}", i), NOW);
        stale.push(tokio_test::assert_ok!(store.create(old).await).key());
        fresh.push(tokio_test::assert_ok!(store.create(new).await).key());
    }

    let evicted = tokio_test::assert_ok!(run_once(&store, &MockClock::at(NOW)).await);
    assert_eq!(evicted, 100);

    let index = bank.read_list(RECENT_INDEX).await.unwrap();
    assert_eq!(index.len(), 100);
    for key in &stale {
        assert!(!index.contains(key));
        assert!(bank.read(RECORD_TABLE, key).await.unwrap_err().is_not_found());
    }
    for key in &fresh {
        assert!(index.contains(key));
        assert!(store.is_remembered(key).await.unwrap());
    }

    // Second pass finds nothing more to do.
    assert_eq!(run_once(&store, &MockClock::at(NOW)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_creates_during_sweep_are_swept_later() {
    let bank = Arc::new(MemoryBank::new());
    let store = TokenStore::new(bank.clone());
    let clock = MockClock::at(NOW);

    let mut creators = Vec::new();
    for i in 0..50 {
        let store = store.clone();
        creators.push(tokio::spawn(async move {
            store
                .create(TokenRecord::new("http://b.example/r", "a.example", format!("t{}", i), NOW))
                .await
        }));
    }
    let sweeper = {
        let store = store.clone();
        let clock = clock.clone();
        tokio::spawn(async move { run_once(&store, &clock).await })
    };

    for c in creators {
        tokio_test::assert_ok!(c.await.unwrap());
    }
    assert_eq!(sweeper.await.unwrap().unwrap(), 0);

    clock.advance(REPLAY_WINDOW_MS + 1);
    assert_eq!(run_once(&store, &clock).await.unwrap(), 50);
    assert!(bank.is_empty());
}

#[tokio::test]
async fn test_duplicate_create_is_rejected_and_store_unaffected() {
    let bank = Arc::new(MemoryBank::new());
    let store = TokenStore::new(bank.clone());
    let rec = TokenRecord::new("http://b.example/resource", "a.example", "tok", NOW);

    tokio_test::assert_ok!(store.create(rec.clone()).await);
    let err = tokio_test::assert_err!(store.create(rec.clone()).await);
    assert!(matches!(err, StoreError::Duplicate(ref k) if *k == rec.key()));

    assert_eq!(bank.len(), 1);
    assert_eq!(bank.read_list(RECENT_INDEX).await.unwrap(), vec![rec.key()]);
}
