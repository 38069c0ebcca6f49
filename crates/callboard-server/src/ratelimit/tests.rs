//! Tests for the rate limiter and its stores.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    CounterStore, CounterStoreError, MemoryCounterStore, RateDecision, RateLimitCounter,
    RateLimitError, SqliteCounterStore,
};
use crate::storage::CallerDatabase;

const FIVE_MINUTES: Duration = Duration::from_secs(300);
const HOUR: Duration = Duration::from_secs(3600);

fn memory_counter() -> RateLimitCounter {
    RateLimitCounter::new(Arc::new(MemoryCounterStore::new()))
}

struct DownStore;

#[async_trait]
impl CounterStore for DownStore {
    async fn acquire(
        &self,
        _key: &str,
        _max_attempts: u32,
        _window: Duration,
    ) -> Result<RateDecision, CounterStoreError> {
        Err(CounterStoreError::Unavailable("connection refused".into()))
    }

    async fn release(&self, _key: &str) -> Result<(), CounterStoreError> {
        Err(CounterStoreError::Unavailable("connection refused".into()))
    }

    async fn purge_expired(&self) -> Result<u64, CounterStoreError> {
        Err(CounterStoreError::Unavailable("connection refused".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn one_per_window_then_reopens_after_expiry() {
    let counter = memory_counter();

    let first = counter
        .check_and_increment("create:a", 1, FIVE_MINUTES)
        .await
        .unwrap();
    assert_eq!(first, RateDecision::Allowed { attempts: 1 });

    let second = counter
        .check_and_increment("create:a", 1, FIVE_MINUTES)
        .await
        .unwrap();
    assert_eq!(
        second,
        RateDecision::Exceeded {
            retry_after: FIVE_MINUTES
        }
    );

    tokio::time::advance(FIVE_MINUTES).await;

    let third = counter
        .check_and_increment("create:a", 1, FIVE_MINUTES)
        .await
        .unwrap();
    assert!(third.is_allowed());
}

#[tokio::test(start_paused = true)]
async fn window_is_fixed_not_sliding() {
    let counter = memory_counter();

    counter.check_and_increment("k", 3, HOUR).await.unwrap();
    tokio::time::advance(Duration::from_secs(1800)).await;
    counter.check_and_increment("k", 3, HOUR).await.unwrap();
    counter.check_and_increment("k", 3, HOUR).await.unwrap();

    match counter.check_and_increment("k", 3, HOUR).await.unwrap() {
        RateDecision::Exceeded { retry_after } => {
            assert_eq!(retry_after, Duration::from_secs(1800));
        }
        other @ RateDecision::Allowed { .. } => panic!("expected exceeded, got {other:?}"),
    }

    // The window opened by the first attempt closes on schedule even though
    // attempts kept arriving.
    tokio::time::advance(Duration::from_secs(1800)).await;
    assert_eq!(
        counter.check_and_increment("k", 3, HOUR).await.unwrap(),
        RateDecision::Allowed { attempts: 1 }
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_attempts_are_free() {
    let counter = memory_counter();

    counter.check_and_increment("k", 2, HOUR).await.unwrap();
    counter.check_and_increment("k", 2, HOUR).await.unwrap();
    for _ in 0..10 {
        assert!(!counter.check_and_increment("k", 2, HOUR).await.unwrap().is_allowed());
    }

    // A burst of rejections does not extend or deepen the block.
    tokio::time::advance(HOUR).await;
    assert!(counter.check_and_increment("k", 2, HOUR).await.unwrap().is_allowed());
    assert!(counter.check_and_increment("k", 2, HOUR).await.unwrap().is_allowed());
}

#[tokio::test]
async fn keys_are_independent() {
    let counter = memory_counter();

    assert!(counter.check_and_increment("create:a", 1, HOUR).await.unwrap().is_allowed());
    assert!(counter.check_and_increment("create:b", 1, HOUR).await.unwrap().is_allowed());
    assert!(!counter.check_and_increment("create:a", 1, HOUR).await.unwrap().is_allowed());
}

#[tokio::test]
async fn zero_limit_always_rejects() {
    let counter = memory_counter();
    assert!(!counter.check_and_increment("k", 0, HOUR).await.unwrap().is_allowed());
}

#[tokio::test]
async fn unavailable_store_fails_closed() {
    let counter = RateLimitCounter::new(Arc::new(DownStore));

    let err = counter.check_and_increment("k", 10, HOUR).await.unwrap_err();
    assert!(matches!(err, RateLimitError::StoreUnavailable(_)));
    assert!(counter.purge_expired().await.is_err());
}

#[tokio::test]
async fn concurrent_attempts_never_exceed_limit() {
    let counter = memory_counter();

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let counter = counter.clone();
            tokio::spawn(async move { counter.check_and_increment("k", 10, HOUR).await })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_allowed() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 10);
}

#[tokio::test(start_paused = true)]
async fn memory_purge_drops_expired() {
    let store = MemoryCounterStore::new();
    store.acquire("short", 1, Duration::from_secs(10)).await.unwrap();
    store.acquire("long", 1, HOUR).await.unwrap();

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(store.purge_expired().await.unwrap(), 1);
    assert!(!store.acquire("long", 1, HOUR).await.unwrap().is_allowed());
}

// === SQLite store ===

#[tokio::test]
async fn sqlite_store_limits_and_reports_wait() {
    let db = CallerDatabase::open_in_memory().await.unwrap();
    let counter = RateLimitCounter::new(Arc::new(SqliteCounterStore::new(db)));

    for i in 1..=10 {
        let decision = counter
            .check_and_increment("create-origin:9.9.9.9", 10, HOUR)
            .await
            .unwrap();
        assert_eq!(decision, RateDecision::Allowed { attempts: i });
    }

    match counter
        .check_and_increment("create-origin:9.9.9.9", 10, HOUR)
        .await
        .unwrap()
    {
        RateDecision::Exceeded { retry_after } => {
            assert!(retry_after > Duration::ZERO && retry_after <= HOUR);
        }
        other @ RateDecision::Allowed { .. } => panic!("expected exceeded, got {other:?}"),
    }

    assert!(counter
        .check_and_increment("create-origin:8.8.8.8", 10, HOUR)
        .await
        .unwrap()
        .is_allowed());
}

#[tokio::test]
async fn sqlite_store_concurrent_attempts_never_exceed_limit() {
    let db = CallerDatabase::open_in_memory().await.unwrap();
    let counter = RateLimitCounter::new(Arc::new(SqliteCounterStore::new(db)));

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let counter = counter.clone();
            tokio::spawn(async move { counter.check_and_increment("k", 5, HOUR).await })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_allowed() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 5);
}

#[tokio::test(start_paused = true)]
async fn released_attempt_frees_a_slot() {
    let counter = memory_counter();

    assert!(counter.check_and_increment("k", 1, FIVE_MINUTES).await.unwrap().is_allowed());
    counter.release("k").await.unwrap();

    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(
        counter.check_and_increment("k", 1, FIVE_MINUTES).await.unwrap(),
        RateDecision::Allowed { attempts: 1 }
    );

    // The window still closes at its original expiry.
    match counter.check_and_increment("k", 1, FIVE_MINUTES).await.unwrap() {
        RateDecision::Exceeded { retry_after } => {
            assert_eq!(retry_after, Duration::from_secs(240));
        }
        other @ RateDecision::Allowed { .. } => panic!("expected exceeded, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn release_after_expiry_is_a_no_op() {
    let counter = memory_counter();

    counter.check_and_increment("k", 2, FIVE_MINUTES).await.unwrap();
    tokio::time::advance(FIVE_MINUTES).await;
    counter.release("k").await.unwrap();
    counter.release("never-seen").await.unwrap();

    assert_eq!(
        counter.check_and_increment("k", 2, FIVE_MINUTES).await.unwrap(),
        RateDecision::Allowed { attempts: 1 }
    );
}

#[tokio::test]
async fn sqlite_store_release_frees_a_slot() {
    let db = CallerDatabase::open_in_memory().await.unwrap();
    let counter = RateLimitCounter::new(Arc::new(SqliteCounterStore::new(db)));

    assert!(counter.check_and_increment("create:h", 1, FIVE_MINUTES).await.unwrap().is_allowed());
    assert!(!counter.check_and_increment("create:h", 1, FIVE_MINUTES).await.unwrap().is_allowed());

    counter.release("create:h").await.unwrap();
    assert_eq!(
        counter.check_and_increment("create:h", 1, FIVE_MINUTES).await.unwrap(),
        RateDecision::Allowed { attempts: 1 }
    );
}

#[tokio::test]
async fn release_on_unavailable_store_is_an_error() {
    let counter = RateLimitCounter::new(Arc::new(DownStore));
    assert!(matches!(
        counter.release("k").await,
        Err(RateLimitError::StoreUnavailable(_))
    ));
}
