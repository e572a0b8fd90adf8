use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

async fn slow_fetch(counter: &AtomicUsize, value: &str) -> Result<String, String> {
    counter.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(value.to_string())
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_fetch() {
    let cache: Arc<ResultCache<String>> = Arc::new(ResultCache::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch("portal", || slow_fetch(&calls, "Portal"))
                    .await
            })
        })
        .collect();

    for task in futures::future::join_all(tasks).await {
        assert_eq!(task.unwrap().unwrap(), "Portal");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.in_flight.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn hit_under_ttl_does_not_refetch() {
    let cache = ResultCache::new(Duration::from_secs(60));
    let calls = AtomicUsize::new(0);

    cache.get_or_fetch("k", || slow_fetch(&calls, "v1")).await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    let v = cache.get_or_fetch("k", || slow_fetch(&calls, "v2")).await.unwrap();

    assert_eq!(v, "v1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_is_a_miss() {
    let cache = ResultCache::new(Duration::from_secs(60));
    let calls = AtomicUsize::new(0);

    cache.get_or_fetch("k", || slow_fetch(&calls, "old")).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;

    assert!(cache.get("k").is_none());
    let v = cache.get_or_fetch("k", || slow_fetch(&calls, "new")).await.unwrap();
    assert_eq!(v, "new");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let cache: ResultCache<u32> = ResultCache::default();
    let calls = AtomicUsize::new(0);

    let first: Result<u32, &str> = cache
        .get_or_fetch("k", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("boom")
        })
        .await;
    assert!(first.is_err());
    assert!(cache.is_empty());

    let second: Result<u32, &str> = cache
        .get_or_fetch("k", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await;
    assert_eq!(second, Ok(7));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn waiter_retries_after_leader_fails() {
    let cache: Arc<ResultCache<u32>> = Arc::new(ResultCache::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let leader = {
        let cache = cache.clone();
        let calls = calls.clone();
        tokio::spawn(async move {
            cache
                .get_or_fetch("k", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err::<u32, &str>("down")
                })
                .await
        })
    };
    tokio::task::yield_now().await;
    let follower = {
        let cache = cache.clone();
        let calls = calls.clone();
        tokio::spawn(async move {
            cache
                .get_or_fetch("k", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<u32, &str>(3)
                })
                .await
        })
    };

    assert!(leader.await.unwrap().is_err());
    assert_eq!(follower.await.unwrap(), Ok(3));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelled_callers_release_the_key() {
    let cache: ResultCache<u32> = ResultCache::new(Duration::from_secs(60));
    let in_flight = |cache: &ResultCache<u32>| cache.in_flight.lock().unwrap().len();

    let leader = tokio::time::timeout(
        Duration::from_secs(1),
        cache.get_or_fetch("k", || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<u32, &str>(1)
        }),
    );
    let waiter = tokio::time::timeout(
        Duration::from_secs(1),
        cache.get_or_fetch("k", || async { Ok::<u32, &str>(2) }),
    );
    let (leader, waiter) = tokio::join!(leader, waiter);

    assert!(leader.is_err());
    assert!(waiter.is_err());
    assert_eq!(in_flight(&cache), 0);

    assert_eq!(cache.get_or_fetch("k", || async { Ok::<u32, &str>(3) }).await, Ok(3));
    assert_eq!(in_flight(&cache), 0);
}

#[tokio::test]
async fn insert_replaces_and_invalidate_removes() {
    let cache: ResultCache<&'static str> = ResultCache::default();
    cache.insert("a", "one");
    cache.insert("a", "two");
    assert_eq!(cache.get("a"), Some("two"));
    assert_eq!(cache.len(), 1);

    cache.invalidate("a");
    assert!(cache.get("a").is_none());
}

#[tokio::test(start_paused = true)]
async fn purge_drops_only_expired() {
    let cache: ResultCache<u8> = ResultCache::new(Duration::from_secs(10));
    cache.insert("old", 1);
    tokio::time::advance(Duration::from_secs(5)).await;
    cache.insert("new", 2);
    tokio::time::advance(Duration::from_secs(6)).await;

    assert_eq!(cache.purge_expired(), 1);
    assert_eq!(cache.get("new"), Some(2));
}
