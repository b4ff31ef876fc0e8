mod common;

use common::{aggregator, MockProvider};
use hostmon::cache::MetricsCache;
use hostmon::error::{CollectError, FoundationalMetric};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn cache(provider: Arc<MockProvider>, window_ms: u64, ttl: Duration) -> Arc<MetricsCache> {
    Arc::new(MetricsCache::new(aggregator(provider, window_ms), ttl))
}

#[tokio::test]
async fn test_fresh_snapshot_is_reused() {
    let provider = Arc::new(MockProvider::new());
    let cache = cache(provider.clone(), 1, Duration::from_secs(60));

    let first = cache.get().await.unwrap();
    let second = cache.get().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(provider.passes(), 1);
    assert_eq!(cache.stats().cache_misses(), 1);
    assert_eq!(cache.stats().cache_hits(), 1);
}

#[tokio::test]
async fn test_stale_snapshot_triggers_new_pass() {
    let provider = Arc::new(MockProvider::new());
    let cache = cache(provider.clone(), 1, Duration::from_secs(60));

    let first = cache.get().await.unwrap();
    let second = cache.get_metrics(Duration::ZERO).await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(provider.passes(), 2);
    assert!(second.collected_at >= first.collected_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stale_readers_share_one_pass() {
    let provider = Arc::new(MockProvider::new());
    let cache = cache(provider.clone(), 200, Duration::from_secs(60));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get().await })
        })
        .collect();

    let mut snapshots = Vec::new();
    for handle in handles {
        snapshots.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(provider.passes(), 1);
    assert!(snapshots.iter().all(|s| Arc::ptr_eq(s, &snapshots[0])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_share_one_failure() {
    let provider = Arc::new(MockProvider::new());
    provider.fail_memory.store(true, Ordering::SeqCst);
    let cache = cache(provider.clone(), 200, Duration::from_secs(60));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get().await })
        })
        .collect();

    for handle in handles {
        match handle.await.unwrap() {
            Err(CollectError::Foundational { metric, .. }) => {
                assert_eq!(metric, FoundationalMetric::Memory)
            }
            other => panic!("expected memory failure, got {:?}", other.map(|_| ())),
        }
    }

    assert_eq!(provider.passes(), 1);
    assert_eq!(cache.stats().passes_failed(), 1);
}

#[tokio::test]
async fn test_failure_keeps_previous_snapshot() {
    let provider = Arc::new(MockProvider::new());
    let cache = cache(provider.clone(), 1, Duration::from_secs(60));

    let good = cache.get().await.unwrap();

    provider.fail_memory.store(true, Ordering::SeqCst);
    assert!(cache.get_metrics(Duration::ZERO).await.is_err());
    assert!(cache.last_error().await.is_some());
    let kept = cache.snapshot().await.unwrap();
    assert!(Arc::ptr_eq(&good, &kept));

    // a fresh read still serves the old snapshot
    let served = cache.get().await.unwrap();
    assert!(Arc::ptr_eq(&good, &served));

    provider.fail_memory.store(false, Ordering::SeqCst);
    let recovered = cache.get_metrics(Duration::ZERO).await.unwrap();
    assert!(!Arc::ptr_eq(&good, &recovered));
    assert!(cache.last_error().await.is_none());
    assert_eq!(cache.stats().passes_ok(), 2);
}
