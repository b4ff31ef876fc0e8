mod common;

use common::{aggregator, MockProvider};
use hostmon::error::{CollectError, FoundationalMetric};
use hostmon::snapshot::Degradation;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_pass_assembles_full_snapshot() {
    let provider = Arc::new(MockProvider::new());
    let agg = aggregator(provider.clone(), 1);

    let snapshot = agg.collect_once().await.unwrap();

    assert!((snapshot.cpu_usage - 75.0).abs() < 1e-9);
    assert_eq!(snapshot.cpu_per_core_usage.len(), 2);
    assert_eq!(snapshot.mem_total, 8 * 1024 * 1024 * 1024);
    assert_eq!(snapshot.mem_used, 2 * 1024 * 1024 * 1024);
    assert!((snapshot.mem_used_percent - 25.0).abs() < 1e-9);
    assert_eq!(snapshot.os.hostname, "mockhost");
    assert_eq!(snapshot.os.distro, "Mock OS");
    assert_eq!(snapshot.uptime, 3600);
    assert_eq!(snapshot.cpu_info[0].cores, 2);
    assert_eq!(snapshot.filesystems.len(), 3);
    assert!(snapshot.degraded.is_empty());

    let pids: Vec<u32> = snapshot.processes.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![42, 7, 1]);
}

#[tokio::test]
async fn test_failed_partition_is_omitted() {
    let provider = Arc::new(MockProvider::new());
    provider.fail_mount("/home");
    let agg = aggregator(provider.clone(), 1);

    let snapshot = agg.collect_once().await.unwrap();

    let mounts: Vec<&str> = snapshot
        .filesystems
        .iter()
        .map(|fs| fs.mountpoint.as_str())
        .collect();
    assert_eq!(mounts, vec!["/", "/data"]);
    assert_eq!(snapshot.degraded, vec![Degradation::Partition("/home".into())]);
}

#[tokio::test]
async fn test_memory_failure_aborts_pass() {
    let provider = Arc::new(MockProvider::new());
    provider.fail_memory.store(true, Ordering::SeqCst);
    let agg = aggregator(provider.clone(), 1);

    match agg.collect_once().await {
        Err(CollectError::Foundational { metric, .. }) => assert_eq!(metric, FoundationalMetric::Memory),
        other => panic!("expected memory failure, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_cpu_failure_aborts_pass() {
    let provider = Arc::new(MockProvider::new());
    provider.fail_cpu.store(true, Ordering::SeqCst);
    let agg = aggregator(provider.clone(), 1);

    match agg.collect_once().await {
        Err(CollectError::Foundational { metric, .. }) => assert_eq!(metric, FoundationalMetric::Cpu),
        other => panic!("expected cpu failure, got {:?}", other.map(|_| ())),
    }
    assert_eq!(provider.passes(), 0);
}

#[tokio::test]
async fn test_process_list_failure_degrades() {
    let provider = Arc::new(MockProvider::new());
    provider.fail_pids.store(true, Ordering::SeqCst);
    let agg = aggregator(provider.clone(), 1);

    let snapshot = agg.collect_once().await.unwrap();
    assert!(snapshot.processes.is_empty());
    assert_eq!(snapshot.degraded, vec![Degradation::ProcessList]);
}

#[tokio::test]
async fn test_rates_appear_from_second_pass() {
    let provider = Arc::new(MockProvider::new());
    let agg = aggregator(provider.clone(), 5);

    let first = agg.collect_once().await.unwrap();
    assert!(first.network.is_empty());
    assert!(first.disk_io.is_empty());

    let second = agg.collect_once().await.unwrap();
    assert_eq!(second.network.len(), 2);
    assert_eq!(second.disk_io.len(), 1);

    let eth0 = second.network.iter().find(|n| n.name == "eth0").unwrap();
    assert!(eth0.rx_bytes_per_sec > 0.0);
    assert!(eth0.tx_bytes_per_sec > 0.0);
    assert_eq!(eth0.rx_total, 20_000);

    // counters that did not move yield zero, never negative
    let lo = second.network.iter().find(|n| n.name == "lo").unwrap();
    assert_eq!(lo.rx_bytes_per_sec, 0.0);
    assert_eq!(lo.rx_unit, "B/s");

    assert!(second.disk_io[0].read_bytes_per_sec > 0.0);
}

#[tokio::test]
async fn test_default_limit_keeps_top_twenty() {
    let processes: Vec<(u32, f64)> = (1..=25).map(|pid| (pid, pid as f64)).collect();
    let provider = Arc::new(MockProvider::new().with_processes(processes));
    let agg = aggregator(provider.clone(), 1);

    let (snapshot, report) = agg.collect_with_report().await.unwrap();

    assert_eq!(snapshot.processes.len(), 20);
    assert_eq!(snapshot.processes[0].pid, 25);
    assert_eq!(snapshot.processes[19].pid, 6);
    assert_eq!(report.processes.requested, 25);
    assert_eq!(report.processes.opened, 25);
}
