//! Test provider with call counters and failure switches.

#![allow(dead_code)]

use hostmon::aggregator::{Aggregator, AggregatorSettings};
use hostmon::error::{ProviderError, ProviderResult};
use hostmon::provider::{
    CpuStat, CpuTimes, DiskIoCounter, DiskUsage, HostInfo, MemoryStats, MetricsProvider, NetCounter,
    Partition, ProcessHandle,
};
use hostmon::sampler::ProcessLimit;
use hostmon::snapshot::CpuInfo;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct MockProvider {
    cpu_calls: AtomicU64,
    memory_calls: AtomicUsize,
    counter_calls: AtomicU64,
    pub fail_cpu: AtomicBool,
    pub fail_memory: AtomicBool,
    pub fail_pids: AtomicBool,
    pub failing_mounts: Mutex<Vec<String>>,
    pub partitions: Vec<Partition>,
    /// CPU percent per PID, in enumeration order.
    pub processes: Vec<(u32, f64)>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            cpu_calls: AtomicU64::new(0),
            memory_calls: AtomicUsize::new(0),
            counter_calls: AtomicU64::new(0),
            fail_cpu: AtomicBool::new(false),
            fail_memory: AtomicBool::new(false),
            fail_pids: AtomicBool::new(false),
            failing_mounts: Mutex::new(Vec::new()),
            partitions: ["/", "/home", "/data"]
                .iter()
                .enumerate()
                .map(|(i, mp)| Partition {
                    device: format!("/dev/sda{}", i + 1),
                    mountpoint: mp.to_string(),
                    fstype: "ext4".into(),
                })
                .collect(),
            processes: vec![(1, 0.5), (42, 12.0), (7, 3.0)],
        }
    }

    pub fn with_processes(mut self, processes: Vec<(u32, f64)>) -> Self {
        self.processes = processes;
        self
    }

    /// Number of passes that got past the CPU reads.
    pub fn passes(&self) -> usize {
        self.memory_calls.load(Ordering::SeqCst)
    }

    pub fn fail_mount(&self, mountpoint: &str) {
        self.failing_mounts.lock().unwrap().push(mountpoint.to_string());
    }
}

impl MetricsProvider for MockProvider {
    fn cpu_times(&self) -> ProviderResult<CpuTimes> {
        if self.fail_cpu.load(Ordering::SeqCst) {
            return Err(ProviderError::Parse("no aggregate cpu line".into()));
        }
        // every read adds 100 ticks, 25 of them idle
        let n = self.cpu_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let core = CpuStat {
            user: 75 * n,
            idle: 25 * n,
            ..Default::default()
        };
        Ok(CpuTimes {
            total: CpuStat {
                user: core.user * 2,
                idle: core.idle * 2,
                ..Default::default()
            },
            per_core: vec![core, core],
        })
    }

    fn memory(&self) -> ProviderResult<MemoryStats> {
        self.memory_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_memory.load(Ordering::SeqCst) {
            return Err(ProviderError::NotFound("meminfo".into()));
        }
        Ok(MemoryStats {
            total_bytes: 8 * 1024 * 1024 * 1024,
            available_bytes: 6 * 1024 * 1024 * 1024,
            free_bytes: 4 * 1024 * 1024 * 1024,
        })
    }

    fn cpu_info(&self) -> ProviderResult<Vec<CpuInfo>> {
        Ok(vec![CpuInfo {
            model: "Mock CPU".into(),
            cores: 2,
            max_frequency: 2400.0,
        }])
    }

    fn host_info(&self) -> ProviderResult<HostInfo> {
        Ok(HostInfo {
            hostname: "mockhost".into(),
            os_type: "Linux".into(),
            kernel: "6.1.0".into(),
            distro: "Mock OS".into(),
            uptime_seconds: 3600,
        })
    }

    fn pids(&self) -> ProviderResult<Vec<u32>> {
        if self.fail_pids.load(Ordering::SeqCst) {
            return Err(ProviderError::Parse("proc not mounted".into()));
        }
        Ok(self.processes.iter().map(|(pid, _)| *pid).collect())
    }

    fn open_process<'a>(&'a self, pid: u32) -> ProviderResult<Box<dyn ProcessHandle + 'a>> {
        let cpu = self
            .processes
            .iter()
            .find(|(p, _)| *p == pid)
            .map(|(_, cpu)| *cpu)
            .ok_or_else(|| ProviderError::NotFound(format!("process {}", pid)))?;
        Ok(Box::new(MockProcess { pid, cpu }))
    }

    fn net_counters(&self) -> ProviderResult<Vec<NetCounter>> {
        let n = self.counter_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(vec![
            NetCounter {
                name: "eth0".into(),
                rx_bytes: 10_000 * n,
                tx_bytes: 5_000 * n,
            },
            NetCounter {
                name: "lo".into(),
                rx_bytes: 100,
                tx_bytes: 100,
            },
        ])
    }

    fn disk_io_counters(&self) -> ProviderResult<Vec<DiskIoCounter>> {
        let n = self.counter_calls.load(Ordering::SeqCst);
        Ok(vec![DiskIoCounter {
            device: "sda".into(),
            read_bytes: 4096 * n,
            write_bytes: 1024 * n,
        }])
    }

    fn partitions(&self) -> ProviderResult<Vec<Partition>> {
        Ok(self.partitions.clone())
    }

    fn disk_usage(&self, partition: &Partition) -> ProviderResult<DiskUsage> {
        let failing = self.failing_mounts.lock().unwrap();
        if failing.contains(&partition.mountpoint) {
            return Err(ProviderError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            )));
        }
        Ok(DiskUsage {
            total: 1000,
            used: 250,
            free: 750,
            used_percent: 25.0,
        })
    }
}

struct MockProcess {
    pid: u32,
    cpu: f64,
}

impl ProcessHandle for MockProcess {
    fn pid(&self) -> u32 {
        self.pid
    }
    fn name(&self) -> ProviderResult<String> {
        Ok(format!("proc{}", self.pid))
    }
    fn username(&self) -> ProviderResult<String> {
        Ok("root".into())
    }
    fn cpu_percent(&self) -> ProviderResult<f64> {
        Ok(self.cpu)
    }
    fn memory_percent(&self) -> ProviderResult<f32> {
        Ok(1.0)
    }
    fn virtual_memory(&self) -> ProviderResult<u64> {
        Ok(4096)
    }
    fn resident_memory(&self) -> ProviderResult<u64> {
        Ok(2048)
    }
    fn cpu_time(&self) -> ProviderResult<f64> {
        Ok(1.5)
    }
    fn num_threads(&self) -> ProviderResult<u32> {
        Ok(1)
    }
    fn status(&self) -> ProviderResult<String> {
        Ok("running".into())
    }
    fn cmdline(&self) -> ProviderResult<String> {
        Ok(format!("/usr/bin/proc{}", self.pid))
    }
    fn nice(&self) -> ProviderResult<i32> {
        Ok(0)
    }
}

/// Aggregator over `provider` with a CPU window of `window_ms`.
pub fn aggregator(provider: Arc<MockProvider>, window_ms: u64) -> Aggregator {
    Aggregator::new(
        provider,
        AggregatorSettings {
            cpu_sample_window: Duration::from_millis(window_ms),
            process_limit: ProcessLimit::default(),
        },
    )
}
