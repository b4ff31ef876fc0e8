//! Per-process sampling.
//!
//! Every PID becomes one rayon work item. A process that vanished before it
//! could be opened is dropped; a process whose individual fields fail is kept
//! with those fields zeroed and listed in `ProcessInfo::missing`.

use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::dedup::LogOnce;
use crate::error::ProviderResult;
use crate::provider::{MetricsProvider, ProcessHandle};
use crate::snapshot::{ProcessField, ProcessInfo};

/// Default number of processes kept after ranking.
pub const DEFAULT_PROCESS_LIMIT: usize = 20;

/// How many ranked processes to keep.
///
/// `Top(0)` keeps nothing. There is no implicit "no limit" value; callers
/// that want every process must ask for `Unlimited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessLimit {
    Top(usize),
    Unlimited,
}

impl Default for ProcessLimit {
    fn default() -> Self {
        ProcessLimit::Top(DEFAULT_PROCESS_LIMIT)
    }
}

/// Counters of the most recent `sample` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleStats {
    pub requested: usize,
    pub opened: usize,
    pub degraded: usize,
}

/// Fans out field queries over all PIDs and ranks the result.
#[derive(Debug, Default)]
pub struct ProcessSampler {
    failures: LogOnce<u32>,
}

impl ProcessSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples `pids` concurrently, then ranks by CPU and truncates to `limit`.
    ///
    /// Returns once every work item has finished.
    pub fn sample(
        &self,
        provider: &dyn MetricsProvider,
        pids: &[u32],
        limit: ProcessLimit,
    ) -> (Vec<ProcessInfo>, SampleStats) {
        let degraded = AtomicUsize::new(0);

        // collect() preserves input order, which keeps ranking ties stable
        let results: Vec<Option<ProcessInfo>> = pids
            .par_iter()
            .map(|&pid| {
                let info = self.sample_one(provider, pid)?;
                if info.is_degraded() {
                    degraded.fetch_add(1, Ordering::Relaxed);
                }
                Some(info)
            })
            .collect();

        let processes: Vec<ProcessInfo> = results.into_iter().flatten().collect();
        let stats = SampleStats {
            requested: pids.len(),
            opened: processes.len(),
            degraded: degraded.load(Ordering::Relaxed),
        };

        debug!(
            "Sampled {} of {} processes ({} degraded)",
            stats.opened, stats.requested, stats.degraded
        );

        (rank_and_truncate(processes, limit), stats)
    }

    fn sample_one(&self, provider: &dyn MetricsProvider, pid: u32) -> Option<ProcessInfo> {
        let handle = match provider.open_process(pid) {
            Ok(h) => h,
            Err(e) => {
                debug!("Skipping process {}: {}", pid, e);
                return None;
            }
        };

        let mut missing = Vec::new();
        let info = ProcessInfo {
            pid,
            name: field(handle.name(), ProcessField::Name, &mut missing),
            username: field(handle.username(), ProcessField::Username, &mut missing),
            cpu: field(handle.cpu_percent(), ProcessField::CpuPercent, &mut missing),
            memory: field(handle.memory_percent(), ProcessField::MemoryPercent, &mut missing),
            virt: field(handle.virtual_memory(), ProcessField::VirtualMemory, &mut missing),
            res: field(handle.resident_memory(), ProcessField::ResidentMemory, &mut missing),
            cpu_time: field(handle.cpu_time(), ProcessField::CpuTime, &mut missing),
            threads: field(handle.num_threads(), ProcessField::Threads, &mut missing),
            status: field(handle.status(), ProcessField::Status, &mut missing),
            cmdline: field(handle.cmdline(), ProcessField::Cmdline, &mut missing),
            nice: field(handle.nice(), ProcessField::Nice, &mut missing),
            missing: Vec::new(),
        };

        if missing.is_empty() {
            return Some(info);
        }

        let failed: Vec<ProcessField> = missing.iter().map(|(f, _)| *f).collect();
        if self.failures.first(pid) {
            let reasons: Vec<String> = missing
                .iter()
                .map(|(f, e)| format!("{:?}: {}", f, e))
                .collect();
            warn!(
                "Process {} ({}) returned partial data: {}",
                pid,
                info.name,
                reasons.join("; ")
            );
        }

        Some(ProcessInfo {
            missing: failed,
            ..info
        })
    }

    /// Number of distinct PIDs that have logged a field failure so far.
    pub fn reported_failures(&self) -> usize {
        self.failures.len()
    }
}

fn field<T: Default>(
    result: ProviderResult<T>,
    which: ProcessField,
    missing: &mut Vec<(ProcessField, String)>,
) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            missing.push((which, e.to_string()));
            T::default()
        }
    }
}

/// Sorts descending by CPU usage (stable) and applies `limit`.
pub fn rank_and_truncate(mut processes: Vec<ProcessInfo>, limit: ProcessLimit) -> Vec<ProcessInfo> {
    processes.sort_by(|a, b| b.cpu.total_cmp(&a.cpu));
    if let ProcessLimit::Top(n) = limit {
        processes.truncate(n);
    }
    processes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::{CpuTimes, DiskIoCounter, DiskUsage, HostInfo, MemoryStats, NetCounter, Partition};
    use crate::snapshot::CpuInfo;
    use ahash::AHashMap as HashMap;

    #[derive(Clone, Default)]
    struct FakeProcess {
        cpu: f64,
        broken_username: bool,
    }

    struct FakeHandle {
        pid: u32,
        proc: FakeProcess,
    }

    impl ProcessHandle for FakeHandle {
        fn pid(&self) -> u32 {
            self.pid
        }
        fn name(&self) -> ProviderResult<String> {
            Ok(format!("proc{}", self.pid))
        }
        fn username(&self) -> ProviderResult<String> {
            if self.proc.broken_username {
                Err(ProviderError::Parse("no uid".into()))
            } else {
                Ok("root".into())
            }
        }
        fn cpu_percent(&self) -> ProviderResult<f64> {
            Ok(self.proc.cpu)
        }
        fn memory_percent(&self) -> ProviderResult<f32> {
            Ok(1.5)
        }
        fn virtual_memory(&self) -> ProviderResult<u64> {
            Ok(4096)
        }
        fn resident_memory(&self) -> ProviderResult<u64> {
            Ok(2048)
        }
        fn cpu_time(&self) -> ProviderResult<f64> {
            Ok(1.0)
        }
        fn num_threads(&self) -> ProviderResult<u32> {
            Ok(1)
        }
        fn status(&self) -> ProviderResult<String> {
            Ok("running".into())
        }
        fn cmdline(&self) -> ProviderResult<String> {
            Ok(String::new())
        }
        fn nice(&self) -> ProviderResult<i32> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct FakeProvider {
        procs: HashMap<u32, FakeProcess>,
    }

    impl FakeProvider {
        fn with_cpu(cpus: &[(u32, f64)]) -> Self {
            let procs = cpus
                .iter()
                .map(|&(pid, cpu)| (pid, FakeProcess { cpu, ..Default::default() }))
                .collect();
            Self { procs }
        }
    }

    impl MetricsProvider for FakeProvider {
        fn cpu_times(&self) -> ProviderResult<CpuTimes> {
            Ok(CpuTimes::default())
        }
        fn memory(&self) -> ProviderResult<MemoryStats> {
            Err(ProviderError::NotFound("unused".into()))
        }
        fn cpu_info(&self) -> ProviderResult<Vec<CpuInfo>> {
            Ok(Vec::new())
        }
        fn host_info(&self) -> ProviderResult<HostInfo> {
            Ok(HostInfo::default())
        }
        fn pids(&self) -> ProviderResult<Vec<u32>> {
            Ok(self.procs.keys().copied().collect())
        }
        fn open_process<'a>(&'a self, pid: u32) -> ProviderResult<Box<dyn ProcessHandle + 'a>> {
            match self.procs.get(&pid) {
                Some(p) => Ok(Box::new(FakeHandle { pid, proc: p.clone() })),
                None => Err(ProviderError::NotFound(format!("process {}", pid))),
            }
        }
        fn net_counters(&self) -> ProviderResult<Vec<NetCounter>> {
            Ok(Vec::new())
        }
        fn disk_io_counters(&self) -> ProviderResult<Vec<DiskIoCounter>> {
            Ok(Vec::new())
        }
        fn partitions(&self) -> ProviderResult<Vec<Partition>> {
            Ok(Vec::new())
        }
        fn disk_usage(&self, _partition: &Partition) -> ProviderResult<DiskUsage> {
            Err(ProviderError::NotFound("unused".into()))
        }
    }

    fn proc_with_cpu(pid: u32, cpu: f64) -> ProcessInfo {
        ProcessInfo {
            pid,
            cpu,
            ..Default::default()
        }
    }

    #[test]
    fn test_ranking_is_stable_for_ties() {
        let input = vec![proc_with_cpu(1, 5.0), proc_with_cpu(2, 5.0), proc_with_cpu(3, 10.0)];
        let ranked = rank_and_truncate(input, ProcessLimit::Unlimited);
        let pids: Vec<u32> = ranked.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![3, 1, 2]);
    }

    #[test]
    fn test_truncates_to_highest_cpu() {
        let input: Vec<ProcessInfo> = (1..=25).map(|pid| proc_with_cpu(pid, pid as f64)).collect();
        let ranked = rank_and_truncate(input, ProcessLimit::Top(20));
        assert_eq!(ranked.len(), 20);
        assert_eq!(ranked[0].pid, 25);
        assert_eq!(ranked[19].pid, 6);
        assert!(ranked.iter().all(|p| p.pid > 5));
    }

    #[test]
    fn test_zero_limit_returns_empty() {
        let input = vec![proc_with_cpu(1, 1.0)];
        assert!(rank_and_truncate(input.clone(), ProcessLimit::Top(0)).is_empty());
        assert_eq!(rank_and_truncate(input, ProcessLimit::Unlimited).len(), 1);
    }

    #[test]
    fn test_sample_keeps_input_order_on_ties() {
        let provider = FakeProvider::with_cpu(&[(1, 5.0), (2, 5.0), (3, 10.0)]);
        let sampler = ProcessSampler::new();
        let (procs, stats) = sampler.sample(&provider, &[1, 2, 3], ProcessLimit::default());
        let pids: Vec<u32> = procs.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![3, 1, 2]);
        assert_eq!(stats.opened, 3);
        assert_eq!(procs[0].name, "proc3");
        assert!(!procs[0].is_degraded());
    }

    #[test]
    fn test_sample_drops_vanished_processes() {
        let provider = FakeProvider::with_cpu(&[(10, 1.0), (11, 2.0)]);
        let sampler = ProcessSampler::new();
        let (procs, stats) = sampler.sample(&provider, &[10, 11, 12], ProcessLimit::Unlimited);
        assert_eq!(procs.len(), 2);
        assert_eq!(stats.requested, 3);
        assert_eq!(stats.opened, 2);
        assert!(procs.iter().all(|p| p.pid != 12));
    }

    #[test]
    fn test_failed_field_is_zeroed_and_reported_once() {
        let mut provider = FakeProvider::with_cpu(&[(7, 3.0)]);
        provider.procs.insert(
            8,
            FakeProcess {
                cpu: 1.0,
                broken_username: true,
            },
        );
        let sampler = ProcessSampler::new();

        for _ in 0..3 {
            let (procs, stats) = sampler.sample(&provider, &[7, 8], ProcessLimit::Unlimited);
            let degraded = procs.iter().find(|p| p.pid == 8).unwrap();
            assert_eq!(degraded.username, "");
            assert_eq!(degraded.missing, vec![ProcessField::Username]);
            assert_eq!(degraded.name, "proc8");
            assert_eq!(stats.degraded, 1);
        }
        assert_eq!(sampler.reported_failures(), 1);
    }

    #[test]
    fn test_sample_many_processes() {
        let cpus: Vec<(u32, f64)> = (1..=5000).map(|pid| (pid, (pid % 97) as f64)).collect();
        let provider = FakeProvider::with_cpu(&cpus);
        let pids: Vec<u32> = cpus.iter().map(|(pid, _)| *pid).collect();
        let (procs, stats) = ProcessSampler::new().sample(&provider, &pids, ProcessLimit::Top(20));
        assert_eq!(stats.opened, 5000);
        assert_eq!(procs.len(), 20);
        assert!(procs.iter().all(|p| p.cpu == 96.0));
    }
}
