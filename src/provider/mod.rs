//! Raw metric sources.
//!
//! The engine only talks to the host through `MetricsProvider`. Each method
//! is an independent query that may fail on its own; the aggregator decides
//! which failures abort a pass and which are absorbed.

mod procfs;

pub use procfs::ProcfsProvider;

use crate::error::ProviderResult;
use crate::snapshot::CpuInfo;
pub use crate::system::{
    CpuStat, CpuTimes, DiskIoCounter, DiskUsage, HostInfo, MemoryStats, NetCounter, Partition,
};

/// Instantaneous host readings.
pub trait MetricsProvider: Send + Sync {
    /// Cumulative CPU time counters, overall and per core.
    fn cpu_times(&self) -> ProviderResult<CpuTimes>;

    fn memory(&self) -> ProviderResult<MemoryStats>;

    fn cpu_info(&self) -> ProviderResult<Vec<CpuInfo>>;

    fn host_info(&self) -> ProviderResult<HostInfo>;

    /// IDs of the processes alive right now.
    fn pids(&self) -> ProviderResult<Vec<u32>>;

    /// Opens a process for field queries. Fails if the process is gone.
    fn open_process<'a>(&'a self, pid: u32) -> ProviderResult<Box<dyn ProcessHandle + 'a>>;

    fn net_counters(&self) -> ProviderResult<Vec<NetCounter>>;

    fn disk_io_counters(&self) -> ProviderResult<Vec<DiskIoCounter>>;

    fn partitions(&self) -> ProviderResult<Vec<Partition>>;

    fn disk_usage(&self, partition: &Partition) -> ProviderResult<DiskUsage>;
}

/// Field queries on one opened process. Each may fail independently.
pub trait ProcessHandle {
    fn pid(&self) -> u32;

    fn name(&self) -> ProviderResult<String>;

    fn username(&self) -> ProviderResult<String>;

    /// CPU usage in percent of one core (may exceed 100 on multi-core hosts).
    fn cpu_percent(&self) -> ProviderResult<f64>;

    /// Resident memory in percent of total RAM.
    fn memory_percent(&self) -> ProviderResult<f32>;

    fn virtual_memory(&self) -> ProviderResult<u64>;

    fn resident_memory(&self) -> ProviderResult<u64>;

    /// Cumulative user + system CPU time in seconds.
    fn cpu_time(&self) -> ProviderResult<f64>;

    fn num_threads(&self) -> ProviderResult<u32>;

    fn status(&self) -> ProviderResult<String>;

    fn cmdline(&self) -> ProviderResult<String>;

    fn nice(&self) -> ProviderResult<i32>;
}
