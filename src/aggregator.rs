//! One full collection pass.
//!
//! Pass stages: sampling (cpu, memory, host) → enumerating pids → fanning out
//! per process → computing rates → assembling. Only CPU and memory failures
//! abort a pass; everything else degrades by omission.

use chrono::Utc;
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::dedup::LogOnce;
use crate::error::{CollectError, FoundationalMetric, ProviderResult};
use crate::provider::{MetricsProvider, Partition};
use crate::rates::{CounterSnapshot, RateComputer};
use crate::sampler::{ProcessLimit, ProcessSampler, SampleStats};
use crate::snapshot::{
    scale_rate, Degradation, DiskIoRate, FilesystemUsage, MetricsSnapshot, NetworkRate, OsInfo,
};

/// Default CPU observation window.
pub const DEFAULT_CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Tunables of a pass.
#[derive(Debug, Clone, Copy)]
pub struct AggregatorSettings {
    /// Time between the two CPU counter reads of a pass.
    pub cpu_sample_window: Duration,
    pub process_limit: ProcessLimit,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            cpu_sample_window: DEFAULT_CPU_SAMPLE_WINDOW,
            process_limit: ProcessLimit::default(),
        }
    }
}

/// Outcome details of the last successful pass, for telemetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassReport {
    pub duration: Duration,
    pub processes: SampleStats,
}

/// Runs collection passes against a provider.
///
/// Concurrent `collect_once` calls are allowed; the rate computers serialise
/// their own state.
pub struct Aggregator {
    provider: Arc<dyn MetricsProvider>,
    sampler: Arc<ProcessSampler>,
    network: RateComputer,
    disk_io: RateComputer,
    settings: AggregatorSettings,
    warned: LogOnce<Degradation>,
}

impl Aggregator {
    pub fn new(provider: Arc<dyn MetricsProvider>, settings: AggregatorSettings) -> Self {
        Self {
            provider,
            sampler: Arc::new(ProcessSampler::new()),
            network: RateComputer::new(),
            disk_io: RateComputer::new(),
            settings,
            warned: LogOnce::new(),
        }
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    pub fn provider(&self) -> &Arc<dyn MetricsProvider> {
        &self.provider
    }

    /// Runs one pass and returns the assembled snapshot.
    pub async fn collect_once(&self) -> Result<MetricsSnapshot, CollectError> {
        self.collect_with_report().await.map(|(snapshot, _)| snapshot)
    }

    #[instrument(skip(self))]
    pub async fn collect_with_report(&self) -> Result<(MetricsSnapshot, PassReport), CollectError> {
        let start = Instant::now();
        let mut degraded = Vec::new();

        debug!("Pass stage: sampling cpu, memory and host descriptors");
        let cpu_before = self
            .provider
            .cpu_times()
            .map_err(|e| CollectError::foundational(FoundationalMetric::Cpu, e))?;
        tokio::time::sleep(self.settings.cpu_sample_window).await;
        let cpu_after = self
            .provider
            .cpu_times()
            .map_err(|e| CollectError::foundational(FoundationalMetric::Cpu, e))?;
        let memory = self
            .provider
            .memory()
            .map_err(|e| CollectError::foundational(FoundationalMetric::Memory, e))?;

        let cpu_usage = cpu_after.total.usage_percent_since(&cpu_before.total);
        let cpu_per_core_usage: Vec<f64> = cpu_after
            .per_core
            .iter()
            .zip(cpu_before.per_core.iter())
            .map(|(after, before)| after.usage_percent_since(before))
            .collect();

        let cpu_info = self
            .degrade(self.provider.cpu_info(), Degradation::CpuInfo, &mut degraded)
            .unwrap_or_default();
        let host = self
            .degrade(self.provider.host_info(), Degradation::HostInfo, &mut degraded)
            .unwrap_or_default();

        debug!("Pass stage: enumerating processes");
        let pids = self
            .degrade(self.provider.pids(), Degradation::ProcessList, &mut degraded)
            .unwrap_or_default();

        debug!("Pass stage: fanning out over {} processes", pids.len());
        let provider = Arc::clone(&self.provider);
        let sampler = Arc::clone(&self.sampler);
        let limit = self.settings.process_limit;
        let (processes, process_stats) =
            tokio::task::spawn_blocking(move || sampler.sample(provider.as_ref(), &pids, limit))
                .await
                .map_err(|e| CollectError::Internal(format!("process sampling task failed: {}", e)))?;

        debug!("Pass stage: computing rates");
        let network = match self.provider.net_counters() {
            Ok(counters) => {
                let snapshots: Vec<CounterSnapshot> = counters
                    .iter()
                    .map(|c| CounterSnapshot::new(c.name.clone(), c.rx_bytes, c.tx_bytes))
                    .collect();
                let rates = self.network.compute(&snapshots, Instant::now());
                counters
                    .into_iter()
                    .filter_map(|c| {
                        let rate = rates.get(&c.name)?;
                        let (rx_speed, rx_unit) = scale_rate(rate.inbound_per_sec);
                        let (tx_speed, tx_unit) = scale_rate(rate.outbound_per_sec);
                        Some(NetworkRate {
                            name: c.name,
                            rx_bytes_per_sec: rate.inbound_per_sec,
                            tx_bytes_per_sec: rate.outbound_per_sec,
                            rx_speed,
                            rx_unit: rx_unit.to_string(),
                            tx_speed,
                            tx_unit: tx_unit.to_string(),
                            rx_total: c.rx_bytes,
                            tx_total: c.tx_bytes,
                        })
                    })
                    .collect()
            }
            Err(e) => {
                self.note(Degradation::Network, &e, &mut degraded);
                Vec::new()
            }
        };

        let disk_io = match self.provider.disk_io_counters() {
            Ok(counters) => {
                let snapshots: Vec<CounterSnapshot> = counters
                    .iter()
                    .map(|c| CounterSnapshot::new(c.device.clone(), c.read_bytes, c.write_bytes))
                    .collect();
                let rates = self.disk_io.compute(&snapshots, Instant::now());
                counters
                    .into_iter()
                    .filter_map(|c| {
                        let rate = rates.get(&c.device)?;
                        Some(DiskIoRate {
                            device: c.device,
                            read_bytes_per_sec: rate.inbound_per_sec,
                            write_bytes_per_sec: rate.outbound_per_sec,
                            read_total: c.read_bytes,
                            write_total: c.write_bytes,
                        })
                    })
                    .collect()
            }
            Err(e) => {
                self.note(Degradation::DiskIo, &e, &mut degraded);
                Vec::new()
            }
        };

        debug!("Pass stage: assembling snapshot");
        let partitions = self
            .degrade(self.provider.partitions(), Degradation::Partitions, &mut degraded)
            .unwrap_or_default();
        let filesystems = self.filesystem_usage(&partitions, &mut degraded);

        let snapshot = MetricsSnapshot {
            cpu_usage,
            cpu_per_core_usage,
            mem_total: memory.total_bytes,
            mem_used: memory.used_bytes(),
            mem_used_percent: memory.used_percent(),
            processes,
            cpu_info,
            network,
            disk_io,
            filesystems,
            os: OsInfo {
                name: host.os_type,
                distro: host.distro,
                architecture: std::env::consts::ARCH.to_string(),
                kernel: host.kernel,
                hostname: host.hostname,
            },
            uptime: host.uptime_seconds,
            collected_at: Utc::now(),
            degraded,
        };

        let report = PassReport {
            duration: start.elapsed(),
            processes: process_stats,
        };

        info!(
            "Collection pass completed: {} processes listed ({} sampled), {} filesystems, {:.2}ms",
            snapshot.processes.len(),
            process_stats.opened,
            snapshot.filesystems.len(),
            report.duration.as_secs_f64() * 1000.0
        );

        Ok((snapshot, report))
    }

    /// Queries every partition independently; failed ones are left out.
    fn filesystem_usage(
        &self,
        partitions: &[Partition],
        degraded: &mut Vec<Degradation>,
    ) -> Vec<FilesystemUsage> {
        let mut out = Vec::with_capacity(partitions.len());
        for partition in partitions {
            match self.provider.disk_usage(partition) {
                Ok(usage) => out.push(FilesystemUsage {
                    device: partition.device.clone(),
                    mountpoint: partition.mountpoint.clone(),
                    fstype: partition.fstype.clone(),
                    total: usage.total,
                    used: usage.used,
                    free: usage.free,
                    used_perc: usage.used_percent,
                }),
                Err(e) => self.note(
                    Degradation::Partition(partition.mountpoint.clone()),
                    &e,
                    degraded,
                ),
            }
        }
        out
    }

    fn degrade<T>(
        &self,
        result: ProviderResult<T>,
        kind: Degradation,
        degraded: &mut Vec<Degradation>,
    ) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.note(kind, &e, degraded);
                None
            }
        }
    }

    fn note(&self, kind: Degradation, err: &impl Display, degraded: &mut Vec<Degradation>) {
        if self.warned.first(kind.clone()) {
            warn!("Omitting {:?} from snapshot: {}", kind, err);
        } else {
            debug!("Omitting {:?} from snapshot: {}", kind, err);
        }
        degraded.push(kind);
    }
}
