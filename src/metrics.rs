//! Prometheus metrics definitions for hostmon.
//!
//! Gauges are reset and refilled from a snapshot on every scrape, so entities
//! that disappeared (exited processes, removed interfaces) drop out.

use prometheus::{Gauge, GaugeVec, Opts, Registry};

use crate::snapshot::MetricsSnapshot;

/// Collection of Prometheus gauges mirroring a `MetricsSnapshot`.
#[derive(Clone)]
pub struct HostMetrics {
    pub cpu_usage: Gauge,
    pub cpu_core_usage: GaugeVec,
    pub memory_total: Gauge,
    pub memory_used: Gauge,
    pub memory_used_percent: Gauge,
    pub uptime: Gauge,

    // Top-N processes
    pub process_cpu_percent: GaugeVec,
    pub process_memory_percent: GaugeVec,
    pub process_resident_bytes: GaugeVec,
    pub process_cpu_time: GaugeVec,

    pub network_rx_rate: GaugeVec,
    pub network_tx_rate: GaugeVec,
    pub disk_read_rate: GaugeVec,
    pub disk_write_rate: GaugeVec,

    pub filesystem_size: GaugeVec,
    pub filesystem_used: GaugeVec,
    pub filesystem_used_percent: GaugeVec,
}

impl HostMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let process_labels = &["pid", "name", "username"];
        let fs_labels = &["device", "mountpoint", "fstype"];

        let cpu_usage = Gauge::new("hostmon_cpu_usage_percent", "Overall CPU usage in percent")?;
        let cpu_core_usage = GaugeVec::new(
            Opts::new("hostmon_cpu_core_usage_percent", "CPU usage per core in percent"),
            &["core"],
        )?;
        let memory_total = Gauge::new("hostmon_memory_total_bytes", "Total physical memory in bytes")?;
        let memory_used = Gauge::new(
            "hostmon_memory_used_bytes",
            "Used physical memory (total - available) in bytes",
        )?;
        let memory_used_percent =
            Gauge::new("hostmon_memory_used_percent", "Used physical memory in percent")?;
        let uptime = Gauge::new("hostmon_host_uptime_seconds", "Host uptime in seconds")?;

        let process_cpu_percent = GaugeVec::new(
            Opts::new(
                "hostmon_process_cpu_percent",
                "CPU usage of the top processes in percent of one core",
            ),
            process_labels,
        )?;
        let process_memory_percent = GaugeVec::new(
            Opts::new(
                "hostmon_process_memory_percent",
                "Resident memory of the top processes in percent of total memory",
            ),
            process_labels,
        )?;
        let process_resident_bytes = GaugeVec::new(
            Opts::new(
                "hostmon_process_resident_bytes",
                "Resident memory of the top processes in bytes",
            ),
            process_labels,
        )?;
        let process_cpu_time = GaugeVec::new(
            Opts::new(
                "hostmon_process_cpu_time_seconds",
                "Total CPU time used by the top processes",
            ),
            process_labels,
        )?;

        let network_rx_rate = GaugeVec::new(
            Opts::new("hostmon_network_receive_bytes_per_second", "Receive rate per interface"),
            &["interface"],
        )?;
        let network_tx_rate = GaugeVec::new(
            Opts::new("hostmon_network_transmit_bytes_per_second", "Transmit rate per interface"),
            &["interface"],
        )?;
        let disk_read_rate = GaugeVec::new(
            Opts::new("hostmon_disk_read_bytes_per_second", "Read rate per block device"),
            &["device"],
        )?;
        let disk_write_rate = GaugeVec::new(
            Opts::new("hostmon_disk_write_bytes_per_second", "Write rate per block device"),
            &["device"],
        )?;

        let filesystem_size = GaugeVec::new(
            Opts::new("hostmon_filesystem_size_bytes", "Filesystem size in bytes"),
            fs_labels,
        )?;
        let filesystem_used = GaugeVec::new(
            Opts::new("hostmon_filesystem_used_bytes", "Filesystem used bytes"),
            fs_labels,
        )?;
        let filesystem_used_percent = GaugeVec::new(
            Opts::new("hostmon_filesystem_used_percent", "Filesystem usage in percent"),
            fs_labels,
        )?;

        registry.register(Box::new(cpu_usage.clone()))?;
        registry.register(Box::new(cpu_core_usage.clone()))?;
        registry.register(Box::new(memory_total.clone()))?;
        registry.register(Box::new(memory_used.clone()))?;
        registry.register(Box::new(memory_used_percent.clone()))?;
        registry.register(Box::new(uptime.clone()))?;
        registry.register(Box::new(process_cpu_percent.clone()))?;
        registry.register(Box::new(process_memory_percent.clone()))?;
        registry.register(Box::new(process_resident_bytes.clone()))?;
        registry.register(Box::new(process_cpu_time.clone()))?;
        registry.register(Box::new(network_rx_rate.clone()))?;
        registry.register(Box::new(network_tx_rate.clone()))?;
        registry.register(Box::new(disk_read_rate.clone()))?;
        registry.register(Box::new(disk_write_rate.clone()))?;
        registry.register(Box::new(filesystem_size.clone()))?;
        registry.register(Box::new(filesystem_used.clone()))?;
        registry.register(Box::new(filesystem_used_percent.clone()))?;

        Ok(Self {
            cpu_usage,
            cpu_core_usage,
            memory_total,
            memory_used,
            memory_used_percent,
            uptime,
            process_cpu_percent,
            process_memory_percent,
            process_resident_bytes,
            process_cpu_time,
            network_rx_rate,
            network_tx_rate,
            disk_read_rate,
            disk_write_rate,
            filesystem_size,
            filesystem_used,
            filesystem_used_percent,
        })
    }

    /// Resets all labeled metrics to clear stale series.
    pub fn reset(&self) {
        self.cpu_core_usage.reset();
        self.process_cpu_percent.reset();
        self.process_memory_percent.reset();
        self.process_resident_bytes.reset();
        self.process_cpu_time.reset();
        self.network_rx_rate.reset();
        self.network_tx_rate.reset();
        self.disk_read_rate.reset();
        self.disk_write_rate.reset();
        self.filesystem_size.reset();
        self.filesystem_used.reset();
        self.filesystem_used_percent.reset();
    }

    /// Replaces every gauge value with the contents of `snapshot`.
    pub fn observe(&self, snapshot: &MetricsSnapshot) {
        self.reset();

        self.cpu_usage.set(snapshot.cpu_usage);
        for (core, usage) in snapshot.cpu_per_core_usage.iter().enumerate() {
            self.cpu_core_usage
                .with_label_values(&[core.to_string().as_str()])
                .set(*usage);
        }
        self.memory_total.set(snapshot.mem_total as f64);
        self.memory_used.set(snapshot.mem_used as f64);
        self.memory_used_percent.set(snapshot.mem_used_percent);
        self.uptime.set(snapshot.uptime as f64);

        for p in &snapshot.processes {
            let pid = p.pid.to_string();
            let labels = [pid.as_str(), p.name.as_str(), p.username.as_str()];
            self.process_cpu_percent.with_label_values(&labels).set(p.cpu);
            self.process_memory_percent
                .with_label_values(&labels)
                .set(f64::from(p.memory));
            self.process_resident_bytes
                .with_label_values(&labels)
                .set(p.res as f64);
            self.process_cpu_time.with_label_values(&labels).set(p.cpu_time);
        }

        for n in &snapshot.network {
            self.network_rx_rate
                .with_label_values(&[n.name.as_str()])
                .set(n.rx_bytes_per_sec);
            self.network_tx_rate
                .with_label_values(&[n.name.as_str()])
                .set(n.tx_bytes_per_sec);
        }

        for d in &snapshot.disk_io {
            self.disk_read_rate
                .with_label_values(&[d.device.as_str()])
                .set(d.read_bytes_per_sec);
            self.disk_write_rate
                .with_label_values(&[d.device.as_str()])
                .set(d.write_bytes_per_sec);
        }

        for fs in &snapshot.filesystems {
            let labels = [fs.device.as_str(), fs.mountpoint.as_str(), fs.fstype.as_str()];
            self.filesystem_size.with_label_values(&labels).set(fs.total as f64);
            self.filesystem_used.with_label_values(&labels).set(fs.used as f64);
            self.filesystem_used_percent
                .with_label_values(&labels)
                .set(fs.used_perc);
        }
    }
}
