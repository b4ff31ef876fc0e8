//! Output structures of a collection pass.
//!
//! Field names here are what `/stats` serializes and what the CSV exporter
//! reads, so renaming them is a breaking change for consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One complete sample of the host. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub cpu_usage: f64,
    pub cpu_per_core_usage: Vec<f64>,
    pub mem_total: u64,
    pub mem_used: u64,
    pub mem_used_percent: f64,
    pub processes: Vec<ProcessInfo>,
    pub cpu_info: Vec<CpuInfo>,
    pub network: Vec<NetworkRate>,
    pub disk_io: Vec<DiskIoRate>,
    pub filesystems: Vec<FilesystemUsage>,
    pub os: OsInfo,
    pub uptime: u64,
    pub collected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<Degradation>,
}

/// Per-process sample.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub username: String,
    pub cpu: f64,
    pub memory: f32,
    pub virt: u64,
    pub res: u64,
    pub cpu_time: f64,
    pub threads: u32,
    pub status: String,
    pub cmdline: String,
    pub nice: i32,
    /// Fields whose query failed and hold their zero value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<ProcessField>,
}

impl ProcessInfo {
    pub fn is_degraded(&self) -> bool {
        !self.missing.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessField {
    Name,
    Username,
    CpuPercent,
    MemoryPercent,
    VirtualMemory,
    ResidentMemory,
    CpuTime,
    Threads,
    Status,
    Cmdline,
    Nice,
}

/// CPU package descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    pub model: String,
    pub cores: u32,
    /// Highest reported clock in MHz.
    #[serde(rename = "maxFrequency")]
    pub max_frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: String,
    pub distro: String,
    pub architecture: String,
    pub kernel: String,
    pub hostname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRate {
    pub name: String,
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
    pub rx_speed: f64,
    pub rx_unit: String,
    pub tx_speed: f64,
    pub tx_unit: String,
    pub rx_total: u64,
    pub tx_total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskIoRate {
    pub device: String,
    pub read_bytes_per_sec: f64,
    pub write_bytes_per_sec: f64,
    pub read_total: u64,
    pub write_total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesystemUsage {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_perc: f64,
}

/// A section or entity that was left out of a snapshot because its query failed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Degradation {
    CpuInfo,
    HostInfo,
    ProcessList,
    Network,
    DiskIo,
    Partitions,
    Partition(String),
}

/// Scales a byte rate into a display value and unit (1024 steps).
pub fn scale_rate(bytes_per_sec: f64) -> (f64, &'static str) {
    const UNITS: [&str; 4] = ["B/s", "KB/s", "MB/s", "GB/s"];
    let mut value = bytes_per_sec;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    (value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_rate_units() {
        assert_eq!(scale_rate(0.0), (0.0, "B/s"));
        assert_eq!(scale_rate(512.0), (512.0, "B/s"));
        assert_eq!(scale_rate(2048.0), (2.0, "KB/s"));
        assert_eq!(scale_rate(3.0 * 1024.0 * 1024.0), (3.0, "MB/s"));
        let (v, u) = scale_rate(5.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0);
        assert_eq!(u, "GB/s");
        assert!((v - 5120.0).abs() < 1e-9);
    }

    #[test]
    fn test_process_missing_fields_skipped_when_empty() {
        let p = ProcessInfo {
            pid: 7,
            name: "init".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("missing").is_none());
        assert_eq!(json["pid"], 7);

        let degraded = ProcessInfo {
            missing: vec![ProcessField::Username],
            ..p
        };
        let json = serde_json::to_value(&degraded).unwrap();
        assert_eq!(json["missing"][0], "username");
    }

    #[test]
    fn test_cpu_info_uses_frontend_field_name() {
        let info = CpuInfo {
            model: "Test CPU".into(),
            cores: 4,
            max_frequency: 3600.0,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["maxFrequency"], 3600.0);
    }
}
