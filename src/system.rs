//! Parsers for procfs and /etc files.
//!
//! Every function here works on file contents rather than paths so the
//! provider can read from any root and tests can feed literal strings.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};

use crate::error::{ProviderError, ProviderResult};
use crate::snapshot::CpuInfo;

/// Cumulative CPU time counters from one `cpu` line of /proc/stat, in ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    /// Calculate total CPU time (all fields).
    pub fn total(&self) -> u64 {
        self.user + self.nice + self.system + self.idle + self.iowait + self.irq + self.softirq + self.steal
    }

    /// Calculate non-active time (idle + iowait).
    /// This includes both true idle time and time spent waiting for I/O operations.
    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }

    /// Busy share of the interval between `previous` and `self`, in percent.
    ///
    /// Returns 0.0 when no ticks elapsed or the counters went backwards.
    pub fn usage_percent_since(&self, previous: &CpuStat) -> f64 {
        let delta_total = self.total().saturating_sub(previous.total());
        let delta_idle = self.idle_total().saturating_sub(previous.idle_total());
        if delta_total == 0 {
            return 0.0;
        }
        let busy = delta_total.saturating_sub(delta_idle);
        (busy as f64 / delta_total as f64) * 100.0
    }
}

/// Aggregate and per-core CPU counters. `per_core[i]` is `cpu{i}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuTimes {
    pub total: CpuStat,
    pub per_core: Vec<CpuStat>,
}

/// System memory statistics in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub free_bytes: u64,
}

impl MemoryStats {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes() as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Cumulative byte counters of one network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetCounter {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Cumulative byte counters of one block device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskIoCounter {
    pub device: String,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// A mounted filesystem from the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
}

/// Capacity of a mounted filesystem in bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
}

/// Host descriptors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostInfo {
    pub hostname: String,
    pub os_type: String,
    pub kernel: String,
    pub distro: String,
    pub uptime_seconds: u64,
}

/// Fields of /proc/<pid>/stat used by the sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidStat {
    pub comm: String,
    pub state: char,
    pub utime: u64,
    pub stime: u64,
    pub nice: i32,
    pub num_threads: u32,
    pub starttime: u64,
    pub vsize: u64,
    pub rss_pages: u64,
}

/// Parses /proc/stat into aggregate and per-core counters.
pub fn parse_cpu_times(content: &str) -> ProviderResult<CpuTimes> {
    let mut total = None;
    let mut cores: Vec<(usize, CpuStat)> = Vec::new();

    for line in content.lines() {
        if !line.starts_with("cpu") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 8 {
            continue;
        }

        let field = |i: usize| parts.get(i).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
        let stat = CpuStat {
            user: field(1),
            nice: field(2),
            system: field(3),
            idle: field(4),
            iowait: field(5),
            irq: field(6),
            softirq: field(7),
            steal: field(8),
        };

        match parts[0].strip_prefix("cpu") {
            Some("") => total = Some(stat),
            Some(idx) => {
                if let Ok(idx) = idx.parse::<usize>() {
                    cores.push((idx, stat));
                }
            }
            None => {}
        }
    }

    let total = total.ok_or_else(|| ProviderError::Parse("no aggregate cpu line in /proc/stat".into()))?;
    cores.sort_by_key(|(idx, _)| *idx);

    Ok(CpuTimes {
        total,
        per_core: cores.into_iter().map(|(_, s)| s).collect(),
    })
}

fn meminfo_kb(line: &str) -> Option<u64> {
    line.split_whitespace().nth(1)?.parse::<u64>().ok()
}

/// Parses /proc/meminfo.
///
/// Falls back to MemFree + Buffers + Cached on kernels without MemAvailable.
pub fn parse_meminfo(content: &str) -> ProviderResult<MemoryStats> {
    let mut total = None;
    let mut available = None;
    let mut free = None;
    let mut buffers = 0;
    let mut cached = 0;

    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            total = meminfo_kb(line);
        } else if line.starts_with("MemAvailable:") {
            available = meminfo_kb(line);
        } else if line.starts_with("MemFree:") {
            free = meminfo_kb(line);
        } else if line.starts_with("Buffers:") {
            buffers = meminfo_kb(line).unwrap_or(0);
        } else if line.starts_with("Cached:") {
            cached = meminfo_kb(line).unwrap_or(0);
        }
    }

    let total = total.ok_or_else(|| ProviderError::Parse("MemTotal missing from /proc/meminfo".into()))?;
    let free = free.unwrap_or(0);
    let available = available.unwrap_or(free + buffers + cached).min(total);

    Ok(MemoryStats {
        total_bytes: total * 1024,
        available_bytes: available * 1024,
        free_bytes: free * 1024,
    })
}

/// Parses the first field of /proc/uptime (seconds since boot).
pub fn parse_uptime(content: &str) -> ProviderResult<f64> {
    content
        .split_whitespace()
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| ProviderError::Parse(format!("invalid /proc/uptime: {:?}", content.trim())))
}

/// Parses /proc/net/dev. Lines that do not carry counters are skipped.
pub fn parse_net_dev(content: &str) -> Vec<NetCounter> {
    let mut out = Vec::new();
    for line in content.lines() {
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        let fields: Vec<u64> = rest
            .split_whitespace()
            .filter_map(|v| v.parse::<u64>().ok())
            .collect();
        // 8 receive columns followed by 8 transmit columns
        if fields.len() < 16 {
            continue;
        }
        out.push(NetCounter {
            name: name.trim().to_string(),
            rx_bytes: fields[0],
            tx_bytes: fields[8],
        });
    }
    out
}

/// Parses /proc/diskstats into byte counters (sectors are 512 bytes).
///
/// Loop and ram devices are skipped.
pub fn parse_diskstats(content: &str) -> Vec<DiskIoCounter> {
    const SECTOR_SIZE: u64 = 512;
    let mut out = Vec::new();
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 10 {
            continue;
        }
        let device = parts[2];
        if device.starts_with("loop") || device.starts_with("ram") {
            continue;
        }
        let sectors_read = parts[5].parse::<u64>().unwrap_or(0);
        let sectors_written = parts[9].parse::<u64>().unwrap_or(0);
        out.push(DiskIoCounter {
            device: device.to_string(),
            read_bytes: sectors_read * SECTOR_SIZE,
            write_bytes: sectors_written * SECTOR_SIZE,
        });
    }
    out
}

/// Returns the filesystem types marked `nodev` in /proc/filesystems.
pub fn parse_nodev_filesystems(content: &str) -> HashSet<String> {
    content
        .lines()
        .filter_map(|line| line.strip_prefix("nodev"))
        .map(|fs| fs.trim().to_string())
        .filter(|fs| !fs.is_empty())
        .collect()
}

/// Decodes the octal escapes (`\040` for space etc.) used in mount tables.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let v = digits.iter().fold(0u16, |acc, b| acc * 8 + u16::from(b - b'0'));
                if let Ok(v) = u8::try_from(v) {
                    out.push(v);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parses a mount table (/proc/mounts), keeping only device-backed filesystems.
///
/// Filesystem types listed in `nodev` are dropped, as are repeated mounts
/// of the same mountpoint (the first one wins).
pub fn parse_mounts(content: &str, nodev: &HashSet<String>) -> Vec<Partition> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }
        let fstype = parts[2];
        if nodev.contains(fstype) {
            continue;
        }
        let mountpoint = unescape_mount_field(parts[1]);
        if !seen.insert(mountpoint.clone()) {
            continue;
        }
        out.push(Partition {
            device: unescape_mount_field(parts[0]),
            mountpoint,
            fstype: fstype.to_string(),
        });
    }
    out
}

/// Parses /proc/cpuinfo into one descriptor per physical package.
///
/// `cores` counts the logical processors of the package. Machines that do not
/// report `physical id` yield a single descriptor.
pub fn parse_cpuinfo(content: &str) -> Vec<CpuInfo> {
    // (physical id) -> (model, logical count, max MHz), in first-seen order
    let mut packages: Vec<(String, CpuInfo)> = Vec::new();

    for block in content.split("\n\n") {
        let mut physical_id = String::from("0");
        let mut model = String::new();
        let mut mhz = 0.0f64;
        let mut is_processor = false;

        for line in block.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "processor" => is_processor = true,
                "physical id" => physical_id = value.to_string(),
                "model name" | "Model" | "cpu model" => model = value.to_string(),
                "cpu MHz" => mhz = value.parse().unwrap_or(0.0),
                _ => {}
            }
        }

        if !is_processor {
            continue;
        }

        match packages.iter_mut().find(|(id, _)| *id == physical_id) {
            Some((_, info)) => {
                info.cores += 1;
                if mhz > info.max_frequency {
                    info.max_frequency = mhz;
                }
                if info.model.is_empty() {
                    info.model = model;
                }
            }
            None => packages.push((
                physical_id,
                CpuInfo {
                    model,
                    cores: 1,
                    max_frequency: mhz,
                },
            )),
        }
    }

    packages.into_iter().map(|(_, info)| info).collect()
}

/// Returns PRETTY_NAME (or NAME) from an os-release file.
pub fn parse_os_release(content: &str) -> Option<String> {
    let mut name = None;
    for line in content.lines() {
        if let Some(v) = line.strip_prefix("PRETTY_NAME=") {
            return Some(v.trim().trim_matches('"').to_string());
        }
        if let Some(v) = line.strip_prefix("NAME=") {
            name = Some(v.trim().trim_matches('"').to_string());
        }
    }
    name
}

/// Parses /proc/<pid>/stat.
///
/// The command name is enclosed in parentheses and may itself contain spaces
/// or parentheses, so the remaining fields are split after the last `)`.
pub fn parse_pid_stat(content: &str) -> ProviderResult<PidStat> {
    let open = content
        .find('(')
        .ok_or_else(|| ProviderError::Parse("missing '(' in stat".into()))?;
    let close = content
        .rfind(')')
        .ok_or_else(|| ProviderError::Parse("missing ')' in stat".into()))?;
    if close < open {
        return Err(ProviderError::Parse("malformed comm in stat".into()));
    }

    let comm = content[open + 1..close].to_string();
    // fields[0] is field 3 (state) of proc(5)
    let fields: Vec<&str> = content[close + 1..].split_whitespace().collect();
    if fields.len() < 22 {
        return Err(ProviderError::Parse(format!(
            "stat has {} fields after comm, expected at least 22",
            fields.len()
        )));
    }

    let num = |i: usize| -> ProviderResult<u64> {
        fields[i]
            .parse::<u64>()
            .map_err(|e| ProviderError::Parse(format!("stat field {}: {}", i + 3, e)))
    };

    Ok(PidStat {
        comm,
        state: fields[0].chars().next().unwrap_or('?'),
        utime: num(11)?,
        stime: num(12)?,
        nice: fields[16]
            .parse::<i32>()
            .map_err(|e| ProviderError::Parse(format!("stat nice: {}", e)))?,
        num_threads: num(17)? as u32,
        starttime: num(19)?,
        vsize: num(20)?,
        rss_pages: fields[21].parse::<i64>().unwrap_or(0).max(0) as u64,
    })
}

/// Returns the real UID from /proc/<pid>/status.
pub fn parse_status_uid(content: &str) -> Option<u32> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

/// Parses /etc/passwd into a UID → user name table.
pub fn parse_passwd(content: &str) -> HashMap<u32, String> {
    let mut users = HashMap::new();
    for line in content.lines() {
        if line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() < 3 {
            continue;
        }
        if let Ok(uid) = parts[2].parse::<u32>() {
            users.entry(uid).or_insert_with(|| parts[0].to_string());
        }
    }
    users
}

/// Joins a NUL-separated /proc/<pid>/cmdline into a single line.
pub fn parse_cmdline(raw: &[u8]) -> String {
    raw.split(|&b| b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps the state letter of /proc/<pid>/stat to a readable status.
pub fn process_state_name(state: char) -> &'static str {
    match state {
        'R' => "running",
        'S' => "sleep",
        'D' => "disk-sleep",
        'T' | 't' => "stop",
        'Z' => "zombie",
        'X' | 'x' => "dead",
        'I' => "idle",
        'W' => "wait",
        'P' => "parked",
        _ => "unknown",
    }
}
