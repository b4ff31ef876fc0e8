//! Linux provider reading procfs and /etc.
//!
//! Both roots are configurable so the provider can run against a fixture
//! tree or a host filesystem mounted into a container (e.g. /host/proc).

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use once_cell::sync::OnceCell;
use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock as StdRwLock;
use std::time::Instant;
use tracing::debug;

use super::{MetricsProvider, ProcessHandle};
use crate::error::{ProviderError, ProviderResult};
use crate::snapshot::CpuInfo;
use crate::system::{
    self, CpuTimes, DiskIoCounter, DiskUsage, HostInfo, MemoryStats, NetCounter, Partition, PidStat,
};

/// Last CPU time seen for a PID, for delta-based CPU percent.
#[derive(Clone, Copy, Debug)]
struct CpuEntry {
    cpu_time_seconds: f64,
    starttime: u64,
    last_updated: Instant,
}

/// Reads host metrics from a procfs root and an etc root.
pub struct ProcfsProvider {
    proc_root: PathBuf,
    etc_root: PathBuf,
    clock_ticks: f64,
    page_size: u64,
    /// MemTotal from the latest `memory()` call, in bytes.
    mem_total: AtomicU64,
    users: OnceCell<HashMap<u32, String>>,
    cpu_cache: StdRwLock<HashMap<u32, CpuEntry>>,
}

impl ProcfsProvider {
    pub fn new(proc_root: impl Into<PathBuf>, etc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            etc_root: etc_root.into(),
            clock_ticks: clock_ticks_per_second(),
            page_size: page_size_bytes(),
            mem_total: AtomicU64::new(0),
            users: OnceCell::new(),
            cpu_cache: StdRwLock::new(HashMap::new()),
        }
    }

    /// Provider for the running host (/proc and /etc).
    pub fn host() -> Self {
        Self::new("/proc", "/etc")
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    fn read_proc(&self, rel: &str) -> ProviderResult<String> {
        Ok(fs::read_to_string(self.proc_root.join(rel))?)
    }

    fn uptime_seconds(&self) -> ProviderResult<f64> {
        system::parse_uptime(&self.read_proc("uptime")?)
    }

    fn total_memory(&self) -> ProviderResult<u64> {
        let cached = self.mem_total.load(Ordering::Relaxed);
        if cached > 0 {
            return Ok(cached);
        }
        Ok(self.memory()?.total_bytes)
    }

    fn users(&self) -> &HashMap<u32, String> {
        self.users.get_or_init(|| match fs::read_to_string(self.etc_root.join("passwd")) {
            Ok(content) => system::parse_passwd(&content),
            Err(e) => {
                debug!("Failed to read passwd from {}: {}", self.etc_root.display(), e);
                HashMap::new()
            }
        })
    }

    /// CPU percent from the delta to the previous sample of the same process,
    /// or the lifetime average on first sight.
    fn cpu_percent_for(&self, pid: u32, stat: &PidStat) -> ProviderResult<f64> {
        let now = Instant::now();
        let cpu_time_seconds = (stat.utime + stat.stime) as f64 / self.clock_ticks;

        let previous = {
            let cache = match self.cpu_cache.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            cache.get(&pid).copied()
        };

        let percent = match previous {
            Some(entry) if entry.starttime == stat.starttime => {
                let dt = now.duration_since(entry.last_updated).as_secs_f64();
                let delta_cpu = cpu_time_seconds - entry.cpu_time_seconds;
                if dt > 0.0 && delta_cpu > 0.0 {
                    (delta_cpu / dt) * 100.0
                } else {
                    0.0
                }
            }
            _ => {
                let age = self.uptime_seconds()? - stat.starttime as f64 / self.clock_ticks;
                if age > 0.0 {
                    (cpu_time_seconds / age) * 100.0
                } else {
                    0.0
                }
            }
        };

        let mut cache = match self.cpu_cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.insert(
            pid,
            CpuEntry {
                cpu_time_seconds,
                starttime: stat.starttime,
                last_updated: now,
            },
        );

        Ok(percent)
    }

    fn prune_cpu_cache(&self, live: &[u32]) {
        let live: HashSet<u32> = live.iter().copied().collect();
        let mut cache = match self.cpu_cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.retain(|pid, _| live.contains(pid));
    }
}

impl MetricsProvider for ProcfsProvider {
    fn cpu_times(&self) -> ProviderResult<CpuTimes> {
        system::parse_cpu_times(&self.read_proc("stat")?)
    }

    fn memory(&self) -> ProviderResult<MemoryStats> {
        let mem = system::parse_meminfo(&self.read_proc("meminfo")?)?;
        self.mem_total.store(mem.total_bytes, Ordering::Relaxed);
        Ok(mem)
    }

    fn cpu_info(&self) -> ProviderResult<Vec<CpuInfo>> {
        let info = system::parse_cpuinfo(&self.read_proc("cpuinfo")?);
        if info.is_empty() {
            return Err(ProviderError::Parse("no processors in cpuinfo".into()));
        }
        Ok(info)
    }

    fn host_info(&self) -> ProviderResult<HostInfo> {
        let read_trimmed = |rel: &str| {
            self.read_proc(rel)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        let distro = fs::read_to_string(self.etc_root.join("os-release"))
            .ok()
            .and_then(|content| system::parse_os_release(&content))
            .unwrap_or_default();

        Ok(HostInfo {
            hostname: read_trimmed("sys/kernel/hostname"),
            os_type: read_trimmed("sys/kernel/ostype"),
            kernel: read_trimmed("sys/kernel/osrelease"),
            distro,
            uptime_seconds: self.uptime_seconds()? as u64,
        })
    }

    fn pids(&self) -> ProviderResult<Vec<u32>> {
        let mut pids = Vec::new();
        for entry in fs::read_dir(&self.proc_root)?.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if let Ok(pid) = name.parse::<u32>() {
                pids.push(pid);
            }
        }
        pids.sort_unstable();
        self.prune_cpu_cache(&pids);
        Ok(pids)
    }

    fn open_process<'a>(&'a self, pid: u32) -> ProviderResult<Box<dyn ProcessHandle + 'a>> {
        let dir = self.proc_root.join(pid.to_string());
        let content = fs::read_to_string(dir.join("stat")).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProviderError::NotFound(format!("process {}", pid))
            } else {
                ProviderError::Io(e)
            }
        })?;
        let stat = system::parse_pid_stat(&content)?;
        Ok(Box::new(ProcfsProcess {
            provider: self,
            pid,
            dir,
            stat,
        }))
    }

    fn net_counters(&self) -> ProviderResult<Vec<NetCounter>> {
        Ok(system::parse_net_dev(&self.read_proc("net/dev")?))
    }

    fn disk_io_counters(&self) -> ProviderResult<Vec<DiskIoCounter>> {
        Ok(system::parse_diskstats(&self.read_proc("diskstats")?))
    }

    fn partitions(&self) -> ProviderResult<Vec<Partition>> {
        let nodev = self
            .read_proc("filesystems")
            .map(|content| system::parse_nodev_filesystems(&content))
            .unwrap_or_default();
        Ok(system::parse_mounts(&self.read_proc("mounts")?, &nodev))
    }

    fn disk_usage(&self, partition: &Partition) -> ProviderResult<DiskUsage> {
        statvfs_usage(Path::new(&partition.mountpoint))
    }
}

/// A process whose stat line has been read.
struct ProcfsProcess<'a> {
    provider: &'a ProcfsProvider,
    pid: u32,
    dir: PathBuf,
    stat: PidStat,
}

impl ProcessHandle for ProcfsProcess<'_> {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn name(&self) -> ProviderResult<String> {
        match fs::read_to_string(self.dir.join("comm")) {
            Ok(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ if !self.stat.comm.is_empty() => Ok(self.stat.comm.clone()),
            Ok(_) => Err(ProviderError::NotFound(format!("name of process {}", self.pid))),
            Err(e) => Err(e.into()),
        }
    }

    fn username(&self) -> ProviderResult<String> {
        let status = fs::read_to_string(self.dir.join("status"))?;
        let uid = system::parse_status_uid(&status)
            .ok_or_else(|| ProviderError::Parse(format!("no Uid line for process {}", self.pid)))?;
        Ok(self
            .provider
            .users()
            .get(&uid)
            .cloned()
            .unwrap_or_else(|| uid.to_string()))
    }

    fn cpu_percent(&self) -> ProviderResult<f64> {
        self.provider.cpu_percent_for(self.pid, &self.stat)
    }

    fn memory_percent(&self) -> ProviderResult<f32> {
        let total = self.provider.total_memory()?;
        if total == 0 {
            return Err(ProviderError::Parse("total memory is zero".into()));
        }
        Ok((self.resident_memory()? as f64 / total as f64 * 100.0) as f32)
    }

    fn virtual_memory(&self) -> ProviderResult<u64> {
        Ok(self.stat.vsize)
    }

    fn resident_memory(&self) -> ProviderResult<u64> {
        Ok(self.stat.rss_pages * self.provider.page_size)
    }

    fn cpu_time(&self) -> ProviderResult<f64> {
        Ok((self.stat.utime + self.stat.stime) as f64 / self.provider.clock_ticks)
    }

    fn num_threads(&self) -> ProviderResult<u32> {
        Ok(self.stat.num_threads)
    }

    fn status(&self) -> ProviderResult<String> {
        Ok(system::process_state_name(self.stat.state).to_string())
    }

    fn cmdline(&self) -> ProviderResult<String> {
        Ok(system::parse_cmdline(&fs::read(self.dir.join("cmdline"))?))
    }

    fn nice(&self) -> ProviderResult<i32> {
        Ok(self.stat.nice)
    }
}

/// Kernel clock ticks per second (USER_HZ), 100 if sysconf fails.
fn clock_ticks_per_second() -> f64 {
    // SAFETY: sysconf has no preconditions.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as f64
    } else {
        100.0
    }
}

fn page_size_bytes() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

/// Usage of the filesystem mounted at `path`, with df semantics for the percentage.
fn statvfs_usage(path: &Path) -> ProviderResult<DiskUsage> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| ProviderError::Parse(format!("invalid mountpoint {}: {}", path.display(), e)))?;
    // SAFETY: statvfs is plain old data; zeroed is a valid initial value.
    let mut buf: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: c_path is NUL-terminated and buf is a valid out pointer.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut buf) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    let frsize = buf.f_frsize as u64;
    let total = buf.f_blocks as u64 * frsize;
    let free = buf.f_bavail as u64 * frsize;
    let used = (buf.f_blocks as u64).saturating_sub(buf.f_bfree as u64) * frsize;
    let used_percent = if used + free > 0 {
        used as f64 / (used + free) as f64 * 100.0
    } else {
        0.0
    };

    Ok(DiskUsage {
        total,
        used,
        free,
        used_percent,
    })
}
