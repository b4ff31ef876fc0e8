//! Running statistics about the engine, rendered by the health endpoint.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Clone, Copy, Default)]
struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

#[derive(Default)]
struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Cache and pass counters.
pub struct HealthStats {
    started_at: Instant,
    sampled_processes: Stat,
    pass_duration_seconds: Stat,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    passes_ok: AtomicU64,
    passes_failed: AtomicU64,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            sampled_processes: Stat::default(),
            pass_duration_seconds: Stat::default(),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            passes_ok: AtomicU64::new(0),
            passes_failed: AtomicU64::new(0),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass(&self, sampled_processes: u64, duration_seconds: f64) {
        self.sampled_processes.add_sample(sampled_processes as f64);
        self.pass_duration_seconds.add_sample(duration_seconds);
        self.passes_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.passes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn passes_ok(&self) -> u64 {
        self.passes_ok.load(Ordering::Relaxed)
    }

    pub fn passes_failed(&self) -> u64 {
        self.passes_failed.load(Ordering::Relaxed)
    }

    /// Duration of the most recent successful pass, 0 before the first one.
    pub fn last_pass_seconds(&self) -> f64 {
        self.pass_duration_seconds.snapshot().0
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn render_table(&self) -> String {
        let (sp_cur, sp_avg, sp_max, sp_min, _sp_count) = self.sampled_processes.snapshot();
        let (pd_cur, pd_avg, pd_max, pd_min, _pd_count) = self.pass_duration_seconds.snapshot();

        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "metric",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out, "{}", "-".repeat(left_col + 3 + (col_w + 3) * 4)).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "sampled processes",
            format!("{:.0}", sp_cur),
            format!("{:.1}", sp_avg),
            format!("{:.0}", sp_max),
            format!("{:.0}", sp_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "pass duration (s)",
            format!("{:.3}", pd_cur),
            format!("{:.3}", pd_avg),
            format!("{:.3}", pd_max),
            format!("{:.3}", pd_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "successful passes: {}", self.passes_ok()).ok();
        writeln!(out, "failed passes:     {}", self.passes_failed()).ok();
        writeln!(out, "cache hits:        {}", self.cache_hits()).ok();
        writeln!(out, "cache misses:      {}", self.cache_misses()).ok();
        writeln!(out, "uptime (s):        {}", self.uptime_seconds()).ok();

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stat_tracks_min_max_avg() {
        let mut s = RunningStat::default();
        s.add(2.0);
        s.add(4.0);
        s.add(0.0);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 4.0);
        assert_eq!(s.last, 0.0);
        assert!((s.avg() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_render_table_lists_counters() {
        let stats = HealthStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_pass(120, 1.25);
        stats.record_failure();

        let table = stats.render_table();
        assert!(table.contains("sampled processes"));
        assert!(table.contains("successful passes: 1"));
        assert!(table.contains("failed passes:     1"));
        assert!(table.contains("cache hits:        1"));
        assert_eq!(stats.last_pass_seconds(), 1.25);
    }
}
