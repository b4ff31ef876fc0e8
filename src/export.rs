//! CSV export sink.
//!
//! Appends one summary row per snapshot. Rate columns are per-second sums
//! across all block devices and network interfaces.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::cache::MetricsCache;
use crate::snapshot::MetricsSnapshot;

pub const CSV_HEADER: [&str; 9] = [
    "timestamp",
    "cpu_usage_total",
    "mem_used_percent",
    "mem_used_bytes",
    "mem_total_bytes",
    "disk_read_bytes",
    "disk_write_bytes",
    "net_bytes_sent",
    "net_bytes_recv",
];

/// Writes snapshot rows to a CSV file.
pub struct CsvExporter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvExporter {
    /// Opens `path` for appending. The header is written only when the file
    /// is new or empty.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_empty = file.metadata()?.len() == 0;
        let mut writer = BufWriter::new(file);
        if is_empty {
            writeln!(writer, "{}", CSV_HEADER.join(","))?;
            writer.flush()?;
        }
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends the row for `snapshot`, stamped with `at`.
    pub fn write(&mut self, snapshot: &MetricsSnapshot, at: DateTime<Utc>) -> std::io::Result<()> {
        writeln!(self.writer, "{}", csv_row(snapshot, at))?;
        self.writer.flush()
    }
}

/// Formats one CSV row.
pub fn csv_row(s: &MetricsSnapshot, at: DateTime<Utc>) -> String {
    let disk_read: f64 = s.disk_io.iter().map(|d| d.read_bytes_per_sec).sum();
    let disk_write: f64 = s.disk_io.iter().map(|d| d.write_bytes_per_sec).sum();
    let net_sent: f64 = s.network.iter().map(|n| n.tx_bytes_per_sec).sum();
    let net_recv: f64 = s.network.iter().map(|n| n.rx_bytes_per_sec).sum();

    format!(
        "{},{:.2},{:.2},{},{},{:.0},{:.0},{:.0},{:.0}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        s.cpu_usage,
        s.mem_used_percent,
        s.mem_used,
        s.mem_total,
        disk_read,
        disk_write,
        net_sent,
        net_recv
    )
}

/// Appends a row every `interval` until the task is aborted.
///
/// Reads go through the cache, so exports never add passes beyond what the
/// TTL allows. Failures are logged and the loop continues.
pub async fn run_csv_export(cache: Arc<MetricsCache>, mut exporter: CsvExporter, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    info!(
        "CSV export to {} every {}s",
        exporter.path().display(),
        interval.as_secs()
    );

    loop {
        ticker.tick().await;
        match cache.get().await {
            Ok(snapshot) => {
                if let Err(e) = exporter.write(&snapshot, Utc::now()) {
                    error!("CSV export to {} failed: {}", exporter.path().display(), e);
                } else {
                    debug!("CSV row written");
                }
            }
            Err(e) => error!("CSV export skipped, metrics unavailable: {}", e),
        }
    }
}
