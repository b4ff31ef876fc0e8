//! Documentation endpoint handler.

use axum::{http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;

/// Handler for the /doc endpoint.
#[instrument]
pub async fn doc_handler() -> impl IntoResponse {
    debug!("Processing /doc request");

    let version = env!("CARGO_PKG_VERSION");
    let doc = format!(
        r#"HOSTMON - DOCUMENTATION
=======================

VERSION: {}
DESCRIPTION: Host resource monitor with JSON and Prometheus endpoints

HTTP ENDPOINTS
--------------
GET /stats       - Latest snapshot as JSON
GET /metrics     - Prometheus metrics endpoint
GET /health      - Health check with internal statistics (plain text)
GET /doc         - This documentation (plain text)

Every read is served from a cache. A new collection pass runs only when the
cached snapshot is older than cache_ttl_ms, and concurrent readers share it.

SNAPSHOT FIELDS (/stats)
------------------------
cpu_usage, cpu_per_core_usage    - CPU busy percent over cpu_sample_window_ms
mem_total, mem_used              - Bytes; used = total - available
processes                        - Top processes by CPU (pid, name, username,
                                   cpu, memory, virt, res, cpu_time, threads,
                                   status, cmdline, nice, missing)
network                          - Per interface rx/tx rates (bytes/s, scaled)
disk_io                          - Per block device read/write rates
filesystems                      - Per mount point usage
cpu_info, os, uptime             - Static host information
degraded                         - Sections that could not be read this pass

AVAILABLE METRICS
-----------------
hostmon_cpu_usage_percent                  - Overall CPU usage
hostmon_cpu_core_usage_percent             - CPU usage per core
hostmon_memory_{{total,used}}_bytes          - Physical memory
hostmon_process_cpu_percent                - CPU usage per top process
hostmon_process_resident_bytes             - RSS per top process
hostmon_network_{{receive,transmit}}_bytes_per_second
hostmon_disk_{{read,write}}_bytes_per_second
hostmon_filesystem_{{size,used}}_bytes
hostmon_pass_duration_seconds              - Duration of the last pass
hostmon_pass_success                       - 1 if the last pass succeeded

CONFIGURATION
-------------
Config file locations (in order):
1. CLI specified: -c /path/to/config.yaml
2. System config: /etc/hostmon/hostmon.{{yaml,yml,json}}
3. Current directory: ./hostmon.{{yaml,yml,json}}

Key configuration options:
- port: HTTP listen port (default: 8080)
- bind: Bind address (default: 0.0.0.0)
- cache_ttl_ms: Snapshot freshness window (default: 2000)
- cpu_sample_window_ms: CPU observation window (default: 1000)
- max_processes: Processes reported (default: 20)
- all_processes: Report every process (default: false)
- csv_export_path: Append CSV rows to this file (default: disabled)
- csv_export_interval_secs: Seconds between CSV rows (default: 5)

CLI COMMANDS
------------
hostmon                          - Start the monitor
hostmon check --all              - Validate system requirements
hostmon config -o hostmon.yaml   - Generate config file
hostmon test -n 3                - Test metrics collection
hostmon --help                   - Show all CLI options

{}
"#,
        version, FOOTER_TEXT
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        doc,
    )
}
