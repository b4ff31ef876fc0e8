//! CLI arguments and subcommands for hostmon.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "hostmon",
    about = "Host resource monitor with JSON and Prometheus endpoints",
    long_about = "Host resource monitor with JSON and Prometheus endpoints.\n\n\
                  Samples CPU, memory, the busiest processes, network and disk \
                  throughput and filesystem usage from /proc, and serves the latest \
                  sample from a short-lived cache.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides the config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Serve cached metrics for N milliseconds
    #[arg(long)]
    pub cache_ttl_ms: Option<u64>,

    /// Time between the two CPU counter reads of a pass, in milliseconds
    #[arg(long)]
    pub cpu_sample_window_ms: Option<u64>,

    /// Number of processes to report, ranked by CPU usage
    #[arg(long)]
    pub max_processes: Option<usize>,

    /// Report every process instead of the top N
    #[arg(long)]
    pub all_processes: bool,

    /// Parallel processing threads (0 = auto)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// procfs mount point to read from
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Append a CSV row to this file at a fixed interval
    #[arg(long)]
    pub csv_export: Option<PathBuf>,

    /// Seconds between CSV rows
    #[arg(long)]
    pub csv_interval_secs: Option<u64>,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Disable /metrics endpoint
    #[arg(long)]
    pub disable_metrics: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check {
        /// Check /proc readers
        #[arg(long)]
        proc: bool,

        /// Check filesystem usage readers
        #[arg(long)]
        disks: bool,

        /// Check all system requirements
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Test metrics collection
    Test {
        /// Number of test iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Show detailed process information
        #[arg(long)]
        verbose: bool,

        /// Output format of the summary
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },
}
