//! Configuration file handling.
//!
//! Every key is optional; `None` means "use the default". Files may be YAML,
//! JSON or TOML, picked by extension (YAML when unknown).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::aggregator::AggregatorSettings;
use crate::sampler::{ProcessLimit, DEFAULT_PROCESS_LIMIT};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CACHE_TTL_MS: u64 = 2000;
pub const DEFAULT_CPU_SAMPLE_WINDOW_MS: u64 = 1000;
pub const DEFAULT_CSV_EXPORT_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_PROC_ROOT: &str = "/proc";
pub const DEFAULT_ETC_ROOT: &str = "/etc";

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Locations searched when no config file is given explicitly.
pub const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/hostmon/hostmon.yaml",
    "/etc/hostmon/hostmon.yml",
    "/etc/hostmon/hostmon.json",
    "./hostmon.yaml",
    "./hostmon.yml",
    "./hostmon.json",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Collection
    pub cache_ttl_ms: Option<u64>,
    pub cpu_sample_window_ms: Option<u64>,
    pub max_processes: Option<usize>,
    #[serde(alias = "all-processes")]
    pub all_processes: Option<bool>,
    pub parallelism: Option<usize>,
    pub proc_root: Option<PathBuf>,
    pub etc_root: Option<PathBuf>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_metrics: Option<bool>,

    // CSV export
    pub csv_export_path: Option<PathBuf>,
    pub csv_export_interval_secs: Option<u64>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            cache_ttl_ms: Some(DEFAULT_CACHE_TTL_MS),
            cpu_sample_window_ms: Some(DEFAULT_CPU_SAMPLE_WINDOW_MS),
            max_processes: Some(DEFAULT_PROCESS_LIMIT),
            all_processes: Some(false),
            parallelism: None,
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            etc_root: Some(PathBuf::from(DEFAULT_ETC_ROOT)),
            enable_health: Some(true),
            enable_metrics: Some(true),
            csv_export_path: None,
            csv_export_interval_secs: Some(DEFAULT_CSV_EXPORT_INTERVAL_SECS),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms.unwrap_or(DEFAULT_CACHE_TTL_MS))
    }

    pub fn cpu_sample_window(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_window_ms.unwrap_or(DEFAULT_CPU_SAMPLE_WINDOW_MS))
    }

    pub fn process_limit(&self) -> ProcessLimit {
        if self.all_processes.unwrap_or(false) {
            ProcessLimit::Unlimited
        } else {
            ProcessLimit::Top(self.max_processes.unwrap_or(DEFAULT_PROCESS_LIMIT))
        }
    }

    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            cpu_sample_window: self.cpu_sample_window(),
            process_limit: self.process_limit(),
        }
    }

    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }

    pub fn etc_root(&self) -> PathBuf {
        self.etc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ETC_ROOT))
    }

    pub fn csv_export_interval(&self) -> Duration {
        Duration::from_secs(
            self.csv_export_interval_secs
                .unwrap_or(DEFAULT_CSV_EXPORT_INTERVAL_SECS),
        )
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.cache_ttl_ms == Some(0) {
        return Err("cache_ttl_ms must be greater than 0".into());
    }
    if cfg.cpu_sample_window_ms == Some(0) {
        return Err("cpu_sample_window_ms must be greater than 0".into());
    }
    if cfg.csv_export_path.is_some() && cfg.csv_export_interval_secs == Some(0) {
        return Err("csv_export_interval_secs must be greater than 0".into());
    }
    if let Some(level) = cfg.log_level.as_deref() {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}', expected one of: {}",
                level,
                LOG_LEVELS.join(", ")
            )
            .into());
        }
    }
    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }
    Ok(())
}

/// Loads a config file, or the first existing default location when `path`
/// is `None`. Returns the defaults when no file exists.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        },
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content, path.extension().and_then(|s| s.to_str()))?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config text in the format named by `extension`.
pub fn parse_config(content: &str, extension: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match extension {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = Config::default();
        assert!(validate_effective_config(&cfg).is_ok());
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(2));
        assert_eq!(cfg.process_limit(), ProcessLimit::Top(20));
    }

    #[test]
    fn test_parse_yaml_partial() {
        let cfg = parse_config("port: 9000\ncache_ttl_ms: 500\n", Some("yaml")).unwrap();
        assert_eq!(cfg.port(), 9000);
        assert_eq!(cfg.cache_ttl(), Duration::from_millis(500));
        // missing keys fall back to defaults through the accessors
        assert_eq!(cfg.bind_addr(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.cpu_sample_window(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_json_and_toml() {
        let cfg = parse_config(r#"{"max_processes": 5}"#, Some("json")).unwrap();
        assert_eq!(cfg.process_limit(), ProcessLimit::Top(5));

        let cfg = parse_config("all_processes = true\nmax_processes = 5\n", Some("toml")).unwrap();
        assert_eq!(cfg.process_limit(), ProcessLimit::Unlimited);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.cache_ttl_ms = Some(0);
        assert!(validate_effective_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.log_level = Some("loud".into());
        assert!(validate_effective_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.bind = Some("not-an-ip".into());
        assert!(validate_effective_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.csv_export_path = Some(PathBuf::from("/tmp/out.csv"));
        cfg.csv_export_interval_secs = Some(0);
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostmon.yaml");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "port: 9100").unwrap();
        writeln!(f, "proc_root: /host/proc").unwrap();
        drop(f);

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.port(), 9100);
        assert_eq!(cfg.proc_root(), PathBuf::from("/host/proc"));
    }

    #[test]
    fn test_load_config_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.yaml"))).is_err());
    }
}
