//! `config` subcommand: writes a default configuration file.

use anyhow::Result;
use hostmon::config::Config;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;

/// Serializes a config in the requested format.
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String> {
    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(content)
}

/// Generates configuration files
pub fn command_config(output: Option<PathBuf>, format: ConfigFormat, commented: bool) -> Result<()> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("hostmon.yaml"));

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# hostmon Configuration
# ======================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 8080                   # HTTP port
#
# Collection
# ----------
# cache_ttl_ms: 2000           # Serve a snapshot for this long before a new pass
# cpu_sample_window_ms: 1000   # Time between the two CPU counter reads
# max_processes: 20            # Processes reported, ranked by CPU usage
# all_processes: false         # Report every process instead
# parallelism: null            # Process sampling threads (null = auto)
# proc_root: "/proc"           # procfs mount (e.g. /host/proc in a container)
# etc_root: "/etc"             # Source of passwd and os-release
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
# enable_metrics: true         # Enable /metrics endpoint
#
# CSV Export
# ----------
# csv_export_path: null        # Append one row per interval to this file
# csv_export_interval_secs: 5  # Seconds between rows
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostmon::config::parse_config;

    #[test]
    fn test_rendered_config_parses_back() {
        let config = Config::default();
        for (format, ext) in [
            (ConfigFormat::Yaml, "yaml"),
            (ConfigFormat::Json, "json"),
            (ConfigFormat::Toml, "toml"),
        ] {
            let text = render_config(&config, format).unwrap();
            assert_eq!(parse_config(&text, Some(ext)).unwrap(), config);
        }
    }

    #[test]
    fn test_commented_yaml_still_parses() {
        let yaml = add_config_comments(render_config(&Config::default(), ConfigFormat::Yaml).unwrap());
        assert!(yaml.starts_with("# hostmon Configuration"));
        assert_eq!(parse_config(&yaml, None).unwrap(), Config::default());
    }
}
