//! `check` subcommand: probes every provider reader once.

use anyhow::{anyhow, Result};
use hostmon::config::{validate_effective_config, Config};
use hostmon::provider::{MetricsProvider, ProcfsProvider};
use std::fmt::Display;

fn report<T, E: Display>(label: &str, result: Result<T, E>, ok: impl FnOnce(&T) -> String) -> bool {
    match result {
        Ok(value) => {
            println!("   ✅ {}: {}", label, ok(&value));
            true
        }
        Err(e) => {
            println!("   ❌ {}: {}", label, e);
            false
        }
    }
}

/// Validates configuration and the readers the monitor depends on.
pub fn command_check(proc: bool, disks: bool, all: bool, config: &Config) -> Result<()> {
    println!("🔍 hostmon - System Check");
    println!("=========================");

    let provider = ProcfsProvider::new(config.proc_root(), config.etc_root());
    let mut all_ok = true;

    if proc || all || !disks {
        println!("\n📁 Checking {} readers...", provider.proc_root().display());
        all_ok &= report("CPU counters", provider.cpu_times(), |t| {
            format!("{} cores", t.per_core.len())
        });
        all_ok &= report("memory", provider.memory(), |m| {
            format!("{} MB total", m.total_bytes / 1024 / 1024)
        });
        all_ok &= report("cpu info", provider.cpu_info(), |c| {
            format!("{} package(s)", c.len())
        });
        all_ok &= report("host info", provider.host_info(), |h| {
            format!("{} ({})", h.hostname, h.kernel)
        });
        all_ok &= report("network counters", provider.net_counters(), |n| {
            format!("{} interfaces", n.len())
        });
        all_ok &= report("disk I/O counters", provider.disk_io_counters(), |d| {
            format!("{} devices", d.len())
        });

        match provider.pids() {
            Ok(pids) => {
                println!("   ✅ process list: {} processes", pids.len());
                let own = std::process::id();
                all_ok &= report(
                    "own process",
                    provider.open_process(own).and_then(|p| p.name()),
                    |name| name.clone(),
                );
            }
            Err(e) => {
                println!("   ❌ process list: {}", e);
                all_ok = false;
            }
        }
    }

    if disks || all {
        println!("\n💾 Checking filesystem usage...");
        match provider.partitions() {
            Ok(partitions) => {
                println!("   ✅ {} mounted filesystems", partitions.len());
                for partition in &partitions {
                    // unreadable mounts are skipped at runtime, so they only warn here
                    match provider.disk_usage(partition) {
                        Ok(usage) => println!(
                            "   ✅ {} ({}): {:.1}% used",
                            partition.mountpoint, partition.fstype, usage.used_percent
                        ),
                        Err(e) => println!("   ⚠️  {}: {}", partition.mountpoint, e),
                    }
                }
            }
            Err(e) => {
                println!("   ❌ partitions: {}", e);
                all_ok = false;
            }
        }
    }

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review the output above");
        Err(anyhow!("system check failed"))
    }
}
