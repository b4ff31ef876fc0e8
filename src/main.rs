//! hostmon binary: HTTP server, CSV export and CLI subcommands around the
//! metrics engine in the library crate.

use axum::{routing::get, Router};
use clap::Parser;
use hostmon::aggregator::Aggregator;
use hostmon::cache::MetricsCache;
use hostmon::config::{load_config, validate_effective_config, Config};
use hostmon::export::{run_csv_export, CsvExporter};
use hostmon::metrics::HostMetrics;
use hostmon::provider::ProcfsProvider;
use prometheus::{Gauge, Registry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};

mod cli;
mod commands;
mod handlers;
mod state;

use cli::{Args, Commands, ConfigFormat};
use commands::{command_check, command_config, command_test};
use handlers::{doc_handler, health_handler, metrics_handler, stats_handler};
use state::AppState;

/// Merges CLI overrides over the config file (or defaults).
fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    if args.cache_ttl_ms.is_some() {
        config.cache_ttl_ms = args.cache_ttl_ms;
    }
    if args.cpu_sample_window_ms.is_some() {
        config.cpu_sample_window_ms = args.cpu_sample_window_ms;
    }
    if args.max_processes.is_some() {
        config.max_processes = args.max_processes;
    }
    if args.all_processes {
        config.all_processes = Some(true);
    }
    if args.parallelism.is_some() {
        config.parallelism = args.parallelism;
    }
    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }

    if let Some(path) = &args.csv_export {
        config.csv_export_path = Some(path.clone());
    }
    if args.csv_interval_secs.is_some() {
        config.csv_export_interval_secs = args.csv_interval_secs;
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_metrics {
        config.enable_metrics = Some(false);
    }

    Ok(config)
}

/// Shows configuration in requested format
fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = commands::config::render_config(config, format)?;
    println!("{output}");
    Ok(())
}

/// Initializes tracing logging subsystem with configured log level
fn setup_logging(config: &Config) {
    let level = config.log_level.as_deref().unwrap_or("info");
    let filter = match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::OFF,
        "error" => LevelFilter::ERROR,
        "warn" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {}", level);
}

/// Resolves when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    let config = resolve_config(&args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    setup_logging(&config);

    // Configure parallel processing thread pool if specified
    if let Some(threads) = config.parallelism {
        if threads > 0 {
            if let Err(e) = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
            {
                error!("Failed to set rayon thread pool: {}", e);
            } else {
                debug!("Rayon thread pool configured with {} threads", threads);
            }
        }
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        let result = match command {
            Commands::Check { proc, disks, all } => command_check(*proc, *disks, *all, &config),
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), *format, *commented),
            Commands::Test {
                iterations,
                verbose,
                format,
            } => command_test(*iterations, *verbose, *format, &config).await,
        };
        if let Err(e) = result {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    info!("Starting hostmon");

    let provider = Arc::new(ProcfsProvider::new(config.proc_root(), config.etc_root()));
    let aggregator = Aggregator::new(provider, config.aggregator_settings());
    let cache = Arc::new(MetricsCache::new(aggregator, config.cache_ttl()));
    info!(
        "Reading from {} with a {}ms cache and a {}ms CPU window",
        config.proc_root().display(),
        config.cache_ttl().as_millis(),
        config.cpu_sample_window().as_millis()
    );

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    let metrics = HostMetrics::new(&registry)?;
    let scrape_duration = Gauge::new(
        "hostmon_scrape_duration_seconds",
        "Time spent serving the last /metrics request",
    )?;
    let pass_duration = Gauge::new(
        "hostmon_pass_duration_seconds",
        "Duration of the last successful collection pass",
    )?;
    let pass_success = Gauge::new(
        "hostmon_pass_success",
        "Whether the last collection pass was successful (1) or failed (0)",
    )?;
    let processes_reported = Gauge::new(
        "hostmon_processes_reported",
        "Number of processes in the current snapshot",
    )?;
    registry.register(Box::new(scrape_duration.clone()))?;
    registry.register(Box::new(pass_duration.clone()))?;
    registry.register(Box::new(pass_success.clone()))?;
    registry.register(Box::new(processes_reported.clone()))?;
    debug!("All metrics registered successfully");

    let state = Arc::new(AppState {
        registry,
        metrics,
        scrape_duration,
        pass_duration,
        pass_success,
        processes_reported,
        cache: cache.clone(),
        config: Arc::new(config.clone()),
    });

    // Warm the cache so the first request does not pay for a pass
    info!("Performing initial collection pass");
    match cache.get().await {
        Ok(snapshot) => info!(
            "Initial collection pass completed: {} processes, {} degraded sections",
            snapshot.processes.len(),
            snapshot.degraded.len()
        ),
        Err(e) => error!("Initial collection pass failed: {}", e),
    }

    let csv_task = match &config.csv_export_path {
        Some(path) => match CsvExporter::create(path) {
            Ok(exporter) => Some(tokio::spawn(run_csv_export(
                cache.clone(),
                exporter,
                config.csv_export_interval(),
            ))),
            Err(e) => {
                warn!("CSV export disabled, cannot open {}: {}", path.display(), e);
                None
            }
        },
        None => None,
    };

    let mut app = Router::new()
        .route("/stats", get(stats_handler))
        .route("/doc", get(doc_handler));

    if config.enable_metrics.unwrap_or(true) {
        app = app.route("/metrics", get(metrics_handler));
    }
    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app.with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_addr(), config.port()).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("hostmon listening on http://{}", addr);

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, exiting...");
        }
    }

    if let Some(task) = csv_task {
        task.abort();
        let _ = task.await;
    }

    info!("hostmon stopped gracefully");
    Ok(())
}
