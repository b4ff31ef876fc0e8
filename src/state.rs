//! Application state shared by the HTTP handlers.

use hostmon::cache::MetricsCache;
use hostmon::config::Config;
use hostmon::metrics::HostMetrics;
use prometheus::{Gauge, Registry};
use std::sync::Arc;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub registry: Registry,
    pub metrics: HostMetrics,
    pub scrape_duration: Gauge,
    pub pass_duration: Gauge,
    pub pass_success: Gauge,
    pub processes_reported: Gauge,
    pub cache: Arc<MetricsCache>,
    pub config: Arc<Config>,
}
