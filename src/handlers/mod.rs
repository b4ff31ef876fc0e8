//! HTTP endpoint handlers.
//!
//! - `/stats`: latest snapshot as JSON
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Health check endpoint
//! - `/doc`: Documentation endpoint

pub mod doc;
pub mod health;
pub mod metrics;
pub mod stats;

// Re-export handlers
pub use doc::doc_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use stats::stats_handler;
