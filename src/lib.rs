//! hostmon: a host resource monitor.
//!
//! The engine reads counters through a [`provider::MetricsProvider`], turns
//! them into a [`snapshot::MetricsSnapshot`] in an [`aggregator::Aggregator`]
//! and serves the latest one from a TTL-gated [`cache::MetricsCache`].

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod error;
pub mod export;
pub mod health_stats;
pub mod metrics;
pub mod provider;
pub mod rates;
pub mod sampler;
pub mod snapshot;
pub mod system;
