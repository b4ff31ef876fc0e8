//! TTL-gated snapshot cache.
//!
//! Fresh reads only take the shared read lock. Stale readers queue on the
//! refresh mutex and re-check under it, so one staleness window costs at most
//! one collection pass no matter how many callers arrive at once.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, instrument};

use crate::aggregator::Aggregator;
use crate::error::CollectError;
use crate::health_stats::HealthStats;
use crate::snapshot::MetricsSnapshot;

/// Default freshness window.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(2);

#[derive(Default)]
struct CacheState {
    snapshot: Option<Arc<MetricsSnapshot>>,
    collected_at: Option<Instant>,
    /// Completed passes, successful or not.
    attempts: u64,
    /// Error of the most recent pass, if it failed.
    last_error: Option<CollectError>,
}

impl CacheState {
    fn fresh(&self, ttl: Duration) -> Option<Arc<MetricsSnapshot>> {
        let collected_at = self.collected_at?;
        if collected_at.elapsed() < ttl {
            self.snapshot.clone()
        } else {
            None
        }
    }
}

/// Owns the current snapshot and the aggregator that produces it.
pub struct MetricsCache {
    aggregator: Aggregator,
    ttl: Duration,
    state: RwLock<CacheState>,
    refresh: Mutex<()>,
    stats: HealthStats,
}

impl MetricsCache {
    pub fn new(aggregator: Aggregator, ttl: Duration) -> Self {
        Self {
            aggregator,
            ttl,
            state: RwLock::new(CacheState::default()),
            refresh: Mutex::new(()),
            stats: HealthStats::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> &HealthStats {
        &self.stats
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Snapshot using the TTL configured at construction.
    pub async fn get(&self) -> Result<Arc<MetricsSnapshot>, CollectError> {
        self.get_metrics(self.ttl).await
    }

    /// Returns the cached snapshot if younger than `ttl`, otherwise collects a
    /// new one.
    ///
    /// A failed pass leaves the previous snapshot in place and its error is
    /// returned to every caller that was waiting on that pass.
    #[instrument(skip(self))]
    pub async fn get_metrics(&self, ttl: Duration) -> Result<Arc<MetricsSnapshot>, CollectError> {
        let observed_attempts = {
            let state = self.state.read().await;
            if let Some(snapshot) = state.fresh(ttl) {
                self.stats.record_hit();
                return Ok(snapshot);
            }
            state.attempts
        };

        let _refresh = self.refresh.lock().await;

        {
            let state = self.state.read().await;
            if state.attempts != observed_attempts {
                // a pass finished while we waited for the refresh lock
                if let Some(err) = &state.last_error {
                    return Err(err.clone());
                }
                if let Some(snapshot) = &state.snapshot {
                    self.stats.record_hit();
                    return Ok(Arc::clone(snapshot));
                }
            }
            if let Some(snapshot) = state.fresh(ttl) {
                self.stats.record_hit();
                return Ok(snapshot);
            }
        }

        self.stats.record_miss();
        debug!("Cache stale, starting collection pass");

        let result = self.aggregator.collect_with_report().await;

        let mut state = self.state.write().await;
        state.attempts += 1;
        match result {
            Ok((snapshot, report)) => {
                let snapshot = Arc::new(snapshot);
                state.snapshot = Some(Arc::clone(&snapshot));
                state.collected_at = Some(Instant::now());
                state.last_error = None;
                self.stats
                    .record_pass(report.processes.opened as u64, report.duration.as_secs_f64());
                Ok(snapshot)
            }
            Err(e) => {
                error!("Collection pass failed, keeping previous snapshot: {}", e);
                state.last_error = Some(e.clone());
                self.stats.record_failure();
                Err(e)
            }
        }
    }

    /// Last successful snapshot, without collecting.
    pub async fn snapshot(&self) -> Option<Arc<MetricsSnapshot>> {
        self.state.read().await.snapshot.clone()
    }

    /// Error of the most recent pass, if it failed.
    pub async fn last_error(&self) -> Option<CollectError> {
        self.state.read().await.last_error.clone()
    }

    /// Age of the cached snapshot.
    pub async fn age(&self) -> Option<Duration> {
        self.state.read().await.collected_at.map(|t| t.elapsed())
    }
}
