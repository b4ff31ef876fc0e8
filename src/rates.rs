//! Per-second rates from cumulative counters.
//!
//! A `RateComputer` keeps the counter set of the previous pass and turns the
//! difference to the current set into rates. The aggregator keeps one for
//! network interfaces (received/sent) and one for block devices (read/written).

use ahash::AHashMap as HashMap;
use std::sync::Mutex;
use std::time::Instant;
use tracing::debug;

/// Cumulative counters of one named entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub name: String,
    pub inbound: u64,
    pub outbound: u64,
}

impl CounterSnapshot {
    pub fn new(name: impl Into<String>, inbound: u64, outbound: u64) -> Self {
        Self {
            name: name.into(),
            inbound,
            outbound,
        }
    }
}

/// Per-second rates of one entity. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rate {
    pub inbound_per_sec: f64,
    pub outbound_per_sec: f64,
}

#[derive(Debug, Clone)]
struct CounterSet {
    taken_at: Instant,
    counters: HashMap<String, CounterSnapshot>,
}

/// Stateful rate computation. Safe to share between concurrent passes.
#[derive(Debug, Default)]
pub struct RateComputer {
    previous: Mutex<Option<CounterSet>>,
}

impl RateComputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes rates against the previous set and stores `current` as the
    /// new previous set.
    ///
    /// Returns no entries on the first call. If `now` is not after the
    /// previous capture instant, returns no entries and keeps the previous
    /// set. A counter that went backwards yields a rate of 0 for that
    /// direction.
    pub fn compute(&self, current: &[CounterSnapshot], now: Instant) -> HashMap<String, Rate> {
        let mut previous = match self.previous.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut rates = HashMap::new();

        if let Some(prev) = previous.as_ref() {
            let elapsed = match now.checked_duration_since(prev.taken_at) {
                Some(d) if !d.is_zero() => d.as_secs_f64(),
                _ => {
                    debug!("Skipping rate computation: no time elapsed since previous sample");
                    return rates;
                }
            };

            for counter in current {
                let Some(before) = prev.counters.get(&counter.name) else {
                    continue;
                };
                rates.insert(
                    counter.name.clone(),
                    Rate {
                        inbound_per_sec: per_second(before.inbound, counter.inbound, elapsed),
                        outbound_per_sec: per_second(before.outbound, counter.outbound, elapsed),
                    },
                );
            }
        }

        *previous = Some(CounterSet {
            taken_at: now,
            counters: current
                .iter()
                .map(|c| (c.name.clone(), c.clone()))
                .collect(),
        });

        rates
    }

    /// Forgets the previous set; the next call behaves like the first one.
    pub fn reset(&self) {
        let mut previous = match self.previous.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *previous = None;
    }

    pub fn has_previous(&self) -> bool {
        match self.previous.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

fn per_second(before: u64, after: u64, elapsed_secs: f64) -> f64 {
    // counter reset or wraparound
    if after < before {
        return 0.0;
    }
    (after - before) as f64 / elapsed_secs
}
