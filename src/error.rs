//! Error types for the metrics engine.
//!
//! `ProviderError` is returned by individual provider queries. `CollectError`
//! is what a collection pass (and therefore the cache) hands back to callers.

use std::fmt;

/// Failure of a single metrics provider query.
#[derive(Debug)]
pub enum ProviderError {
    Io(std::io::Error),
    Parse(String),
    NotFound(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Io(e) => write!(f, "I/O error: {}", e),
            ProviderError::Parse(msg) => write!(f, "parse error: {}", msg),
            ProviderError::NotFound(what) => write!(f, "not found: {}", what),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProviderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(e: std::io::Error) -> Self {
        ProviderError::Io(e)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Metrics without which a pass cannot produce a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoundationalMetric {
    Cpu,
    Memory,
}

impl fmt::Display for FoundationalMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FoundationalMetric::Cpu => f.write_str("cpu"),
            FoundationalMetric::Memory => f.write_str("memory"),
        }
    }
}

/// Error returned by a collection pass.
///
/// Cloneable so that every caller waiting on the same pass can receive it.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectError {
    Foundational {
        metric: FoundationalMetric,
        reason: String,
    },
    Internal(String),
}

impl CollectError {
    pub fn foundational(metric: FoundationalMetric, err: ProviderError) -> Self {
        CollectError::Foundational {
            metric,
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::Foundational { metric, reason } => {
                write!(f, "failed to read {} statistics: {}", metric, reason)
            }
            CollectError::Internal(msg) => write!(f, "collection pass aborted: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foundational_error_names_the_metric() {
        let err = CollectError::foundational(
            FoundationalMetric::Memory,
            ProviderError::Parse("MemTotal missing".into()),
        );
        assert_eq!(
            err.to_string(),
            "failed to read memory statistics: parse error: MemTotal missing"
        );
    }
}
