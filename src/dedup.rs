//! "Log once per entity" guard.

use ahash::AHashSet as HashSet;
use std::hash::Hash;
use std::sync::Mutex;

/// Remembers which keys have already been reported.
///
/// Entries are never removed; a reused key after a long uptime stays silent.
#[derive(Debug)]
pub struct LogOnce<K> {
    seen: Mutex<HashSet<K>>,
}

impl<K: Eq + Hash> LogOnce<K> {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Returns true the first time `key` is seen.
    pub fn first(&self, key: K) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.insert(key)
    }

    pub fn len(&self) -> usize {
        match self.seen.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash> Default for LogOnce<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_each_key_once() {
        let once = LogOnce::new();
        assert!(once.first(42u32));
        assert!(!once.first(42u32));
        assert!(once.first(43u32));
        assert_eq!(once.len(), 2);
    }
}
