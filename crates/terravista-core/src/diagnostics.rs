//! Log throttling for repeated per-asset diagnostics.

use std::hash::Hash;

use hashbrown::HashSet;

/// Remembers which keys have already produced a log line.
///
/// Missing tiles and models are reported once per unique key; later reports for
/// the same key are only counted.
#[derive(Debug)]
pub struct LogThrottle<K> {
    seen: HashSet<K>,
    suppressed: u64,
}

impl<K> Default for LogThrottle<K> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            suppressed: 0,
        }
    }
}

impl<K: Eq + Hash> LogThrottle<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `key` is seen, `false` afterwards.
    pub fn first_time(&mut self, key: K) -> bool {
        if self.seen.insert(key) {
            true
        } else {
            self.suppressed += 1;
            false
        }
    }

    /// Number of reports swallowed since the last reset.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// Number of distinct keys reported.
    pub fn reported(&self) -> usize {
        self.seen.len()
    }

    /// Forget all keys (world reload).
    pub fn reset(&mut self) {
        self.seen.clear();
        self.suppressed = 0;
    }
}
