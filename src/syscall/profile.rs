//! Per-operation latency aggregation. Purely observational: nothing in the
//! syscall path reads these numbers back.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default)]
pub struct OpStats {
    pub total: Duration,
    pub count: u64,
}

#[derive(Default)]
pub struct Metrics {
    ops: Mutex<HashMap<&'static str, OpStats>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &'static str, elapsed: Duration) {
        let mut ops = self.ops.lock().unwrap();
        let entry = ops.entry(name).or_default();
        entry.total += elapsed;
        entry.count += 1;
    }

    /// Aggregated stats per operation name, sorted by name.
    pub fn snapshot(&self) -> Vec<(&'static str, OpStats)> {
        let mut out: Vec<_> = self
            .ops
            .lock()
            .unwrap()
            .iter()
            .map(|(name, stats)| (*name, *stats))
            .collect();
        out.sort_by_key(|(name, _)| *name);
        out
    }
}
