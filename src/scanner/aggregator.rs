//! Collects probe results from concurrent workers.
//!
//! Results are keyed by (target, port, protocol); every pair is recorded at
//! most once, and the final listing is sorted by target order, then port,
//! then protocol regardless of completion order.

use crate::scanner::traits::ProbeResult;
use crate::types::{Port, PortState, Protocol};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Upper bound on storage reserved before the first result arrives.
pub(crate) const INITIAL_CAPACITY: usize = 4096;

/// Identity of one unit of scan work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScanKey {
    /// Index into the scan's target list.
    pub target: usize,
    pub port: Port,
    pub protocol: Protocol,
}

/// Summary counts for a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    /// Pairs the scan was asked to cover.
    pub expected: usize,
    /// Pairs with a recorded result.
    pub completed: usize,
    /// Pairs never dispatched (cancellation or deadline).
    pub skipped: usize,
    pub open: usize,
    pub closed: usize,
    pub filtered: usize,
    pub open_filtered: usize,
    pub error: usize,
}

impl ScanStats {
    pub fn is_complete(&self) -> bool {
        self.completed == self.expected
    }
}

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicUsize,
    open: AtomicUsize,
    closed: AtomicUsize,
    filtered: AtomicUsize,
    open_filtered: AtomicUsize,
    error: AtomicUsize,
}

impl Counters {
    fn bump(&self, state: PortState) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        let counter = match state {
            PortState::Open => &self.open,
            PortState::Closed => &self.closed,
            PortState::Filtered => &self.filtered,
            PortState::OpenFiltered => &self.open_filtered,
            PortState::Error => &self.error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Thread-safe result store shared by all workers of a scan.
#[derive(Debug)]
pub struct Aggregator {
    expected: usize,
    results: Mutex<HashMap<ScanKey, ProbeResult>>,
    counters: Counters,
}

impl Aggregator {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            results: Mutex::new(HashMap::with_capacity(expected.min(INITIAL_CAPACITY))),
            counters: Counters::default(),
        }
    }

    /// Record the result for `key`. A second result for the same key is
    /// discarded and `false` returned.
    pub fn record(&self, key: ScanKey, result: ProbeResult) -> bool {
        let state = result.state;
        {
            let mut results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
            match results.entry(key) {
                Entry::Occupied(_) => {
                    warn!(
                        port = %key.port,
                        protocol = %key.protocol,
                        "duplicate result discarded"
                    );
                    return false;
                }
                Entry::Vacant(slot) => {
                    slot.insert(result);
                }
            }
        }
        self.counters.bump(state);
        true
    }

    /// Number of results recorded so far.
    pub fn completed(&self) -> usize {
        self.counters.completed.load(Ordering::Relaxed)
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// A snapshot of the running counts.
    pub fn progress(&self) -> ScanStats {
        let load = |counter: &AtomicUsize| counter.load(Ordering::Relaxed);
        let completed = load(&self.counters.completed);
        ScanStats {
            expected: self.expected,
            completed,
            skipped: 0,
            open: load(&self.counters.open),
            closed: load(&self.counters.closed),
            filtered: load(&self.counters.filtered),
            open_filtered: load(&self.counters.open_filtered),
            error: load(&self.counters.error),
        }
    }

    /// Drain the recorded results in canonical order. Pairs without a result
    /// are counted as skipped.
    pub fn finish(&self) -> (Vec<ProbeResult>, ScanStats) {
        let drained = {
            let mut results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *results)
        };
        let mut entries: Vec<(ScanKey, ProbeResult)> = drained.into_iter().collect();
        entries.sort_unstable_by_key(|(key, _)| *key);

        let mut stats = ScanStats {
            expected: self.expected,
            ..ScanStats::default()
        };
        let results: Vec<ProbeResult> = entries
            .into_iter()
            .map(|(_, result)| {
                match result.state {
                    PortState::Open => stats.open += 1,
                    PortState::Closed => stats.closed += 1,
                    PortState::Filtered => stats.filtered += 1,
                    PortState::OpenFiltered => stats.open_filtered += 1,
                    PortState::Error => stats.error += 1,
                }
                result
            })
            .collect();
        stats.completed = results.len();
        stats.skipped = self.expected.saturating_sub(results.len());
        (results, stats)
    }
}
