//! Worker pool that drains the scan's work queue.
//!
//! Each worker repeatedly paces itself, takes the next pair, probes it
//! (retrying ambiguous TCP outcomes within the retry and deadline budget),
//! fingerprints open ports and hands the result to the aggregator. Workers
//! check the cancellation token before taking new work; probes already in
//! flight finish within their own timeout.

use crate::fingerprint::Fingerprinter;
use crate::scanner::aggregator::{Aggregator, ScanKey};
use crate::scanner::engine::ProbeEngine;
use crate::scanner::timing::TimingController;
use crate::scanner::traits::ProbeResult;
use crate::types::{Protocol, Target};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Shared FIFO of pending pairs.
#[derive(Debug)]
struct WorkQueue {
    items: Mutex<VecDeque<ScanKey>>,
}

impl WorkQueue {
    fn new(items: Vec<ScanKey>) -> Self {
        Self {
            items: Mutex::new(items.into()),
        }
    }

    fn pop(&self) -> Option<ScanKey> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Everything a worker needs, shared read-only across the pool.
pub(crate) struct Scheduler {
    pub(crate) targets: Arc<[Target]>,
    pub(crate) engine: ProbeEngine,
    pub(crate) timing: TimingController,
    pub(crate) fingerprinter: Option<Fingerprinter>,
    pub(crate) aggregator: Arc<Aggregator>,
    pub(crate) cancel: CancellationToken,
    /// Wall-clock point after which no retry may start.
    pub(crate) deadline: Option<Instant>,
}

impl Scheduler {
    /// Probe every pair in `work` and return once all workers have exited.
    pub(crate) async fn run(self: Arc<Self>, work: Vec<ScanKey>) {
        let queue = Arc::new(WorkQueue::new(work));
        let workers = self.timing.worker_count(queue.len());
        debug!(workers, pending = queue.len(), "starting scan workers");

        let mut pool = JoinSet::new();
        for id in 0..workers {
            let scheduler = Arc::clone(&self);
            let queue = Arc::clone(&queue);
            pool.spawn(async move { scheduler.worker(id, &queue).await });
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "scan worker terminated abnormally");
            }
        }

        let abandoned = queue.len();
        if abandoned > 0 {
            debug!(abandoned, "work left undispatched");
        }
    }

    async fn worker(&self, id: usize, queue: &WorkQueue) {
        let mut probes = 0usize;
        loop {
            if probes > 0 {
                self.timing.pace(&self.cancel).await;
            }
            if self.cancel.is_cancelled() {
                break;
            }
            let Some(key) = queue.pop() else {
                break;
            };

            self.timing.throttle(&self.cancel).await;
            if self.cancel.is_cancelled() {
                break;
            }

            let result = self.execute(key).await;
            self.aggregator.record(key, result);
            probes += 1;
        }
        trace!(worker = id, probes, "worker finished");
    }

    async fn execute(&self, key: ScanKey) -> ProbeResult {
        let target = &self.targets[key.target];
        let timeout = self.timing.probe_timeout();

        let mut result = self.engine.probe(target, key.port, key.protocol, timeout).await;
        let mut attempts = 1;
        while self.should_retry(&result, attempts) {
            trace!(host = %result.target, port = %key.port, attempts, "retrying filtered port");
            result = self.engine.probe(target, key.port, key.protocol, timeout).await;
            attempts += 1;
        }
        result.attempts = attempts;

        if result.is_open() {
            self.annotate(target, &mut result).await;
        }
        result
    }

    /// Only TCP `filtered` is retried, and only while a full probe still fits
    /// before the deadline.
    fn should_retry(&self, result: &ProbeResult, attempts: u32) -> bool {
        result.state.is_retryable(result.protocol)
            && attempts <= self.timing.max_retries()
            && !self.cancel.is_cancelled()
            && self.deadline.map_or(true, |deadline| {
                deadline.saturating_duration_since(Instant::now()) >= self.timing.probe_timeout()
            })
    }

    async fn annotate(&self, target: &Target, result: &mut ProbeResult) {
        let (Some(fingerprinter), Some(ip)) = (&self.fingerprinter, target.ip()) else {
            return;
        };
        match result.protocol {
            Protocol::Tcp => {
                let (service, banner) = fingerprinter
                    .fingerprint_tcp(ip, result.port, self.timing.probe_timeout())
                    .await;
                if banner.is_some() {
                    result.banner = banner;
                }
                result.service = Some(service);
            }
            Protocol::Udp => {
                let service = fingerprinter.fingerprint_udp(result.port, result.banner.as_deref());
                result.service = Some(service);
            }
        }
    }
}
