//! Scan sessions: from a request to a finished report.

use crate::config::{TimingCatalog, TimingLimits, TimingOverrides};
use crate::error::ScanResult;
use crate::fingerprint::{FingerprintConfig, Fingerprinter};
use crate::scanner::aggregator::{Aggregator, ScanKey, ScanStats, INITIAL_CAPACITY};
use crate::scanner::engine::ProbeEngine;
use crate::scanner::scheduler::Scheduler;
use crate::scanner::timing::TimingController;
use crate::scanner::traits::ProbeResult;
use crate::types::{PortSpec, Protocol, ProtocolSelection, ScanId, Target, TargetResolver, TargetSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStatus {
    /// Every expected pair has a result.
    Completed,
    /// Cancelled or out of time; the results are a subset.
    PartiallyCompleted,
    /// Could not start.
    Failed,
}

impl ScanStatus {
    /// Process exit code for this status.
    pub fn exit_code(self) -> u8 {
        match self {
            ScanStatus::Completed => 0,
            ScanStatus::Failed => 1,
            ScanStatus::PartiallyCompleted => 2,
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Completed => write!(f, "completed"),
            ScanStatus::PartiallyCompleted => write!(f, "partially-completed"),
            ScanStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The outcome of a scan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub id: ScanId,
    pub status: ScanStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub stats: ScanStats,
    /// Sorted by target order, then port, then protocol.
    pub results: Vec<ProbeResult>,
}

impl ScanReport {
    pub fn open_ports(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| r.is_open())
    }
}

/// Unparsed inputs for a scan.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub targets: Vec<String>,
    pub ports: String,
    pub protocols: ProtocolSelection,
    pub timing_profile: String,
    pub overrides: TimingOverrides,
    pub fingerprint: Option<FingerprintConfig>,
    pub deadline: Option<Duration>,
}

impl ScanRequest {
    pub fn new(targets: Vec<String>, ports: impl Into<String>) -> Self {
        Self {
            targets,
            ports: ports.into(),
            protocols: ProtocolSelection::default(),
            timing_profile: "normal".to_string(),
            overrides: TimingOverrides::default(),
            fingerprint: None,
            deadline: None,
        }
    }

    pub fn with_protocols(mut self, protocols: ProtocolSelection) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn with_timing(mut self, profile: impl Into<String>, overrides: TimingOverrides) -> Self {
        self.timing_profile = profile.into();
        self.overrides = overrides;
        self
    }

    pub fn with_fingerprinting(mut self, config: FingerprintConfig) -> Self {
        self.fingerprint = Some(config);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// A scan ready to run.
///
/// # Example
///
/// ```ignore
/// let request = ScanRequest::new(vec!["10.0.0.1".into()], "22,80,443");
/// let session = ScanSession::prepare(&request, &TimingCatalog::default(), &resolver).await?;
/// let cancel = session.cancellation_token();
/// let report = session.run().await;
/// ```
pub struct ScanSession {
    id: ScanId,
    targets: Arc<[Target]>,
    ports: PortSpec,
    protocols: &'static [Protocol],
    limits: TimingLimits,
    fingerprint: Option<FingerprintConfig>,
    deadline: Option<Duration>,
    engine: ProbeEngine,
    aggregator: Arc<Aggregator>,
    cancel: CancellationToken,
}

impl ScanSession {
    /// Validate and resolve a request.
    ///
    /// Port, target and timing errors are reported before any network
    /// activity, including DNS.
    pub async fn prepare(
        request: &ScanRequest,
        catalog: &TimingCatalog,
        resolver: &TargetResolver,
    ) -> ScanResult<Self> {
        let ports: PortSpec = request.ports.parse()?;
        let specs = TargetSpec::parse_list(request.targets.as_slice())?;
        let limits = catalog.resolve(&request.timing_profile, &request.overrides)?;
        let targets = resolver.resolve(&specs).await?;

        let mut session = Self::new(targets, ports, request.protocols, limits);
        session.fingerprint = request.fingerprint;
        session.deadline = request.deadline;
        Ok(session)
    }

    /// A session over already-resolved targets.
    pub fn new(
        targets: Vec<Target>,
        ports: PortSpec,
        protocols: ProtocolSelection,
        limits: TimingLimits,
    ) -> Self {
        let protocols = protocols.protocols();
        let expected = targets.len() * ports.len() * protocols.len();
        Self {
            id: ScanId::new(),
            targets: targets.into(),
            ports,
            protocols,
            limits,
            fingerprint: None,
            deadline: None,
            engine: ProbeEngine::new(),
            aggregator: Arc::new(Aggregator::new(expected)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_engine(mut self, engine: ProbeEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn limits(&self) -> &TimingLimits {
        &self.limits
    }

    /// Number of (target, port, protocol) pairs this scan covers.
    pub fn expected_results(&self) -> usize {
        self.aggregator.expected()
    }

    /// Token that stops the scan when cancelled. Results gathered so far
    /// are still reported.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Live view of the results gathered so far.
    pub fn progress(&self) -> Arc<Aggregator> {
        Arc::clone(&self.aggregator)
    }

    /// Run the scan to completion, cancellation or deadline.
    pub async fn run(self) -> ScanReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let expected = self.expected_results();
        info!(
            scan_id = %self.id.short(),
            targets = self.targets.len(),
            ports = self.ports.len(),
            expected,
            "scan started"
        );

        let mut work = Vec::with_capacity(expected.min(INITIAL_CAPACITY));
        for (index, target) in self.targets.iter().enumerate() {
            for &port in self.ports.ports() {
                for &protocol in self.protocols {
                    let key = ScanKey {
                        target: index,
                        port,
                        protocol,
                    };
                    if target.is_resolved() {
                        work.push(key);
                    } else {
                        let result = self.engine.probe(target, port, protocol, Duration::ZERO).await;
                        self.aggregator.record(key, result);
                    }
                }
            }
        }

        let watchdog = self.deadline.map(|limit| {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => {
                        warn!(deadline_ms = limit.as_millis() as u64, "scan deadline reached");
                        cancel.cancel();
                    }
                    _ = cancel.cancelled() => {}
                }
            })
        });

        let scheduler = Arc::new(Scheduler {
            targets: Arc::clone(&self.targets),
            engine: self.engine.clone(),
            timing: TimingController::new(self.limits),
            fingerprinter: self.fingerprint.map(Fingerprinter::new),
            aggregator: Arc::clone(&self.aggregator),
            cancel: self.cancel.clone(),
            deadline: self.deadline.map(|limit| start + limit),
        });
        scheduler.run(work).await;

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let (results, stats) = self.aggregator.finish();
        let status = if stats.is_complete() {
            ScanStatus::Completed
        } else {
            ScanStatus::PartiallyCompleted
        };
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            scan_id = %self.id.short(),
            %status,
            completed = stats.completed,
            open = stats.open,
            duration_ms,
            "scan finished"
        );

        ScanReport {
            id: self.id,
            status,
            started_at,
            finished_at: Utc::now(),
            duration_ms,
            stats,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimingProfile;
    use crate::error::{ParseError, ResolutionError, ScanError};
    use crate::scanner::traits::{ProbeOutcome, Prober};
    use crate::types::{HostLookup, Port, PortError, PortState};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers from a fixed (ip, port) table; everything else is closed.
    struct ScriptedProber {
        protocol: Protocol,
        states: HashMap<(IpAddr, u16), PortState>,
        calls: AtomicUsize,
        latency: Duration,
    }

    impl ScriptedProber {
        fn new(protocol: Protocol) -> Self {
            Self {
                protocol,
                states: HashMap::new(),
                calls: AtomicUsize::new(0),
                latency: Duration::ZERO,
            }
        }

        fn with(mut self, ip: IpAddr, port: u16, state: PortState) -> Self {
            self.states.insert((ip, port), state);
            self
        }

        fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        fn protocol(&self) -> Protocol {
            self.protocol
        }

        async fn probe(&self, ip: IpAddr, port: Port, _timeout: Duration) -> ProbeOutcome {
            let start = Instant::now();
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let state = self
                .states
                .get(&(ip, port.as_u16()))
                .copied()
                .unwrap_or(PortState::Closed);
            ProbeOutcome::new(state, start)
        }
    }

    struct NoLookup;

    #[async_trait]
    impl HostLookup for NoLookup {
        async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolutionError> {
            Err(ResolutionError::NoAddresses(host.to_string()))
        }
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn fast_limits() -> TimingLimits {
        TimingLimits {
            max_concurrent_probes: 16,
            probe_timeout: Duration::from_millis(100),
            ..TimingLimits::default()
        }
    }

    fn engine(tcp: Arc<ScriptedProber>, udp: Arc<ScriptedProber>) -> ProbeEngine {
        ProbeEngine::with_probers(tcp, udp)
    }

    #[tokio::test]
    async fn test_single_host_scan() {
        let tcp = Arc::new(
            ScriptedProber::new(Protocol::Tcp)
                .with(ip(1), 22, PortState::Open)
                .with(ip(1), 80, PortState::Open),
        );
        let udp = Arc::new(ScriptedProber::new(Protocol::Udp));
        let ports: PortSpec = "22,80,9999".parse().unwrap();

        let report = ScanSession::new(vec![Target::from_ip(ip(1))], ports, ProtocolSelection::Tcp, fast_limits())
            .with_engine(engine(tcp, udp))
            .run()
            .await;

        assert_eq!(report.status, ScanStatus::Completed);
        let states: Vec<(u16, PortState)> = report
            .results
            .iter()
            .map(|r| (r.port.as_u16(), r.state))
            .collect();
        assert_eq!(
            states,
            vec![
                (22, PortState::Open),
                (80, PortState::Open),
                (9999, PortState::Closed)
            ]
        );
        assert_eq!(report.stats.open, 2);
        assert_eq!(report.stats.closed, 1);
    }

    #[tokio::test]
    async fn test_every_pair_reported_once() {
        let tcp = Arc::new(ScriptedProber::new(Protocol::Tcp));
        let udp = Arc::new(ScriptedProber::new(Protocol::Udp));
        let targets: Vec<Target> = (1..=4).map(|n| Target::from_ip(ip(n))).collect();
        let ports: PortSpec = "1-25".parse().unwrap();

        let report = ScanSession::new(targets, ports, ProtocolSelection::Both, fast_limits())
            .with_engine(engine(Arc::clone(&tcp), Arc::clone(&udp)))
            .run()
            .await;

        assert_eq!(report.results.len(), 4 * 25 * 2);
        assert_eq!(report.stats.expected, 200);
        assert_eq!(tcp.calls(), 100);
        assert_eq!(udp.calls(), 100);

        let mut keys: Vec<(String, u16, Protocol)> = report
            .results
            .iter()
            .map(|r| (r.target.clone(), r.port.as_u16(), r.protocol))
            .collect();
        let listed = keys.clone();
        keys.dedup();
        assert_eq!(keys, listed);
        assert_eq!(report.results[0].protocol, Protocol::Tcp);
        assert_eq!(report.results[1].protocol, Protocol::Udp);
    }

    #[tokio::test]
    async fn test_filtered_tcp_is_retried() {
        let tcp = Arc::new(ScriptedProber::new(Protocol::Tcp).with(ip(1), 443, PortState::Filtered));
        let udp = Arc::new(ScriptedProber::new(Protocol::Udp).with(ip(1), 443, PortState::OpenFiltered));
        let limits = TimingLimits {
            max_retries: 2,
            ..fast_limits()
        };

        let report = ScanSession::new(
            vec![Target::from_ip(ip(1))],
            PortSpec::from_ports([Port::new(443).unwrap()]),
            ProtocolSelection::Both,
            limits,
        )
        .with_engine(engine(Arc::clone(&tcp), Arc::clone(&udp)))
        .run()
        .await;

        let tcp_result = &report.results[0];
        assert_eq!(tcp_result.state, PortState::Filtered);
        assert_eq!(tcp_result.attempts, 3);
        assert_eq!(tcp.calls(), 3);

        let udp_result = &report.results[1];
        assert_eq!(udp_result.state, PortState::OpenFiltered);
        assert_eq!(udp_result.attempts, 1);
        assert_eq!(udp.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_retry_when_timeout_exceeds_remaining_deadline() {
        let tcp = Arc::new(ScriptedProber::new(Protocol::Tcp).with(ip(1), 443, PortState::Filtered));
        let udp = Arc::new(ScriptedProber::new(Protocol::Udp));
        let limits = TimingLimits {
            probe_timeout: Duration::from_secs(5),
            max_retries: 3,
            ..fast_limits()
        };

        let report = ScanSession::new(
            vec![Target::from_ip(ip(1))],
            PortSpec::from_ports([Port::new(443).unwrap()]),
            ProtocolSelection::Tcp,
            limits,
        )
        .with_engine(engine(Arc::clone(&tcp), udp))
        .with_deadline(Duration::from_secs(1))
        .run()
        .await;

        assert_eq!(report.status, ScanStatus::Completed);
        assert_eq!(report.results[0].state, PortState::Filtered);
        assert_eq!(report.results[0].attempts, 1);
        assert_eq!(tcp.calls(), 1);
    }

    #[tokio::test]
    async fn test_unresolved_target_recorded_without_probing() {
        let tcp = Arc::new(ScriptedProber::new(Protocol::Tcp));
        let udp = Arc::new(ScriptedProber::new(Protocol::Udp));
        let targets = vec![
            Target::from_ip(ip(1)),
            Target::unresolved("ghost.lan", "no addresses"),
        ];

        let report = ScanSession::new(targets, "80".parse().unwrap(), ProtocolSelection::Tcp, fast_limits())
            .with_engine(engine(Arc::clone(&tcp), udp))
            .run()
            .await;

        assert_eq!(report.status, ScanStatus::Completed);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[1].target, "ghost.lan");
        assert_eq!(report.results[1].state, PortState::Error);
        assert_eq!(tcp.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_returns_subset() {
        let tcp = Arc::new(ScriptedProber::new(Protocol::Tcp).with_latency(Duration::from_millis(20)));
        let udp = Arc::new(ScriptedProber::new(Protocol::Udp));
        let limits = TimingLimits {
            max_concurrent_probes: 2,
            ..fast_limits()
        };

        let session = ScanSession::new(
            vec![Target::from_ip(ip(1))],
            "1-1000".parse().unwrap(),
            ProtocolSelection::Tcp,
            limits,
        )
        .with_engine(engine(Arc::clone(&tcp), udp));
        let cancel = session.cancellation_token();
        let progress = session.progress();

        let handle = tokio::spawn(session.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        let report = handle.await.unwrap();

        assert_eq!(report.status, ScanStatus::PartiallyCompleted);
        assert!(!report.results.is_empty());
        assert!(report.results.len() < 1000);
        assert_eq!(report.stats.completed + report.stats.skipped, 1000);
        assert_eq!(report.results.len(), tcp.calls());
        assert_eq!(progress.expected(), 1000);

        let mut ports: Vec<u16> = report.results.iter().map(|r| r.port.as_u16()).collect();
        ports.dedup();
        assert_eq!(ports.len(), report.results.len());
    }

    #[tokio::test]
    async fn test_deadline_stops_scan() {
        let tcp = Arc::new(ScriptedProber::new(Protocol::Tcp).with_latency(Duration::from_millis(20)));
        let udp = Arc::new(ScriptedProber::new(Protocol::Udp));
        let limits = TimingLimits {
            max_concurrent_probes: 1,
            ..fast_limits()
        };

        let report = ScanSession::new(
            vec![Target::from_ip(ip(1))],
            "1-500".parse().unwrap(),
            ProtocolSelection::Tcp,
            limits,
        )
        .with_engine(engine(tcp, udp))
        .with_deadline(Duration::from_millis(150))
        .run()
        .await;

        assert_eq!(report.status, ScanStatus::PartiallyCompleted);
        assert!(report.stats.skipped > 0);
    }

    #[tokio::test]
    async fn test_prepare_rejects_bad_input_first() {
        let resolver = TargetResolver::new(1024, Arc::new(NoLookup));
        let catalog = TimingCatalog::default();

        let request = ScanRequest::new(vec!["10.0.0.1".to_string()], "100-90");
        let err = ScanSession::prepare(&request, &catalog, &resolver).await.err().unwrap();
        assert!(matches!(
            err,
            ScanError::Parse(ParseError::Port(PortError::InvalidRange(100, 90)))
        ));

        let request = ScanRequest::new(vec!["10.0.0.1".to_string()], "80")
            .with_timing("warp", TimingOverrides::default());
        let err = ScanSession::prepare(&request, &catalog, &resolver).await.err().unwrap();
        assert!(matches!(err, ScanError::Config(_)));

        let request = ScanRequest::new(vec!["nowhere.invalid".to_string()], "80");
        let err = ScanSession::prepare(&request, &catalog, &resolver).await.err().unwrap();
        assert!(matches!(err, ScanError::Resolution(ResolutionError::NoTargets(1))));
    }

    #[tokio::test]
    async fn test_prepare_applies_request() {
        let resolver = TargetResolver::new(1024, Arc::new(NoLookup));
        let request = ScanRequest::new(vec!["10.0.0.0/30".to_string()], "22,80")
            .with_protocols(ProtocolSelection::Both)
            .with_timing("polite", TimingOverrides::default())
            .with_deadline(Duration::from_secs(30));

        let session = ScanSession::prepare(&request, &TimingCatalog::default(), &resolver)
            .await
            .unwrap();
        assert_eq!(session.targets().len(), 2);
        assert_eq!(session.expected_results(), 2 * 2 * 2);
        assert_eq!(*session.limits(), TimingProfile::Polite.limits());
    }

    #[test]
    fn test_status_exit_codes() {
        assert_eq!(ScanStatus::Completed.exit_code(), 0);
        assert_eq!(ScanStatus::Failed.exit_code(), 1);
        assert_eq!(ScanStatus::PartiallyCompleted.exit_code(), 2);
        assert_eq!(
            serde_json::to_string(&ScanStatus::PartiallyCompleted).unwrap(),
            "\"partially-completed\""
        );
    }
}
