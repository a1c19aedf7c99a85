//! The process scanner: periodic enumeration, delta detection, adaptive
//! rate control, and consumer fan-out.

use super::probe::PlatformProbe;
use super::snapshot::ProcessSnapshot;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::metrics::Metrics;
use crate::registry::ConsumerRegistry;
use pt_common::{Error, ProcessId, Result};
use pt_config::ScannerConfig;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// One scan cycle's worth of classified process changes.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub appeared: Vec<ProcessSnapshot>,
    pub departed: Vec<ProcessSnapshot>,
    pub changed: Vec<ProcessSnapshot>,
    pub unchanged: Vec<ProcessSnapshot>,
}

const CPU_EPSILON_PERCENT: f64 = 0.5;
const RSS_EPSILON_BYTES: u64 = 1024 * 1024;

/// A cooperative cancellation signal that can interrupt the scanner's
/// inter-scan sleep immediately.
#[derive(Clone)]
pub struct CancelToken {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            state: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.state;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.0.lock().unwrap()
    }

    /// Sleep up to `dur`, waking early if cancelled. Returns whether
    /// cancellation occurred.
    pub fn wait(&self, dur: Duration) -> bool {
        let (lock, cvar) = &*self.state;
        let guard = lock.lock().unwrap();
        let (guard, _) = cvar.wait_timeout_while(guard, dur, |cancelled| !*cancelled).unwrap();
        *guard
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the scan loop: probe, diff, fan out, adapt rate, sleep.
pub struct Scanner<P: PlatformProbe> {
    probe: P,
    cfg: ScannerConfig,
    previous: HashMap<ProcessId, ProcessSnapshot>,
    interval_secs: f64,
    include_re: Option<Regex>,
    exclude_re: Option<Regex>,
    consecutive_failures: u32,
    degraded: bool,
    metrics: Metrics,
    diagnostics: DiagnosticSink,
    scan_count: u64,
    registry: Option<Arc<ConsumerRegistry>>,
}

impl<P: PlatformProbe> Scanner<P> {
    pub fn new(probe: P, cfg: ScannerConfig, diagnostics: DiagnosticSink) -> Result<Self> {
        let include_re = cfg
            .include_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| Error::Config(format!("invalid include_pattern: {e}")))?;
        let exclude_re = cfg
            .exclude_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| Error::Config(format!("invalid exclude_pattern: {e}")))?;
        let interval_secs = cfg.sample_interval_secs as f64;

        Ok(Self {
            probe,
            cfg,
            previous: HashMap::new(),
            interval_secs,
            include_re,
            exclude_re,
            consecutive_failures: 0,
            degraded: false,
            metrics: Metrics::new(60),
            diagnostics,
            scan_count: 0,
            registry: None,
        })
    }

    fn passes_filter(&self, snap: &ProcessSnapshot) -> bool {
        let haystack = format!("{} {}", snap.name, snap.command_line);
        if let Some(re) = &self.include_re {
            if !re.is_match(&haystack) {
                return false;
            }
        }
        if let Some(re) = &self.exclude_re {
            if re.is_match(&haystack) {
                return false;
            }
        }
        true
    }

    fn materially_changed(prev: &ProcessSnapshot, new: &ProcessSnapshot) -> bool {
        (prev.cpu_percent - new.cpu_percent).abs() > CPU_EPSILON_PERCENT
            || prev.rss_bytes.abs_diff(new.rss_bytes) > RSS_EPSILON_BYTES
            || prev.state != new.state
            || prev.name != new.name
    }

    /// Run one scan cycle: probe, classify deltas against the previous
    /// scan, update metrics, and adapt the interval. Probe failures are
    /// absorbed (the previous state is retained and an empty change set
    /// returned) unless escalation is purely diagnostic; this method
    /// itself never returns an error for a failed probe call.
    ///
    /// Once `consecutive_failures` reaches the configured threshold the
    /// scanner becomes degraded: a fatal diagnostic is emitted and this
    /// method stops probing (it keeps returning the retained state) until
    /// [`Scanner::reset`] is called.
    pub fn scan_once(&mut self) -> Result<ChangeSet> {
        if self.degraded {
            return Ok(ChangeSet {
                unchanged: self.previous.values().cloned().collect(),
                ..Default::default()
            });
        }

        let scan_start = Instant::now();
        let deadline = Duration::from_secs_f64((self.interval_secs / 2.0).max(0.1));

        let raw = match self.probe.list_processes(deadline) {
            Ok(list) => {
                self.consecutive_failures = 0;
                list
            }
            Err(e) => {
                self.consecutive_failures += 1;
                self.diagnostics.emit(DiagnosticEvent::ProbeFailure {
                    message: e.to_string(),
                    consecutive_failures: self.consecutive_failures,
                });
                self.metrics
                    .set("scanner_probe_failures", self.consecutive_failures as f64);

                if self.consecutive_failures >= self.cfg.max_consecutive_probe_failures {
                    self.degraded = true;
                    self.diagnostics.emit(DiagnosticEvent::ProbeFatal {
                        consecutive_failures: self.consecutive_failures,
                    });
                }

                return Ok(ChangeSet {
                    unchanged: self.previous.values().cloned().collect(),
                    ..Default::default()
                });
            }
        };

        let filtered: Vec<ProcessSnapshot> = raw.into_iter().filter(|s| self.passes_filter(s)).collect();

        let mut appeared = Vec::new();
        let mut changed = Vec::new();
        let mut unchanged = Vec::new();
        let mut current: HashMap<ProcessId, ProcessSnapshot> = HashMap::with_capacity(filtered.len());

        for snap in filtered {
            match self.previous.get(&snap.pid) {
                None => appeared.push(snap.clone()),
                Some(prev) if prev.start_id != snap.start_id => appeared.push(snap.clone()),
                Some(prev) if Self::materially_changed(prev, &snap) => changed.push(snap.clone()),
                Some(_) => unchanged.push(snap.clone()),
            }
            current.insert(snap.pid, snap);
        }

        let departed: Vec<ProcessSnapshot> = self
            .previous
            .iter()
            .filter(|(pid, prev)| match current.get(pid) {
                None => true,
                Some(cur) => cur.start_id != prev.start_id,
            })
            .map(|(_, prev)| prev.clone())
            .collect();

        self.previous = current;
        self.scan_count += 1;

        self.metrics.set("scanner_scan_count", self.scan_count as f64);
        self.metrics
            .set("scanner_scan_duration_seconds", scan_start.elapsed().as_secs_f64());
        self.metrics.set("scanner_processes_seen", self.previous.len() as f64);

        self.adapt_rate();

        Ok(ChangeSet {
            appeared,
            departed,
            changed,
            unchanged,
        })
    }

    /// Widen or narrow the scan interval based on measured self-CPU,
    /// within `[min_interval_secs, max_interval_secs]`.
    fn adapt_rate(&mut self) {
        let self_cpu_pct = self.probe.self_usage().map(|(cpu, _)| cpu).unwrap_or(0.0);
        let beta = self.cfg.rate_adjust_factor;
        let target_pct = self.cfg.target_cpu_fraction * 100.0;

        if self_cpu_pct > target_pct {
            self.interval_secs = (self.interval_secs * (1.0 + beta)).min(self.cfg.max_interval_secs as f64);
        } else if self_cpu_pct < target_pct * 0.5 {
            self.interval_secs = (self.interval_secs * (1.0 - beta)).max(self.cfg.min_interval_secs as f64);
        }
        self.metrics.set("scanner_interval_seconds", self.interval_secs);
    }

    pub fn interval_secs(&self) -> f64 {
        self.interval_secs
    }

    /// Named metrics for this scanner, merged with the consumer registry's
    /// own (e.g. `scanner_consumer_dropped`) once `run` has started, so a
    /// reader only ever needs this one call.
    pub fn metrics(&self) -> HashMap<String, f64> {
        let mut m = self.metrics.snapshot();
        if let Some(registry) = &self.registry {
            m.extend(registry.metrics());
        }
        m
    }

    /// True once consecutive probe failures reached the configured
    /// threshold. Reads (`metrics`, `interval_secs`) keep working while
    /// degraded; only scheduling new scans is suspended.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Clear the degraded state and resume scheduling scans.
    pub fn reset(&mut self) {
        self.degraded = false;
        self.consecutive_failures = 0;
    }

    /// Drive the scan loop until `cancel` fires. Once degraded (see
    /// [`Scanner::is_degraded`]) no new scans are scheduled; the loop keeps
    /// waiting on `cancel` so it can still be stopped, but only
    /// [`Scanner::reset`] resumes probing.
    pub fn run(mut self, registry: Arc<ConsumerRegistry>, cancel: CancelToken) {
        self.registry = Some(Arc::clone(&registry));
        loop {
            if cancel.is_cancelled() {
                return;
            }

            if !self.degraded {
                match self.scan_once() {
                    Ok(change_set) => registry.notify(Arc::new(change_set)),
                    Err(e) => tracing::error!(error = %e, "scan cycle failed"),
                }
            }

            if cancel.wait(Duration::from_secs_f64(self.interval_secs)) {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::probe::MockProbe;
    use super::super::snapshot::ProcessState;
    use crate::diagnostics::channel;
    use pt_common::StartId;

    fn snap(pid: u32, name: &str, cpu: f64, start: u64) -> ProcessSnapshot {
        ProcessSnapshot {
            pid: ProcessId(pid),
            parent_pid: None,
            start_id: StartId::from_linux("boot1", start),
            name: name.into(),
            command_line: name.into(),
            user: "root".into(),
            state: ProcessState::Running,
            cpu_percent: cpu,
            rss_bytes: 1024,
            attributes: HashMap::new(),
        }
    }

    fn scanner(batches: Vec<Vec<ProcessSnapshot>>) -> Scanner<MockProbe> {
        let (sink, _rx) = channel(8);
        Scanner::new(MockProbe::new(batches), ScannerConfig::default(), sink).unwrap()
    }

    #[test]
    fn first_scan_reports_everything_as_appeared() {
        let mut s = scanner(vec![vec![snap(1, "a", 1.0, 1), snap(2, "b", 1.0, 1)]]);
        let cs = s.scan_once().unwrap();
        assert_eq!(cs.appeared.len(), 2);
        assert!(cs.departed.is_empty());
    }

    #[test]
    fn unchanged_process_reported_as_unchanged() {
        let mut s = scanner(vec![
            vec![snap(1, "a", 1.0, 1)],
            vec![snap(1, "a", 1.05, 1)],
        ]);
        s.scan_once().unwrap();
        let cs = s.scan_once().unwrap();
        assert_eq!(cs.unchanged.len(), 1);
        assert!(cs.changed.is_empty());
    }

    #[test]
    fn cpu_jump_reported_as_changed() {
        let mut s = scanner(vec![
            vec![snap(1, "a", 1.0, 1)],
            vec![snap(1, "a", 50.0, 1)],
        ]);
        s.scan_once().unwrap();
        let cs = s.scan_once().unwrap();
        assert_eq!(cs.changed.len(), 1);
    }

    #[test]
    fn departed_process_is_reported() {
        let mut s = scanner(vec![vec![snap(1, "a", 1.0, 1)], vec![]]);
        s.scan_once().unwrap();
        let cs = s.scan_once().unwrap();
        assert_eq!(cs.departed.len(), 1);
    }

    #[test]
    fn pid_reuse_is_departed_then_appeared() {
        let mut s = scanner(vec![
            vec![snap(1, "a", 1.0, 1)],
            vec![snap(1, "b", 1.0, 2)],
        ]);
        s.scan_once().unwrap();
        let cs = s.scan_once().unwrap();
        assert_eq!(cs.departed.len(), 1);
        assert_eq!(cs.appeared.len(), 1);
        assert_eq!(cs.appeared[0].name, "b");
    }

    #[test]
    fn include_pattern_filters_out_non_matching() {
        let (sink, _rx) = channel(8);
        let cfg = ScannerConfig {
            include_pattern: Some("^a$".to_string()),
            ..ScannerConfig::default()
        };
        let mut s = Scanner::new(
            MockProbe::new(vec![vec![snap(1, "a", 1.0, 1), snap(2, "b", 1.0, 1)]]),
            cfg,
            sink,
        )
        .unwrap();
        let cs = s.scan_once().unwrap();
        assert_eq!(cs.appeared.len(), 1);
        assert_eq!(cs.appeared[0].name, "a");
    }

    #[test]
    fn probe_failure_retains_previous_state() {
        let (sink, _rx) = channel(8);
        struct FailingProbe;
        impl PlatformProbe for FailingProbe {
            fn list_processes(&self, _deadline: Duration) -> Result<Vec<ProcessSnapshot>> {
                Err(Error::ProbeTransient("boom".into()))
            }
            fn self_usage(&self) -> Result<(f64, u64)> {
                Ok((0.0, 0))
            }
        }
        let mut s = Scanner::new(FailingProbe, ScannerConfig::default(), sink).unwrap();
        let cs = s.scan_once().unwrap();
        assert!(cs.appeared.is_empty());
        assert_eq!(s.consecutive_failures, 1);
    }

    #[test]
    fn interval_widens_when_over_target() {
        let (sink, _rx) = channel(8);
        struct HotProbe;
        impl PlatformProbe for HotProbe {
            fn list_processes(&self, _deadline: Duration) -> Result<Vec<ProcessSnapshot>> {
                Ok(vec![])
            }
            fn self_usage(&self) -> Result<(f64, u64)> {
                Ok((50.0, 0))
            }
        }
        let mut s = Scanner::new(HotProbe, ScannerConfig::default(), sink).unwrap();
        let before = s.interval_secs();
        s.scan_once().unwrap();
        assert!(s.interval_secs() > before);
    }

    #[test]
    fn repeated_failures_trigger_degraded_state_and_fatal_diagnostic() {
        let (sink, rx) = channel(8);
        struct FailingProbe;
        impl PlatformProbe for FailingProbe {
            fn list_processes(&self, _deadline: Duration) -> Result<Vec<ProcessSnapshot>> {
                Err(Error::ProbeTransient("boom".into()))
            }
            fn self_usage(&self) -> Result<(f64, u64)> {
                Ok((0.0, 0))
            }
        }
        let cfg = ScannerConfig {
            max_consecutive_probe_failures: 2,
            ..ScannerConfig::default()
        };
        let mut s = Scanner::new(FailingProbe, cfg, sink).unwrap();
        assert!(!s.is_degraded());
        s.scan_once().unwrap();
        assert!(!s.is_degraded());
        s.scan_once().unwrap();
        assert!(s.is_degraded());

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(matches!(
            events.last(),
            Some(DiagnosticEvent::ProbeFatal { consecutive_failures: 2 })
        ));

        s.reset();
        assert!(!s.is_degraded());
    }

    #[test]
    fn cancel_token_wakes_waiter_immediately() {
        let token = CancelToken::new();
        let waiter_token = token.clone();
        let handle = std::thread::spawn(move || waiter_token.wait(Duration::from_secs(30)));
        std::thread::sleep(Duration::from_millis(20));
        token.cancel();
        let cancelled = handle.join().unwrap();
        assert!(cancelled);
    }
}
