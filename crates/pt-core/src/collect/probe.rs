//! The platform probe capability: the abstract "list processes" boundary.
//!
//! Concrete OS-specific process enumeration is out of scope for this crate
//! (see the crate-level design notes); callers supply an implementation of
//! [`PlatformProbe`]. [`MockProbe`] backs the scanner's own tests.

use super::snapshot::ProcessSnapshot;
use pt_common::Result;
use std::time::Duration;

/// Abstract capability to enumerate processes on a host.
///
/// Implementations must honor `deadline`: a call that cannot complete
/// within it should return [`pt_common::Error::ProbeTimeout`] rather than
/// blocking past it, since the scanner's adaptive rate control assumes
/// probe calls are bounded by at most half the scan interval.
pub trait PlatformProbe: Send + Sync {
    /// Enumerate all currently running processes.
    fn list_processes(&self, deadline: Duration) -> Result<Vec<ProcessSnapshot>>;

    /// This process's own CPU/memory usage, used by the scanner's adaptive
    /// rate control and the sampler's circuit breaker.
    fn self_usage(&self) -> Result<(f64, u64)>;
}

/// A scripted [`PlatformProbe`] for tests: returns a fixed sequence of
/// process lists, one per call, repeating the last entry once exhausted.
pub struct MockProbe {
    batches: std::sync::Mutex<Vec<Vec<ProcessSnapshot>>>,
    cursor: std::sync::atomic::AtomicUsize,
    self_usage: (f64, u64),
}

impl MockProbe {
    pub fn new(batches: Vec<Vec<ProcessSnapshot>>) -> Self {
        Self {
            batches: std::sync::Mutex::new(batches),
            cursor: std::sync::atomic::AtomicUsize::new(0),
            self_usage: (0.01, 1024 * 1024),
        }
    }

    pub fn with_self_usage(mut self, cpu_pct: f64, rss_bytes: u64) -> Self {
        self.self_usage = (cpu_pct, rss_bytes);
        self
    }
}

impl PlatformProbe for MockProbe {
    fn list_processes(&self, _deadline: Duration) -> Result<Vec<ProcessSnapshot>> {
        let batches = self.batches.lock().unwrap();
        if batches.is_empty() {
            return Ok(Vec::new());
        }
        let i = self
            .cursor
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            .min(batches.len() - 1);
        Ok(batches[i].clone())
    }

    fn self_usage(&self) -> Result<(f64, u64)> {
        Ok(self.self_usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pt_common::{ProcessId, StartId};
    use std::collections::HashMap;

    fn snap(pid: u32) -> ProcessSnapshot {
        ProcessSnapshot {
            pid: ProcessId(pid),
            parent_pid: None,
            start_id: StartId::from_linux("boot1", 1),
            name: "p".into(),
            command_line: "p".into(),
            user: "root".into(),
            state: super::super::snapshot::ProcessState::Running,
            cpu_percent: 1.0,
            rss_bytes: 1,
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn mock_probe_cycles_through_batches() {
        let probe = MockProbe::new(vec![vec![snap(1)], vec![snap(1), snap(2)]]);
        let first = probe.list_processes(Duration::from_secs(1)).unwrap();
        assert_eq!(first.len(), 1);
        let second = probe.list_processes(Duration::from_secs(1)).unwrap();
        assert_eq!(second.len(), 2);
        // Exhausted: repeats the last batch.
        let third = probe.list_processes(Duration::from_secs(1)).unwrap();
        assert_eq!(third.len(), 2);
    }

    #[test]
    fn empty_batches_yields_empty_list() {
        let probe = MockProbe::new(vec![]);
        assert!(probe.list_processes(Duration::from_secs(1)).unwrap().is_empty());
    }
}
