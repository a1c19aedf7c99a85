//! Diagnostic events.
//!
//! Modules that guard resource limits (the sampler's circuit breaker, the
//! scanner's probe retries) report state transitions as [`DiagnosticEvent`]s.
//! Each event is both pushed onto a bounded channel for the embedding host
//! and emitted as a `tracing` event at the same call site, so a deployment
//! with no consumer attached still gets the information in its logs.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use tracing::warn;

/// A single diagnostic occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// The sampler's circuit breaker opened.
    ModuleOverLimitDetected {
        cpu_pct: f64,
        churn_rate: f64,
    },
    /// The sampler's circuit breaker closed.
    ModuleOverLimitResolved {
        cpu_pct: f64,
        churn_rate: f64,
    },
    /// A platform probe call failed.
    ProbeFailure {
        message: String,
        consecutive_failures: u32,
    },
    /// Consecutive probe failures exceeded the configured threshold; the
    /// scanner has stopped scheduling new scans until reset.
    ProbeFatal {
        consecutive_failures: u32,
    },
}

impl DiagnosticEvent {
    fn log(&self) {
        match self {
            DiagnosticEvent::ModuleOverLimitDetected { cpu_pct, churn_rate } => {
                warn!(cpu_pct, churn_rate, "ModuleOverLimit detected");
            }
            DiagnosticEvent::ModuleOverLimitResolved { cpu_pct, churn_rate } => {
                warn!(cpu_pct, churn_rate, "ModuleOverLimit resolved");
            }
            DiagnosticEvent::ProbeFailure {
                message,
                consecutive_failures,
            } => {
                warn!(message, consecutive_failures, "ProbeFailure");
            }
            DiagnosticEvent::ProbeFatal { consecutive_failures } => {
                warn!(consecutive_failures, "ProbeFatal");
            }
        }
    }
}

/// The writing half of a diagnostic channel. Drops events silently (after
/// logging) if the channel is full; diagnostics are best-effort, never a
/// reason to block the scan or sampler loop.
#[derive(Clone)]
pub struct DiagnosticSink {
    tx: SyncSender<DiagnosticEvent>,
}

impl DiagnosticSink {
    pub fn emit(&self, event: DiagnosticEvent) {
        event.log();
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            // Channel full: the host isn't draining fast enough. The
            // tracing event above already carries the information.
        }
    }
}

/// Create a bounded diagnostic channel with the given capacity.
pub fn channel(capacity: usize) -> (DiagnosticSink, Receiver<DiagnosticEvent>) {
    let (tx, rx) = sync_channel(capacity.max(1));
    (DiagnosticSink { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitted_event_is_received() {
        let (sink, rx) = channel(4);
        sink.emit(DiagnosticEvent::ModuleOverLimitDetected {
            cpu_pct: 0.9,
            churn_rate: 10.0,
        });
        let received = rx.try_recv().unwrap();
        assert_eq!(
            received,
            DiagnosticEvent::ModuleOverLimitDetected {
                cpu_pct: 0.9,
                churn_rate: 10.0
            }
        );
    }

    #[test]
    fn full_channel_drops_without_panicking() {
        let (sink, _rx) = channel(1);
        sink.emit(DiagnosticEvent::ProbeFailure {
            message: "a".into(),
            consecutive_failures: 1,
        });
        sink.emit(DiagnosticEvent::ProbeFailure {
            message: "b".into(),
            consecutive_failures: 2,
        });
    }
}
