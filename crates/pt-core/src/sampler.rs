//! Top-N Sampler: heap + scoring + churn bookkeeping + circuit breaker.
//!
//! Orchestrates the indexed min-heap and the scoring function over
//! successive batches of process snapshots, tracking churn as an EMA and
//! tripping a hysteresis circuit breaker when the sampler itself is
//! spending too much time or seeing too much process turnover.

use crate::collect::snapshot::ProcessSnapshot;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::heap::{HeapItem, IndexedMinHeap, InsertOutcome};
use crate::metrics::Metrics;
use crate::score::{is_rankable, score, ScoringContext};
use pt_common::{ProcessId, Result};
use pt_config::SamplerConfig;
use pt_math::Ema;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
struct TrackedProcess {
    pid: ProcessId,
    score: f64,
    cpu_percent: f64,
}

impl HeapItem for TrackedProcess {
    type Id = ProcessId;
    fn heap_id(&self) -> ProcessId {
        self.pid
    }
    fn heap_score(&self) -> f64 {
        self.score
    }
}

/// Outcome of one [`TopNSampler::update`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateReport {
    pub tracked: usize,
    pub updated: usize,
    pub churn_rate: f64,
    pub circuit_breaker_open: bool,
    pub update_time_seconds: f64,
    pub capture_ratio: f64,
}

/// The mutable half of a sampler: everything `update()` touches, guarded by
/// a single `RwLock` so readers (`top_n`, `metrics`, ...) never block each
/// other and only contend with the occasional writer.
struct SamplerState {
    heap: IndexedMinHeap<TrackedProcess>,
    churn_ema: Ema,
    previous_ids: HashSet<ProcessId>,
    recently_seen: HashMap<ProcessId, Instant>,
    circuit_open: bool,
    metrics: Metrics,
    last_update_at: Option<Instant>,
    last_update_seconds: Option<f64>,
}

/// Orchestrates the indexed heap, scoring, churn EMA, and circuit breaker
/// over successive scan batches. A multi-reader hot path: `top_n`,
/// `metrics`, and the other read accessors take a shared read lock and can
/// run concurrently with each other, while `update` takes the write lock
/// only for the duration of one batch.
pub struct TopNSampler {
    state: RwLock<SamplerState>,
    cfg: SamplerConfig,
    diagnostics: DiagnosticSink,
    created_at: Instant,
}

impl TopNSampler {
    pub fn new(cfg: SamplerConfig, diagnostics: DiagnosticSink) -> Self {
        let max_processes = cfg.max_processes;
        Self {
            state: RwLock::new(SamplerState {
                heap: IndexedMinHeap::new(max_processes),
                churn_ema: Ema::new(0.7),
                previous_ids: HashSet::new(),
                recently_seen: HashMap::new(),
                circuit_open: false,
                metrics: Metrics::new(60),
                last_update_at: None,
                last_update_seconds: None,
            }),
            cfg,
            diagnostics,
            created_at: Instant::now(),
        }
    }

    /// Process one batch of snapshots. See the crate-level design notes for
    /// the seven-step update protocol.
    pub fn update(&self, batch: &[ProcessSnapshot], now: Instant) -> Result<UpdateReport> {
        let wall_start = Instant::now();
        let mut state = self.state.write().unwrap();

        let elapsed_secs = match state.last_update_at {
            Some(prev) => now.saturating_duration_since(prev).as_secs_f64().max(1e-6),
            None => 1.0,
        };
        state.last_update_at = Some(now);

        let grace = self.cfg.grace_window_secs as f64;
        state
            .recently_seen
            .retain(|_, seen_at| now.saturating_duration_since(*seen_at).as_secs_f64() <= grace);

        let current_ids: HashSet<ProcessId> = batch.iter().map(|s| s.pid).collect();
        let new_count = current_ids
            .iter()
            .filter(|id| !state.previous_ids.contains(id) && !state.recently_seen.contains_key(id))
            .count();
        let churn_rate = new_count as f64 / elapsed_secs;
        let churn_value = if self.cfg.churn_handling_enabled {
            state.churn_ema.update(churn_rate)
        } else {
            0.0
        };

        let prior_update_seconds = state.last_update_seconds.unwrap_or(0.0);
        self.evaluate_circuit_breaker(&mut state, prior_update_seconds, churn_value);

        let mut working: Vec<&ProcessSnapshot> = batch.iter().collect();
        if state.circuit_open && !working.is_empty() {
            let keep = ((working.len() as f64 * 0.1).ceil() as usize)
                .max(10)
                .min(working.len());
            // Deterministic truncation, not a random sample.
            working.truncate(keep);
        }

        let total_rss: u64 = working.iter().map(|s| s.rss_bytes).sum();
        let ctx = ScoringContext::from_config(&self.cfg, total_rss);

        let mut updated_count = 0usize;
        for snap in &working {
            let s = score(snap.cpu_percent, snap.rss_bytes, &ctx);
            if !is_rankable(s, &ctx) {
                continue;
            }
            let item = TrackedProcess {
                pid: snap.pid,
                score: s,
                cpu_percent: snap.cpu_percent,
            };
            if matches!(state.heap.insert_or_replace(item), InsertOutcome::Updated) {
                updated_count += 1;
            }
            state.recently_seen.remove(&snap.pid);
        }

        let departed: Vec<ProcessId> = state.previous_ids.difference(&current_ids).copied().collect();
        for id in departed {
            state.heap.remove(id);
            state.recently_seen.insert(id, now);
        }
        state.previous_ids = current_ids;

        let total_cpu_all: f64 = batch.iter().map(|s| s.cpu_percent).sum();
        let tracked_cpu: f64 = state.heap.iter().map(|t| t.cpu_percent).sum();
        let capture_ratio = if total_cpu_all <= 0.0 {
            100.0
        } else {
            tracked_cpu / total_cpu_all * 100.0
        };

        let update_time_seconds = wall_start.elapsed().as_secs_f64();
        state.last_update_seconds = Some(update_time_seconds);

        let tracked = state.heap.len();
        let circuit_breaker_open = state.circuit_open;
        state.metrics.set("topn_processes_tracked", tracked as f64);
        state.metrics.set("topn_processes_updated", updated_count as f64);
        state.metrics.set("topn_churn_rate", churn_value);
        state
            .metrics
            .set("topn_circuit_breaker", if circuit_breaker_open { 1.0 } else { 0.0 });
        state.metrics.set("topn_update_time_seconds", update_time_seconds);
        state.metrics.set("topn_capture_ratio", capture_ratio);
        state
            .metrics
            .set("sampler_uptime_seconds", self.created_at.elapsed().as_secs_f64());

        Ok(UpdateReport {
            tracked,
            updated: updated_count,
            churn_rate: churn_value,
            circuit_breaker_open,
            update_time_seconds,
            capture_ratio,
        })
    }

    fn evaluate_circuit_breaker(&self, state: &mut SamplerState, prior_update_seconds: f64, churn_value: f64) {
        let cpu_threshold = self.cfg.max_sampler_cpu_pct / 100.0;
        let churn_threshold = self.cfg.churn_threshold;
        let cpu_over = prior_update_seconds > cpu_threshold;
        let churn_over = self.cfg.churn_handling_enabled && churn_value > churn_threshold;

        if !state.circuit_open {
            if cpu_over || churn_over {
                state.circuit_open = true;
                self.diagnostics.emit(DiagnosticEvent::ModuleOverLimitDetected {
                    cpu_pct: prior_update_seconds * 100.0,
                    churn_rate: churn_value,
                });
            }
        } else {
            let cpu_closed = prior_update_seconds < cpu_threshold * 0.7;
            let churn_closed = !self.cfg.churn_handling_enabled || churn_value < churn_threshold * 0.7;
            if cpu_closed && churn_closed {
                state.circuit_open = false;
                self.diagnostics.emit(DiagnosticEvent::ModuleOverLimitResolved {
                    cpu_pct: prior_update_seconds * 100.0,
                    churn_rate: churn_value,
                });
            }
        }
    }

    /// Snapshot the top `k` tracked processes, descending by score.
    pub fn top_n(&self, k: usize) -> Vec<(ProcessId, f64)> {
        let state = self.state.read().unwrap();
        state.heap.top_n(k).iter().map(|t| (t.pid, t.score)).collect()
    }

    pub fn contains(&self, pid: ProcessId) -> bool {
        self.state.read().unwrap().heap.contains(pid)
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().unwrap().heap.is_empty()
    }

    pub fn circuit_breaker_open(&self) -> bool {
        self.state.read().unwrap().circuit_open
    }

    pub fn metrics(&self) -> HashMap<String, f64> {
        self.state.read().unwrap().metrics.snapshot()
    }

    pub fn record_self_usage(&self, cpu_pct: f64, rss_bytes: u64) {
        let mut state = self.state.write().unwrap();
        state.metrics.set("sampler_cpu_percent", cpu_pct);
        state.metrics.set("sampler_rss_bytes", rss_bytes as f64);
    }

    pub fn resources(&self) -> (f64, u64) {
        let state = self.state.read().unwrap();
        (
            state.metrics.get("sampler_cpu_percent").unwrap_or(0.0),
            state.metrics.get("sampler_rss_bytes").unwrap_or(0.0) as u64,
        )
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.created_at.elapsed().as_secs_f64()
    }

    /// Force the measurement the circuit breaker will evaluate on the next
    /// call to [`TopNSampler::update`], simulating a slow or fast prior
    /// update without actually taking that long.
    #[cfg(test)]
    pub fn inject_last_update_seconds(&self, seconds: f64) {
        self.state.write().unwrap().last_update_seconds = Some(seconds);
    }
}
