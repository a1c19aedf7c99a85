//! Process scanning, top-N sampling, and quantile sketching.
//!
//! See the crate-level modules for the three subsystems: [`collect`] (the
//! platform probe boundary and scan loop), [`sampler`] (the top-N sampler),
//! and [`sketch`] ([`sketch::Sketch`], the DDSketch quantile estimator).

pub mod collect;
pub mod diagnostics;
pub mod exit_codes;
pub mod heap;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod sampler;
pub mod score;
pub mod sketch;

pub use diagnostics::{DiagnosticEvent, DiagnosticSink};
pub use exit_codes::ExitCode;
pub use heap::{HeapItem, IndexedMinHeap, InsertOutcome};
pub use metrics::Metrics;
pub use registry::{Consumer, ConsumerRegistry};
pub use sampler::{TopNSampler, UpdateReport};
pub use sketch::{Sketch, SketchParams};

use pt_config::TelemetryConfig;

/// Wires the scanner, sampler, and a diagnostic channel from a single
/// resolved configuration. Library consumers needing more control (custom
/// probes, multiple sketches, their own consumer set) should construct the
/// pieces directly instead of going through this convenience type.
pub struct Telemetry {
    pub sampler: TopNSampler,
    pub registry: ConsumerRegistry,
    pub diagnostics_rx: std::sync::mpsc::Receiver<DiagnosticEvent>,
}

impl Telemetry {
    pub fn new(cfg: &TelemetryConfig) -> Self {
        let (sink, diagnostics_rx) = diagnostics::channel(64);
        let sampler = TopNSampler::new(cfg.sampler.clone(), sink);
        let registry = ConsumerRegistry::new(64);
        Self {
            sampler,
            registry,
            diagnostics_rx,
        }
    }

    pub fn sketch_params(cfg: &TelemetryConfig) -> SketchParams {
        SketchParams {
            alpha: cfg.sketch.gamma,
            collapse_limit: cfg.sketch.collapse_limit,
            density_factor: cfg.sketch.density_factor,
            allow_negative: false,
        }
    }
}
