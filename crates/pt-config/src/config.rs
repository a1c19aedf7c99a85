//! Typed configuration structs for the telemetry subsystem.
//!
//! Field defaults match the configuration table of the telemetry design:
//! scan cadence, sampler capacity and weights, churn handling, and the
//! DDSketch accuracy parameter.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the telemetry subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub sketch: SketchConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig::default(),
            sampler: SamplerConfig::default(),
            sketch: SketchConfig::default(),
        }
    }
}

/// Process scanner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ScannerConfig {
    /// Base scan period in seconds. Adaptive rate control adjusts around
    /// this, never below `min_interval_secs` nor above `max_interval_secs`.
    pub sample_interval_secs: u64,
    /// Floor for adaptive interval widening/narrowing.
    pub min_interval_secs: u64,
    /// Ceiling for adaptive interval widening.
    pub max_interval_secs: u64,
    /// Multiplicative step for adaptive rate control (beta).
    pub rate_adjust_factor: f64,
    /// Target self-CPU usage fraction (0-1) the scanner tries to stay under.
    pub target_cpu_fraction: f64,
    /// Consecutive probe failures before escalating to a fatal diagnostic.
    pub max_consecutive_probe_failures: u32,
    /// Optional include filter (regex over process name or command).
    pub include_pattern: Option<String>,
    /// Optional exclude filter (regex over process name or command).
    pub exclude_pattern: Option<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 15,
            min_interval_secs: 2,
            max_interval_secs: 120,
            rate_adjust_factor: 0.25,
            target_cpu_fraction: 0.0075,
            max_consecutive_probe_failures: 5,
            include_pattern: None,
            exclude_pattern: None,
        }
    }
}

/// Top-N sampler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SamplerConfig {
    /// Sampler implementation selector; only `"topn"` is defined today.
    pub sampler_type: String,
    /// Heap capacity: maximum tracked processes.
    pub max_processes: usize,
    /// CPU-percentage weight in the scoring function.
    pub cpu_weight: f64,
    /// Normalized-RSS weight in the scoring function.
    pub rss_weight: f64,
    /// Scores below this are excluded from ranking.
    pub min_score: f64,
    /// Score EMA smoothing factor. Accepted for forward compatibility; the
    /// sampler currently scores each scan independently and does not apply
    /// this factor (see crate-level design notes).
    pub stability_factor: f64,
    /// Whether churn rate feeds the circuit breaker.
    pub churn_handling_enabled: bool,
    /// Churn EMA (process ids/sec) that opens the circuit breaker.
    pub churn_threshold: f64,
    /// Self-CPU percentage (0-5) that opens the circuit breaker.
    pub max_sampler_cpu_pct: f64,
    /// Grace window (seconds) a departed process id is remembered before
    /// being forgotten, to absorb rapid appear/disappear cycling.
    pub grace_window_secs: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sampler_type: "topn".to_string(),
            max_processes: 500,
            cpu_weight: 0.7,
            rss_weight: 0.3,
            min_score: 0.001,
            stability_factor: 0.8,
            churn_handling_enabled: true,
            churn_threshold: 2000.0,
            max_sampler_cpu_pct: 0.5,
            grace_window_secs: 60,
        }
    }
}

/// DDSketch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SketchConfig {
    /// Relative accuracy parameter (0,1).
    pub gamma: f64,
    /// Maximum distinct sparse buckets before collapsing the lowest-index
    /// range into a single bucket.
    pub collapse_limit: usize,
    /// Density factor controlling the sparse-to-dense store switch.
    pub density_factor: f64,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            gamma: 0.0075,
            collapse_limit: 2048,
            density_factor: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design_table() {
        let cfg = TelemetryConfig::default();
        assert_eq!(cfg.scanner.sample_interval_secs, 15);
        assert_eq!(cfg.sampler.max_processes, 500);
        assert!((cfg.sampler.cpu_weight - 0.7).abs() < 1e-12);
        assert!((cfg.sampler.rss_weight - 0.3).abs() < 1e-12);
        assert!((cfg.sketch.gamma - 0.0075).abs() < 1e-12);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = TelemetryConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TelemetryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn unrecognized_top_level_key_fails_to_deserialize() {
        let mut value = serde_json::to_value(TelemetryConfig::default()).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("bogus".to_string(), serde_json::Value::Bool(true));
        assert!(serde_json::from_value::<TelemetryConfig>(value).is_err());
    }

    #[test]
    fn unrecognized_nested_key_fails_to_deserialize() {
        let mut value = serde_json::to_value(TelemetryConfig::default()).unwrap();
        value["scanner"]
            .as_object_mut()
            .unwrap()
            .insert("made_up_field".to_string(), serde_json::Value::Bool(true));
        assert!(serde_json::from_value::<TelemetryConfig>(value).is_err());
    }
}
