//! Configuration resolution: defaults → environment variables → explicit overrides.
//!
//! Loading a configuration *file* from disk is out of scope for this
//! crate — the embedding host is responsible for discovering and parsing
//! its own config file format and handing the result in as `overrides`.

use crate::config::TelemetryConfig;
use std::env;
use std::str::FromStr;

fn env_override<T: FromStr>(key: &str, current: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or(current),
        Err(_) => current,
    }
}

/// Resolve a [`TelemetryConfig`] from compiled-in defaults, overlaid with
/// environment variables, overlaid with an optional explicit override
/// struct supplied by the embedding host.
///
/// Precedence (lowest to highest): defaults → environment → `overrides`.
pub fn resolve_config(overrides: Option<TelemetryConfig>) -> TelemetryConfig {
    let mut cfg = TelemetryConfig::default();

    cfg.scanner.sample_interval_secs = env_override(
        "PT_SAMPLE_INTERVAL_SECS",
        cfg.scanner.sample_interval_secs,
    );
    cfg.scanner.min_interval_secs =
        env_override("PT_MIN_INTERVAL_SECS", cfg.scanner.min_interval_secs);
    cfg.scanner.max_interval_secs =
        env_override("PT_MAX_INTERVAL_SECS", cfg.scanner.max_interval_secs);
    cfg.scanner.rate_adjust_factor =
        env_override("PT_RATE_ADJUST_FACTOR", cfg.scanner.rate_adjust_factor);
    cfg.scanner.target_cpu_fraction =
        env_override("PT_SCANNER_TARGET_CPU", cfg.scanner.target_cpu_fraction);
    cfg.scanner.max_consecutive_probe_failures = env_override(
        "PT_MAX_PROBE_FAILURES",
        cfg.scanner.max_consecutive_probe_failures,
    );
    if let Ok(pattern) = env::var("PT_INCLUDE_PATTERN") {
        cfg.scanner.include_pattern = Some(pattern);
    }
    if let Ok(pattern) = env::var("PT_EXCLUDE_PATTERN") {
        cfg.scanner.exclude_pattern = Some(pattern);
    }

    if let Ok(sampler_type) = env::var("PT_SAMPLER_TYPE") {
        cfg.sampler.sampler_type = sampler_type;
    }
    cfg.sampler.max_processes = env_override("PT_MAX_PROCESSES", cfg.sampler.max_processes);
    cfg.sampler.cpu_weight = env_override("PT_CPU_WEIGHT", cfg.sampler.cpu_weight);
    cfg.sampler.rss_weight = env_override("PT_RSS_WEIGHT", cfg.sampler.rss_weight);
    cfg.sampler.min_score = env_override("PT_MIN_SCORE", cfg.sampler.min_score);
    cfg.sampler.stability_factor =
        env_override("PT_STABILITY_FACTOR", cfg.sampler.stability_factor);
    cfg.sampler.churn_handling_enabled = env_override(
        "PT_CHURN_HANDLING_ENABLED",
        cfg.sampler.churn_handling_enabled,
    );
    cfg.sampler.churn_threshold =
        env_override("PT_CHURN_THRESHOLD", cfg.sampler.churn_threshold);
    cfg.sampler.max_sampler_cpu_pct =
        env_override("PT_MAX_SAMPLER_CPU_PCT", cfg.sampler.max_sampler_cpu_pct);
    cfg.sampler.grace_window_secs =
        env_override("PT_GRACE_WINDOW_SECS", cfg.sampler.grace_window_secs);

    cfg.sketch.gamma = env_override("PT_SKETCH_GAMMA", cfg.sketch.gamma);
    cfg.sketch.collapse_limit =
        env_override("PT_SKETCH_COLLAPSE_LIMIT", cfg.sketch.collapse_limit);
    cfg.sketch.density_factor =
        env_override("PT_SKETCH_DENSITY_FACTOR", cfg.sketch.density_factor);

    if let Some(ov) = overrides {
        merge_overrides(&mut cfg, ov);
    }

    cfg
}

/// Merge `ov` into `cfg` field-by-field: a field only wins if it differs
/// from the compiled-in default, so fields the caller didn't explicitly set
/// (and therefore left at their `Default` value while building `ov`, the
/// `..ScannerConfig::default()` pattern) don't clobber an env-resolved
/// value. This only distinguishes "explicitly set" from "left default" when
/// the caller's intended override actually differs from the default; an
/// override that deliberately sets a field back to its default value is
/// indistinguishable from not having set it at all.
fn merge_overrides(cfg: &mut TelemetryConfig, ov: TelemetryConfig) {
    let default = TelemetryConfig::default();

    macro_rules! merge_field {
        ($section:ident, $field:ident) => {
            if ov.$section.$field != default.$section.$field {
                cfg.$section.$field = ov.$section.$field.clone();
            }
        };
    }

    merge_field!(scanner, sample_interval_secs);
    merge_field!(scanner, min_interval_secs);
    merge_field!(scanner, max_interval_secs);
    merge_field!(scanner, rate_adjust_factor);
    merge_field!(scanner, target_cpu_fraction);
    merge_field!(scanner, max_consecutive_probe_failures);
    merge_field!(scanner, include_pattern);
    merge_field!(scanner, exclude_pattern);

    merge_field!(sampler, sampler_type);
    merge_field!(sampler, max_processes);
    merge_field!(sampler, cpu_weight);
    merge_field!(sampler, rss_weight);
    merge_field!(sampler, min_score);
    merge_field!(sampler, stability_factor);
    merge_field!(sampler, churn_handling_enabled);
    merge_field!(sampler, churn_threshold);
    merge_field!(sampler, max_sampler_cpu_pct);
    merge_field!(sampler, grace_window_secs);

    merge_field!(sketch, gamma);
    merge_field!(sketch, collapse_limit);
    merge_field!(sketch, density_factor);
}
