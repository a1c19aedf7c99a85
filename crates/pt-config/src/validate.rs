//! Semantic validation of a resolved [`TelemetryConfig`].

use crate::config::{SamplerConfig, ScannerConfig, SketchConfig, TelemetryConfig};
use thiserror::Error;

/// A single configuration validation failure.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("scanner.sample_interval_secs must be >= 1, got {0}")]
    SampleIntervalTooSmall(u64),

    #[error("scanner.min_interval_secs ({min}) must be <= sample_interval_secs ({base}) <= max_interval_secs ({max})")]
    IntervalBoundsInverted { min: u64, base: u64, max: u64 },

    #[error("scanner.rate_adjust_factor must be in (0.0, 1.0), got {0}")]
    RateAdjustFactorOutOfRange(f64),

    #[error("sampler.max_processes must be > 0")]
    MaxProcessesZero,

    #[error("sampler.cpu_weight and rss_weight must each be >= 0 and sum > 0 (got {cpu}, {rss})")]
    WeightsInvalid { cpu: f64, rss: f64 },

    #[error("sampler.min_score must be >= 0, got {0}")]
    MinScoreNegative(f64),

    #[error("sampler.stability_factor must be in [0.0, 1.0], got {0}")]
    StabilityFactorOutOfRange(f64),

    #[error("sampler.churn_threshold must be > 0, got {0}")]
    ChurnThresholdNonPositive(f64),

    #[error("sampler.max_sampler_cpu_pct must be in (0.0, 5.0], got {0}")]
    MaxSamplerCpuOutOfRange(f64),

    #[error("sketch.gamma must be in (0.0, 1.0), got {0}")]
    GammaOutOfRange(f64),

    #[error("sketch.collapse_limit must be > 0")]
    CollapseLimitZero,

    #[error("sketch.density_factor must be >= 1.0, got {0}")]
    DensityFactorTooSmall(f64),
}

/// Validate a scanner configuration in isolation.
pub fn validate_scanner(cfg: &ScannerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if cfg.sample_interval_secs < 1 {
        errors.push(ValidationError::SampleIntervalTooSmall(
            cfg.sample_interval_secs,
        ));
    }
    if !(cfg.min_interval_secs <= cfg.sample_interval_secs
        && cfg.sample_interval_secs <= cfg.max_interval_secs)
    {
        errors.push(ValidationError::IntervalBoundsInverted {
            min: cfg.min_interval_secs,
            base: cfg.sample_interval_secs,
            max: cfg.max_interval_secs,
        });
    }
    if !(cfg.rate_adjust_factor > 0.0 && cfg.rate_adjust_factor < 1.0) {
        errors.push(ValidationError::RateAdjustFactorOutOfRange(
            cfg.rate_adjust_factor,
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a sampler configuration in isolation.
pub fn validate_sampler(cfg: &SamplerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if cfg.max_processes == 0 {
        errors.push(ValidationError::MaxProcessesZero);
    }
    if cfg.cpu_weight < 0.0 || cfg.rss_weight < 0.0 || cfg.cpu_weight + cfg.rss_weight <= 0.0 {
        errors.push(ValidationError::WeightsInvalid {
            cpu: cfg.cpu_weight,
            rss: cfg.rss_weight,
        });
    }
    if cfg.min_score < 0.0 {
        errors.push(ValidationError::MinScoreNegative(cfg.min_score));
    }
    if !(0.0..=1.0).contains(&cfg.stability_factor) {
        errors.push(ValidationError::StabilityFactorOutOfRange(
            cfg.stability_factor,
        ));
    }
    if cfg.churn_threshold <= 0.0 {
        errors.push(ValidationError::ChurnThresholdNonPositive(
            cfg.churn_threshold,
        ));
    }
    if !(cfg.max_sampler_cpu_pct > 0.0 && cfg.max_sampler_cpu_pct <= 5.0) {
        errors.push(ValidationError::MaxSamplerCpuOutOfRange(
            cfg.max_sampler_cpu_pct,
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a sketch configuration in isolation.
pub fn validate_sketch(cfg: &SketchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !(cfg.gamma > 0.0 && cfg.gamma < 1.0) {
        errors.push(ValidationError::GammaOutOfRange(cfg.gamma));
    }
    if cfg.collapse_limit == 0 {
        errors.push(ValidationError::CollapseLimitZero);
    }
    if cfg.density_factor < 1.0 {
        errors.push(ValidationError::DensityFactorTooSmall(cfg.density_factor));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a complete configuration, collecting every failure rather than
/// stopping at the first one.
pub fn validate(cfg: &TelemetryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    if let Err(e) = validate_scanner(&cfg.scanner) {
        errors.extend(e);
    }
    if let Err(e) = validate_sampler(&cfg.sampler) {
        errors.extend(e);
    }
    if let Err(e) = validate_sketch(&cfg.sketch) {
        errors.extend(e);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&TelemetryConfig::default()).is_ok());
    }

    #[test]
    fn zero_interval_rejected() {
        let mut cfg = TelemetryConfig::default();
        cfg.scanner.sample_interval_secs = 0;
        let errs = validate(&cfg).unwrap_err();
        assert!(errs.contains(&ValidationError::SampleIntervalTooSmall(0)));
    }

    #[test]
    fn zero_weights_rejected() {
        let mut cfg = TelemetryConfig::default();
        cfg.sampler.cpu_weight = 0.0;
        cfg.sampler.rss_weight = 0.0;
        let errs = validate(&cfg).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, ValidationError::WeightsInvalid { .. })));
    }

    #[test]
    fn gamma_out_of_range_rejected() {
        let mut cfg = TelemetryConfig::default();
        cfg.sketch.gamma = 1.5;
        let errs = validate(&cfg).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, ValidationError::GammaOutOfRange(_))));
    }

    #[test]
    fn collects_multiple_errors_at_once() {
        let mut cfg = TelemetryConfig::default();
        cfg.sampler.max_processes = 0;
        cfg.sketch.collapse_limit = 0;
        let errs = validate(&cfg).unwrap_err();
        assert!(errs.len() >= 2);
    }
}
