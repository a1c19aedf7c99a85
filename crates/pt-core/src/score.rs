//! Process scoring.
//!
//! The score is a weighted sum of CPU percentage and memory share, used by
//! the top-N sampler to decide which processes are worth tracking. See
//! [`ScoringContext`] for the knobs and the crate-level design notes for why
//! this crate does not apply an exponential moving average across scans.

use pt_config::SamplerConfig;

/// Parameters and per-batch context needed to score a process snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext {
    pub cpu_weight: f64,
    pub rss_weight: f64,
    pub min_score: f64,
    /// Accepted for forward compatibility with [`SamplerConfig::stability_factor`];
    /// not applied by [`score`]. See the crate-level design notes.
    pub stability_factor: f64,
    /// Sum of resident memory (bytes) across the current scan batch, used
    /// to normalize `rss_weight` onto the same 0-100 scale as `cpu_weight`.
    pub total_rss_observed: u64,
}

impl ScoringContext {
    pub fn from_config(cfg: &SamplerConfig, total_rss_observed: u64) -> Self {
        Self {
            cpu_weight: cfg.cpu_weight,
            rss_weight: cfg.rss_weight,
            min_score: cfg.min_score,
            stability_factor: cfg.stability_factor,
            total_rss_observed,
        }
    }
}

/// Compute `w_cpu * cpu_pct + w_mem * normalized_rss` for one process.
///
/// `normalized_rss` is `100 * rss / total_rss_observed`, so both terms are
/// on a comparable 0-100 scale before weighting. When `total_rss_observed`
/// is zero (an empty or all-zero-RSS batch) the memory term is zero.
pub fn score(cpu_pct: f64, rss_bytes: u64, ctx: &ScoringContext) -> f64 {
    let normalized_rss = if ctx.total_rss_observed == 0 {
        0.0
    } else {
        100.0 * (rss_bytes as f64) / (ctx.total_rss_observed as f64)
    };
    ctx.cpu_weight * cpu_pct + ctx.rss_weight * normalized_rss
}

/// Whether a computed score clears the configured ranking threshold.
pub fn is_rankable(score: f64, ctx: &ScoringContext) -> bool {
    score >= ctx.min_score
}
