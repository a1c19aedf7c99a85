//! Numerical stability primitives for the telemetry subsystem.
//!
//! The sketch's bucket mapping and the sampler's churn/CPU smoothing both
//! need a small set of numerically careful building blocks: exponential
//! moving averages, compensated (Kahan) summation for running totals that
//! accumulate over many scans, and the log-space helpers the DDSketch
//! bucket index depends on.

pub mod ema;
pub mod kahan;
pub mod logspace;

pub use ema::Ema;
pub use kahan::KahanSum;
pub use logspace::{gamma_from_alpha, bucket_index, bucket_value};
