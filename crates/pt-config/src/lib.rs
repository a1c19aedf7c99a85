//! Configuration loading, validation, and resolution for the telemetry subsystem.
//!
//! This crate provides:
//! - Typed Rust structs for the scanner/sampler/sketch configuration surface
//! - Config resolution (explicit overrides → environment → defaults)
//! - Semantic validation with descriptive errors
//! - Config snapshots for diagnostics

pub mod config;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use config::{SamplerConfig, ScannerConfig, SketchConfig, TelemetryConfig};
pub use resolve::resolve_config;
pub use snapshot::ConfigSnapshot;
pub use validate::{validate, ValidationError};

/// Schema version for configuration snapshots.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
