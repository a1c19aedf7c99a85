//! Error types shared across the telemetry subsystem.

use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the telemetry subsystem.
///
/// Variants are grouped into numbered ranges (see [`Error::code`]) so that
/// callers reporting errors in structured form can key off a stable integer
/// without matching on the variant itself.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown configuration key: {0}")]
    UnknownConfigKey(String),

    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    // Collection errors (20-29)
    #[error("process collection failed: {0}")]
    Collection(String),

    #[error("process {pid} not found")]
    ProcessNotFound { pid: u32 },

    #[error("process identity mismatch: expected start_id={expected}, got {actual}")]
    IdentityMismatch { expected: String, actual: String },

    #[error("permission denied accessing process {pid}")]
    PermissionDenied { pid: u32 },

    #[error("probe call timed out after {millis}ms")]
    ProbeTimeout { millis: u64 },

    #[error("platform probe failed: {0}")]
    ProbeTransient(String),

    #[error("platform probe failed repeatedly: {0}")]
    ProbeFatal(String),

    // Sampler errors (30-39)
    #[error("consumer {name} saturated, change set dropped")]
    ConsumerSaturated { name: String },

    #[error("numerical instability detected: {0}")]
    NumericalInstability(String),

    // Sketch errors (40-49)
    #[error("cannot merge sketches with incompatible gamma ({a} vs {b})")]
    IncompatibleSketch { a: f64, b: f64 },

    #[error("value {0} unsupported by sketch configuration")]
    UnsupportedValue(f64),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Platform errors (70-79)
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("capability not available: {0}")]
    CapabilityMissing(String),

    // Lifecycle errors (90-99)
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Used for structured error reporting in diagnostics and logs.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::UnknownConfigKey(_) => 11,
            Error::SchemaValidation(_) => 13,
            Error::Collection(_) => 20,
            Error::ProcessNotFound { .. } => 21,
            Error::IdentityMismatch { .. } => 22,
            Error::PermissionDenied { .. } => 23,
            Error::ProbeTimeout { .. } => 24,
            Error::ProbeTransient(_) => 25,
            Error::ProbeFatal(_) => 26,
            Error::ConsumerSaturated { .. } => 30,
            Error::NumericalInstability(_) => 31,
            Error::IncompatibleSketch { .. } => 40,
            Error::UnsupportedValue(_) => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::UnsupportedPlatform(_) => 70,
            Error::CapabilityMissing(_) => 71,
            Error::Cancelled => 90,
        }
    }
}
