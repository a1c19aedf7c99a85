//! Shared types, IDs, and errors for the telemetry subsystem.
//!
//! This crate provides foundational types shared between the scanner,
//! sampler, and sketch components:
//! - Process identity types with PID-reuse safety guarantees
//! - Schema versioning
//! - A unified error type

pub mod error;
pub mod id;
pub mod schema;

pub use error::{Error, Result};
pub use id::{ProcessId, StartId};
pub use schema::SCHEMA_VERSION;
