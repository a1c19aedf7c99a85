//! Exit codes for the pt-core CLI harness.

/// Exit codes for the demonstration binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Ran and shut down cleanly.
    Clean = 0,
    /// Configuration failed validation.
    ConfigError = 10,
    /// The scanner or sampler hit an unrecoverable runtime error.
    RuntimeError = 11,
    /// Internal/unknown error.
    InternalError = 99,
}

impl ExitCode {
    /// Convert to `i32` for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
