//! Process identity types.
//!
//! A process is uniquely identified by its `(ProcessId, StartId)` pair;
//! `StartId` disambiguates PID reuse within and across reboots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID wrapper with display formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId(pid)
    }
}

/// Start ID - unique identifier for a specific process incarnation.
///
/// Format: `<boot_id_prefix>-<start_time_ticks>` (Linux)
/// or `<boot_id_prefix>-<pid>-<start_time>` (macOS)
///
/// This disambiguates PID reuse across reboots and within a boot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StartId(pub String);

impl StartId {
    /// Create a new StartId from components (Linux).
    pub fn from_linux(boot_id_prefix: &str, start_time_ticks: u64) -> Self {
        StartId(format!("{}-{}", boot_id_prefix, start_time_ticks))
    }

    /// Create a new StartId from components (macOS).
    pub fn from_macos(boot_id_prefix: &str, pid: u32, start_time: u64) -> Self {
        StartId(format!("{}-{}-{}", boot_id_prefix, pid, start_time))
    }

    /// Parse and validate a StartId string.
    pub fn parse(s: &str) -> Option<Self> {
        // Basic validation: must have at least one hyphen
        if s.contains('-') && !s.is_empty() {
            Some(StartId(s.to_string()))
        } else {
            None
        }
    }
}

impl fmt::Display for StartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_id_linux() {
        let sid = StartId::from_linux("abc12345", 123456789);
        assert_eq!(sid.0, "abc12345-123456789");
    }

    #[test]
    fn test_start_id_macos() {
        let sid = StartId::from_macos("abc12345", 1234, 987654321);
        assert_eq!(sid.0, "abc12345-1234-987654321");
    }
}
