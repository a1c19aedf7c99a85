//! Config snapshots for diagnostics and session telemetry.

use crate::config::TelemetryConfig;
use crate::CONFIG_SCHEMA_VERSION;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// An immutable, timestamped copy of the resolved configuration, suitable
/// for embedding in a diagnostic event or a session's opening log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub schema_version: String,
    pub captured_at: String,
    pub config: TelemetryConfig,
}

impl ConfigSnapshot {
    /// Capture a snapshot of the given configuration at the current time.
    pub fn capture(config: &TelemetryConfig) -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            captured_at: Utc::now().to_rfc3339(),
            config: config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_captures_config() {
        let cfg = TelemetryConfig::default();
        let snap = ConfigSnapshot::capture(&cfg);
        assert_eq!(snap.config, cfg);
        assert_eq!(snap.schema_version, CONFIG_SCHEMA_VERSION);
    }

    #[test]
    fn snapshot_serializes() {
        let cfg = TelemetryConfig::default();
        let snap = ConfigSnapshot::capture(&cfg);
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("schema_version"));
    }
}
