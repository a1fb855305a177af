//! Viewer configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use crate::channel::DEFAULT_EVENT;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{PoseGraphError, PoseGraphResult};

/// Producer endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:5000";

/// Settings for connecting a viewer to a producer. Every field has a default, so a config
/// file only needs the values it changes.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Producer `host:port`.
    pub endpoint: String,
    /// Event name carrying snapshots.
    pub event: String,
    /// Frame shown until the caller selects another.
    pub active_frame: u64,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Upper bound on one receive wait, in milliseconds; cancellation is noticed at this
    /// granularity.
    pub poll_interval_ms: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            event: DEFAULT_EVENT.to_string(),
            active_frame: 0,
            connect_timeout_ms: 5_000,
            poll_interval_ms: 250,
        }
    }
}

impl ViewerConfig {
    /// Load from a JSON file and validate.
    pub fn from_path(path: impl AsRef<Path>) -> PoseGraphResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            PoseGraphError::config(format!("open config '{}': {e}", path.display()))
        })?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f)).map_err(|e| {
            PoseGraphError::config(format!("parse config '{}': {e}", path.display()))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check field invariants.
    pub fn validate(&self) -> PoseGraphResult<()> {
        let endpoint = self.endpoint.trim();
        let has_port = endpoint
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !has_port {
            return Err(PoseGraphError::config(format!(
                "endpoint \"{}\" must be host:port",
                self.endpoint
            )));
        }
        if self.event.trim().is_empty() {
            return Err(PoseGraphError::config("event must be non-empty"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(PoseGraphError::config("connect_timeout_ms must be > 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(PoseGraphError::config("poll_interval_ms must be > 0"));
        }
        Ok(())
    }

    /// Frame to compose initially.
    pub fn active_frame(&self) -> FrameIndex {
        FrameIndex(self.active_frame)
    }

    /// Connection timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Receive poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
#[path = "../tests/unit/config/config.rs"]
mod tests;
