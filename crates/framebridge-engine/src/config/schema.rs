use std::time::Duration;

use serde::Deserialize;
use framebridge_core::error::{BridgeError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    pub version: u32,

    /// Exact origin of the other context. No wildcards.
    pub target_domain: String,

    #[serde(default)]
    pub handshake: HandshakeSection,
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(BridgeError::UnsupportedVersion);
        }
        if self.target_domain.trim().is_empty() {
            return Err(BridgeError::Config("target_domain must not be empty".into()));
        }

        self.handshake.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandshakeSection {
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: u64,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl Default for HandshakeSection {
    fn default() -> Self {
        Self {
            time_limit_ms: default_time_limit_ms(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl HandshakeSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=60000).contains(&self.retry_interval_ms) {
            return Err(BridgeError::Config(
                "handshake.retry_interval_ms must be between 1 and 60000".into(),
            ));
        }
        if self.time_limit_ms < self.retry_interval_ms {
            return Err(BridgeError::Config(
                "handshake.time_limit_ms must not be less than retry_interval_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn settings(&self) -> HandshakeSettings {
        HandshakeSettings {
            time_limit: Duration::from_millis(self.time_limit_ms),
            retry_interval: Duration::from_millis(self.retry_interval_ms),
        }
    }
}

fn default_time_limit_ms() -> u64 {
    60000
}
fn default_retry_interval_ms() -> u64 {
    100
}

/// Runtime form of the handshake timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeSettings {
    pub time_limit: Duration,
    pub retry_interval: Duration,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        HandshakeSection::default().settings()
    }
}

impl HandshakeSettings {
    /// Number of `request-api` sends before giving up (limit / interval).
    pub fn max_attempts(&self) -> u32 {
        let interval = self.retry_interval.as_millis().max(1);
        let attempts = (self.time_limit.as_millis() / interval).max(1);
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}
