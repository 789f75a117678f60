//! # Hub Configuration
//!
//! Timing and size settings for observer sessions.
//!
//! ## Liveness Timeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One Observer Connection                             │
//! │                                                                         │
//! │  t=0s          t=54s               t=60s                               │
//! │   │              │                   │                                  │
//! │   │  any frame   │  Ping ──►         │                                  │
//! │   │  resets the  │  ◄── Pong         │  no frame since last reset?     │
//! │   │  read window │  (resets window)  │  → ReadTimeout, session ends    │
//! │   ▼              ▼                   ▼                                  │
//! │  ──────────────────────────────────────────────────────────────►        │
//! │                                                                         │
//! │  ping_period = 9/10 × pong_wait, so a healthy peer always answers      │
//! │  before the read window closes.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! These settings live in the `[hub]` section of the server's `fifo.toml`:
//! ```toml
//! [hub]
//! pong_wait_secs = 60
//! write_wait_secs = 10
//! max_message_size = 512
//! outbound_buffer = 64
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HubError, HubResult};

/// Observer session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubSettings {
    /// Read window: the session ends if nothing arrives for this long.
    #[serde(default = "default_pong_wait")]
    pub pong_wait_secs: u64,

    /// Deadline for a single frame write.
    #[serde(default = "default_write_wait")]
    pub write_wait_secs: u64,

    /// Inbound frame cap in bytes. Observers send nothing but control frames.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Frames queued per observer before it is treated as stalled.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

fn default_pong_wait() -> u64 {
    60
}

fn default_write_wait() -> u64 {
    10
}

fn default_max_message_size() -> usize {
    512
}

fn default_outbound_buffer() -> usize {
    64
}

impl Default for HubSettings {
    fn default() -> Self {
        HubSettings {
            pong_wait_secs: default_pong_wait(),
            write_wait_secs: default_write_wait(),
            max_message_size: default_max_message_size(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl HubSettings {
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    /// Keepalive interval, 9/10 of the read window.
    pub fn ping_period(&self) -> Duration {
        self.pong_wait() * 9 / 10
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_secs)
    }

    /// Validates the settings.
    pub fn validate(&self) -> HubResult<()> {
        if self.pong_wait_secs == 0 {
            return Err(HubError::Config("pong_wait_secs must be greater than 0".into()));
        }

        if self.ping_period() >= self.pong_wait() {
            return Err(HubError::Config(
                "ping period must be shorter than the read window".into(),
            ));
        }

        if self.write_wait_secs == 0 {
            return Err(HubError::Config("write_wait_secs must be greater than 0".into()));
        }

        if self.max_message_size == 0 {
            return Err(HubError::Config("max_message_size must be greater than 0".into()));
        }

        if self.outbound_buffer == 0 {
            return Err(HubError::Config("outbound_buffer must be greater than 0".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let settings = HubSettings::default();
        assert_eq!(settings.pong_wait(), Duration::from_secs(60));
        assert_eq!(settings.ping_period(), Duration::from_secs(54));
        assert_eq!(settings.write_wait(), Duration::from_secs(10));
        assert_eq!(settings.max_message_size, 512);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut settings = HubSettings::default();

        settings.pong_wait_secs = 0;
        assert!(settings.validate().is_err());

        settings.pong_wait_secs = 30;
        settings.outbound_buffer = 0;
        assert!(settings.validate().is_err());

        settings.outbound_buffer = 8;
        settings.max_message_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: HubSettings = toml::from_str("pong_wait_secs = 20").unwrap();
        assert_eq!(settings.pong_wait_secs, 20);
        assert_eq!(settings.ping_period(), Duration::from_secs(18));
        assert_eq!(settings.outbound_buffer, 64);
    }
}
