use std::sync::atomic::{AtomicI64, Ordering};

use crate::errors::{codes, Error, Result};

pub const DEFAULT_OFFLINE_TIMEOUT_MINUTES: i64 = 30;

/// Process-wide configuration. The offline timeout is mutable at runtime via
/// the config endpoint and read on every liveness query; the analytics flag
/// is fixed at startup.
#[derive(Debug)]
pub struct RuntimeConfig {
    offline_timeout_minutes: AtomicI64,
    analytics_enabled: bool,
}

impl RuntimeConfig {
    pub fn new(offline_timeout_minutes: i64, analytics_enabled: bool) -> Self {
        RuntimeConfig {
            offline_timeout_minutes: AtomicI64::new(offline_timeout_minutes),
            analytics_enabled,
        }
    }

    pub fn offline_timeout_minutes(&self) -> i64 {
        self.offline_timeout_minutes.load(Ordering::Relaxed)
    }

    /// Rejects non-positive timeouts, leaving the configured value unchanged.
    pub fn set_offline_timeout_minutes(&self, minutes: i64) -> Result<()> {
        if minutes <= 0 {
            return Err(Error::validation(
                codes::DEVICE_OFFLINE_TIMEOUT_INVALID,
                "invalid offline timeout",
                format!("timeout must be a positive number of minutes, got {minutes}"),
            ));
        }
        self.offline_timeout_minutes.store(minutes, Ordering::Relaxed);
        Ok(())
    }

    pub fn analytics_enabled(&self) -> bool {
        self.analytics_enabled
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig::new(DEFAULT_OFFLINE_TIMEOUT_MINUTES, false)
    }
}
