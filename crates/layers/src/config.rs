use std::time::Duration;

use scene::PickOptions;
use serde::{Deserialize, Serialize};
use streaming::RetryPolicy;

/// Engine tuning. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet window before descriptor toggles are reconciled.
    pub debounce_ms: u64,
    pub retry_base_ms: u64,
    pub retry_multiplier: u32,
    pub max_retries: u32,
    /// Overrides the per-kind request timeout when set.
    pub timeout_ms: Option<u64>,
    /// Pointer hit radius for points and lines, in render units.
    pub pick_tolerance: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            retry_base_ms: 1000,
            retry_multiplier: 2,
            max_retries: 3,
            timeout_ms: None,
            pick_tolerance: 5.0,
        }
    }
}

impl SyncConfig {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.retry_base_ms),
            multiplier: self.retry_multiplier.max(1),
            max_retries: self.max_retries,
        }
    }

    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn pick_options(&self) -> PickOptions {
        PickOptions {
            tolerance: self.pick_tolerance,
        }
    }
}
