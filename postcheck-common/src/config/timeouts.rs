//! Timing configuration for polling the record store.
//!
//! Delivery through a real mail service is asynchronous and can take tens of
//! seconds, so the maximum wait defaults to 45 seconds. The interval is how
//! long the store's poll primitive sleeps between queries when nothing new
//! has been appended.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollTimeouts {
    /// Maximum time to wait for a matching record.
    ///
    /// Default: 45 seconds
    #[serde(default = "defaults::max_wait_secs")]
    pub max_wait_secs: u64,

    /// Time between successive store queries. Must be non-zero.
    ///
    /// Default: 250 milliseconds
    #[serde(default = "defaults::interval_ms")]
    pub interval_ms: u64,
}

impl PollTimeouts {
    pub const fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// # Errors
    ///
    /// If `interval_ms` is zero, which would re-query the store without pause.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "interval_ms".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for PollTimeouts {
    fn default() -> Self {
        Self {
            max_wait_secs: defaults::max_wait_secs(),
            interval_ms: defaults::interval_ms(),
        }
    }
}

pub(crate) mod defaults {
    pub const fn max_wait_secs() -> u64 {
        45
    }
    pub const fn interval_ms() -> u64 {
        250
    }
}
