//! [`WorkerConfig`] – timing and sizing of the worker and its channels.
//!
//! Read from the `[worker]` table of the configuration file.  Every field
//! is optional and falls back to the defaults below.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for one worker instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Motor spin-down time between zeroing the motors and stopping the bus.
    pub settle_delay_ms: u64,
    /// Upper bound on one idle wait when all channels are empty.
    pub idle_wait_ms: u64,
    /// How long a client waits for its reply.
    pub reply_timeout_ms: u64,
    /// How long [`WorkerControl::shutdown`][crate::WorkerControl::shutdown]
    /// waits for the worker thread to exit.
    pub shutdown_timeout_ms: u64,
    /// Buffered messages per channel direction.
    pub channel_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            idle_wait_ms: 5,
            reply_timeout_ms: 1_000,
            shutdown_timeout_ms: 3_000,
            channel_capacity: 8,
        }
    }
}

impl WorkerConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
