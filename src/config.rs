//! Tracker configuration
//!
//! The sentinel prefix must match what the instrumentation library prints,
//! and the poll interval bounds how long the report can stay silent.

use std::time::Duration;

use crate::TraceError;

/// Sentinel printed by the malloc instrumentation before every trace line
pub const DEFAULT_PREFIX: &str = "|||||||||||||||||||||| ";

/// Longest wait for input before an unconditional flush
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration parameters for a tracking run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Marker identifying trace lines; everything else is program output
    pub prefix: String,

    /// Polling window of the batch scheduler
    pub poll_interval: Duration,

    /// Print the full per-caller table on every flush
    pub module_table: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            module_table: false,
        }
    }
}

impl TrackerConfig {
    /// Use a different sentinel prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Use a different polling window.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Enable the per-flush module table.
    pub fn with_module_table(mut self, enabled: bool) -> Self {
        self.module_table = enabled;
        self
    }

    /// Reject configurations that would make every line a trace line or
    /// spin the scheduler.
    pub fn validate(&self) -> Result<(), TraceError> {
        if self.prefix.is_empty() {
            return Err(TraceError::InvalidConfiguration(
                "prefix must not be empty".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(TraceError::InvalidConfiguration(
                "poll interval must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
