//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default inbox capacity, in messages.
pub const DEFAULT_INBOX_CAPACITY: usize = 128;
/// Default longest sleep between ticks (100 ms).
pub const DEFAULT_IDLE_CEILING_NS: u64 = 100_000_000;
/// Default shortest sleep; anything below yields instead (1 µs).
pub const DEFAULT_MIN_TICK_NS: u64 = 1_000;

/// Configuration for a single orchestrator instance.
///
/// Every field has a default, so a partial JSON document is accepted:
///
/// ```
/// use prometheus_workload::config::OrchestratorConfig;
///
/// let cfg = OrchestratorConfig::from_json_str(r#"{ "name": "telemetry", "inbox_capacity": 16 }"#)
///     .unwrap();
/// assert_eq!(cfg.inbox_capacity, 16);
/// assert_eq!(cfg.idle_ceiling_ns, 100_000_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Instance name. Used as the execution thread name and in log fields.
    pub name: String,
    /// Capacity of the inbound message channel.
    pub inbox_capacity: usize,
    /// Longest sleep between ticks, in nanoseconds. Bounds how long a posted
    /// message can wait before the next drain.
    pub idle_ceiling_ns: u64,
    /// Sleeps shorter than this many nanoseconds become a thread yield.
    pub min_tick_ns: u64,
    /// Refuse posts once the instance has stopped instead of queueing
    /// messages that will never be drained.
    pub reject_posts_after_stop: bool,
    /// Stack size for the execution thread. Platform default when unset.
    pub thread_stack_size: Option<usize>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            name: "orchestrator".into(),
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            idle_ceiling_ns: DEFAULT_IDLE_CEILING_NS,
            min_tick_ns: DEFAULT_MIN_TICK_NS,
            reject_posts_after_stop: false,
            thread_stack_size: None,
        }
    }
}

impl OrchestratorConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the instance name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the inbox capacity.
    #[must_use]
    pub const fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity;
        self
    }

    /// Set the sleep ceiling.
    #[must_use]
    pub fn with_idle_ceiling(mut self, ceiling: Duration) -> Self {
        self.idle_ceiling_ns = duration_to_nanos(ceiling);
        self
    }

    /// Set the shortest sleep before falling back to a yield.
    #[must_use]
    pub fn with_min_tick(mut self, min_tick: Duration) -> Self {
        self.min_tick_ns = duration_to_nanos(min_tick);
        self
    }

    /// Refuse posts after the instance stops.
    #[must_use]
    pub const fn with_reject_posts_after_stop(mut self, reject: bool) -> Self {
        self.reject_posts_after_stop = reject;
        self
    }

    /// Set the execution thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = Some(size);
        self
    }

    /// Sleep ceiling as a `Duration`.
    #[must_use]
    pub const fn idle_ceiling(&self) -> Duration {
        Duration::from_nanos(self.idle_ceiling_ns)
    }

    /// Shortest sleep as a `Duration`.
    #[must_use]
    pub const fn min_tick(&self) -> Duration {
        Duration::from_nanos(self.min_tick_ns)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if self.inbox_capacity == 0 {
            return Err("inbox_capacity must be greater than 0".into());
        }
        if self.idle_ceiling_ns == 0 {
            return Err("idle_ceiling_ns must be greater than 0".into());
        }
        if self.min_tick_ns > self.idle_ceiling_ns {
            return Err(format!(
                "min_tick_ns ({}) must not exceed idle_ceiling_ns ({})",
                self.min_tick_ns, self.idle_ceiling_ns
            ));
        }
        if self.thread_stack_size == Some(0) {
            return Err("thread_stack_size must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate it.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn duration_to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
