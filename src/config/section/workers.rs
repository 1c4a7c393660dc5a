//! `[workers]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [workers]
//! min = 2                # Lower clamp for the detected parallelism
//! max = 6                # Upper clamp for the detected parallelism
//! # count = 4            # Fixed pool size, bypasses detection
//! timeout = 60           # Seconds before an attempt is terminated
//! retries = 2            # Extra attempts after the first failure
//! isolation = "process"  # "process" or "thread"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

/// How each compilation attempt is isolated from the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Isolation {
    /// Child process per attempt; killed on timeout.
    Process,
    /// Dedicated thread per attempt; detached on timeout.
    ///
    /// A detached thread keeps running until its compile returns, so the
    /// number of compilations actually in progress can exceed the pool size
    /// while timed-out attempts linger.
    Thread,
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub min: usize,
    pub max: usize,
    pub count: Option<usize>,
    /// Per-attempt timeout in seconds.
    pub timeout: u64,
    pub retries: u32,
    pub isolation: Isolation,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            min: 2,
            max: 6,
            count: None,
            timeout: 60,
            retries: 2,
            isolation: Isolation::Process,
        }
    }
}

impl WorkersConfig {
    /// Pool size: explicit `count`, else detected parallelism clamped to `[min, max]`.
    pub fn concurrency(&self) -> usize {
        match self.count {
            Some(count) => count.max(1),
            None => {
                let min = self.min.max(1);
                cpu_count().clamp(min, self.max.max(min))
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.min == 0 {
            diag.error("workers.min", "must be at least 1");
        }
        if self.min > self.max {
            diag.error(
                "workers.max",
                format!("max ({}) is below min ({})", self.max, self.min),
            );
        }
        if self.count == Some(0) {
            diag.error("workers.count", "must be at least 1");
        }
        if self.timeout == 0 {
            diag.error_with_hint("workers.timeout", "must be positive", "the default is 60 seconds");
        }
    }
}

/// Hardware parallelism reported by the OS (1 when unknown).
pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
