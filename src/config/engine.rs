//! Engine configuration.

use std::env;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::AppResult;

/// What happens to pending tasks whose dependency failed or was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyFailurePolicy {
    /// Leave dependents pending; they are reported as blocked when the run
    /// can make no further progress.
    #[default]
    LeavePending,
    /// Cancel dependents (transitively) as soon as a dependency terminates
    /// without completing.
    CancelDependents,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum tasks running at once.
    pub max_concurrent_tasks: usize,
    /// Per-attempt timeout in milliseconds.
    pub task_timeout_ms: u64,
    /// Retries allowed after the first attempt.
    pub retry_attempts: u32,
    /// Number of priority bands. Advisory only.
    pub priority_levels: u32,
    /// Memory ceiling gating admission, in megabytes.
    pub memory_threshold_mb: f64,
    /// CPU ceiling gating admission, in percent.
    pub cpu_threshold_percent: f64,
    /// Resource monitor sampling interval in milliseconds.
    pub monitor_interval_ms: u64,
    /// Share of the memory ceiling that raises a warning.
    pub memory_warning_ratio: f64,
    /// Number of periodic snapshots kept by the monitor.
    pub snapshot_history: usize,
    /// Handling of dependents of failed tasks.
    pub dependency_failure: DependencyFailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 8,
            task_timeout_ms: 30_000,
            retry_attempts: 3,
            priority_levels: 5,
            memory_threshold_mb: 2048.0,
            cpu_threshold_percent: 80.0,
            monitor_interval_ms: 1000,
            memory_warning_ratio: 0.9,
            snapshot_history: 60,
            dependency_failure: DependencyFailurePolicy::LeavePending,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency cap.
    #[must_use]
    pub const fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    /// Set the concurrency cap to the number of logical CPUs.
    #[must_use]
    pub fn with_host_concurrency(mut self) -> Self {
        self.max_concurrent_tasks = num_cpus::get().max(1);
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub const fn with_task_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.task_timeout_ms = timeout_ms;
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub const fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Set the number of priority bands.
    #[must_use]
    pub const fn with_priority_levels(mut self, levels: u32) -> Self {
        self.priority_levels = levels;
        self
    }

    /// Set the memory ceiling.
    #[must_use]
    pub const fn with_memory_threshold_mb(mut self, mb: f64) -> Self {
        self.memory_threshold_mb = mb;
        self
    }

    /// Set the CPU ceiling.
    #[must_use]
    pub const fn with_cpu_threshold_percent(mut self, percent: f64) -> Self {
        self.cpu_threshold_percent = percent;
        self
    }

    /// Set the monitor interval.
    #[must_use]
    pub const fn with_monitor_interval_ms(mut self, interval_ms: u64) -> Self {
        self.monitor_interval_ms = interval_ms;
        self
    }

    /// Set the warning ratio.
    #[must_use]
    pub const fn with_memory_warning_ratio(mut self, ratio: f64) -> Self {
        self.memory_warning_ratio = ratio;
        self
    }

    /// Set the snapshot history length.
    #[must_use]
    pub const fn with_snapshot_history(mut self, len: usize) -> Self {
        self.snapshot_history = len;
        self
    }

    /// Set the dependency failure policy.
    #[must_use]
    pub const fn with_dependency_failure(mut self, policy: DependencyFailurePolicy) -> Self {
        self.dependency_failure = policy;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_tasks == 0 {
            return Err("max_concurrent_tasks must be greater than 0".into());
        }
        if self.task_timeout_ms == 0 {
            return Err("task_timeout_ms must be greater than 0".into());
        }
        if self.priority_levels == 0 {
            return Err("priority_levels must be greater than 0".into());
        }
        if !(self.memory_threshold_mb.is_finite() && self.memory_threshold_mb > 0.0) {
            return Err("memory_threshold_mb must be a positive number".into());
        }
        if !(self.cpu_threshold_percent > 0.0 && self.cpu_threshold_percent <= 100.0) {
            return Err("cpu_threshold_percent must be in (0, 100]".into());
        }
        if self.monitor_interval_ms == 0 {
            return Err("monitor_interval_ms must be greater than 0".into());
        }
        if !(self.memory_warning_ratio > 0.0 && self.memory_warning_ratio <= 1.0) {
            return Err("memory_warning_ratio must be in (0, 1]".into());
        }
        if self.snapshot_history == 0 {
            return Err("snapshot_history must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `ENGINE_*` environment variables (after
    /// loading `.env` if present), falling back to defaults.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();
        let cfg = Self {
            max_concurrent_tasks: env_or(
                "ENGINE_MAX_CONCURRENT_TASKS",
                defaults.max_concurrent_tasks,
            )?,
            task_timeout_ms: env_or("ENGINE_TASK_TIMEOUT_MS", defaults.task_timeout_ms)?,
            retry_attempts: env_or("ENGINE_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            priority_levels: env_or("ENGINE_PRIORITY_LEVELS", defaults.priority_levels)?,
            memory_threshold_mb: env_or(
                "ENGINE_MEMORY_THRESHOLD_MB",
                defaults.memory_threshold_mb,
            )?,
            cpu_threshold_percent: env_or(
                "ENGINE_CPU_THRESHOLD_PERCENT",
                defaults.cpu_threshold_percent,
            )?,
            monitor_interval_ms: env_or(
                "ENGINE_MONITOR_INTERVAL_MS",
                defaults.monitor_interval_ms,
            )?,
            ..defaults
        };
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

fn env_or<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}
