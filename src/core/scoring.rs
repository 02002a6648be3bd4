//! Admission scoring strategies.
//!
//! The scorer establishes the initial total order of a run's pending queue.
//! Higher scores run first; equal scores fall back to submission order so the
//! result is deterministic for a fixed input.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::SchedulerError;
use super::task::{Task, TaskMetadata};

/// Strategy used to rank pending tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Descending priority only.
    Priority,
    /// `2*priority - memory/100 - duration/1000`: cheap, high-priority work first.
    ResourceOptimal,
    /// `priority - 0.5*dependencies - duration/2000`.
    #[default]
    Balanced,
}

impl Strategy {
    /// Score a task; higher is admitted earlier.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score(self, meta: &TaskMetadata) -> f64 {
        let priority = f64::from(meta.priority);
        match self {
            Self::Priority => priority,
            Self::ResourceOptimal => {
                2.0 * priority
                    - meta.estimated_memory_mb as f64 / 100.0
                    - meta.estimated_duration_ms as f64 / 1000.0
            }
            Self::Balanced => {
                priority
                    - 0.5 * meta.dependencies.len() as f64
                    - meta.estimated_duration_ms as f64 / 2000.0
            }
        }
    }

    /// Compare two tasks in admission order (`Less` means `a` goes first).
    #[must_use]
    pub fn compare(self, a: &TaskMetadata, b: &TaskMetadata) -> Ordering {
        self.score(b)
            .total_cmp(&self.score(a))
            .then_with(|| a.submission_index.cmp(&b.submission_index))
    }

    /// Canonical name as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::ResourceOptimal => "resource-optimal",
            Self::Balanced => "balanced",
        }
    }
}

impl FromStr for Strategy {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "priority" => Ok(Self::Priority),
            "resource-optimal" | "resource_optimal" => Ok(Self::ResourceOptimal),
            "balanced" => Ok(Self::Balanced),
            _ => Err(SchedulerError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort metadata into admission order.
pub fn rank(metas: &mut [TaskMetadata], strategy: Strategy) {
    metas.sort_by(|a, b| strategy.compare(a, b));
}

/// Sort tasks into admission order.
pub fn order_tasks<C, R>(tasks: &mut [Task<C, R>], strategy: Strategy) {
    tasks.sort_by(|a, b| strategy.compare(&a.meta, &b.meta));
}
