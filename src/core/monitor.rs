//! Process resource monitoring.
//!
//! One monitor lives as long as its engine. It samples memory on a fixed
//! interval, publishes the latest snapshot behind a read lock, keeps a
//! bounded history, and raises a warning when usage crosses the configured
//! share of the memory ceiling. The admission gate also samples
//! synchronously through [`ResourceMonitor::sample`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::events::{EngineEvent, EventBus};
use super::scheduler::RunCounters;
use crate::config::EngineConfig;
use crate::runtime::TokioSpawner;
use crate::util::clock::now_ms;

/// Source of process memory readings.
pub trait MemorySampler: Send + Sync + 'static {
    /// Current memory usage in megabytes.
    fn sample_mb(&self) -> f64;
}

/// Samples the resident set size of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemorySampler;

impl MemorySampler for ProcessMemorySampler {
    fn sample_mb(&self) -> f64 {
        crate::util::process::resident_memory_mb()
    }
}

/// Point-in-time resource usage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Sampled memory usage in megabytes.
    pub memory_mb: f64,
    /// CPU usage in percent. Always 0 without CPU telemetry.
    pub cpu_percent: f64,
    /// Tasks currently running.
    pub in_flight: usize,
    /// Tasks waiting in the pending queue.
    pub pending: usize,
    /// Sample time in milliseconds since epoch.
    pub taken_at_ms: u128,
}

/// Admission thresholds derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceCeilings {
    /// Memory ceiling in megabytes.
    pub memory_mb: f64,
    /// CPU ceiling in percent.
    pub cpu_percent: f64,
    /// Share of the memory ceiling that triggers a warning.
    pub warning_ratio: f64,
}

impl ResourceCeilings {
    /// Whether a snapshot leaves room to admit more work.
    #[must_use]
    pub fn admits(&self, snapshot: &ResourceSnapshot) -> bool {
        snapshot.memory_mb < self.memory_mb && snapshot.cpu_percent < self.cpu_percent
    }

    /// Usage ratio if the snapshot crosses the warning threshold.
    #[must_use]
    pub fn warning(&self, snapshot: &ResourceSnapshot) -> Option<f64> {
        let ratio = snapshot.memory_mb / self.memory_mb;
        (ratio > self.warning_ratio).then_some(ratio)
    }
}

impl From<&EngineConfig> for ResourceCeilings {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            memory_mb: cfg.memory_threshold_mb,
            cpu_percent: cfg.cpu_threshold_percent,
            warning_ratio: cfg.memory_warning_ratio,
        }
    }
}

/// Periodic resource sampler shared by every run of an engine.
pub struct ResourceMonitor {
    interval: Duration,
    ceilings: ResourceCeilings,
    sampler: Arc<dyn MemorySampler>,
    counters: Arc<RunCounters>,
    events: Arc<EventBus>,
    latest: RwLock<ResourceSnapshot>,
    history: Mutex<VecDeque<ResourceSnapshot>>,
    max_history: usize,
    stopped: AtomicBool,
    stop_signal: Notify,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ResourceMonitor {
    /// Create a monitor; call [`ResourceMonitor::start`] to begin ticking.
    pub fn new(
        config: &EngineConfig,
        sampler: Arc<dyn MemorySampler>,
        counters: Arc<RunCounters>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            interval: Duration::from_millis(config.monitor_interval_ms),
            ceilings: ResourceCeilings::from(config),
            sampler,
            counters,
            events,
            latest: RwLock::new(ResourceSnapshot::default()),
            history: Mutex::new(VecDeque::with_capacity(config.snapshot_history)),
            max_history: config.snapshot_history,
            stopped: AtomicBool::new(false),
            stop_signal: Notify::new(),
            handle: Mutex::new(None),
        }
    }

    /// Take an initial sample and spawn the periodic sampler.
    pub fn start(self: &Arc<Self>, spawner: &TokioSpawner) {
        self.sample();
        let monitor = Arc::clone(self);
        let handle = spawner.spawn(async move {
            let mut ticker = tokio::time::interval(monitor.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately and was covered above.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => monitor.tick(),
                    () = monitor.stop_signal.notified() => break,
                }
                if monitor.stopped.load(Ordering::Acquire) {
                    break;
                }
            }
            tracing::debug!("resource monitor stopped");
        });
        *self.handle.lock() = Some(handle);
        tracing::debug!(interval_ms = self.interval.as_millis(), "resource monitor started");
    }

    /// One timer tick: sample, record history, publish events.
    fn tick(&self) {
        let snapshot = self.sample();
        self.history_push(snapshot);
        self.events.emit(EngineEvent::ResourceSnapshot(snapshot));
        if let Some(usage_ratio) = self.ceilings.warning(&snapshot) {
            tracing::warn!(
                memory_mb = snapshot.memory_mb,
                threshold_mb = self.ceilings.memory_mb,
                "memory usage above warning threshold"
            );
            self.events.emit(EngineEvent::ResourceWarning {
                memory_mb: snapshot.memory_mb,
                threshold_mb: self.ceilings.memory_mb,
                usage_ratio,
            });
        }
    }

    fn history_push(&self, snapshot: ResourceSnapshot) {
        if self.max_history == 0 {
            return;
        }
        let mut history = self.history.lock();
        if history.len() >= self.max_history {
            history.pop_front();
        }
        history.push_back(snapshot);
    }

    /// Sample now and publish the result as the latest snapshot.
    pub fn sample(&self) -> ResourceSnapshot {
        let snapshot = ResourceSnapshot {
            memory_mb: self.sampler.sample_mb(),
            cpu_percent: 0.0,
            in_flight: self.counters.in_flight(),
            pending: self.counters.queued(),
            taken_at_ms: now_ms(),
        };
        *self.latest.write() = snapshot;
        snapshot
    }

    /// Latest published snapshot; may be stale by up to one interval.
    #[must_use]
    pub fn current(&self) -> ResourceSnapshot {
        *self.latest.read()
    }

    /// Snapshots recorded by the periodic sampler, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ResourceSnapshot> {
        self.history.lock().iter().copied().collect()
    }

    /// Admission thresholds in use.
    #[must_use]
    pub const fn ceilings(&self) -> ResourceCeilings {
        self.ceilings
    }

    /// Sampling interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the periodic sampler. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop_signal.notify_one();
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }

    /// Whether [`ResourceMonitor::stop`] has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}
