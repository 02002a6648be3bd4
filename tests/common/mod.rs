//! Shared work units and engine helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use prometheus_execution_engine::config::EngineConfig;
use prometheus_execution_engine::core::{
    ExecutionEngine, InMemoryEventSink, MemorySampler, TaskError, TaskId, TaskProfile, WorkUnit,
};
use tokio::time::Instant;

// ============================================================================
// RECORDING
// ============================================================================

/// Records start/end order and peak concurrency across units.
#[derive(Default)]
pub struct Recorder {
    starts: Mutex<Vec<(String, Instant)>>,
    ends: Mutex<Vec<(String, Instant)>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self, id: &str) {
        self.starts.lock().push((id.to_string(), Instant::now()));
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self, id: &str) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.ends.lock().push((id.to_string(), Instant::now()));
    }

    pub fn start_order(&self) -> Vec<String> {
        self.starts.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn started_at(&self, id: &str) -> Option<Instant> {
        self.starts.lock().iter().find(|(s, _)| s == id).map(|(_, at)| *at)
    }

    pub fn ended_at(&self, id: &str) -> Option<Instant> {
        self.ends.lock().iter().find(|(s, _)| s == id).map(|(_, at)| *at)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

// ============================================================================
// TEST WORK UNITS
// ============================================================================

/// Sleeps, then doubles its context.
pub struct SleepUnit {
    pub id: String,
    pub profile: TaskProfile,
    pub sleep_ms: u64,
    pub recorder: Arc<Recorder>,
}

impl SleepUnit {
    pub fn new(id: &str, sleep_ms: u64, recorder: &Arc<Recorder>) -> Self {
        Self {
            id: id.to_string(),
            profile: TaskProfile::default(),
            sleep_ms,
            recorder: Arc::clone(recorder),
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.profile.priority = priority;
        self
    }

    pub fn with_profile(mut self, profile: TaskProfile) -> Self {
        self.profile = profile;
        self
    }
}

#[async_trait]
impl WorkUnit<u64, u64> for SleepUnit {
    fn id(&self) -> TaskId {
        self.id.clone()
    }

    fn profile(&self) -> TaskProfile {
        self.profile
    }

    async fn execute(&self, context: &u64) -> Result<u64, TaskError> {
        self.recorder.enter(&self.id);
        tokio::time::sleep(Duration::from_millis(self.sleep_ms)).await;
        self.recorder.exit(&self.id);
        Ok(context * 2)
    }
}

/// Fails a fixed number of attempts, then succeeds.
pub struct FlakyUnit {
    pub id: String,
    pub priority: u32,
    pub failures: u32,
    pub sleep_ms: u64,
    pub calls: AtomicU32,
    pub recorder: Arc<Recorder>,
}

impl FlakyUnit {
    pub fn new(id: &str, failures: u32, recorder: &Arc<Recorder>) -> Self {
        Self {
            id: id.to_string(),
            priority: 3,
            failures,
            sleep_ms: 5,
            calls: AtomicU32::new(0),
            recorder: Arc::clone(recorder),
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_sleep_ms(mut self, sleep_ms: u64) -> Self {
        self.sleep_ms = sleep_ms;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkUnit<u64, u64> for FlakyUnit {
    fn id(&self) -> TaskId {
        self.id.clone()
    }

    fn profile(&self) -> TaskProfile {
        TaskProfile {
            priority: self.priority,
            ..TaskProfile::default()
        }
    }

    async fn execute(&self, context: &u64) -> Result<u64, TaskError> {
        self.recorder.enter(&self.id);
        tokio::time::sleep(Duration::from_millis(self.sleep_ms)).await;
        self.recorder.exit(&self.id);
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(TaskError::failed(format!("boom #{call}")));
        }
        Ok(*context)
    }
}

/// Sleeps far beyond any test timeout and flags if it ever finishes.
pub struct HangingUnit {
    pub id: String,
    pub finished: Arc<AtomicBool>,
}

#[async_trait]
impl WorkUnit<u64, u64> for HangingUnit {
    fn id(&self) -> TaskId {
        self.id.clone()
    }

    async fn execute(&self, _context: &u64) -> Result<u64, TaskError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(0)
    }
}

/// Runs a hook (typically `engine.cancel()`), then fails.
pub struct HookThenFailUnit {
    pub id: String,
    pub hook: Arc<dyn Fn() + Send + Sync>,
    pub calls: AtomicU32,
}

impl HookThenFailUnit {
    pub fn new(id: &str, hook: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            id: id.to_string(),
            hook: Arc::new(hook),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkUnit<u64, u64> for HookThenFailUnit {
    fn id(&self) -> TaskId {
        self.id.clone()
    }

    async fn execute(&self, _context: &u64) -> Result<u64, TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.hook)();
        Err(TaskError::failed("failed after cancel"))
    }
}

/// Panics on every attempt.
pub struct PanickingUnit(pub &'static str);

#[async_trait]
impl WorkUnit<u64, u64> for PanickingUnit {
    fn id(&self) -> TaskId {
        self.0.to_string()
    }

    async fn execute(&self, _context: &u64) -> Result<u64, TaskError> {
        panic!("unit {} exploded", self.0)
    }
}

// ============================================================================
// ENGINE HELPERS
// ============================================================================

/// Memory sampler returning an adjustable value.
pub struct FixedSampler {
    bits: AtomicU64,
}

impl FixedSampler {
    pub fn new(memory_mb: f64) -> Arc<Self> {
        Arc::new(Self {
            bits: AtomicU64::new(memory_mb.to_bits()),
        })
    }

    pub fn set(&self, memory_mb: f64) {
        self.bits.store(memory_mb.to_bits(), Ordering::SeqCst);
    }
}

impl MemorySampler for FixedSampler {
    fn sample_mb(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

/// Engine with a constant 64 MB memory reading.
pub fn engine(config: EngineConfig) -> ExecutionEngine<u64, u64> {
    engine_with(config, FixedSampler::new(64.0)).0
}

/// Engine with the given sampler and an in-memory event sink.
pub fn engine_with(
    config: EngineConfig,
    sampler: Arc<FixedSampler>,
) -> (ExecutionEngine<u64, u64>, InMemoryEventSink) {
    prometheus_execution_engine::util::init_test_tracing();
    let sink = InMemoryEventSink::new(1024);
    let engine = ExecutionEngine::builder(config)
        .with_sampler(sampler)
        .with_event_sink(Arc::new(sink.clone()))
        .build()
        .expect("engine builds inside a runtime");
    (engine, sink)
}

/// Erase concrete unit types.
pub fn boxed<U: WorkUnit<u64, u64>>(unit: U) -> Arc<dyn WorkUnit<u64, u64>> {
    Arc::new(unit)
}

/// Contexts `1..=n`.
pub fn contexts(n: usize) -> Vec<u64> {
    (1..=n as u64).collect()
}

/// Event names without periodic resource samples.
pub fn lifecycle(sink: &InMemoryEventSink) -> Vec<&'static str> {
    sink.names()
        .into_iter()
        .filter(|name| !name.starts_with("resource-"))
        .collect()
}
