//! Evaluator and heap settings.
//!
//! Both structs deserialize from JSON with every field optional, so a host
//! can ship partial configuration files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_MAX_WORK_STACK: usize = 1 << 20; // 1,048,576 frames
const DEFAULT_WAIT_POLL_MS: u64 = 5;
const DEFAULT_GC_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Maximum number of frames on one evaluator's work stack.
    pub max_work_stack: usize,
    /// Maximum number of reduction steps per `force` call.
    pub max_steps: Option<u64>,
    /// Wall-clock limit per `force` call, in milliseconds.
    pub time_limit_ms: Option<u64>,
    /// Emit a `trace` log record for every reduction step.
    pub trace: bool,
    /// How often a blocked actor re-checks a node owned by another actor.
    pub wait_poll_ms: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_work_stack: DEFAULT_MAX_WORK_STACK,
            max_steps: None,
            time_limit_ms: None,
            trace: false,
            wait_poll_ms: DEFAULT_WAIT_POLL_MS,
        }
    }
}

impl EvalConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }

    pub fn wait_poll(&self) -> Duration {
        Duration::from_millis(self.wait_poll_ms.max(1))
    }

    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// Allocations between collections when the host collects on demand.
    pub gc_threshold: usize,
    pub gc_enabled: bool,
    /// Upper bound on live nodes; allocation past it fails.
    pub max_nodes: Option<usize>,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            gc_threshold: DEFAULT_GC_THRESHOLD,
            gc_enabled: true,
            max_nodes: None,
        }
    }
}

impl HeapConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
