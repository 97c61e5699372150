//! Heap telemetry: per-tag allocation counts, collection cycle history and
//! point-in-time heap snapshots.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use serde::Serialize;

use crate::runtime::data_type::DataType;

const KINDS: usize = DataType::ALL.len();

fn kind_index(tag: DataType) -> usize {
    match tag {
        DataType::Char => 0,
        DataType::Int => 1,
        DataType::Double => 2,
        DataType::Object => 3,
        DataType::Constructor => 4,
        DataType::Function => 5,
        DataType::Indirection => 6,
        DataType::Thunk => 7,
    }
}

/// Metrics captured for a single collection cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleMetrics {
    pub cycle_index: usize,
    #[serde(serialize_with = "serialize_micros")]
    pub duration: Duration,
    pub live_before: usize,
    pub live_after: usize,
    pub collected_count: usize,
    pub roots_scanned: usize,
    pub peak_mark_stack: usize,
    pub threshold_before: usize,
    pub threshold_after: usize,
}

fn serialize_micros<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u128(duration.as_micros())
}

/// Point-in-time summary of heap state.
#[derive(Debug, Clone, Serialize)]
pub struct HeapSnapshot {
    pub capacity: usize,
    pub live_count: usize,
    pub free_list_len: usize,
    pub fragmentation: f64,
    pub utilization: f64,
    pub unevaluated_thunks: usize,
    pub kind_breakdown: Vec<(DataType, usize)>,
}

impl HeapSnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Telemetry collector owned by the heap.
///
/// Allocation counters are atomic because evaluators allocate through a
/// shared heap; cycle history is only written by `collect`, which has
/// exclusive access.
#[derive(Debug, Default)]
pub struct GcTelemetry {
    alloc_counts: [AtomicUsize; KINDS],
    survival_counts: [usize; KINDS],
    cycles: Vec<CycleMetrics>,
}

impl GcTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_alloc(&self, tag: DataType) {
        self.alloc_counts[kind_index(tag)].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_survival(&mut self, tag: DataType) {
        self.survival_counts[kind_index(tag)] += 1;
    }

    pub fn record_cycle(&mut self, metrics: CycleMetrics) {
        self.cycles.push(metrics);
    }

    pub fn alloc_count(&self, tag: DataType) -> usize {
        self.alloc_counts[kind_index(tag)].load(Ordering::Relaxed)
    }

    pub fn survival_count(&self, tag: DataType) -> usize {
        self.survival_counts[kind_index(tag)]
    }

    pub fn total_alloc_count(&self) -> usize {
        DataType::ALL.iter().map(|tag| self.alloc_count(*tag)).sum()
    }

    pub fn cycles(&self) -> &[CycleMetrics] {
        &self.cycles
    }

    /// Formatted report of per-tag allocation statistics.
    pub fn report_allocation_stats(&self) -> String {
        let mut out = String::from("=== Heap Allocation Stats ===\n");
        out.push_str(&format!("{:<14} {:>10} {:>10}\n", "Tag", "Allocs", "Survived"));
        out.push_str(&"-".repeat(36));
        out.push('\n');
        for tag in DataType::ALL {
            out.push_str(&format!(
                "{:<14} {:>10} {:>10}\n",
                tag.label(),
                self.alloc_count(tag),
                self.survival_count(tag),
            ));
        }
        out.push_str(&"-".repeat(36));
        out.push('\n');
        out.push_str(&format!("{:<14} {:>10}\n", "TOTAL", self.total_alloc_count()));
        out
    }

    /// Formatted report of collection history.
    pub fn report_cycles(&self) -> String {
        if self.cycles.is_empty() {
            return "=== GC Cycles ===\nNo collections performed.\n".to_string();
        }
        let mut out = String::from("=== GC Cycles ===\n");
        out.push_str(&format!(
            "{:>5} {:>10} {:>8} {:>8} {:>9} {:>10}\n",
            "Cycle", "Duration", "Before", "After", "Collected", "Threshold"
        ));
        out.push_str(&"-".repeat(56));
        out.push('\n');
        for c in &self.cycles {
            out.push_str(&format!(
                "{:>5} {:>8}us {:>8} {:>8} {:>9} {:>10}\n",
                c.cycle_index,
                c.duration.as_micros(),
                c.live_before,
                c.live_after,
                c.collected_count,
                c.threshold_after,
            ));
        }
        out
    }
}

pub fn format_heap_snapshot(snap: &HeapSnapshot) -> String {
    let mut out = String::from("=== Heap Snapshot ===\n");
    out.push_str(&format!("Capacity (slots):   {}\n", snap.capacity));
    out.push_str(&format!("Live nodes:         {}\n", snap.live_count));
    out.push_str(&format!("Free list length:   {}\n", snap.free_list_len));
    out.push_str(&format!("Pending thunks:     {}\n", snap.unevaluated_thunks));
    out.push_str(&format!(
        "Fragmentation:      {:.2}%\n",
        snap.fragmentation * 100.0
    ));
    out.push_str(&format!(
        "Utilization:        {:.2}%\n",
        snap.utilization * 100.0
    ));
    out.push_str("\nBreakdown by tag:\n");
    for (tag, count) in &snap.kind_breakdown {
        out.push_str(&format!("{:<14} {:>8}\n", tag.label(), count));
    }
    out
}
