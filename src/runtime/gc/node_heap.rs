use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock,
        atomic::{AtomicU32, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use crate::runtime::{
    code::{Expr, Lambda},
    config::HeapConfig,
    data_type::DataType,
    error::{EvalError, EvalResult, Limit},
    gc::{
        node_id::NodeId,
        slot::{ActorId, Slot, SlotState},
        telemetry::{CycleMetrics, GcTelemetry, HeapSnapshot},
    },
    value::{HostValue, Node},
};

pub(crate) const MIN_GC_THRESHOLD: usize = 1024;
const MAX_GC_THRESHOLD: usize = 1_000_000;

struct Entry {
    generation: u32,
    /// `None` for a free slot, or for one reserved by `alloc_recursive`
    /// whose node has not been written yet.
    slot: Option<Slot>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Arena of graph nodes shared by every evaluator actor.
///
/// Slots have fixed identity: a [`NodeId`] stays valid until the collector
/// reclaims its slot, after which the slot's generation moves on and the stale
/// handle is reported as [`EvalError::MalformedGraph`].
///
/// Reads, claims and thunk updates go through `&self`, so any number of
/// evaluators can run against one heap from different threads. Collection
/// takes `&mut self`, which guarantees no evaluator is running.
///
/// Lock order: `waits`, then `entries`, then a slot's payload lock, then
/// `free_list`. No method calls back into the heap while holding a slot.
pub struct NodeHeap {
    entries: RwLock<Vec<Entry>>,
    free_list: Mutex<Vec<u32>>,
    roots: Mutex<HashMap<NodeId, usize>>,
    live: AtomicUsize,
    allocation_count: AtomicUsize,
    total_allocations: AtomicUsize,
    total_collections: usize,
    gc_threshold: usize,
    gc_enabled: bool,
    max_nodes: Option<usize>,
    next_actor: AtomicU32,
    /// Node each blocked actor is waiting on.
    waits: Mutex<HashMap<ActorId, NodeId>>,
    /// Bumped whenever a claimed slot is completed or released.
    epoch: Mutex<u64>,
    changed: Condvar,
    telemetry: GcTelemetry,
}

impl Default for NodeHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeHeap {
    /// Creates a heap with [`HeapConfig::default`] collection settings.
    pub fn new() -> Self {
        Self::with_config(&HeapConfig::default())
    }

    /// Creates a heap with a custom allocation threshold.
    ///
    /// Unlike [`Self::set_threshold`], this does not clamp to `MIN_GC_THRESHOLD`.
    pub fn with_threshold(threshold: usize) -> Self {
        Self::with_config(&HeapConfig {
            gc_threshold: threshold,
            ..HeapConfig::default()
        })
    }

    pub fn with_config(config: &HeapConfig) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            free_list: Mutex::new(Vec::new()),
            roots: Mutex::new(HashMap::new()),
            live: AtomicUsize::new(0),
            allocation_count: AtomicUsize::new(0),
            total_allocations: AtomicUsize::new(0),
            total_collections: 0,
            gc_threshold: config.gc_threshold,
            gc_enabled: config.gc_enabled,
            max_nodes: config.max_nodes,
            next_actor: AtomicU32::new(1),
            waits: Mutex::new(HashMap::new()),
            epoch: Mutex::new(0),
            changed: Condvar::new(),
            telemetry: GcTelemetry::new(),
        }
    }

    /// Enables or disables automatic collection checks.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.gc_enabled = enabled
    }

    /// Sets the allocation threshold that triggers collection.
    ///
    /// Values below `MIN_GC_THRESHOLD` are clamped upward.
    pub fn set_threshold(&mut self, threshold: usize) {
        self.gc_threshold = threshold.max(MIN_GC_THRESHOLD)
    }

    pub fn threshold(&self) -> usize {
        self.gc_threshold
    }

    /// Returns `true` when GC is enabled and the threshold was reached.
    pub fn should_collect(&self) -> bool {
        self.gc_enabled && self.allocation_count.load(Ordering::Relaxed) >= self.gc_threshold
    }

    // ── Allocation ───────────────────────────────────────────────────────

    /// Allocates a node and returns its handle.
    ///
    /// Freed slots are reused through the free-list before the slot vector
    /// grows. Fails with [`Limit::Heap`] when the configured node limit is
    /// reached.
    pub fn alloc(&self, node: Node) -> EvalResult<NodeId> {
        self.reserve(1)?;
        self.telemetry.record_alloc(node.data_type());

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut free = lock(&self.free_list);
        let id = Self::take_slot(&mut entries, &mut free);
        entries[id.index as usize].slot = Some(Slot::new(node));
        Ok(id)
    }

    pub fn alloc_char(&self, value: char) -> EvalResult<NodeId> {
        self.alloc(Node::Char(value))
    }

    pub fn alloc_int(&self, value: i64) -> EvalResult<NodeId> {
        self.alloc(Node::Int(value))
    }

    pub fn alloc_double(&self, value: f64) -> EvalResult<NodeId> {
        self.alloc(Node::Double(value))
    }

    pub fn alloc_str(&self, text: &str) -> EvalResult<NodeId> {
        self.alloc(Node::str(text))
    }

    pub fn alloc_constructor(&self, ordinal: u32, name: &str, args: Vec<NodeId>) -> EvalResult<NodeId> {
        self.alloc(Node::constructor(ordinal, name, args))
    }

    pub fn alloc_function(&self, code: Arc<Lambda>, bound: Vec<NodeId>) -> EvalResult<NodeId> {
        self.alloc(Node::function(code, bound))
    }

    pub fn alloc_thunk(&self, expr: Arc<Expr>, env: Vec<NodeId>) -> EvalResult<NodeId> {
        self.alloc(Node::thunk(expr, env))
    }

    pub fn alloc_indirection(&self, target: NodeId) -> EvalResult<NodeId> {
        self.alloc(Node::Indirection(target))
    }

    /// Allocates `count` nodes that may refer to each other.
    ///
    /// `build` receives the handles the nodes will live at and returns the
    /// nodes in the same order, which is how recursive bindings and cyclic
    /// structures are tied. The handles are not readable until `build`
    /// returns.
    pub fn alloc_recursive<F>(&self, count: usize, build: F) -> EvalResult<Vec<NodeId>>
    where
        F: FnOnce(&[NodeId]) -> Vec<Node>,
    {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.reserve(count)?;

        let ids: Vec<NodeId> = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let mut free = lock(&self.free_list);
            (0..count)
                .map(|_| Self::take_slot(&mut entries, &mut free))
                .collect()
        };

        let nodes = build(&ids);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if nodes.len() != count {
            let mut free = lock(&self.free_list);
            for id in &ids {
                let entry = &mut entries[id.index as usize];
                entry.generation = entry.generation.wrapping_add(1);
                free.push(id.index);
            }
            self.live.fetch_sub(count, Ordering::Relaxed);
            self.allocation_count.fetch_sub(count, Ordering::Relaxed);
            self.total_allocations.fetch_sub(count, Ordering::Relaxed);
            return Err(EvalError::MalformedGraph(format!(
                "recursive allocation built {} nodes for {} slots",
                nodes.len(),
                count
            )));
        }
        for (id, node) in ids.iter().zip(nodes) {
            self.telemetry.record_alloc(node.data_type());
            entries[id.index as usize].slot = Some(Slot::new(node));
        }
        Ok(ids)
    }

    fn reserve(&self, count: usize) -> EvalResult<()> {
        let before = self.live.fetch_add(count, Ordering::Relaxed);
        if let Some(max) = self.max_nodes {
            if before + count > max {
                self.live.fetch_sub(count, Ordering::Relaxed);
                return Err(EvalError::ResourceExhausted(Limit::Heap(max)));
            }
        }
        self.allocation_count.fetch_add(count, Ordering::Relaxed);
        self.total_allocations.fetch_add(count, Ordering::Relaxed);
        Ok(())
    }

    fn take_slot(entries: &mut Vec<Entry>, free: &mut Vec<u32>) -> NodeId {
        if let Some(index) = free.pop() {
            NodeId::new(index, entries[index as usize].generation)
        } else {
            let index = entries.len() as u32;
            entries.push(Entry {
                generation: 0,
                slot: None,
            });
            NodeId::new(index, 0)
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────

    fn with_slot<R>(&self, id: NodeId, f: impl FnOnce(&Slot) -> R) -> EvalResult<R> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(id.index as usize) {
            Some(entry) if entry.generation == id.generation => match &entry.slot {
                Some(slot) => Ok(f(slot)),
                None => Err(EvalError::MalformedGraph(format!("node {} is not allocated", id))),
            },
            Some(_) => Err(EvalError::MalformedGraph(format!(
                "stale handle {} (generation {})",
                id, id.generation
            ))),
            None => Err(EvalError::MalformedGraph(format!("dangling handle {}", id))),
        }
    }

    /// Clones the node stored at `id`. Never forces.
    pub fn node(&self, id: NodeId) -> EvalResult<Node> {
        self.with_slot(id, Slot::read)
    }

    pub fn state(&self, id: NodeId) -> EvalResult<SlotState> {
        self.with_slot(id, Slot::state)
    }

    pub fn data_type(&self, id: NodeId) -> EvalResult<DataType> {
        self.node(id).map(|node| node.data_type())
    }

    /// `true` if `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.with_slot(id, |_| ()).is_ok()
    }

    /// Follows indirections from `id` without forcing anything.
    pub fn resolve(&self, id: NodeId) -> EvalResult<NodeId> {
        let mut current = id;
        let mut seen = HashSet::new();
        loop {
            match self.node(current)? {
                Node::Indirection(target) => {
                    if !seen.insert(current) {
                        return Err(EvalError::NonTermination { node: id });
                    }
                    current = target;
                }
                _ => return Ok(current),
            }
        }
    }

    /// Host-boxed value of the node `id` resolves to.
    ///
    /// `None` when the chain ends in an unevaluated thunk.
    pub fn value(&self, id: NodeId) -> EvalResult<Option<HostValue>> {
        let target = self.resolve(id)?;
        Ok(self.node(target)?.value())
    }

    pub fn ordinal(&self, id: NodeId) -> EvalResult<u32> {
        let target = self.resolve(id)?;
        self.node(target)?.ordinal()
    }

    // ── Thunk state transitions ──────────────────────────────────────────

    pub(crate) fn try_claim(&self, id: NodeId, actor: ActorId) -> EvalResult<Result<(), SlotState>> {
        self.with_slot(id, |slot| slot.try_claim(actor))
    }

    /// Publishes the result of a claimed thunk and wakes waiting actors.
    pub(crate) fn complete(&self, id: NodeId, actor: ActorId, node: Node) -> EvalResult<bool> {
        let written = self.with_slot(id, |slot| slot.complete(actor, node))?;
        self.notify();
        Ok(written)
    }

    /// Returns a claimed thunk to `Unevaluated` and wakes waiting actors.
    pub(crate) fn release(&self, id: NodeId, actor: ActorId) -> EvalResult<bool> {
        let released = self.with_slot(id, |slot| slot.release(actor))?;
        self.notify();
        Ok(released)
    }

    pub(crate) fn redirect(&self, id: NodeId, target: NodeId) -> EvalResult<bool> {
        self.with_slot(id, |slot| slot.redirect(target))
    }

    // ── Persistent roots ─────────────────────────────────────────────────

    /// Keeps `id` alive across collections. Roots are counted, so a node
    /// added twice must be removed twice.
    pub fn add_root(&self, id: NodeId) {
        *lock(&self.roots).entry(id).or_insert(0) += 1;
    }

    pub fn remove_root(&self, id: NodeId) -> bool {
        let mut roots = lock(&self.roots);
        match roots.get_mut(&id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                roots.remove(&id);
                true
            }
            None => false,
        }
    }

    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<NodeId> = lock(&self.roots).keys().copied().collect();
        roots.sort();
        roots
    }

    // ── Actors ───────────────────────────────────────────────────────────

    pub fn register_actor(&self) -> ActorId {
        ActorId(self.next_actor.fetch_add(1, Ordering::Relaxed))
    }

    /// Records that `actor` is about to block on `node`.
    ///
    /// Follows the chain of owners and the nodes they are themselves waiting
    /// on. If the chain leads back to a node `actor` owns, blocking would
    /// never end and the wait is refused with `NonTermination`.
    pub(crate) fn begin_wait(&self, actor: ActorId, node: NodeId) -> EvalResult<()> {
        let mut waits = lock(&self.waits);
        let mut current = node;
        for _ in 0..=waits.len() {
            match self.state(current)? {
                SlotState::InProgress(owner) if owner == actor => {
                    return Err(EvalError::NonTermination { node });
                }
                SlotState::InProgress(owner) => match waits.get(&owner) {
                    Some(next) => current = *next,
                    None => break,
                },
                SlotState::Unevaluated | SlotState::Evaluated => break,
            }
        }
        waits.insert(actor, node);
        Ok(())
    }

    pub(crate) fn end_wait(&self, actor: ActorId) {
        lock(&self.waits).remove(&actor);
    }

    pub(crate) fn epoch(&self) -> u64 {
        *lock(&self.epoch)
    }

    /// Blocks until some claimed slot changes after `seen`, or `timeout`
    /// passes.
    pub(crate) fn wait_for_change(&self, seen: u64, timeout: Duration) {
        let guard = lock(&self.epoch);
        if *guard != seen {
            return;
        }
        let _woken = self
            .changed
            .wait_timeout_while(guard, timeout, |epoch| *epoch == seen)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn notify(&self) {
        let mut epoch = lock(&self.epoch);
        *epoch = epoch.wrapping_add(1);
        self.changed.notify_all();
    }

    // ── Collection ───────────────────────────────────────────────────────

    /// Runs a full stop-the-world mark-and-sweep collection.
    ///
    /// Marks from the persistent roots plus `extra_roots`. Reclaimed slots go
    /// on the free-list with a bumped generation, so handles into them stop
    /// resolving.
    pub fn collect(&mut self, extra_roots: &[NodeId]) -> CycleMetrics {
        let start = Instant::now();
        let threshold_before = self.gc_threshold;

        let entries = self.entries.get_mut().unwrap_or_else(PoisonError::into_inner);
        let free = self.free_list.get_mut().unwrap_or_else(PoisonError::into_inner);
        let roots = self.roots.get_mut().unwrap_or_else(PoisonError::into_inner);

        let live_before = entries.iter().filter(|entry| entry.slot.is_some()).count();

        let mut worklist: Vec<NodeId> = roots.keys().copied().collect();
        worklist.extend_from_slice(extra_roots);
        let mut visited_code = HashSet::new();
        let roots_scanned = worklist.len();
        let mut peak_mark_stack = worklist.len();

        while let Some(id) = worklist.pop() {
            let Some(entry) = entries.get_mut(id.index as usize) else {
                continue;
            };
            if entry.generation != id.generation {
                continue;
            }
            let Some(slot) = entry.slot.as_mut() else {
                continue;
            };
            // Mark first so cycles and shared nodes are visited once.
            if slot.marked {
                continue;
            }
            slot.marked = true;
            let node = slot.payload();
            worklist.extend_from_slice(node.references());
            // Code may name nodes directly through `Global` handles.
            node.code_references(&mut visited_code, &mut worklist);
            peak_mark_stack = peak_mark_stack.max(worklist.len());
        }

        let mut collected = 0;
        for (index, entry) in entries.iter_mut().enumerate() {
            let Some(slot) = entry.slot.as_mut() else {
                continue;
            };
            if slot.marked {
                slot.marked = false;
                self.telemetry.record_survival(slot.payload().data_type());
            } else {
                entry.slot = None;
                entry.generation = entry.generation.wrapping_add(1);
                free.push(index as u32);
                collected += 1;
            }
        }

        let live_after = live_before - collected;
        self.live.store(live_after, Ordering::Relaxed);
        self.allocation_count.store(0, Ordering::Relaxed);
        self.adapt_threshold(collected, live_before);

        let metrics = CycleMetrics {
            cycle_index: self.total_collections,
            duration: start.elapsed(),
            live_before,
            live_after,
            collected_count: collected,
            roots_scanned,
            peak_mark_stack,
            threshold_before,
            threshold_after: self.gc_threshold,
        };
        self.total_collections += 1;

        log::debug!(
            "gc cycle {}: {} -> {} live ({} collected, threshold {})",
            metrics.cycle_index,
            live_before,
            live_after,
            collected,
            self.gc_threshold
        );
        self.telemetry.record_cycle(metrics.clone());
        metrics
    }

    fn adapt_threshold(&mut self, collected: usize, total_before: usize) {
        if total_before == 0 {
            return;
        }

        let ratio = collected as f64 / total_before as f64;
        if ratio < 0.25 {
            self.gc_threshold = (self.gc_threshold * 2).min(MAX_GC_THRESHOLD);
        } else if ratio > 0.75 {
            self.gc_threshold = (self.gc_threshold / 2).max(MIN_GC_THRESHOLD)
        }
    }

    // ── Statistics ───────────────────────────────────────────────────────

    /// Returns the number of currently live nodes.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Number of slots, live or free.
    pub fn capacity(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns the total number of allocations performed by this heap.
    pub fn total_allocations(&self) -> usize {
        self.total_allocations.load(Ordering::Relaxed)
    }

    /// Returns the total number of completed GC cycles.
    pub fn total_collections(&self) -> usize {
        self.total_collections
    }

    pub fn telemetry(&self) -> &GcTelemetry {
        &self.telemetry
    }

    pub fn snapshot(&self) -> HeapSnapshot {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts = [0usize; DataType::ALL.len()];
        let mut live_count = 0;
        let mut unevaluated_thunks = 0;
        for slot in entries.iter().filter_map(|entry| entry.slot.as_ref()) {
            live_count += 1;
            let node = slot.read();
            if let Some(pos) = DataType::ALL.iter().position(|tag| *tag == node.data_type()) {
                counts[pos] += 1;
            }
            if slot.state() == SlotState::Unevaluated {
                unevaluated_thunks += 1;
            }
        }
        let capacity = entries.len();
        drop(entries);
        let free_list_len = lock(&self.free_list).len();

        let ratio = |n: usize| if capacity == 0 { 0.0 } else { n as f64 / capacity as f64 };
        HeapSnapshot {
            capacity,
            live_count,
            free_list_len,
            fragmentation: ratio(free_list_len),
            utilization: ratio(live_count),
            unevaluated_thunks,
            kind_breakdown: DataType::ALL
                .iter()
                .zip(counts)
                .filter(|(_, count)| *count > 0)
                .map(|(tag, count)| (*tag, count))
                .collect(),
        }
    }
}
