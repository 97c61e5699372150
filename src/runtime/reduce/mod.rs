//! Demand-driven graph reduction.
//!
//! An [`Evaluator`] is one actor. It rewrites the graph reachable from a root
//! until the root is in weak head normal form, using an explicit work stack
//! of [`Frame`]s instead of host recursion, so deep graphs cannot overflow the
//! native stack. Any number of evaluators may share one [`NodeHeap`]; a thunk
//! is claimed by exactly one of them and the others wait for its result.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use rayon::prelude::*;

use crate::runtime::{
    config::EvalConfig,
    error::{EvalError, EvalResult, Limit},
    gc::{ActorId, NodeHeap, NodeId},
};

mod demand;
mod dispatch;
mod frame;
mod function_call;
mod resume;
mod trace;

pub use frame::{Control, Frame, Operands, Whnf};

/// Shared flag that asks running evaluators to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct Evaluator<'h> {
    heap: &'h NodeHeap,
    actor: ActorId,
    config: EvalConfig,
    stack: Vec<Frame>,
    cancel: Option<CancelToken>,
    steps: u64,
    deadline: Option<Instant>,
}

impl<'h> Evaluator<'h> {
    pub fn new(heap: &'h NodeHeap) -> Self {
        Self::with_config(heap, EvalConfig::default())
    }

    pub fn with_config(heap: &'h NodeHeap, config: EvalConfig) -> Self {
        Self {
            heap,
            actor: heap.register_actor(),
            config,
            stack: Vec::new(),
            cancel: None,
            steps: 0,
            deadline: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn heap(&self) -> &'h NodeHeap {
        self.heap
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Reduction steps taken by the last `force` call.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Reduces `root` to WHNF and returns the node holding the result.
    ///
    /// Every thunk on the way is overwritten with its value, so forcing the
    /// same root again is a lookup. On failure every thunk this call had
    /// claimed is released unevaluated and the heap is left consistent.
    pub fn force(&mut self, root: NodeId) -> EvalResult<NodeId> {
        self.steps = 0;
        self.deadline = self.config.time_limit().map(|limit| Instant::now() + limit);

        match self.run(root) {
            Ok(result) => Ok(result),
            Err(err) => {
                self.unwind(&err);
                Err(err)
            }
        }
    }

    fn run(&mut self, root: NodeId) -> EvalResult<NodeId> {
        let mut control = Control::Force(root);
        loop {
            self.tick()?;
            if self.config.trace {
                self.trace_step(&control);
            }

            control = match control {
                Control::Eval(expr, env) => self.eval(expr, env)?,
                Control::Force(id) => self.demand(id)?,
                Control::Return(whnf) => match self.stack.pop() {
                    Some(frame) => self.resume(frame, whnf)?,
                    None => {
                        return match whnf.id {
                            Some(id) => Ok(id),
                            None => self.heap.alloc(whnf.node),
                        };
                    }
                },
            };
        }
    }

    /// Nodes this evaluator is currently reducing, outermost first.
    pub fn update_markers(&self) -> Vec<NodeId> {
        self.stack
            .iter()
            .filter_map(|frame| match frame {
                Frame::Update { node } => Some(*node),
                _ => None,
            })
            .collect()
    }

    /// One line per pending update marker, outermost first.
    pub fn describe_markers(&self) -> Vec<String> {
        self.update_markers()
            .into_iter()
            .map(|node| self.heap.describe(node))
            .collect()
    }

    pub(super) fn push(&mut self, frame: Frame) -> EvalResult<()> {
        if self.stack.len() >= self.config.max_work_stack {
            return Err(EvalError::ResourceExhausted(Limit::WorkStack(
                self.config.max_work_stack,
            )));
        }
        self.stack.push(frame);
        Ok(())
    }

    fn tick(&mut self) -> EvalResult<()> {
        self.steps += 1;
        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(EvalError::ResourceExhausted(Limit::Steps(max)));
            }
        }
        self.check_interrupt()
    }

    /// Cancellation and deadline, checked every step and while blocked.
    pub(super) fn check_interrupt(&self) -> EvalResult<()> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(EvalError::ResourceExhausted(Limit::Cancelled));
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(EvalError::ResourceExhausted(Limit::Deadline));
        }
        Ok(())
    }

    /// Drops the work stack after a fault, handing every claimed thunk back.
    fn unwind(&mut self, err: &EvalError) {
        let mut released = 0;
        while let Some(frame) = self.stack.pop() {
            if let Frame::Update { node } = frame {
                if matches!(self.heap.release(node, self.actor), Ok(true)) {
                    released += 1;
                }
            }
        }
        self.heap.end_wait(self.actor);
        log::debug!(
            "{} aborted after {} steps: {} ({} update markers released)",
            self.actor,
            self.steps,
            err,
            released
        );
    }
}

/// Forces every root on the rayon pool, one evaluator per root.
///
/// Roots that share subgraphs still evaluate each shared thunk once; the
/// evaluators that lose the claim wait for the winner's result.
pub fn force_parallel(
    heap: &NodeHeap,
    roots: &[NodeId],
    config: &EvalConfig,
) -> Vec<EvalResult<NodeId>> {
    roots
        .par_iter()
        .map(|root| Evaluator::with_config(heap, config.clone()).force(*root))
        .collect()
}
