use std::{
    fmt,
    sync::{
        PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::runtime::{gc::NodeId, value::Node};

const EVALUATED: u64 = 0;
const UNEVALUATED: u64 = 1;
const IN_PROGRESS: u64 = 2;
const STATE_MASK: u64 = 0b11;

/// Identity of an evaluator actor, recorded in the slots it is reducing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub(crate) u32);

impl ActorId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor {}", self.0)
    }
}

/// Evaluation state of a slot.
///
/// Only thunk slots ever leave `Evaluated`: they start `Unevaluated`, are
/// claimed with a single compare-and-swap, and become `Evaluated` once their
/// result is written. An aborted reduction moves a claimed slot back to
/// `Unevaluated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Unevaluated,
    InProgress(ActorId),
    Evaluated,
}

impl SlotState {
    fn encode(self) -> u64 {
        match self {
            SlotState::Evaluated => EVALUATED,
            SlotState::Unevaluated => UNEVALUATED,
            SlotState::InProgress(actor) => ((actor.0 as u64) << 2) | IN_PROGRESS,
        }
    }

    fn decode(word: u64) -> Self {
        match word & STATE_MASK {
            UNEVALUATED => SlotState::Unevaluated,
            IN_PROGRESS => SlotState::InProgress(ActorId((word >> 2) as u32)),
            _ => SlotState::Evaluated,
        }
    }
}

/// One heap slot: the node payload plus its evaluation state word.
///
/// The payload lock is held only for the duration of a clone or a single
/// write, so readers never observe a half-written node.
pub(crate) struct Slot {
    state: AtomicU64,
    node: RwLock<Node>,
    pub(crate) marked: bool,
}

impl Slot {
    pub(crate) fn new(node: Node) -> Self {
        let state = if matches!(node, Node::Thunk(_)) {
            SlotState::Unevaluated
        } else {
            SlotState::Evaluated
        };
        Self {
            state: AtomicU64::new(state.encode()),
            node: RwLock::new(node),
            marked: false,
        }
    }

    pub(crate) fn state(&self) -> SlotState {
        SlotState::decode(self.state.load(Ordering::Acquire))
    }

    /// Clones the current payload.
    pub(crate) fn read(&self) -> Node {
        self.node
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payload access without locking, for exclusive (`&mut`) heap passes.
    pub(crate) fn payload(&mut self) -> &Node {
        self.node.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// `Unevaluated -> InProgress(actor)`. On failure returns the state that
    /// was observed instead.
    pub(crate) fn try_claim(&self, actor: ActorId) -> Result<(), SlotState> {
        self.state
            .compare_exchange(
                UNEVALUATED,
                SlotState::InProgress(actor).encode(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(SlotState::decode)
    }

    /// Writes the final payload of a claimed thunk and publishes it.
    ///
    /// Returns `false` without writing if `actor` does not own the slot.
    pub(crate) fn complete(&self, actor: ActorId, node: Node) -> bool {
        if self.state() != SlotState::InProgress(actor) {
            return false;
        }
        *self.node.write().unwrap_or_else(PoisonError::into_inner) = node;
        self.state.store(EVALUATED, Ordering::Release);
        true
    }

    /// Gives a claimed slot back without touching its payload.
    pub(crate) fn release(&self, actor: ActorId) -> bool {
        self.state
            .compare_exchange(
                SlotState::InProgress(actor).encode(),
                UNEVALUATED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Points an indirection slot at `target`. Any other payload is left
    /// alone.
    pub(crate) fn redirect(&self, target: NodeId) -> bool {
        let mut node = self.node.write().unwrap_or_else(PoisonError::into_inner);
        match &mut *node {
            Node::Indirection(current) => {
                *current = target;
                true
            }
            _ => false,
        }
    }
}
