//! Faults raised by the node heap and the reduction engine.

use std::fmt;

use thiserror::Error;

use crate::runtime::{data_type::DataType, gc::NodeId};

/// Limit that stopped a reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Work stack grew past the configured number of frames.
    WorkStack(usize),
    /// Heap reached the configured number of live nodes.
    Heap(usize),
    /// Step budget used up.
    Steps(u64),
    /// Wall-clock time limit passed.
    Deadline,
    /// Cancelled through a [`CancelToken`](crate::runtime::reduce::CancelToken).
    Cancelled,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::WorkStack(max) => write!(f, "work stack exceeded {} frames", max),
            Limit::Heap(max) => write!(f, "heap exceeded {} live nodes", max),
            Limit::Steps(max) => write!(f, "step budget of {} exhausted", max),
            Limit::Deadline => write!(f, "time limit reached"),
            Limit::Cancelled => write!(f, "reduction cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// An operation needed a specific tag and the node carried another.
    #[error("type mismatch in {operation}: expected {expected}, found {found}")]
    TypeMismatch {
        operation: &'static str,
        expected: &'static str,
        found: DataType,
    },

    /// A node's evaluation depends on forcing itself (black hole), either
    /// directly or through other actors waiting on each other.
    #[error("non-termination: {node} depends on its own value")]
    NonTermination { node: NodeId },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(Limit),

    /// Internal consistency fault: dangling handle, bad environment slot,
    /// arity disagreement between code and data.
    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    #[error("pattern match failure: no alternative for ordinal {ordinal}")]
    PatternMatchFailure { ordinal: u32 },

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl EvalError {
    pub fn type_mismatch(operation: &'static str, expected: &'static str, found: DataType) -> Self {
        EvalError::TypeMismatch {
            operation,
            expected,
            found,
        }
    }

    /// Fatal faults end the reduction that raised them and are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EvalError::NonTermination { .. }
                | EvalError::ResourceExhausted(_)
                | EvalError::MalformedGraph(_)
        )
    }
}

/// Result alias for heap and evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;
