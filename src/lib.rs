//! Runtime core of a lazy, G-machine style evaluator.
//!
//! Allocate nodes in a [`NodeHeap`], bind an [`Evaluator`] to it and call
//! [`Evaluator::force`] to reduce a node to weak head normal form.
pub mod primop;
pub mod runtime;

pub use runtime::{
    code::{Alt, Env, Expr, Lambda, NativeFn},
    config::{EvalConfig, HeapConfig},
    data_type::DataType,
    error::{EvalError, EvalResult, Limit},
    gc::{ActorId, NodeHeap, NodeId, SlotState},
    reduce::{CancelToken, Evaluator, force_parallel},
    render::{NodeView, ViewState},
    value::{HostObject, HostValue, Node},
};
