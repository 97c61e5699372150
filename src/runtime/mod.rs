//! Runtime core: value nodes, the node heap and the graph-reduction engine.
//!
//! # Sharing and mutation
//! Nodes refer to each other only through [`gc::NodeId`] handles, so the graph
//! may be cyclic (recursive `let`, self-referential data) without ownership
//! cycles. Values never change after they reach WHNF. The only writes to an
//! existing slot are:
//! - a thunk overwritten once with its result, and
//! - an indirection retargeted to shorten a chain.
//!
//! Everything else is immutable once allocated, which is what lets several
//! evaluators share one heap.
pub mod code;
pub mod config;
pub mod data_type;
pub mod error;
pub mod gc;
pub mod reduce;
pub mod render;
pub mod value;
