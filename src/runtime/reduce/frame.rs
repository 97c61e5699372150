use std::sync::Arc;

use crate::{
    primop::PrimOp,
    runtime::{
        code::{Env, Expr, NativeFn},
        gc::NodeId,
        value::Node,
    },
};

/// Work-stack entry: what to do with the next WHNF result.
#[derive(Debug)]
pub enum Frame {
    /// Write the result into this claimed thunk.
    Update { node: NodeId },
    /// Point every indirection in `chain` at the result.
    Redirect { chain: Vec<NodeId> },
    /// Apply the result to these suspended arguments.
    Apply { args: Vec<NodeId> },
    Prim { op: PrimOp, operands: Operands },
    Native { func: NativeFn, operands: Operands },
    /// Select an alternative of this `Expr::Case` by the result's ordinal.
    Case { expr: Arc<Expr>, env: Env },
    Seq { then: Arc<Expr>, env: Env },
}

impl Frame {
    pub fn name(&self) -> &'static str {
        match self {
            Frame::Update { .. } => "update",
            Frame::Redirect { .. } => "redirect",
            Frame::Apply { .. } => "apply",
            Frame::Prim { .. } => "prim",
            Frame::Native { .. } => "native",
            Frame::Case { .. } => "case",
            Frame::Seq { .. } => "seq",
        }
    }
}

/// Arguments of a strict call, evaluated left to right.
#[derive(Debug)]
pub struct Operands {
    pub done: Vec<Node>,
    /// Not yet evaluated, last argument first.
    pub pending: Vec<Arc<Expr>>,
    pub env: Env,
}

impl Operands {
    pub(super) fn new(args: &[Arc<Expr>], env: Env) -> Self {
        Self {
            done: Vec::with_capacity(args.len()),
            pending: args.iter().rev().cloned().collect(),
            env,
        }
    }
}

/// A node in weak head normal form, with the heap slot it lives in when it
/// already has one.
#[derive(Debug, Clone)]
pub struct Whnf {
    pub id: Option<NodeId>,
    pub node: Node,
}

impl Whnf {
    pub(super) fn fresh(node: Node) -> Self {
        Self { id: None, node }
    }

    pub(super) fn stored(id: NodeId, node: Node) -> Self {
        Self { id: Some(id), node }
    }
}

/// Next action of the reduction loop.
#[derive(Debug)]
pub enum Control {
    Eval(Arc<Expr>, Env),
    Force(NodeId),
    Return(Whnf),
}
