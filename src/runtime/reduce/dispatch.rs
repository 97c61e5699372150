use std::sync::Arc;

use crate::runtime::{
    code::{Env, Expr, Lambda},
    error::{EvalError, EvalResult},
    gc::NodeId,
    value::{Constructor, Function, HostObject, Node, Thunk},
};

use super::{
    Evaluator,
    frame::{Control, Frame, Operands, Whnf},
};

/// How an expression in a lazy position is represented in the graph.
enum Suspended {
    /// Reuse a node that already exists.
    Existing(NodeId),
    /// Allocate this node.
    New(Node),
}

#[cold]
#[inline(never)]
fn env_slot_err(slot: usize, env: &Env) -> EvalError {
    EvalError::MalformedGraph(format!(
        "environment slot {} out of range ({} bound)",
        slot,
        env.len()
    ))
}

pub(super) fn lookup(env: &Env, slot: usize) -> EvalResult<NodeId> {
    env.get(slot).copied().ok_or_else(|| env_slot_err(slot, env))
}

pub(super) fn extend(env: &Env, extra: &[NodeId]) -> Env {
    env.iter().chain(extra).copied().collect()
}

fn close(code: &Arc<Lambda>, captures: &[usize], env: &Env) -> EvalResult<Node> {
    if captures.len() != code.captures {
        return Err(EvalError::MalformedGraph(format!(
            "lambda {} captures {} slots, code expects {}",
            code.name,
            captures.len(),
            code.captures
        )));
    }
    let bound = captures
        .iter()
        .map(|slot| lookup(env, *slot))
        .collect::<EvalResult<Vec<_>>>()?;
    Ok(Node::Function(Function {
        code: code.clone(),
        bound: bound.into(),
    }))
}

fn suspension(expr: &Arc<Expr>, env: &Env) -> EvalResult<Suspended> {
    let node = match &**expr {
        Expr::Var(slot) => return lookup(env, *slot).map(Suspended::Existing),
        Expr::Global(id) => return Ok(Suspended::Existing(*id)),
        Expr::Char(c) => Node::Char(*c),
        Expr::Int(v) => Node::Int(*v),
        Expr::Double(v) => Node::Double(*v),
        Expr::Str(text) => Node::Object(HostObject::Str(text.clone())),
        Expr::Lambda { code, captures } => close(code, captures, env)?,
        _ => Node::Thunk(Thunk {
            expr: expr.clone(),
            env: env.clone(),
        }),
    };
    Ok(Suspended::New(node))
}

impl Evaluator<'_> {
    /// Evaluates `expr` in a strict position.
    pub(super) fn eval(&mut self, expr: Arc<Expr>, env: Env) -> EvalResult<Control> {
        match &*expr {
            Expr::Var(slot) => Ok(Control::Force(lookup(&env, *slot)?)),
            Expr::Global(id) => Ok(Control::Force(*id)),
            Expr::Char(c) => Ok(Control::Return(Whnf::fresh(Node::Char(*c)))),
            Expr::Int(v) => Ok(Control::Return(Whnf::fresh(Node::Int(*v)))),
            Expr::Double(v) => Ok(Control::Return(Whnf::fresh(Node::Double(*v)))),
            Expr::Str(text) => Ok(Control::Return(Whnf::fresh(Node::Object(
                HostObject::Str(text.clone()),
            )))),
            Expr::Construct { ordinal, name, args } => {
                let fields = self.suspend_all(args, &env)?;
                Ok(Control::Return(Whnf::fresh(Node::Constructor(Constructor {
                    ordinal: *ordinal,
                    name: name.clone(),
                    args: fields.into(),
                }))))
            }
            Expr::Lambda { code, captures } => {
                Ok(Control::Return(Whnf::fresh(close(code, captures, &env)?)))
            }
            Expr::Apply { func, args } => {
                if !args.is_empty() {
                    let args = self.suspend_all(args, &env)?;
                    self.push(Frame::Apply { args })?;
                }
                Ok(Control::Eval(func.clone(), env))
            }
            Expr::Prim { op, args } => {
                if args.len() != op.arity() {
                    return Err(EvalError::MalformedGraph(format!(
                        "primop {} takes {} arguments, got {}",
                        op.display_name(),
                        op.arity(),
                        args.len()
                    )));
                }
                let operands = Operands::new(args, env);
                self.next_operand(Frame::Prim { op: *op, operands })
            }
            Expr::Native { func, args } => {
                if args.len() != func.arity {
                    return Err(EvalError::MalformedGraph(format!(
                        "native {} takes {} arguments, got {}",
                        func.name,
                        func.arity,
                        args.len()
                    )));
                }
                let operands = Operands::new(args, env);
                self.next_operand(Frame::Native {
                    func: func.clone(),
                    operands,
                })
            }
            Expr::Case { scrutinee, .. } => {
                let scrutinee = scrutinee.clone();
                self.push(Frame::Case {
                    expr: expr.clone(),
                    env: env.clone(),
                })?;
                Ok(Control::Eval(scrutinee, env))
            }
            Expr::Let { bindings, body } => {
                let env = self.bind_recursive(bindings, &env)?;
                Ok(Control::Eval(body.clone(), env))
            }
            Expr::Seq { first, then } => {
                self.push(Frame::Seq {
                    then: then.clone(),
                    env: env.clone(),
                })?;
                Ok(Control::Eval(first.clone(), env))
            }
            Expr::Error(message) => Err(EvalError::Runtime(message.to_string())),
        }
    }

    /// Puts `expr` in the graph without evaluating it.
    pub(super) fn suspend(&self, expr: &Arc<Expr>, env: &Env) -> EvalResult<NodeId> {
        match suspension(expr, env)? {
            Suspended::Existing(id) => Ok(id),
            Suspended::New(node) => self.heap.alloc(node),
        }
    }

    fn suspend_all(&self, exprs: &[Arc<Expr>], env: &Env) -> EvalResult<Vec<NodeId>> {
        exprs.iter().map(|expr| self.suspend(expr, env)).collect()
    }

    /// Allocates recursive bindings and returns the environment extended
    /// with them. Every binding sees all of them, itself included.
    ///
    /// A binding that names an existing node becomes an indirection to it,
    /// so bindings that only rename each other form an indirection loop and
    /// fault when forced instead of spinning.
    fn bind_recursive(&self, bindings: &[Arc<Expr>], env: &Env) -> EvalResult<Env> {
        if bindings.is_empty() {
            return Ok(env.clone());
        }

        let mut failure = None;
        let ids = self.heap.alloc_recursive(bindings.len(), |ids| {
            let scope = extend(env, ids);
            bindings
                .iter()
                .map(|binding| match suspension(binding, &scope) {
                    Ok(Suspended::Existing(target)) => Node::Indirection(target),
                    Ok(Suspended::New(node)) => node,
                    Err(err) => {
                        failure.get_or_insert(err);
                        Node::Constructor(Constructor {
                            ordinal: 0,
                            name: "<invalid>".into(),
                            args: Arc::new([]),
                        })
                    }
                })
                .collect()
        })?;

        match failure {
            Some(err) => Err(err),
            None => Ok(extend(env, &ids)),
        }
    }
}
