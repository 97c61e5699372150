use std::sync::Arc;

use crate::runtime::{
    code::{Env, Expr},
    error::{EvalError, EvalResult},
    gc::NodeId,
    value::Node,
};

use super::{
    Evaluator,
    dispatch::extend,
    frame::{Control, Frame, Whnf},
};

impl Evaluator<'_> {
    /// Continues the popped `frame` with a WHNF result.
    pub(super) fn resume(&mut self, frame: Frame, whnf: Whnf) -> EvalResult<Control> {
        match frame {
            Frame::Update { node } => self.update(node, whnf),
            Frame::Redirect { chain } => {
                if let Some(target) = whnf.id {
                    self.collapse(&chain, target)?;
                }
                Ok(Control::Return(whnf))
            }
            Frame::Apply { args } => self.apply(whnf.node, args),
            Frame::Prim { op, mut operands } => {
                operands.done.push(whnf.node);
                self.next_operand(Frame::Prim { op, operands })
            }
            Frame::Native { func, mut operands } => {
                operands.done.push(whnf.node);
                self.next_operand(Frame::Native { func, operands })
            }
            Frame::Case { expr, env } => self.select(&expr, env, &whnf.node),
            Frame::Seq { then, env } => Ok(Control::Eval(then, env)),
        }
    }

    /// Overwrites a claimed thunk with its result.
    ///
    /// Scalars and freshly built nodes are stored in the thunk's own slot. A
    /// result that already lives elsewhere is shared through an indirection
    /// so its identity is preserved.
    fn update(&mut self, node: NodeId, whnf: Whnf) -> EvalResult<Control> {
        let (payload, result) = match whnf.id {
            Some(existing) if existing != node && !whnf.node.data_type().is_scalar() => {
                (Node::Indirection(existing), existing)
            }
            _ => (whnf.node.clone(), node),
        };

        if !self.heap.complete(node, self.actor, payload)? {
            return Err(EvalError::MalformedGraph(format!(
                "update of {} which {} does not own",
                node, self.actor
            )));
        }
        log::debug!(
            "{} updated {} -> {}",
            self.actor,
            node,
            whnf.node.brief_summary()
        );
        Ok(Control::Return(Whnf::stored(result, whnf.node)))
    }

    /// Picks the case alternative matching the scrutinee's ordinal.
    fn select(&self, case: &Arc<Expr>, env: Env, scrutinee: &Node) -> EvalResult<Control> {
        let Expr::Case { alts, default, .. } = &**case else {
            return Err(EvalError::MalformedGraph(
                "case frame without a case expression".to_string(),
            ));
        };

        // With no alternatives the default needs no ordinal. Without one, a
        // scrutinee that has no ordinal is a type error as in the general case.
        if alts.is_empty() {
            return match default {
                Some(body) => Ok(Control::Eval(body.clone(), env)),
                None => Err(EvalError::PatternMatchFailure {
                    ordinal: scrutinee.ordinal()?,
                }),
            };
        }

        let ordinal = scrutinee.ordinal()?;
        let Some(alt) = alts.iter().find(|alt| alt.ordinal == ordinal) else {
            return match default {
                Some(body) => Ok(Control::Eval(body.clone(), env)),
                None => Err(EvalError::PatternMatchFailure { ordinal }),
            };
        };

        let fields: &[NodeId] = match scrutinee {
            Node::Constructor(cons) => &cons.args[..],
            _ => &[],
        };
        if alt.binds != fields.len() {
            return Err(EvalError::MalformedGraph(format!(
                "alternative {} binds {} fields, scrutinee has {}",
                alt.ordinal,
                alt.binds,
                fields.len()
            )));
        }

        let env = if fields.is_empty() {
            env
        } else {
            extend(&env, fields)
        };
        Ok(Control::Eval(alt.body.clone(), env))
    }
}
