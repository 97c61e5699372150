use crate::{
    primop::execute_primop,
    runtime::{
        error::{EvalError, EvalResult},
        gc::NodeId,
        value::{Function, Node},
    },
};

use super::{
    Evaluator,
    dispatch::extend,
    frame::{Control, Frame, Whnf},
};

impl Evaluator<'_> {
    /// Applies a function value to suspended arguments.
    ///
    /// Too few arguments build a partial application, exactly enough run the
    /// body, and any surplus is applied to whatever the body returns.
    pub(super) fn apply(&mut self, callee: Node, args: Vec<NodeId>) -> EvalResult<Control> {
        let func = match callee {
            Node::Function(func) => func,
            other => return Err(EvalError::type_mismatch("apply", "FUNCTION", other.data_type())),
        };

        let remaining = func.remaining();
        if args.len() < remaining {
            return Ok(Control::Return(Whnf::fresh(Node::Function(Function {
                bound: extend(&func.bound, &args),
                code: func.code,
            }))));
        }

        let (now, rest) = args.split_at(remaining);
        let env = extend(&func.bound, now);
        if !rest.is_empty() {
            self.push(Frame::Apply {
                args: rest.to_vec(),
            })?;
        }
        Ok(Control::Eval(func.code.body.clone(), env))
    }

    /// Evaluates the next operand of a strict call, or makes the call once
    /// all operands are in WHNF.
    pub(super) fn next_operand(&mut self, mut frame: Frame) -> EvalResult<Control> {
        let operands = match &mut frame {
            Frame::Prim { operands, .. } | Frame::Native { operands, .. } => operands,
            other => {
                return Err(EvalError::MalformedGraph(format!(
                    "{} frame has no operands",
                    other.name()
                )));
            }
        };

        match operands.pending.pop() {
            Some(expr) => {
                let env = operands.env.clone();
                self.push(frame)?;
                Ok(Control::Eval(expr, env))
            }
            None => self.call_strict(frame),
        }
    }

    fn call_strict(&mut self, frame: Frame) -> EvalResult<Control> {
        let result = match frame {
            Frame::Prim { op, operands } => execute_primop(op, &operands.done)?,
            Frame::Native { func, operands } => (func.call)(&operands.done)?,
            other => {
                return Err(EvalError::MalformedGraph(format!(
                    "{} frame is not a call",
                    other.name()
                )));
            }
        };

        if result.data_type().is_whnf() {
            Ok(Control::Return(Whnf::fresh(result)))
        } else {
            // Host code may hand back a suspended computation.
            let id = self.heap.alloc(result)?;
            Ok(Control::Force(id))
        }
    }
}
