use crate::runtime::code::Expr;

use super::{Evaluator, frame::Control};

impl Evaluator<'_> {
    pub(super) fn trace_step(&self, control: &Control) {
        log::trace!(
            "{} step={} depth={} {}",
            self.actor,
            self.steps,
            self.stack.len(),
            describe_control(control)
        );
        if let Some(frame) = self.stack.last() {
            log::trace!("  top: {}", frame.name());
        }
    }
}

pub(super) fn describe_control(control: &Control) -> String {
    match control {
        Control::Eval(expr, env) => format!("eval {} env={}", expr_kind(expr), env.len()),
        Control::Force(id) => format!("force {}", id),
        Control::Return(whnf) => {
            let at = whnf
                .id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "fresh".to_string());
            format!(
                "return {} {} ({})",
                whnf.node.data_type(),
                whnf.node.brief_summary(),
                at
            )
        }
    }
}

pub(super) fn expr_kind(expr: &Expr) -> &'static str {
    match expr {
        Expr::Var(_) => "var",
        Expr::Global(_) => "global",
        Expr::Char(_) => "char",
        Expr::Int(_) => "int",
        Expr::Double(_) => "double",
        Expr::Str(_) => "str",
        Expr::Construct { .. } => "construct",
        Expr::Lambda { .. } => "lambda",
        Expr::Apply { .. } => "apply",
        Expr::Prim { .. } => "prim",
        Expr::Native { .. } => "native",
        Expr::Case { .. } => "case",
        Expr::Let { .. } => "let",
        Expr::Seq { .. } => "seq",
        Expr::Error(_) => "error",
    }
}
