//! In-memory code shapes run by the reduction engine.
//!
//! The compiler emits these trees for thunk bodies and function bodies. They
//! are immutable and shared through `Arc`, so a thunk holds its expression
//! without copying it. Variables are environment slot indices; an environment
//! is the list of node handles a thunk or function body was built with.

use std::{collections::HashSet, fmt, sync::Arc};

use crate::{
    primop::PrimOp,
    runtime::{error::EvalResult, gc::NodeId, value::Node},
};

/// Node handles visible to an expression, indexed by [`Expr::Var`].
pub type Env = Arc<[NodeId]>;

/// Host function called with the WHNF nodes of its arguments.
pub type NativeCall = dyn Fn(&[Node]) -> EvalResult<Node> + Send + Sync;

#[derive(Debug)]
pub enum Expr {
    /// Environment slot.
    Var(usize),
    /// Node allocated outside this expression (a global or a constant).
    Global(NodeId),
    Char(char),
    Int(i64),
    Double(f64),
    Str(Arc<str>),
    /// Saturated constructor application; arguments are suspended.
    Construct {
        ordinal: u32,
        name: Arc<str>,
        args: Vec<Arc<Expr>>,
    },
    /// Function value capturing the listed environment slots.
    Lambda {
        code: Arc<Lambda>,
        captures: Vec<usize>,
    },
    /// Application; the head is evaluated, arguments are suspended.
    Apply {
        func: Arc<Expr>,
        args: Vec<Arc<Expr>>,
    },
    /// Primitive operation, strict in every argument.
    Prim { op: PrimOp, args: Vec<Arc<Expr>> },
    /// Host function, strict in every argument.
    Native { func: NativeFn, args: Vec<Arc<Expr>> },
    /// Selects an alternative by the scrutinee's ordinal.
    Case {
        scrutinee: Arc<Expr>,
        alts: Vec<Alt>,
        default: Option<Arc<Expr>>,
    },
    /// Recursive bindings appended to the environment, then the body.
    Let {
        bindings: Vec<Arc<Expr>>,
        body: Arc<Expr>,
    },
    /// Forces `first` to WHNF, then continues with `then`.
    Seq { first: Arc<Expr>, then: Arc<Expr> },
    /// Raises [`EvalError::Runtime`](crate::runtime::error::EvalError::Runtime).
    Error(Arc<str>),
}

/// Shared function code.
///
/// The body runs in an environment of `captures` captured nodes followed by
/// `params` arguments.
#[derive(Debug)]
pub struct Lambda {
    pub name: Arc<str>,
    pub captures: usize,
    pub params: usize,
    pub body: Arc<Expr>,
}

impl Lambda {
    pub fn new(name: &str, captures: usize, params: usize, body: Arc<Expr>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            captures,
            params,
            body,
        })
    }

    /// Total environment size the body expects.
    pub fn env_size(&self) -> usize {
        self.captures + self.params
    }
}

/// Case alternative.
///
/// For a constructor scrutinee, `binds` must equal the constructor's field
/// count and the fields are appended to the environment. Char alternatives
/// bind nothing.
#[derive(Debug)]
pub struct Alt {
    pub ordinal: u32,
    pub binds: usize,
    pub body: Arc<Expr>,
}

impl Alt {
    pub fn new(ordinal: u32, binds: usize, body: Arc<Expr>) -> Self {
        Self {
            ordinal,
            binds,
            body,
        }
    }
}

#[derive(Clone)]
pub struct NativeFn {
    pub name: Arc<str>,
    pub arity: usize,
    pub call: Arc<NativeCall>,
}

impl NativeFn {
    pub fn new<F>(name: &str, arity: usize, call: F) -> Self
    where
        F: Fn(&[Node]) -> EvalResult<Node> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            call: Arc::new(call),
        }
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native {}/{}>", self.name, self.arity)
    }
}

impl Expr {
    /// Every node named by an [`Expr::Global`] in this expression, nested
    /// lambda bodies included. A handle named in two distinct places is
    /// listed twice.
    pub fn globals(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        collect_globals(self, &mut HashSet::new(), &mut out);
        out
    }
}

/// Pushes the `Global` handles reachable from `root` onto `out`.
///
/// Shared subtrees already in `visited` are skipped, so code shared by many
/// thunks is walked once per pass. Expression depth does not touch the host
/// stack.
pub(crate) fn collect_globals(
    root: &Expr,
    visited: &mut HashSet<*const Expr>,
    out: &mut Vec<NodeId>,
) {
    let mut work = vec![root];
    while let Some(expr) = work.pop() {
        let mut children: Vec<&Arc<Expr>> = Vec::new();
        match expr {
            Expr::Global(id) => out.push(*id),
            Expr::Var(_)
            | Expr::Char(_)
            | Expr::Int(_)
            | Expr::Double(_)
            | Expr::Str(_)
            | Expr::Error(_) => {}
            Expr::Construct { args, .. }
            | Expr::Prim { args, .. }
            | Expr::Native { args, .. } => children.extend(args),
            Expr::Lambda { code, .. } => children.push(&code.body),
            Expr::Apply { func, args } => {
                children.push(func);
                children.extend(args);
            }
            Expr::Case {
                scrutinee,
                alts,
                default,
            } => {
                children.push(scrutinee);
                children.extend(alts.iter().map(|alt| &alt.body));
                children.extend(default);
            }
            Expr::Let { bindings, body } => {
                children.extend(bindings);
                children.push(body);
            }
            Expr::Seq { first, then } => {
                children.push(first);
                children.push(then);
            }
        }
        for child in children {
            if visited.insert(Arc::as_ptr(child)) {
                work.push(&**child);
            }
        }
    }
}

// Builders used by code generators and tests.
impl Expr {
    pub fn var(slot: usize) -> Arc<Expr> {
        Arc::new(Expr::Var(slot))
    }

    pub fn global(node: NodeId) -> Arc<Expr> {
        Arc::new(Expr::Global(node))
    }

    pub fn char(value: char) -> Arc<Expr> {
        Arc::new(Expr::Char(value))
    }

    pub fn int(value: i64) -> Arc<Expr> {
        Arc::new(Expr::Int(value))
    }

    pub fn double(value: f64) -> Arc<Expr> {
        Arc::new(Expr::Double(value))
    }

    pub fn str(value: &str) -> Arc<Expr> {
        Arc::new(Expr::Str(value.into()))
    }

    pub fn construct(ordinal: u32, name: &str, args: Vec<Arc<Expr>>) -> Arc<Expr> {
        Arc::new(Expr::Construct {
            ordinal,
            name: name.into(),
            args,
        })
    }

    pub fn lambda(code: Arc<Lambda>, captures: Vec<usize>) -> Arc<Expr> {
        Arc::new(Expr::Lambda { code, captures })
    }

    pub fn apply(func: Arc<Expr>, args: Vec<Arc<Expr>>) -> Arc<Expr> {
        Arc::new(Expr::Apply { func, args })
    }

    pub fn prim(op: PrimOp, args: Vec<Arc<Expr>>) -> Arc<Expr> {
        Arc::new(Expr::Prim { op, args })
    }

    pub fn native(func: NativeFn, args: Vec<Arc<Expr>>) -> Arc<Expr> {
        Arc::new(Expr::Native { func, args })
    }

    pub fn case(scrutinee: Arc<Expr>, alts: Vec<Alt>, default: Option<Arc<Expr>>) -> Arc<Expr> {
        Arc::new(Expr::Case {
            scrutinee,
            alts,
            default,
        })
    }

    pub fn let_rec(bindings: Vec<Arc<Expr>>, body: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Let { bindings, body })
    }

    pub fn seq(first: Arc<Expr>, then: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Seq { first, then })
    }

    pub fn error(message: &str) -> Arc<Expr> {
        Arc::new(Expr::Error(message.into()))
    }
}
