use std::{any::Any, collections::HashSet, fmt, sync::Arc};

use crate::runtime::{
    code::{Env, Expr, Lambda, collect_globals},
    data_type::DataType,
    error::{EvalError, EvalResult},
    gc::NodeId,
};

/// Runtime value node stored in a heap slot.
///
/// ## Memory Model
///
/// Nodes never own other nodes. Constructor fields, function captures and
/// thunk environments are [`NodeId`]s into the same heap, so the graph may be
/// cyclic (recursive `let`) without ownership cycles. Reclamation is done by
/// the heap's mark-and-sweep collector.
///
/// ### Mutation
///
/// `Thunk` slots are overwritten once, when their expression reaches WHNF.
/// `Indirection` slots may be retargeted to collapse chains. Every other
/// variant is immutable once allocated.
///
/// Payload collections are `Arc` slices so cloning a node out of its slot is
/// O(1).
#[derive(Debug, Clone)]
pub enum Node {
    Char(char),
    Int(i64),
    Double(f64),
    Object(HostObject),
    Constructor(Constructor),
    Function(Function),
    Indirection(NodeId),
    Thunk(Thunk),
}

#[derive(Debug, Clone)]
pub struct Constructor {
    pub ordinal: u32,
    pub name: Arc<str>,
    pub args: Arc<[NodeId]>,
}

/// Function code plus the nodes bound so far: captures first, then any
/// partially applied arguments.
#[derive(Debug, Clone)]
pub struct Function {
    pub code: Arc<Lambda>,
    pub bound: Arc<[NodeId]>,
}

impl Function {
    /// Arguments still needed before the body can run.
    pub fn remaining(&self) -> usize {
        self.code.env_size().saturating_sub(self.bound.len())
    }
}

#[derive(Debug, Clone)]
pub struct Thunk {
    pub expr: Arc<Expr>,
    pub env: Env,
}

/// Host-level object boxed inside an `Object` node.
#[derive(Clone)]
pub enum HostObject {
    Str(Arc<str>),
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl HostObject {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostObject::Str(text) => Some(&**text),
            HostObject::Opaque(_) => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            HostObject::Str(_) => None,
            HostObject::Opaque(object) => object.downcast_ref::<T>(),
        }
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostObject::Str(text) => write!(f, "Str({:?})", text),
            HostObject::Opaque(_) => write!(f, "Opaque(..)"),
        }
    }
}

impl PartialEq for HostObject {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostObject::Str(left), HostObject::Str(right)) => left == right,
            (HostObject::Opaque(left), HostObject::Opaque(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }
}

/// Boxed form of a WHNF node handed to the foreign-object layer.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Char(char),
    Int(i64),
    Double(f64),
    Object(HostObject),
    Constructor {
        ordinal: u32,
        name: Arc<str>,
        fields: Arc<[NodeId]>,
    },
    Function {
        name: Arc<str>,
        remaining: usize,
    },
}

impl Node {
    pub fn str(text: &str) -> Node {
        Node::Object(HostObject::Str(text.into()))
    }

    pub fn constructor(ordinal: u32, name: &str, args: Vec<NodeId>) -> Node {
        Node::Constructor(Constructor {
            ordinal,
            name: name.into(),
            args: args.into(),
        })
    }

    /// Booleans are the constructors `False` (0) and `True` (1).
    pub fn bool(value: bool) -> Node {
        if value {
            Node::constructor(1, "True", Vec::new())
        } else {
            Node::constructor(0, "False", Vec::new())
        }
    }

    pub fn function(code: Arc<Lambda>, bound: Vec<NodeId>) -> Node {
        Node::Function(Function {
            code,
            bound: bound.into(),
        })
    }

    pub fn thunk(expr: Arc<Expr>, env: Vec<NodeId>) -> Node {
        Node::Thunk(Thunk {
            expr,
            env: env.into(),
        })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Node::Char(_) => DataType::Char,
            Node::Int(_) => DataType::Int,
            Node::Double(_) => DataType::Double,
            Node::Object(_) => DataType::Object,
            Node::Constructor(_) => DataType::Constructor,
            Node::Function(_) => DataType::Function,
            Node::Indirection(_) => DataType::Indirection,
            Node::Thunk(_) => DataType::Thunk,
        }
    }

    /// Host-boxed content of this node. Never forces: thunks and
    /// indirections have no value of their own.
    pub fn value(&self) -> Option<HostValue> {
        match self {
            Node::Char(c) => Some(HostValue::Char(*c)),
            Node::Int(v) => Some(HostValue::Int(*v)),
            Node::Double(v) => Some(HostValue::Double(*v)),
            Node::Object(object) => Some(HostValue::Object(object.clone())),
            Node::Constructor(cons) => Some(HostValue::Constructor {
                ordinal: cons.ordinal,
                name: cons.name.clone(),
                fields: cons.args.clone(),
            }),
            Node::Function(func) => Some(HostValue::Function {
                name: func.code.name.clone(),
                remaining: func.remaining(),
            }),
            Node::Indirection(_) | Node::Thunk(_) => None,
        }
    }

    /// Code point for chars, declared index for constructors.
    pub fn ordinal(&self) -> EvalResult<u32> {
        match self {
            Node::Char(c) => Ok(*c as u32),
            Node::Constructor(cons) => Ok(cons.ordinal),
            other => Err(EvalError::type_mismatch(
                "ordinal",
                "CHAR or CONSTRUCTOR",
                other.data_type(),
            )),
        }
    }

    /// One-line, non-strict summary for tracers.
    pub fn brief_summary(&self) -> String {
        match self {
            Node::Char(c) => c.to_string(),
            Node::Int(v) => v.to_string(),
            Node::Double(v) => format_double(*v),
            Node::Object(HostObject::Str(text)) => format!("{:?}", text),
            Node::Object(HostObject::Opaque(_)) => "<object>".to_string(),
            Node::Constructor(cons) => cons.name.to_string(),
            Node::Function(func) => format!("{}/{}", func.code.name, func.remaining()),
            Node::Indirection(target) => format!("-> {}", target),
            Node::Thunk(_) => "<thunk>".to_string(),
        }
    }

    /// Nodes this node refers to, in field order.
    pub fn references(&self) -> &[NodeId] {
        match self {
            Node::Constructor(cons) => &cons.args[..],
            Node::Function(func) => &func.bound[..],
            Node::Indirection(target) => std::slice::from_ref(target),
            Node::Thunk(thunk) => &thunk.env[..],
            Node::Char(_) | Node::Int(_) | Node::Double(_) | Node::Object(_) => &[],
        }
    }

    /// Pushes the nodes named by `Global` handles in this node's code: a
    /// thunk's expression or a function's body. These are edges of the graph
    /// just like [`Self::references`].
    pub(crate) fn code_references(&self, visited: &mut HashSet<*const Expr>, out: &mut Vec<NodeId>) {
        match self {
            Node::Thunk(thunk) => collect_globals(&thunk.expr, visited, out),
            Node::Function(func) => collect_globals(&func.code.body, visited, out),
            Node::Char(_)
            | Node::Int(_)
            | Node::Double(_)
            | Node::Object(_)
            | Node::Constructor(_)
            | Node::Indirection(_) => {}
        }
    }
}

/// Doubles always show a fractional part so they never read as ints.
pub(crate) fn format_double(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
