use crate::runtime::{
    error::{EvalError, EvalResult},
    value::{HostObject, Node},
};

/// Primitive operations the compiler can emit in `Expr::Prim`.
///
/// IDs may be encoded by code generators, so existing discriminants must
/// remain stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PrimOp {
    /// Integer addition: `Int x Int -> Int` (wrapping).
    IAdd = 0,
    ISub = 1,
    IMul = 2,
    /// Truncating integer division; division by zero is a runtime error.
    IDiv = 3,
    IRem = 4,
    INeg = 5,
    /// Integer comparisons return `False`/`True` constructors.
    IEq = 6,
    ILt = 7,
    ILe = 8,
    DAdd = 9,
    DSub = 10,
    DMul = 11,
    DDiv = 12,
    DNeg = 13,
    DEq = 14,
    DLt = 15,
    DLe = 16,
    CEq = 17,
    CLt = 18,
    /// `Char -> Int`, the code point.
    CharToInt = 19,
    /// `Int -> Char`; fails for values that are not Unicode scalar values.
    IntToChar = 20,
    IntToDouble = 21,
    /// Truncates toward zero, saturating at the `Int` range.
    DoubleToInt = 22,
    StrAppend = 23,
    StrLength = 24,
    StrEq = 25,
}

impl PrimOp {
    /// Upper bound reserved for decoding tables.
    pub const COUNT: usize = 26;

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Decodes an ID into a [`PrimOp`].
    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            0 => Self::IAdd,
            1 => Self::ISub,
            2 => Self::IMul,
            3 => Self::IDiv,
            4 => Self::IRem,
            5 => Self::INeg,
            6 => Self::IEq,
            7 => Self::ILt,
            8 => Self::ILe,
            9 => Self::DAdd,
            10 => Self::DSub,
            11 => Self::DMul,
            12 => Self::DDiv,
            13 => Self::DNeg,
            14 => Self::DEq,
            15 => Self::DLt,
            16 => Self::DLe,
            17 => Self::CEq,
            18 => Self::CLt,
            19 => Self::CharToInt,
            20 => Self::IntToChar,
            21 => Self::IntToDouble,
            22 => Self::DoubleToInt,
            23 => Self::StrAppend,
            24 => Self::StrLength,
            25 => Self::StrEq,
            _ => return None,
        })
    }

    /// Returns the fixed argument count for this operation.
    pub fn arity(self) -> usize {
        match self {
            Self::INeg
            | Self::DNeg
            | Self::CharToInt
            | Self::IntToChar
            | Self::IntToDouble
            | Self::DoubleToInt
            | Self::StrLength => 1,
            _ => 2,
        }
    }

    /// Human-readable name used in errors and traces.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::IAdd => "iadd",
            Self::ISub => "isub",
            Self::IMul => "imul",
            Self::IDiv => "idiv",
            Self::IRem => "irem",
            Self::INeg => "ineg",
            Self::IEq => "ieq",
            Self::ILt => "ilt",
            Self::ILe => "ile",
            Self::DAdd => "dadd",
            Self::DSub => "dsub",
            Self::DMul => "dmul",
            Self::DDiv => "ddiv",
            Self::DNeg => "dneg",
            Self::DEq => "deq",
            Self::DLt => "dlt",
            Self::DLe => "dle",
            Self::CEq => "ceq",
            Self::CLt => "clt",
            Self::CharToInt => "char_to_int",
            Self::IntToChar => "int_to_char",
            Self::IntToDouble => "int_to_double",
            Self::DoubleToInt => "double_to_int",
            Self::StrAppend => "str_append",
            Self::StrLength => "str_length",
            Self::StrEq => "str_eq",
        }
    }
}

/// Executes a primitive operation on WHNF operands.
///
/// Arity disagreement means the emitted code is inconsistent and is reported
/// as a malformed graph; a wrong operand tag is a type mismatch.
pub fn execute_primop(op: PrimOp, args: &[Node]) -> EvalResult<Node> {
    if args.len() != op.arity() {
        return Err(EvalError::MalformedGraph(format!(
            "primop {} expects {} arguments, got {}",
            op.display_name(),
            op.arity(),
            args.len()
        )));
    }

    match op {
        PrimOp::IAdd => int2(args, op, |a, b| Ok(Node::Int(a.wrapping_add(b)))),
        PrimOp::ISub => int2(args, op, |a, b| Ok(Node::Int(a.wrapping_sub(b)))),
        PrimOp::IMul => int2(args, op, |a, b| Ok(Node::Int(a.wrapping_mul(b)))),
        PrimOp::IDiv => int2(args, op, |a, b| {
            if b == 0 {
                return Err(division_by_zero(op));
            }
            Ok(Node::Int(a.wrapping_div(b)))
        }),
        PrimOp::IRem => int2(args, op, |a, b| {
            if b == 0 {
                return Err(division_by_zero(op));
            }
            Ok(Node::Int(a.wrapping_rem(b)))
        }),
        PrimOp::INeg => Ok(Node::Int(expect_int(&args[0], op)?.wrapping_neg())),
        PrimOp::IEq => int2(args, op, |a, b| Ok(Node::bool(a == b))),
        PrimOp::ILt => int2(args, op, |a, b| Ok(Node::bool(a < b))),
        PrimOp::ILe => int2(args, op, |a, b| Ok(Node::bool(a <= b))),
        PrimOp::DAdd => double2(args, op, |a, b| Node::Double(a + b)),
        PrimOp::DSub => double2(args, op, |a, b| Node::Double(a - b)),
        PrimOp::DMul => double2(args, op, |a, b| Node::Double(a * b)),
        PrimOp::DDiv => double2(args, op, |a, b| Node::Double(a / b)),
        PrimOp::DNeg => Ok(Node::Double(-expect_double(&args[0], op)?)),
        PrimOp::DEq => double2(args, op, |a, b| Node::bool(a == b)),
        PrimOp::DLt => double2(args, op, |a, b| Node::bool(a < b)),
        PrimOp::DLe => double2(args, op, |a, b| Node::bool(a <= b)),
        PrimOp::CEq => {
            let (a, b) = (expect_char(&args[0], op)?, expect_char(&args[1], op)?);
            Ok(Node::bool(a == b))
        }
        PrimOp::CLt => {
            let (a, b) = (expect_char(&args[0], op)?, expect_char(&args[1], op)?);
            Ok(Node::bool(a < b))
        }
        PrimOp::CharToInt => Ok(Node::Int(expect_char(&args[0], op)? as i64)),
        PrimOp::IntToChar => {
            let code = expect_int(&args[0], op)?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(Node::Char)
                .ok_or_else(|| {
                    EvalError::Runtime(format!(
                        "primop {}: {} is not a character code point",
                        op.display_name(),
                        code
                    ))
                })
        }
        PrimOp::IntToDouble => Ok(Node::Double(expect_int(&args[0], op)? as f64)),
        PrimOp::DoubleToInt => Ok(Node::Int(expect_double(&args[0], op)? as i64)),
        PrimOp::StrAppend => {
            let (a, b) = (expect_str(&args[0], op)?, expect_str(&args[1], op)?);
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Node::str(&joined))
        }
        PrimOp::StrLength => Ok(Node::Int(expect_str(&args[0], op)?.chars().count() as i64)),
        PrimOp::StrEq => {
            let (a, b) = (expect_str(&args[0], op)?, expect_str(&args[1], op)?);
            Ok(Node::bool(a == b))
        }
    }
}

/// Helper for binary integer primops. Both operands must carry `INT`.
fn int2<F>(args: &[Node], op: PrimOp, f: F) -> EvalResult<Node>
where
    F: FnOnce(i64, i64) -> EvalResult<Node>,
{
    let left = expect_int(&args[0], op)?;
    let right = expect_int(&args[1], op)?;
    f(left, right)
}

fn double2<F>(args: &[Node], op: PrimOp, f: F) -> EvalResult<Node>
where
    F: FnOnce(f64, f64) -> Node,
{
    let left = expect_double(&args[0], op)?;
    let right = expect_double(&args[1], op)?;
    Ok(f(left, right))
}

fn expect_int(node: &Node, op: PrimOp) -> EvalResult<i64> {
    match node {
        Node::Int(v) => Ok(*v),
        other => Err(EvalError::type_mismatch(op.display_name(), "INT", other.data_type())),
    }
}

fn expect_double(node: &Node, op: PrimOp) -> EvalResult<f64> {
    match node {
        Node::Double(v) => Ok(*v),
        other => Err(EvalError::type_mismatch(op.display_name(), "DOUBLE", other.data_type())),
    }
}

fn expect_char(node: &Node, op: PrimOp) -> EvalResult<char> {
    match node {
        Node::Char(c) => Ok(*c),
        other => Err(EvalError::type_mismatch(op.display_name(), "CHAR", other.data_type())),
    }
}

fn expect_str(node: &Node, op: PrimOp) -> EvalResult<&str> {
    match node {
        Node::Object(HostObject::Str(text)) => Ok(&**text),
        other => Err(EvalError::type_mismatch(
            op.display_name(),
            "OBJECT (string)",
            other.data_type(),
        )),
    }
}

fn division_by_zero(op: PrimOp) -> EvalError {
    EvalError::Runtime(format!("primop {}: division by zero", op.display_name()))
}
