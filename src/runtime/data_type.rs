use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminant carried by every heap node.
///
/// The set is closed: primitive operations, case selection, and the debug
/// surface all match on it exhaustively, so adding a tag means visiting every
/// dispatch site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    /// Unicode scalar value.
    Char,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point number.
    Double,
    /// Boxed host object (strings and opaque foreign values).
    Object,
    /// Saturated data constructor.
    Constructor,
    /// Function or partial application.
    Function,
    /// Alias to another node.
    Indirection,
    /// Suspended computation.
    Thunk,
}

impl DataType {
    pub const ALL: [DataType; 8] = [
        DataType::Char,
        DataType::Int,
        DataType::Double,
        DataType::Object,
        DataType::Constructor,
        DataType::Function,
        DataType::Indirection,
        DataType::Thunk,
    ];

    /// Stable upper-case label used in renders and error messages.
    pub fn label(self) -> &'static str {
        match self {
            DataType::Char => "CHAR",
            DataType::Int => "INT",
            DataType::Double => "DOUBLE",
            DataType::Object => "OBJECT",
            DataType::Constructor => "CONSTRUCTOR",
            DataType::Function => "FUNCTION",
            DataType::Indirection => "INDIRECTION",
            DataType::Thunk => "THUNK",
        }
    }

    /// Returns `true` for tags that are already in weak head normal form.
    pub fn is_whnf(self) -> bool {
        !matches!(self, DataType::Indirection | DataType::Thunk)
    }

    /// Returns `true` for tags that expose an ordinal value.
    pub fn is_ordinal(self) -> bool {
        matches!(self, DataType::Char | DataType::Constructor)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Int | DataType::Double)
    }

    /// Scalars are copied into a thunk slot on update instead of being
    /// referenced through an indirection.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            DataType::Char | DataType::Int | DataType::Double | DataType::Object
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
