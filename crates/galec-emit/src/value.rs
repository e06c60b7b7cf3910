//! The emitter's polymorphic value representation.
//!
//! Three orthogonal categories flow through expression lowering: ordinary
//! values with an LLVM textual name, and the two untyped constant kinds.
//! Uses normalize through `remove_constant` (coerce a constant at a typed
//! context) and `remove_lvalness` (load an address), keeping the
//! categories out of the individual lowering arms.

use galec_sem::{ConstValue, Type};

/// Result of lowering an expression.
#[derive(Clone, Debug)]
pub enum Value {
    /// A typed value: an SSA name, or an address when `lval` is set.
    Expr(ExprValue),
    /// An untyped integer literal or folded integer expression.
    IntConst(i64),
    /// An untyped bool literal or folded comparison.
    BoolConst(bool),
}

/// A value with an LLVM textual representation.
///
/// When `lval` is set, `name` is the *address* of the semantic value (an
/// alloca, a global, or a `getelementptr` result) and reading it requires
/// a `load`. Array values are carried as the address of the array either
/// way, matching `getelementptr`'s `[N x T]*` convention.
#[derive(Clone, Debug)]
pub struct ExprValue {
    pub name: String,
    pub lval: bool,
    pub ty: Type,
}

impl ExprValue {
    pub fn rvalue(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            lval: false,
            ty,
        }
    }

    pub fn lvalue(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            lval: true,
            ty,
        }
    }
}

impl Value {
    pub fn from_const(value: ConstValue) -> Value {
        match value {
            ConstValue::Int(i) => Value::IntConst(i),
            ConstValue::Bool(b) => Value::BoolConst(b),
        }
    }

    /// The constant content, if this is an untyped constant.
    pub fn as_const(&self) -> Option<ConstValue> {
        match self {
            Value::IntConst(i) => Some(ConstValue::Int(*i)),
            Value::BoolConst(b) => Some(ConstValue::Bool(*b)),
            Value::Expr(_) => None,
        }
    }
}
