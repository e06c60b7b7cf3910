//! Compile-time arithmetic on untyped constants.
//!
//! Shared by the resolver (const declarations, global initializers) and
//! the emitter (expression folding). Integer arithmetic wraps at 64 bits;
//! division and remainder by zero are errors.

use galec_par::ast::{BinOp, UnOp};

use crate::symbol::ConstValue;

pub fn fold_unop(op: UnOp, v: ConstValue) -> Result<ConstValue, String> {
    match (op, v) {
        (UnOp::Neg, ConstValue::Int(i)) => Ok(ConstValue::Int(i.wrapping_neg())),
        (op, _) => Err(format!("unhandled unary operator '{}' on a constant", op)),
    }
}

pub fn fold_binop(op: BinOp, l: ConstValue, r: ConstValue) -> Result<ConstValue, String> {
    use ConstValue::{Bool, Int};
    match (l, r) {
        (Int(l), Int(r)) => Ok(match op {
            BinOp::Add => Int(l.wrapping_add(r)),
            BinOp::Sub => Int(l.wrapping_sub(r)),
            BinOp::Mul => Int(l.wrapping_mul(r)),
            BinOp::Div => {
                if r == 0 {
                    return Err("division by zero".to_string());
                }
                Int(l.wrapping_div(r))
            }
            BinOp::Rem => {
                if r == 0 {
                    return Err("division by zero".to_string());
                }
                Int(l.wrapping_rem(r))
            }
            BinOp::BitAnd => Int(l & r),
            BinOp::BitOr => Int(l | r),
            BinOp::BitXor => Int(l ^ r),
            BinOp::AndNot => Int(l & !r),
            BinOp::Shl => {
                if !(0..64).contains(&r) {
                    return Err("shift amount out of range".to_string());
                }
                Int(l.wrapping_shl(r as u32))
            }
            BinOp::Shr => {
                if !(0..64).contains(&r) {
                    return Err("shift amount out of range".to_string());
                }
                Int(l >> r)
            }
            BinOp::Eq => Bool(l == r),
            BinOp::NotEq => Bool(l != r),
            BinOp::Lt => Bool(l < r),
            BinOp::LtEq => Bool(l <= r),
            BinOp::Gt => Bool(l > r),
            BinOp::GtEq => Bool(l >= r),
            BinOp::And | BinOp::Or => {
                return Err(format!("mismatched types for '{}' operator", op));
            }
        }),
        (Bool(l), Bool(r)) => Ok(match op {
            BinOp::Eq => Bool(l == r),
            BinOp::NotEq => Bool(l != r),
            BinOp::And => Bool(l && r),
            BinOp::Or => Bool(l || r),
            _ => return Err(format!("unhandled binary operator '{}' on bools", op)),
        }),
        _ => Err(format!("mismatched types for '{}' operator", op)),
    }
}
