//! Expression lowering.
//!
//! Every use site funnels through the same two normalizations:
//! `remove_constant` coerces an untyped constant at a typed context, and
//! `remove_lvalness` turns an address into a value with a `load` (the
//! identity on arrays, whose addresses feed `getelementptr` directly).

use std::io::Write;

use galec_par::ast::{BinOp, Call, Expr, IndexInto, Selector, UnOp, Unop};
use galec_sem::{default_int_type, default_uint_type, fold_binop, fold_unop, int_fits, Symbol, Type};
use galec_util::{CompileError, FileSpan, Result};

use crate::value::{ExprValue, Value};
use crate::Emitter;

impl<W: Write> Emitter<'_, W> {
    pub(crate) fn lower_expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Constant(lit) => Ok(Value::IntConst(lit.value)),
            Expr::Str(lit) => Err(CompileError::source(
                "string literal is not a value",
                lit.span.clone(),
            )),
            Expr::Ident(ident) => match self.pkg.symbol_of(ident.id) {
                Symbol::Local { ty, slot, .. } => {
                    let ty = ty.clone();
                    let addr = self.slot_addr(*slot).to_string();
                    Ok(Value::Expr(ExprValue::lvalue(addr, ty)))
                }
                Symbol::Global { ty, name, .. } => {
                    if matches!(ty, Type::Void) {
                        // Imports register as opaque globals.
                        return Err(CompileError::source(
                            format!("{} is not a value", ident.name),
                            ident.span.clone(),
                        ));
                    }
                    Ok(Value::Expr(ExprValue::lvalue(
                        format!("@{}", name),
                        ty.clone(),
                    )))
                }
                Symbol::Const { value, .. } => Ok(Value::from_const(*value)),
                Symbol::GlobalFunc { .. } => Err(CompileError::source(
                    format!("function {} used as a value", ident.name),
                    ident.span.clone(),
                )),
                Symbol::Lazy { .. } => {
                    panic!("internal error: lazy symbol survived resolution")
                }
            },
            Expr::Unop(unop) => self.lower_unop(unop),
            Expr::Binop(binop) => match binop.op {
                BinOp::And | BinOp::Or => {
                    self.lower_short_circuit(binop.op, &binop.l, &binop.r)
                }
                op => {
                    let l = self.lower_expr(&binop.l)?;
                    let r = self.lower_expr(&binop.r)?;
                    self.lower_binop_values(
                        op,
                        l,
                        r,
                        binop.l.span(),
                        binop.r.span(),
                        &binop.span,
                    )
                }
            },
            Expr::Call(call) => self.lower_call(call),
            Expr::Selector(sel) => self.lower_selector(sel),
            Expr::Index(index) => self.lower_index(index),
        }
    }

    fn lower_unop(&mut self, unop: &Unop) -> Result<Value> {
        let value = self.lower_expr(&unop.expr)?;
        match unop.op {
            UnOp::Addr => match value {
                Value::Expr(e) if e.lval => Ok(Value::Expr(ExprValue::rvalue(
                    e.name,
                    Type::Pointer(Box::new(e.ty)),
                ))),
                _ => Err(CompileError::source(
                    "cannot take the address of this expression",
                    unop.span.clone(),
                )),
            },
            UnOp::Deref => {
                let e = match value {
                    Value::Expr(e) => self.remove_lvalness(e)?,
                    _ => {
                        return Err(CompileError::source(
                            "cannot dereference this expression",
                            unop.span.clone(),
                        ));
                    }
                };
                match self.pkg.types.resolve(&e.ty).clone() {
                    Type::Pointer(inner) => {
                        Ok(Value::Expr(ExprValue::lvalue(e.name, *inner)))
                    }
                    other => Err(CompileError::source(
                        format!(
                            "cannot dereference a value of type {}",
                            self.pkg.types.display(&other)
                        ),
                        unop.span.clone(),
                    )),
                }
            }
            UnOp::Neg => match value {
                Value::IntConst(_) | Value::BoolConst(_) => {
                    let folded = fold_unop(UnOp::Neg, value.as_const().unwrap())
                        .map_err(|msg| CompileError::source(msg, unop.span.clone()))?;
                    Ok(Value::from_const(folded))
                }
                Value::Expr(e) => {
                    let e = self.remove_lvalness(e)?;
                    if !self.pkg.types.is_int(&e.ty) {
                        return Err(CompileError::source(
                            format!(
                                "cannot negate a value of type {}",
                                self.pkg.types.display(&e.ty)
                            ),
                            unop.span.clone(),
                        ));
                    }
                    let ty_text = self.llvm(&e.ty);
                    let result = self.new_value();
                    self.emiti(format_args!(
                        "{} = sub {} 0, {}",
                        result, ty_text, e.name
                    ))?;
                    Ok(Value::Expr(ExprValue::rvalue(result, e.ty)))
                }
            },
        }
    }

    /// Lowers a binary operator over two already-lowered operands. Also
    /// the backend of compound assignment.
    pub(crate) fn lower_binop_values(
        &mut self,
        op: BinOp,
        l: Value,
        r: Value,
        lspan: &FileSpan,
        rspan: &FileSpan,
        span: &FileSpan,
    ) -> Result<Value> {
        // Two constants fold at compile time.
        if let (Some(lc), Some(rc)) = (l.as_const(), r.as_const()) {
            let folded = fold_binop(op, lc, rc)
                .map_err(|msg| CompileError::source(msg, span.clone()))?;
            return Ok(Value::from_const(folded));
        }

        // A constant arm coerces to the typed arm's type.
        let (le, re) = match (l, r) {
            (Value::Expr(le), other) => {
                let hint = le.ty.clone();
                (le, self.remove_constant(other, &hint, rspan)?)
            }
            (other, Value::Expr(re)) => {
                let hint = re.ty.clone();
                (self.remove_constant(other, &hint, lspan)?, re)
            }
            _ => unreachable!("constant pair handled above"),
        };
        let le = self.remove_lvalness(le)?;
        let re = self.remove_lvalness(re)?;

        if !self.pkg.types.equals(&le.ty, &re.ty) {
            return Err(CompileError::source(
                format!(
                    "mismatched types for '{}' operator ({} vs {})",
                    op,
                    self.pkg.types.display(&le.ty),
                    self.pkg.types.display(&re.ty)
                ),
                span.clone(),
            ));
        }
        let signed = match self.pkg.types.resolve(&le.ty) {
            Type::Int { signed, .. } => *signed,
            other => {
                return Err(CompileError::source(
                    format!(
                        "operator '{}' requires integer operands, not {}",
                        op,
                        self.pkg.types.display(other)
                    ),
                    span.clone(),
                ));
            }
        };
        let ty_text = self.llvm(&le.ty);

        // Comparisons produce a bool.
        if let Some(pred) = icmp_predicate(op, signed) {
            let result = self.new_value();
            self.emiti(format_args!(
                "{} = icmp {} {} {}, {}",
                result, pred, ty_text, le.name, re.name
            ))?;
            return Ok(Value::Expr(ExprValue::rvalue(result, Type::bool_type())));
        }

        if op == BinOp::AndNot {
            // No direct LLVM opcode: l & (r ^ -1).
            let inverted = self.new_value();
            self.emiti(format_args!(
                "{} = xor {} {}, -1",
                inverted, ty_text, re.name
            ))?;
            let result = self.new_value();
            self.emiti(format_args!(
                "{} = and {} {}, {}",
                result, ty_text, le.name, inverted
            ))?;
            return Ok(Value::Expr(ExprValue::rvalue(result, le.ty)));
        }

        let opcode = match op {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => {
                if signed {
                    "sdiv"
                } else {
                    "udiv"
                }
            }
            BinOp::Rem => {
                if signed {
                    "srem"
                } else {
                    "urem"
                }
            }
            BinOp::BitAnd => "and",
            BinOp::BitOr => "or",
            BinOp::BitXor => "xor",
            BinOp::Shl => "shl",
            BinOp::Shr => {
                if signed {
                    "ashr"
                } else {
                    "lshr"
                }
            }
            _ => panic!("internal error: unhandled binary operator {}", op),
        };
        let result = self.new_value();
        self.emiti(format_args!(
            "{} = {} {} {}, {}",
            result, opcode, ty_text, le.name, re.name
        ))?;
        Ok(Value::Expr(ExprValue::rvalue(result, le.ty)))
    }

    /// `&&` and `||` lower with conditional branches so the right side is
    /// only evaluated when the left side does not decide the result. The
    /// result goes through an `i1` spill slot; no phi nodes.
    fn lower_short_circuit(&mut self, op: BinOp, l: &Expr, r: &Expr) -> Result<Value> {
        let bool_ty = Type::bool_type();
        let left = self.lower_expr(l)?;

        // A constant left side decides, or defers wholly to the right.
        if let Value::BoolConst(b) = left {
            let decided = match op {
                BinOp::And => !b,
                BinOp::Or => b,
                _ => unreachable!(),
            };
            if decided {
                return Ok(Value::BoolConst(b));
            }
            let right = self.lower_expr(r)?;
            if let Value::BoolConst(_) = right {
                return Ok(right);
            }
            let re = self.remove_constant(right, &bool_ty, r.span())?;
            let re = self.remove_lvalness(re)?;
            self.require_bool(&re, r.span())?;
            return Ok(Value::Expr(re));
        }

        let le = self.remove_constant(left, &bool_ty, l.span())?;
        let le = self.remove_lvalness(le)?;
        self.require_bool(&le, l.span())?;

        let slot = self.new_value();
        self.emiti(format_args!("{} = alloca i1", slot))?;
        self.emiti(format_args!("store i1 {}, i1* {}", le.name, slot))?;

        let rhs = self.new_label();
        let after = self.new_label();
        match op {
            BinOp::And => self.emit_cond_br(&le.name, &rhs, &after)?,
            BinOp::Or => self.emit_cond_br(&le.name, &after, &rhs)?,
            _ => unreachable!(),
        }

        self.emit_label(&rhs)?;
        let right = self.lower_expr(r)?;
        let re = self.remove_constant(right, &bool_ty, r.span())?;
        let re = self.remove_lvalness(re)?;
        self.require_bool(&re, r.span())?;
        self.emiti(format_args!("store i1 {}, i1* {}", re.name, slot))?;
        self.emit_br(&after)?;

        self.emit_label(&after)?;
        let result = self.new_value();
        self.emiti(format_args!("{} = load i1, i1* {}", result, slot))?;
        Ok(Value::Expr(ExprValue::rvalue(result, bool_ty)))
    }

    fn lower_call(&mut self, call: &Call) -> Result<Value> {
        let (fn_ty, fn_name) = match &call.callee {
            Expr::Ident(ident) => match self.pkg.symbol_of(ident.id) {
                Symbol::GlobalFunc { ty, name, .. } => (ty.clone(), name.clone()),
                _ => {
                    return Err(CompileError::source(
                        format!("{} is not a function", ident.name),
                        ident.span.clone(),
                    ));
                }
            },
            other => {
                return Err(CompileError::source(
                    "call of a non-function expression",
                    other.span().clone(),
                ));
            }
        };

        let arity_ok = if fn_ty.is_var_arg {
            call.args.len() >= fn_ty.args.len()
        } else {
            call.args.len() == fn_ty.args.len()
        };
        if !arity_ok {
            return Err(CompileError::source(
                format!(
                    "wrong number of arguments to {} (want {}, have {})",
                    fn_name,
                    fn_ty.args.len(),
                    call.args.len()
                ),
                call.span.clone(),
            ));
        }

        // Extra variadic arguments default to the machine int.
        let vararg_hint = default_int_type(self.target);
        let mut lowered = Vec::with_capacity(call.args.len());
        for (i, arg) in call.args.iter().enumerate() {
            let declared = fn_ty.args.get(i);
            let hint = declared.cloned().unwrap_or_else(|| vararg_hint.clone());
            let value = self.lower_expr(arg)?;
            let value = self.remove_constant(value, &hint, arg.span())?;
            let value = self.remove_lvalness(value)?;
            let value = self.load_array_value(value)?;
            if let Some(declared) = declared {
                if !self.pkg.types.equals(&value.ty, declared) {
                    return Err(CompileError::source(
                        format!(
                            "mismatched types in call to {} ({} vs {})",
                            fn_name,
                            self.pkg.types.display(&value.ty),
                            self.pkg.types.display(declared)
                        ),
                        arg.span().clone(),
                    ));
                }
            }
            lowered.push(format!("{} {}", self.llvm(&value.ty), value.name));
        }

        let arg_list = lowered.join(", ");
        if matches!(self.pkg.types.resolve(&fn_ty.ret), Type::Void) {
            self.emiti(format_args!("call void @{}({})", fn_name, arg_list))?;
            return Ok(Value::Expr(ExprValue::rvalue(String::new(), Type::Void)));
        }

        let ret_text = self.llvm(&fn_ty.ret);
        let result = self.new_value();
        self.emiti(format_args!(
            "{} = call {} @{}({})",
            result, ret_text, fn_name, arg_list
        ))?;

        // An array return value is spilled so the array convention
        // (addresses everywhere) holds for the result too.
        if self.pkg.types.is_array(&fn_ty.ret) {
            let addr = self.new_value();
            self.emiti(format_args!("{} = alloca {}", addr, ret_text))?;
            self.emiti(format_args!(
                "store {} {}, {}* {}",
                ret_text, result, ret_text, addr
            ))?;
            return Ok(Value::Expr(ExprValue::lvalue(addr, (*fn_ty.ret).clone())));
        }
        Ok(Value::Expr(ExprValue::rvalue(result, (*fn_ty.ret).clone())))
    }

    /// Field selection: a `getelementptr` on an addressable struct (with
    /// one level of pointer auto-deref), or `extractvalue` on a plain
    /// struct value.
    fn lower_selector(&mut self, sel: &Selector) -> Result<Value> {
        let base = self.lower_expr(&sel.expr)?;
        let e = match base {
            Value::Expr(e) => e,
            _ => {
                return Err(CompileError::source(
                    "cannot select a field of this expression",
                    sel.span.clone(),
                ));
            }
        };

        let resolved = self.pkg.types.resolve(&e.ty).clone();
        match resolved {
            Type::Pointer(inner) => {
                let pointee = (*inner).clone();
                let (index, field_ty) = self.field_of(&pointee, &sel.name, &sel.span)?;
                let pointer = self.remove_lvalness(e)?;
                let struct_text = self.llvm(&pointee);
                let result = self.new_value();
                self.emiti(format_args!(
                    "{} = getelementptr {}, {}* {}, i64 0, i32 {}",
                    result, struct_text, struct_text, pointer.name, index
                ))?;
                Ok(Value::Expr(ExprValue::lvalue(result, field_ty)))
            }
            Type::Struct { .. } => {
                let (index, field_ty) = self.field_of(&e.ty, &sel.name, &sel.span)?;
                let struct_text = self.llvm(&e.ty);
                if e.lval {
                    let result = self.new_value();
                    self.emiti(format_args!(
                        "{} = getelementptr {}, {}* {}, i64 0, i32 {}",
                        result, struct_text, struct_text, e.name, index
                    ))?;
                    Ok(Value::Expr(ExprValue::lvalue(result, field_ty)))
                } else {
                    let result = self.new_value();
                    self.emiti(format_args!(
                        "{} = extractvalue {} {}, {}",
                        result, struct_text, e.name, index
                    ))?;
                    Ok(Value::Expr(ExprValue::rvalue(result, field_ty)))
                }
            }
            other => Err(CompileError::source(
                format!("type {} has no fields", self.pkg.types.display(&other)),
                sel.span.clone(),
            )),
        }
    }

    /// Position and type of a struct field.
    fn field_of(&self, ty: &Type, name: &str, span: &FileSpan) -> Result<(usize, Type)> {
        match self.pkg.types.resolve(ty) {
            Type::Struct { fields } => fields
                .iter()
                .position(|f| f.name == name)
                .map(|i| (i, fields[i].ty.clone()))
                .ok_or_else(|| {
                    CompileError::source(
                        format!(
                            "type {} has no field {}",
                            self.pkg.types.display(ty),
                            name
                        ),
                        span.clone(),
                    )
                }),
            other => Err(CompileError::source(
                format!("type {} has no fields", self.pkg.types.display(other)),
                span.clone(),
            )),
        }
    }

    /// Indexing into an array (by its address) or a pointer.
    fn lower_index(&mut self, index: &IndexInto) -> Result<Value> {
        let base = self.lower_expr(&index.expr)?;
        let e = match base {
            Value::Expr(e) => e,
            _ => {
                return Err(CompileError::source(
                    "cannot index this expression",
                    index.span.clone(),
                ));
            }
        };

        // The index coerces to the default uint and loads if needed.
        let uint = default_uint_type(self.target);
        let idx = self.lower_expr(&index.index)?;
        let idx = self.remove_constant(idx, &uint, index.index.span())?;
        let idx = self.remove_lvalness(idx)?;
        if !self.pkg.types.is_int(&idx.ty) {
            return Err(CompileError::source(
                "array index must be an integer",
                index.index.span().clone(),
            ));
        }
        let idx_text = self.llvm(&idx.ty);

        match self.pkg.types.resolve(&e.ty).clone() {
            Type::Array { elem, .. } => {
                // An array's representation is its address whether or not
                // the L-value flag is set.
                let array_text = self.llvm(&e.ty);
                let result = self.new_value();
                self.emiti(format_args!(
                    "{} = getelementptr {}, {}* {}, i64 0, {} {}",
                    result, array_text, array_text, e.name, idx_text, idx.name
                ))?;
                Ok(Value::Expr(ExprValue::lvalue(result, (*elem).clone())))
            }
            Type::Pointer(inner) => {
                let pointer = self.remove_lvalness(e)?;
                let elem_text = self.llvm(&inner);
                let result = self.new_value();
                self.emiti(format_args!(
                    "{} = getelementptr {}, {}* {}, {} {}",
                    result, elem_text, elem_text, pointer.name, idx_text, idx.name
                ))?;
                Ok(Value::Expr(ExprValue::lvalue(result, (*inner).clone())))
            }
            other => Err(CompileError::source(
                format!(
                    "cannot index a value of type {}",
                    self.pkg.types.display(&other)
                ),
                index.span.clone(),
            )),
        }
    }

    // Normalization helpers.

    /// Coerces an untyped constant at a typed context. An integer constant
    /// fits any integer type wider than a bool; a bool constant fits only
    /// bool. Typed values pass through.
    pub(crate) fn remove_constant(
        &mut self,
        value: Value,
        hint: &Type,
        span: &FileSpan,
    ) -> Result<ExprValue> {
        match value {
            Value::Expr(e) => Ok(e),
            Value::IntConst(v) => match self.pkg.types.resolve(hint) {
                Type::Int { bits, signed } if *bits > 1 => {
                    if !int_fits(v, *bits, *signed) {
                        return Err(CompileError::source(
                            format!(
                                "constant {} out of range for {}",
                                v,
                                self.pkg.types.display(hint)
                            ),
                            span.clone(),
                        ));
                    }
                    Ok(ExprValue::rvalue(v.to_string(), hint.clone()))
                }
                _ => Err(CompileError::source(
                    format!(
                        "cannot use integer constant as {}",
                        self.pkg.types.display(hint)
                    ),
                    span.clone(),
                )),
            },
            Value::BoolConst(b) => {
                if self.pkg.types.is_bool(hint) {
                    Ok(ExprValue::rvalue(b.to_string(), hint.clone()))
                } else {
                    Err(CompileError::source(
                        format!(
                            "cannot use bool constant as {}",
                            self.pkg.types.display(hint)
                        ),
                        span.clone(),
                    ))
                }
            }
        }
    }

    /// Loads an L-value. The identity for arrays: their address is their
    /// representation, only the flag clears.
    pub(crate) fn remove_lvalness(&mut self, e: ExprValue) -> Result<ExprValue> {
        if !e.lval {
            return Ok(e);
        }
        if self.pkg.types.is_array(&e.ty) {
            return Ok(ExprValue::rvalue(e.name, e.ty));
        }
        let ty_text = self.llvm(&e.ty);
        let result = self.new_value();
        self.emiti(format_args!(
            "{} = load {}, {}* {}",
            result, ty_text, ty_text, e.name
        ))?;
        Ok(ExprValue::rvalue(result, e.ty))
    }

    /// Materializes an array's aggregate value from its address, for the
    /// by-value contexts (assignment, argument, return).
    pub(crate) fn load_array_value(&mut self, e: ExprValue) -> Result<ExprValue> {
        if !self.pkg.types.is_array(&e.ty) {
            return Ok(e);
        }
        let ty_text = self.llvm(&e.ty);
        let result = self.new_value();
        self.emiti(format_args!(
            "{} = load {}, {}* {}",
            result, ty_text, ty_text, e.name
        ))?;
        Ok(ExprValue::rvalue(result, e.ty))
    }

    /// Lowers a condition expression to a loaded bool value.
    pub(crate) fn lower_bool_cond(&mut self, expr: &Expr) -> Result<ExprValue> {
        let bool_ty = Type::bool_type();
        let value = self.lower_expr(expr)?;
        let e = self.remove_constant(value, &bool_ty, expr.span())?;
        let e = self.remove_lvalness(e)?;
        self.require_bool(&e, expr.span())?;
        Ok(e)
    }

    fn require_bool(&self, e: &ExprValue, span: &FileSpan) -> Result<()> {
        if self.pkg.types.is_bool(&e.ty) {
            Ok(())
        } else {
            Err(CompileError::source(
                format!(
                    "condition must be a bool, not {}",
                    self.pkg.types.display(&e.ty)
                ),
                span.clone(),
            ))
        }
    }
}

/// The `icmp` predicate of a comparison operator, or `None` for the
/// arithmetic operators.
fn icmp_predicate(op: BinOp, signed: bool) -> Option<&'static str> {
    Some(match op {
        BinOp::Eq => "eq",
        BinOp::NotEq => "ne",
        BinOp::Lt => {
            if signed {
                "slt"
            } else {
                "ult"
            }
        }
        BinOp::LtEq => {
            if signed {
                "sle"
            } else {
                "ule"
            }
        }
        BinOp::Gt => {
            if signed {
                "sgt"
            } else {
                "ugt"
            }
        }
        BinOp::GtEq => {
            if signed {
                "sge"
            } else {
                "uge"
            }
        }
        _ => return None,
    })
}
