//! Semantic types.
//!
//! A closed sum with structural equality. Named types live in a
//! package-level [`TypeTable`] arena and are referenced by copyable
//! [`NamedId`], so pointer-recursive type graphs need no owning cycles:
//! the table owns every definition, types hold ids.

use galec_util::{CompileError, FilePos, FileSpan, TargetMachine};
use indexmap::IndexMap;

/// Reference to a named type in the package's [`TypeTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NamedId(pub u32);

#[derive(Clone, Debug)]
pub enum Type {
    Void,
    /// Sized integer; `bool` is `Int { bits: 1, signed: false }`.
    Int { bits: u32, signed: bool },
    Pointer(Box<Type>),
    Array { dim: i64, elem: Box<Type> },
    Struct { fields: Vec<Field> },
    Func(FuncType),
    Named(NamedId),
    /// The meta-type of untyped integer and bool literals.
    Constant,
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

#[derive(Clone, Debug)]
pub struct FuncType {
    pub ret: Box<Type>,
    pub args: Vec<Type>,
    pub is_var_arg: bool,
}

impl Type {
    pub fn bool_type() -> Type {
        Type::Int {
            bits: 1,
            signed: false,
        }
    }

    pub fn int(bits: u32, signed: bool) -> Type {
        Type::Int { bits, signed }
    }
}

/// The `int` type of a target: a signed integer of register width.
pub fn default_int_type(target: &dyn TargetMachine) -> Type {
    Type::int(target.default_int_bit_width(), true)
}

/// The `uint` type of a target; also the array index type.
pub fn default_uint_type(target: &dyn TargetMachine) -> Type {
    Type::int(target.default_int_bit_width(), false)
}

/// Whether `value` is representable in an integer of the given shape.
pub fn int_fits(value: i64, bits: u32, signed: bool) -> bool {
    if bits >= 64 {
        return signed || value >= 0;
    }
    if signed {
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        min <= value && value <= max
    } else {
        value >= 0 && value < (1i64 << bits)
    }
}

/// A named type definition: a shell until its underlying type is filled
/// in by the resolver's second sweep over the declarations.
#[derive(Debug)]
pub struct NamedTypeDef {
    pub name: String,
    pub span: FileSpan,
    pub underlying: Option<Type>,
}

/// Arena of the package's named types.
#[derive(Debug, Default)]
pub struct TypeTable {
    defs: Vec<NamedTypeDef>,
    by_name: IndexMap<String, NamedId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a shell for `name`. Fails on redefinition.
    pub fn declare_shell(&mut self, name: &str, span: FileSpan) -> Result<NamedId, CompileError> {
        if let Some(&prior) = self.by_name.get(name) {
            return Err(CompileError::source(
                format!(
                    "type {} already declared at {}",
                    name,
                    self.defs[prior.0 as usize].span
                ),
                span,
            ));
        }
        let id = NamedId(self.defs.len() as u32);
        self.defs.push(NamedTypeDef {
            name: name.to_string(),
            span,
            underlying: None,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<NamedId> {
        self.by_name.get(name).copied()
    }

    pub fn def(&self, id: NamedId) -> &NamedTypeDef {
        &self.defs[id.0 as usize]
    }

    pub fn set_underlying(&mut self, id: NamedId, ty: Type) {
        self.defs[id.0 as usize].underlying = Some(ty);
    }

    /// The filled-in underlying type of a named type.
    ///
    /// # Panics
    ///
    /// Panics on a shell; the resolver fills every definition before any
    /// later phase runs.
    pub fn underlying(&self, id: NamedId) -> &Type {
        self.defs[id.0 as usize]
            .underlying
            .as_ref()
            .expect("internal error: named type shell was never filled")
    }

    pub fn iter(&self) -> impl Iterator<Item = (NamedId, &NamedTypeDef)> {
        self.defs
            .iter()
            .enumerate()
            .map(|(i, d)| (NamedId(i as u32), d))
    }

    /// Chases `Named` references down to a structural type.
    pub fn resolve<'a>(&'a self, mut ty: &'a Type) -> &'a Type {
        while let Type::Named(id) = ty {
            ty = self.underlying(*id);
        }
        ty
    }

    /// Structural equality. `Named` compares by underlying type with an
    /// identity short-circuit; `Constant` equals only `Constant`.
    pub fn equals(&self, a: &Type, b: &Type) -> bool {
        self.eq_rec(a, b, &mut Vec::new())
    }

    fn eq_rec(&self, a: &Type, b: &Type, assumed: &mut Vec<(NamedId, NamedId)>) -> bool {
        match (a, b) {
            (Type::Named(x), Type::Named(y)) => {
                if x == y {
                    return true;
                }
                // A pair already under comparison is assumed equal; this
                // terminates mutually recursive graphs.
                if assumed.contains(&(*x, *y)) {
                    return true;
                }
                assumed.push((*x, *y));
                let eq = self.eq_rec(self.underlying(*x), self.underlying(*y), assumed);
                assumed.pop();
                eq
            }
            (Type::Named(x), other) => self.eq_rec(self.underlying(*x), other, assumed),
            (other, Type::Named(y)) => self.eq_rec(other, self.underlying(*y), assumed),
            (Type::Void, Type::Void) => true,
            (Type::Constant, Type::Constant) => true,
            (
                Type::Int { bits: ab, signed: asg },
                Type::Int { bits: bb, signed: bsg },
            ) => ab == bb && asg == bsg,
            (Type::Pointer(ap), Type::Pointer(bp)) => self.eq_rec(ap, bp, assumed),
            (
                Type::Array { dim: ad, elem: ae },
                Type::Array { dim: bd, elem: be },
            ) => ad == bd && self.eq_rec(ae, be, assumed),
            (Type::Struct { fields: af }, Type::Struct { fields: bf }) => {
                af.len() == bf.len()
                    && af.iter().zip(bf.iter()).all(|(x, y)| {
                        x.name == y.name && self.eq_rec(&x.ty, &y.ty, assumed)
                    })
            }
            (Type::Func(af), Type::Func(bf)) => {
                af.is_var_arg == bf.is_var_arg
                    && af.args.len() == bf.args.len()
                    && self.eq_rec(&af.ret, &bf.ret, assumed)
                    && af
                        .args
                        .iter()
                        .zip(bf.args.iter())
                        .all(|(x, y)| self.eq_rec(x, y, assumed))
            }
            _ => false,
        }
    }

    pub fn is_bool(&self, ty: &Type) -> bool {
        matches!(self.resolve(ty), Type::Int { bits: 1, .. })
    }

    pub fn is_int(&self, ty: &Type) -> bool {
        matches!(self.resolve(ty), Type::Int { .. })
    }

    pub fn is_pointer(&self, ty: &Type) -> bool {
        matches!(self.resolve(ty), Type::Pointer(_))
    }

    pub fn is_array(&self, ty: &Type) -> bool {
        matches!(self.resolve(ty), Type::Array { .. })
    }

    /// Human-readable rendering for error messages.
    pub fn display(&self, ty: &Type) -> String {
        match ty {
            Type::Void => "void".to_string(),
            Type::Constant => "constant".to_string(),
            Type::Int { bits: 1, .. } => "bool".to_string(),
            Type::Int { bits, signed: true } => format!("int{}", bits),
            Type::Int { bits, signed: false } => format!("uint{}", bits),
            Type::Pointer(inner) => format!("*{}", self.display(inner)),
            Type::Array { dim, elem } => format!("[{}]{}", dim, self.display(elem)),
            Type::Struct { fields } => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{} {}", f.name, self.display(&f.ty)))
                    .collect();
                format!("struct {{ {} }}", inner.join("; "))
            }
            Type::Func(_) => "function".to_string(),
            Type::Named(id) => self.def(*id).name.clone(),
        }
    }
}

/// The builtin sized types available in every scope.
pub fn builtin_types(target: &dyn TargetMachine) -> Vec<(&'static str, Type)> {
    vec![
        ("bool", Type::bool_type()),
        ("int8", Type::int(8, true)),
        ("int16", Type::int(16, true)),
        ("int32", Type::int(32, true)),
        ("int64", Type::int(64, true)),
        ("uint8", Type::int(8, false)),
        ("uint16", Type::int(16, false)),
        ("uint32", Type::int(32, false)),
        ("uint64", Type::int(64, false)),
        ("int", default_int_type(target)),
        ("uint", default_uint_type(target)),
    ]
}

/// A placeholder position for builtin definitions.
pub fn builtin_span() -> FileSpan {
    FileSpan::point(std::sync::Arc::from("<builtin>"), FilePos::START)
}
