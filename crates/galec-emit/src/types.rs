//! Lowering of semantic types to LLVM textual types.

use galec_sem::{Type, TypeTable};

/// The LLVM spelling of a semantic type.
///
/// Named struct types lower to their `%Name`, which the module prologue
/// defines; this is what lets pointer-recursive structs terminate. Other
/// named types lower through their underlying type.
pub fn llvm_type(table: &TypeTable, ty: &Type) -> String {
    match ty {
        Type::Void => "void".to_string(),
        Type::Int { bits, .. } => format!("i{}", bits),
        Type::Pointer(inner) => format!("{}*", llvm_type(table, inner)),
        Type::Array { dim, elem } => format!("[{} x {}]", dim, llvm_type(table, elem)),
        Type::Struct { fields } => {
            let inner: Vec<String> = fields.iter().map(|f| llvm_type(table, &f.ty)).collect();
            format!("{{ {} }}", inner.join(", "))
        }
        Type::Named(id) => {
            let def = table.def(*id);
            match def.underlying.as_ref() {
                Some(Type::Struct { .. }) => format!("%{}", def.name),
                Some(other) => llvm_type(table, other),
                None => panic!("internal error: named type shell in emission"),
            }
        }
        Type::Func(_) | Type::Constant => {
            panic!("internal error: type has no LLVM lowering")
        }
    }
}

/// The textual zero of a type, for zero-initializing stores and globals.
pub fn zero_value(table: &TypeTable, ty: &Type) -> &'static str {
    match table.resolve(ty) {
        Type::Int { .. } => "0",
        Type::Pointer(_) => "null",
        Type::Array { .. } | Type::Struct { .. } => "zeroinitializer",
        _ => panic!("internal error: type has no zero value"),
    }
}
