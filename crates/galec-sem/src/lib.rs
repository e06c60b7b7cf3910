//! galec-sem - Semantic analysis for gale packages.
//!
//! Provides the semantic type system, scopes and symbols, compile-time
//! constant arithmetic, and the two-pass resolver that binds every
//! identifier node to a symbol and computes the types of all declarations.

pub mod fold;
pub mod resolve;
pub mod scope;
pub mod symbol;
pub mod types;

pub use fold::{fold_binop, fold_unop};
pub use resolve::{resolve_package, GlobalVar, ResolvedPackage};
pub use scope::{LocalScopes, PackageScope};
pub use symbol::{ConstValue, SlotId, Symbol, SymbolId, SymbolTable};
pub use types::{
    builtin_types, default_int_type, default_uint_type, int_fits, Field, FuncType, NamedId,
    Type, TypeTable,
};
