//! Lexical scopes.
//!
//! Two kinds: the package scope, which supports forward references via
//! `Lazy` symbols, and the strict top-down local frames used inside
//! function bodies. Builtin types and constants sit in a root frame below
//! the package scope.

use galec_util::{CompileError, FileSpan, TargetMachine};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::symbol::{ConstValue, Symbol, SymbolId, SymbolTable};
use crate::types::{builtin_span, builtin_types, Type};

/// Package-level names plus the builtin root frame.
#[derive(Debug)]
pub struct PackageScope {
    builtin_types: IndexMap<String, Type>,
    builtin_syms: IndexMap<String, SymbolId>,
    types: IndexMap<String, Type>,
    syms: IndexMap<String, SymbolId>,
}

impl PackageScope {
    pub fn new(target: &dyn TargetMachine, table: &mut SymbolTable) -> Self {
        let mut builtin_syms = IndexMap::new();
        for (name, value) in [("true", true), ("false", false)] {
            let id = table.alloc(Symbol::Const {
                value: ConstValue::Bool(value),
                def_pos: builtin_span(),
            });
            builtin_syms.insert(name.to_string(), id);
        }
        Self {
            builtin_types: builtin_types(target)
                .into_iter()
                .map(|(n, t)| (n.to_string(), t))
                .collect(),
            builtin_syms,
            types: IndexMap::new(),
            syms: IndexMap::new(),
        }
    }

    pub fn declare_type(
        &mut self,
        name: &str,
        ty: Type,
        span: &FileSpan,
    ) -> Result<(), CompileError> {
        if self.types.contains_key(name) {
            return Err(CompileError::source(
                format!("type {} already declared", name),
                span.clone(),
            ));
        }
        self.types.insert(name.to_string(), ty);
        Ok(())
    }

    pub fn lookup_type(&self, name: &str) -> Option<&Type> {
        self.types.get(name).or_else(|| self.builtin_types.get(name))
    }

    /// Declares a package-level symbol. An existing `Lazy` placeholder for
    /// the name is patched in place, so earlier forward references resolve
    /// to the new symbol.
    pub fn declare_sym(
        &mut self,
        table: &mut SymbolTable,
        name: &str,
        sym: Symbol,
        span: &FileSpan,
    ) -> Result<SymbolId, CompileError> {
        if let Some(&existing) = self.syms.get(name) {
            if table.is_lazy(existing) {
                table.patch(existing, sym);
                return Ok(existing);
            }
            return Err(CompileError::source(
                format!(
                    "{} already declared at {}",
                    name,
                    table.get(existing).def_pos()
                ),
                span.clone(),
            ));
        }
        let id = table.alloc(sym);
        self.syms.insert(name.to_string(), id);
        Ok(id)
    }

    /// Looks a name up, creating a `Lazy` placeholder on a miss so the
    /// caller always gets a binding. Unpatched placeholders are reported
    /// by [`PackageScope::first_unresolved`].
    pub fn lookup_sym(
        &mut self,
        table: &mut SymbolTable,
        name: &str,
        use_span: &FileSpan,
    ) -> SymbolId {
        if let Some(&id) = self.syms.get(name) {
            return id;
        }
        if let Some(&id) = self.builtin_syms.get(name) {
            return id;
        }
        let id = table.alloc(Symbol::Lazy {
            name: name.to_string(),
            first_use: use_span.clone(),
        });
        self.syms.insert(name.to_string(), id);
        id
    }

    /// Looks a name up without creating a placeholder.
    pub fn peek_sym(&self, name: &str) -> Option<SymbolId> {
        self.syms
            .get(name)
            .or_else(|| self.builtin_syms.get(name))
            .copied()
    }

    /// The first name that was referenced but never declared, in
    /// first-reference order.
    pub fn first_unresolved<'t>(&self, table: &'t SymbolTable) -> Option<(&'t str, &'t FileSpan)> {
        self.syms.values().find_map(|&id| match table.get(id) {
            Symbol::Lazy { name, first_use } => Some((name.as_str(), first_use)),
            _ => None,
        })
    }
}

/// The strict top-down frames of a function body. No forward references;
/// redeclaration within one frame is an error.
#[derive(Debug, Default)]
pub struct LocalScopes {
    frames: Vec<FxHashMap<String, SymbolId>>,
}

impl LocalScopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    pub fn pop(&mut self) {
        self.frames.pop().expect("internal error: scope underflow");
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn declare(
        &mut self,
        table: &SymbolTable,
        name: &str,
        id: SymbolId,
        span: &FileSpan,
    ) -> Result<(), CompileError> {
        let frame = self
            .frames
            .last_mut()
            .expect("internal error: no open scope");
        if let Some(&existing) = frame.get(name) {
            return Err(CompileError::source(
                format!(
                    "{} already declared at {}",
                    name,
                    table.get(existing).def_pos()
                ),
                span.clone(),
            ));
        }
        frame.insert(name.to_string(), id);
        Ok(())
    }

    /// Walks the frames innermost-out.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).copied())
    }
}
