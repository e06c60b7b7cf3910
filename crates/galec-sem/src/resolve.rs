//! Name and type resolution.
//!
//! Two passes over a package. Pass A registers everything at package
//! level: named types (shells first, then underlyings, then an acyclicity
//! sweep), imports, function signatures, constants, and global variables.
//! Pass B walks every function body, declaring locals and binding each
//! identifier node to a symbol in the package-wide identifier map.
//!
//! Package-level forward references work through `Lazy` placeholder
//! symbols patched on declaration; any placeholder still unpatched at the
//! end is an undeclared name.

use galec_par::ast::{self, Expr, File, NodeId, Stmt, TypeExpr};
use galec_util::{CompileError, FileSpan, Result, TargetMachine};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::fold::{fold_binop, fold_unop};
use crate::scope::{LocalScopes, PackageScope};
use crate::symbol::{ConstValue, SlotId, Symbol, SymbolId, SymbolTable};
use crate::types::{int_fits, Field, FuncType, NamedId, Type, TypeTable};

/// A package-level variable, in declaration order for emission.
#[derive(Debug)]
pub struct GlobalVar {
    pub name: String,
    pub ty: Type,
    pub init: Option<ConstValue>,
}

/// Everything later phases need from resolution.
#[derive(Debug)]
pub struct ResolvedPackage {
    pub pkg_name: String,
    pub types: TypeTable,
    pub symbols: SymbolTable,
    /// Identifier node to symbol, for every bindable name occurrence.
    pub bindings: FxHashMap<NodeId, SymbolId>,
    /// Function name to signature; the emitter reads return types here.
    pub fn_types: FxHashMap<String, FuncType>,
    pub globals: Vec<GlobalVar>,
}

impl ResolvedPackage {
    /// The symbol an identifier node was bound to.
    ///
    /// # Panics
    ///
    /// Panics if the node was never bound; resolution binds every
    /// identifier it accepts.
    pub fn symbol_of(&self, id: NodeId) -> &Symbol {
        let sym = self
            .bindings
            .get(&id)
            .expect("internal error: unbound identifier node");
        self.symbols.get(*sym)
    }
}

/// Resolves one package's files.
pub fn resolve_package(
    target: &dyn TargetMachine,
    files: &[File],
) -> Result<ResolvedPackage> {
    let mut symbols = SymbolTable::new();
    let package = PackageScope::new(target, &mut symbols);
    let mut resolver = Resolver {
        types: TypeTable::new(),
        symbols,
        package,
        locals: LocalScopes::new(),
        bindings: FxHashMap::default(),
        fn_types: FxHashMap::default(),
        globals: Vec::new(),
        next_slot: 0,
    };

    // Pass A: package-level declarations.
    resolver.declare_named_types(files)?;
    resolver.declare_imports(files)?;
    resolver.declare_funcs(files)?;
    resolver.declare_consts(files)?;
    resolver.declare_globals(files)?;

    // Pass B: function bodies.
    for file in files {
        for func in &file.func_decls {
            resolver.resolve_func(func)?;
        }
    }

    if let Some((name, span)) = resolver.package.first_unresolved(&resolver.symbols) {
        return Err(CompileError::source(
            format!("{} is not declared", name),
            span.clone(),
        ));
    }

    Ok(ResolvedPackage {
        pkg_name: files.first().map(|f| f.pkg.clone()).unwrap_or_default(),
        types: resolver.types,
        symbols: resolver.symbols,
        bindings: resolver.bindings,
        fn_types: resolver.fn_types,
        globals: resolver.globals,
    })
}

struct Resolver {
    types: TypeTable,
    symbols: SymbolTable,
    package: PackageScope,
    locals: LocalScopes,
    bindings: FxHashMap<NodeId, SymbolId>,
    fn_types: FxHashMap<String, FuncType>,
    globals: Vec<GlobalVar>,
    next_slot: u32,
}

impl Resolver {
    fn fresh_slot(&mut self) -> SlotId {
        let slot = SlotId(self.next_slot);
        self.next_slot += 1;
        slot
    }

    /// Converts a type expression into a semantic type.
    fn type_of(&self, te: &TypeExpr) -> Result<Type> {
        match te {
            TypeExpr::Name { name, span } => {
                self.package.lookup_type(name).cloned().ok_or_else(|| {
                    CompileError::source(
                        format!("{} is not a valid type", name),
                        span.clone(),
                    )
                })
            }
            TypeExpr::Pointer { inner, .. } => {
                Ok(Type::Pointer(Box::new(self.type_of(inner)?)))
            }
            TypeExpr::Array { dim, elem, .. } => Ok(Type::Array {
                dim: *dim,
                elem: Box::new(self.type_of(elem)?),
            }),
            TypeExpr::Struct { fields, span } => {
                let mut seen = FxHashSet::default();
                let mut out = Vec::with_capacity(fields.len());
                for field in fields {
                    if !seen.insert(field.name.as_str()) {
                        return Err(CompileError::source(
                            format!("duplicate struct field {}", field.name),
                            span.clone(),
                        ));
                    }
                    out.push(Field {
                        name: field.name.clone(),
                        ty: self.type_of(&field.ty)?,
                    });
                }
                Ok(Type::Struct { fields: out })
            }
        }
    }

    // Pass A.

    /// Named types: shells for every declaration first, so underlyings can
    /// reference each other freely, then fill, then reject any type that
    /// reaches itself without crossing a pointer.
    fn declare_named_types(&mut self, files: &[File]) -> Result<()> {
        let mut decls = Vec::new();
        for file in files {
            for td in &file.type_decls {
                let id = self.types.declare_shell(&td.name, td.span.clone())?;
                self.package
                    .declare_type(&td.name, Type::Named(id), &td.span)?;
                decls.push((id, td));
            }
        }

        for (id, td) in &decls {
            let underlying = self.type_of(&td.ty)?;
            self.types.set_underlying(*id, underlying);
        }

        for (id, td) in &decls {
            let mut visited = FxHashSet::default();
            if self.reaches_by_value(*id, self.types.underlying(*id), &mut visited) {
                return Err(CompileError::source(
                    format!("self-recursive type {}", td.name),
                    td.span.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Whether `ty` reaches the named type `target` without crossing a
    /// pointer. Walks struct fields and array elements, expanding other
    /// named types (each at most once).
    fn reaches_by_value(
        &self,
        target: NamedId,
        ty: &Type,
        visited: &mut FxHashSet<NamedId>,
    ) -> bool {
        match ty {
            Type::Pointer(_) => false,
            Type::Array { elem, .. } => self.reaches_by_value(target, elem, visited),
            Type::Struct { fields } => fields
                .iter()
                .any(|f| self.reaches_by_value(target, &f.ty, visited)),
            Type::Named(id) => {
                if *id == target {
                    return true;
                }
                visited.insert(*id)
                    && self.reaches_by_value(target, self.types.underlying(*id), visited)
            }
            _ => false,
        }
    }

    /// Imports register their last path segment as an opaque global.
    fn declare_imports(&mut self, files: &[File]) -> Result<()> {
        for file in files {
            for imp in &file.imports {
                let name = imp.local_name().to_string();
                self.package.declare_sym(
                    &mut self.symbols,
                    &name,
                    Symbol::Global {
                        ty: Type::Void,
                        def_pos: imp.span.clone(),
                        name: name.clone(),
                    },
                    &imp.span,
                )?;
            }
        }
        Ok(())
    }

    fn declare_funcs(&mut self, files: &[File]) -> Result<()> {
        for file in files {
            for func in &file.func_decls {
                let mut args = Vec::with_capacity(func.args.len());
                for arg in &func.args {
                    args.push(self.type_of(&arg.ty)?);
                }
                let ret = match &func.ret {
                    Some(te) => self.type_of(te)?,
                    None => Type::Void,
                };
                let fn_ty = FuncType {
                    ret: Box::new(ret),
                    args,
                    is_var_arg: func.is_var_arg,
                };
                self.package.declare_sym(
                    &mut self.symbols,
                    &func.name,
                    Symbol::GlobalFunc {
                        ty: fn_ty.clone(),
                        def_pos: func.span.clone(),
                        name: func.name.clone(),
                    },
                    &func.span,
                )?;
                self.fn_types.insert(func.name.clone(), fn_ty);
            }
        }
        Ok(())
    }

    fn declare_consts(&mut self, files: &[File]) -> Result<()> {
        for file in files {
            for cd in &file.const_decls {
                let value = self.eval_const_expr(&cd.body)?;
                self.package.declare_sym(
                    &mut self.symbols,
                    &cd.name,
                    Symbol::Const {
                        value,
                        def_pos: cd.span.clone(),
                    },
                    &cd.span,
                )?;
            }
        }
        Ok(())
    }

    fn declare_globals(&mut self, files: &[File]) -> Result<()> {
        for file in files {
            for vd in &file.var_decls {
                let ty = self.type_of(&vd.ty)?;
                let init = match &vd.init {
                    Some(assign) => {
                        let value = self.eval_const_expr(&assign.r)?;
                        self.check_global_init(&value, &ty, assign.r.span())?;
                        Some(value)
                    }
                    None => None,
                };
                let id = self.package.declare_sym(
                    &mut self.symbols,
                    &vd.name,
                    Symbol::Global {
                        ty: ty.clone(),
                        def_pos: vd.span.clone(),
                        name: vd.name.clone(),
                    },
                    &vd.span,
                )?;
                self.bindings.insert(vd.id, id);
                self.globals.push(GlobalVar {
                    name: vd.name.clone(),
                    ty,
                    init,
                });
            }
        }
        Ok(())
    }

    fn check_global_init(
        &self,
        value: &ConstValue,
        ty: &Type,
        span: &FileSpan,
    ) -> Result<()> {
        let ok = match (value, self.types.resolve(ty)) {
            (ConstValue::Bool(_), t) => self.types.is_bool(t),
            (ConstValue::Int(v), Type::Int { bits, signed }) => {
                *bits > 1 && int_fits(*v, *bits, *signed)
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(CompileError::source(
                format!(
                    "cannot initialize {} with this constant",
                    self.types.display(ty)
                ),
                span.clone(),
            ))
        }
    }

    /// Evaluates a package-level constant expression: literals, previously
    /// declared constants, and foldable operators.
    fn eval_const_expr(&self, expr: &Expr) -> Result<ConstValue> {
        match expr {
            Expr::Constant(lit) => Ok(ConstValue::Int(lit.value)),
            Expr::Ident(ident) => match self.package.peek_sym(&ident.name) {
                Some(id) => match self.symbols.get(id) {
                    Symbol::Const { value, .. } => Ok(*value),
                    _ => Err(CompileError::source(
                        format!("{} is not a constant", ident.name),
                        ident.span.clone(),
                    )),
                },
                None => Err(CompileError::source(
                    format!("{} is not declared", ident.name),
                    ident.span.clone(),
                )),
            },
            Expr::Unop(unop) => {
                let v = self.eval_const_expr(&unop.expr)?;
                fold_unop(unop.op, v)
                    .map_err(|msg| CompileError::source(msg, unop.span.clone()))
            }
            Expr::Binop(binop) => {
                let l = self.eval_const_expr(&binop.l)?;
                let r = self.eval_const_expr(&binop.r)?;
                fold_binop(binop.op, l, r)
                    .map_err(|msg| CompileError::source(msg, binop.span.clone()))
            }
            other => Err(CompileError::source(
                "initializer is not a constant expression",
                other.span().clone(),
            )),
        }
    }

    // Pass B.

    fn resolve_func(&mut self, func: &ast::FuncDecl) -> Result<()> {
        let fn_ty = self.fn_types[&func.name].clone();
        let depth = self.locals.depth();

        // Prologue scope holds the arguments, body scope the rest.
        self.locals.push();
        for (arg, ty) in func.args.iter().zip(fn_ty.args.iter()) {
            let slot = self.fresh_slot();
            let id = self.symbols.alloc(Symbol::Local {
                ty: ty.clone(),
                def_pos: arg.span.clone(),
                slot,
            });
            self.locals.declare(&self.symbols, &arg.name, id, &arg.span)?;
            self.bindings.insert(arg.id, id);
        }
        self.locals.push();
        for stmt in &func.body {
            self.resolve_stmt(stmt)?;
        }
        self.locals.pop();
        self.locals.pop();
        debug_assert_eq!(self.locals.depth(), depth);
        Ok(())
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::VarDecl(vd) => {
                let ty = self.type_of(&vd.ty)?;
                let slot = self.fresh_slot();
                let id = self.symbols.alloc(Symbol::Local {
                    ty,
                    def_pos: vd.span.clone(),
                    slot,
                });
                self.locals.declare(&self.symbols, &vd.name, id, &vd.span)?;
                self.bindings.insert(vd.id, id);
                if let Some(init) = &vd.init {
                    self.resolve_expr(&init.l)?;
                    self.resolve_expr(&init.r)?;
                }
                Ok(())
            }
            Stmt::If(ifs) => {
                self.resolve_expr(&ifs.cond)?;
                self.locals.push();
                for s in &ifs.body {
                    self.resolve_stmt(s)?;
                }
                self.locals.pop();
                self.locals.push();
                for s in &ifs.els {
                    self.resolve_stmt(s)?;
                }
                self.locals.pop();
                Ok(())
            }
            Stmt::For(f) => {
                if let Some(init) = &f.init {
                    self.resolve_stmt(init)?;
                }
                if let Some(cond) = &f.cond {
                    self.resolve_expr(cond)?;
                }
                if let Some(step) = &f.step {
                    self.resolve_stmt(step)?;
                }
                self.locals.push();
                for s in &f.body {
                    self.resolve_stmt(s)?;
                }
                self.locals.pop();
                Ok(())
            }
            Stmt::Return(r) => match &r.expr {
                Some(e) => self.resolve_expr(e),
                None => Ok(()),
            },
            Stmt::Assign(a) => {
                self.resolve_expr(&a.l)?;
                self.resolve_expr(&a.r)
            }
            Stmt::Expr(e) => self.resolve_expr(&e.expr),
            Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Empty { .. } => Ok(()),
        }
    }

    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Ident(ident) => {
                let id = match self.locals.lookup(&ident.name) {
                    Some(id) => id,
                    None => {
                        self.package
                            .lookup_sym(&mut self.symbols, &ident.name, &ident.span)
                    }
                };
                self.bindings.insert(ident.id, id);
                Ok(())
            }
            Expr::Constant(_) | Expr::Str(_) => Ok(()),
            Expr::Binop(b) => {
                self.resolve_expr(&b.l)?;
                self.resolve_expr(&b.r)
            }
            Expr::Unop(u) => self.resolve_expr(&u.expr),
            Expr::Call(c) => {
                self.resolve_expr(&c.callee)?;
                for arg in &c.args {
                    self.resolve_expr(arg)?;
                }
                Ok(())
            }
            Expr::Selector(s) => self.resolve_expr(&s.expr),
            Expr::Index(i) => {
                self.resolve_expr(&i.expr)?;
                self.resolve_expr(&i.index)
            }
        }
    }
}
