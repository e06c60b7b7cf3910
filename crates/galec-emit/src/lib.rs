//! galec-emit - Textual LLVM IR emission.
//!
//! A syntax-directed translator from the resolved AST to an LLVM IR text
//! module. Lowering is deliberately naive: every argument and local gets
//! an alloca, every use goes through a load, and the backend's mem2reg
//! pass is trusted to build SSA. The emitter keeps basic blocks well
//! formed: no block is empty and every block ends in exactly one
//! terminator.

mod expr;
mod types;
pub mod value;

#[cfg(test)]
mod tests;

use std::io::Write;

use galec_par::ast::{AssignOp, AssignStmt, BinOp, File, FuncDecl, Stmt};
use galec_sem::{ConstValue, ResolvedPackage, SlotId, Symbol, Type};
use galec_util::{CompileError, Result, TargetMachine};
use rustc_hash::FxHashMap;

use types::{llvm_type, zero_value};
use value::Value;

/// Writes the package as one LLVM IR text module.
pub fn emit_module<W: Write>(
    target: &dyn TargetMachine,
    pkg: &ResolvedPackage,
    files: &[File],
    out: &mut W,
) -> Result<()> {
    writeln!(out, "target triple = \"{}\"", target.llvm_target_triple())?;
    writeln!(out)?;

    // Named struct types first; pointer-recursive structs need the name.
    let mut wrote_types = false;
    for (_, def) in pkg.types.iter() {
        if let Some(underlying @ Type::Struct { .. }) = def.underlying.as_ref() {
            writeln!(out, "%{} = type {}", def.name, llvm_type(&pkg.types, underlying))?;
            wrote_types = true;
        }
    }
    if wrote_types {
        writeln!(out)?;
    }

    for global in &pkg.globals {
        let init = match global.init {
            Some(ConstValue::Int(v)) => v.to_string(),
            Some(ConstValue::Bool(b)) => b.to_string(),
            None => zero_value(&pkg.types, &global.ty).to_string(),
        };
        writeln!(
            out,
            "@{} = global {} {}",
            global.name,
            llvm_type(&pkg.types, &global.ty),
            init
        )?;
    }
    if !pkg.globals.is_empty() {
        writeln!(out)?;
    }

    let mut emitter = Emitter {
        out,
        target,
        pkg,
        val_counter: 0,
        label_counter: 0,
        cur_ret: Type::Void,
        block_terminated: true,
        slots: FxHashMap::default(),
        loops: Vec::new(),
    };
    for file in files {
        for func in &file.func_decls {
            emitter.emit_func(func)?;
        }
    }
    Ok(())
}

/// Branch targets of the innermost enclosing loop.
struct LoopLabels {
    /// `continue` target: the step block.
    step: String,
    /// `break` target.
    exit: String,
}

pub(crate) struct Emitter<'a, W: Write> {
    out: &'a mut W,
    target: &'a dyn TargetMachine,
    pkg: &'a ResolvedPackage,
    /// LLVM value counter; includes function parameters so unnamed
    /// temporaries stay strictly sequential.
    val_counter: u32,
    label_counter: u32,
    /// Semantic return type of the function being emitted.
    cur_ret: Type,
    /// Whether the current block already ends in a terminator.
    block_terminated: bool,
    /// Local slot to alloca name, per function.
    slots: FxHashMap<SlotId, String>,
    loops: Vec<LoopLabels>,
}

impl<W: Write> Emitter<'_, W> {
    pub(crate) fn llvm(&self, ty: &Type) -> String {
        llvm_type(&self.pkg.types, ty)
    }

    pub(crate) fn new_value(&mut self) -> String {
        let name = format!("%{}", self.val_counter);
        self.val_counter += 1;
        name
    }

    pub(crate) fn new_label(&mut self) -> String {
        let name = format!(".L{}", self.label_counter);
        self.label_counter += 1;
        name
    }

    /// Opens a fresh (unreachable) block if the current one is already
    /// terminated; statements after a `return` land here.
    fn ensure_open_block(&mut self) -> Result<()> {
        if self.block_terminated {
            let label = self.new_label();
            writeln!(self.out, "{}:", label)?;
            self.block_terminated = false;
        }
        Ok(())
    }

    /// Emits one indented instruction.
    pub(crate) fn emiti(&mut self, instr: std::fmt::Arguments<'_>) -> Result<()> {
        self.ensure_open_block()?;
        writeln!(self.out, "  {}", instr)?;
        Ok(())
    }

    /// Emits one indented terminator and closes the block.
    fn emit_term(&mut self, instr: std::fmt::Arguments<'_>) -> Result<()> {
        self.ensure_open_block()?;
        writeln!(self.out, "  {}", instr)?;
        self.block_terminated = true;
        Ok(())
    }

    /// Emits a block header, first closing an unterminated predecessor
    /// with an explicit fall-through branch.
    pub(crate) fn emit_label(&mut self, label: &str) -> Result<()> {
        if !self.block_terminated {
            writeln!(self.out, "  br label %{}", label)?;
        }
        writeln!(self.out, "{}:", label)?;
        self.block_terminated = false;
        Ok(())
    }

    pub(crate) fn emit_br(&mut self, label: &str) -> Result<()> {
        self.emit_term(format_args!("br label %{}", label))
    }

    pub(crate) fn emit_cond_br(&mut self, cond: &str, then: &str, els: &str) -> Result<()> {
        self.emit_term(format_args!(
            "br i1 {}, label %{}, label %{}",
            cond, then, els
        ))
    }

    // Functions.

    fn emit_func(&mut self, func: &FuncDecl) -> Result<()> {
        let fn_ty = self.pkg.fn_types[&func.name].clone();
        self.cur_ret = (*fn_ty.ret).clone();
        self.val_counter = 0;
        self.label_counter = 0;
        self.slots.clear();
        self.loops.clear();

        let mut params = Vec::with_capacity(fn_ty.args.len());
        for ty in &fn_ty.args {
            let name = self.new_value();
            params.push((name, self.llvm(ty)));
        }
        let mut sig: Vec<String> = params
            .iter()
            .map(|(name, ty)| format!("{} {}", ty, name))
            .collect();
        if fn_ty.is_var_arg {
            sig.push("...".to_string());
        }
        writeln!(
            self.out,
            "define {} @{}({}) {{",
            self.llvm(&fn_ty.ret),
            func.name,
            sig.join(", ")
        )?;
        self.block_terminated = true;
        self.emit_label(".entry")?;

        // Spill every argument so all reads go through memory.
        for (arg, (ssa_name, ty_text)) in func.args.iter().zip(params.iter()) {
            let slot = match self.pkg.symbol_of(arg.id) {
                Symbol::Local { slot, .. } => *slot,
                other => panic!("internal error: argument bound to {:?}", other),
            };
            let addr = self.new_value();
            self.emiti(format_args!("{} = alloca {}", addr, ty_text))?;
            self.emiti(format_args!(
                "store {} {}, {}* {}",
                ty_text, ssa_name, ty_text, addr
            ))?;
            self.slots.insert(slot, addr);
        }

        for stmt in &func.body {
            self.emit_stmt(stmt)?;
        }

        // A reachable function end still needs a terminator.
        if !self.block_terminated {
            match self.cur_ret {
                Type::Void => self.emit_term(format_args!("ret void"))?,
                _ => self.emit_term(format_args!("unreachable"))?,
            }
        }
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;
        Ok(())
    }

    // Statements.

    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::VarDecl(vd) => {
                let (ty, slot) = match self.pkg.symbol_of(vd.id) {
                    Symbol::Local { ty, slot, .. } => (ty.clone(), *slot),
                    other => panic!("internal error: var decl bound to {:?}", other),
                };
                let ty_text = self.llvm(&ty);
                let zero = zero_value(&self.pkg.types, &ty);
                let addr = self.new_value();
                self.emiti(format_args!("{} = alloca {}", addr, ty_text))?;
                self.emiti(format_args!(
                    "store {} {}, {}* {}",
                    ty_text, zero, ty_text, addr
                ))?;
                self.slots.insert(slot, addr);
                match &vd.init {
                    Some(init) => self.emit_assign(init),
                    None => Ok(()),
                }
            }
            Stmt::Assign(assign) => self.emit_assign(assign),
            Stmt::Return(ret) => match &ret.expr {
                None => {
                    if !matches!(self.pkg.types.resolve(&self.cur_ret), Type::Void) {
                        return Err(CompileError::source(
                            "missing return value",
                            ret.span.clone(),
                        ));
                    }
                    self.emit_term(format_args!("ret void"))
                }
                Some(expr) => {
                    if matches!(self.pkg.types.resolve(&self.cur_ret), Type::Void) {
                        return Err(CompileError::source(
                            "returning a value in a function with no return type",
                            ret.span.clone(),
                        ));
                    }
                    let value = self.lower_expr(expr)?;
                    let ret_ty = self.cur_ret.clone();
                    let value = self.remove_constant(value, &ret_ty, expr.span())?;
                    let value = self.remove_lvalness(value)?;
                    let value = self.load_array_value(value)?;
                    if !self.pkg.types.equals(&value.ty, &ret_ty) {
                        return Err(CompileError::source(
                            format!(
                                "mismatched types in return ({} vs {})",
                                self.pkg.types.display(&value.ty),
                                self.pkg.types.display(&ret_ty)
                            ),
                            ret.span.clone(),
                        ));
                    }
                    let ty_text = self.llvm(&ret_ty);
                    self.emit_term(format_args!("ret {} {}", ty_text, value.name))
                }
            },
            Stmt::If(ifs) => {
                let cond = self.lower_bool_cond(&ifs.cond)?;
                let iftrue = self.new_label();
                let iffalse = self.new_label();
                let after = self.new_label();
                self.emit_cond_br(&cond.name, &iftrue, &iffalse)?;

                self.emit_label(&iftrue)?;
                for s in &ifs.body {
                    self.emit_stmt(s)?;
                }
                self.emit_br(&after)?;

                self.emit_label(&iffalse)?;
                for s in &ifs.els {
                    self.emit_stmt(s)?;
                }
                self.emit_br(&after)?;

                self.emit_label(&after)
            }
            Stmt::For(f) => {
                if let Some(init) = &f.init {
                    self.emit_stmt(init)?;
                }
                let begin = self.new_label();
                let body = self.new_label();
                let step = self.new_label();
                let exit = self.new_label();

                self.emit_br(&begin)?;
                self.emit_label(&begin)?;
                match &f.cond {
                    Some(cond) => {
                        let c = self.lower_bool_cond(cond)?;
                        self.emit_cond_br(&c.name, &body, &exit)?;
                    }
                    None => self.emit_br(&body)?,
                }

                self.emit_label(&body)?;
                self.loops.push(LoopLabels {
                    step: step.clone(),
                    exit: exit.clone(),
                });
                for s in &f.body {
                    self.emit_stmt(s)?;
                }
                self.loops.pop();

                // The step block exists whether or not there is a step
                // statement, so `continue` always has a target.
                self.emit_br(&step)?;
                self.emit_label(&step)?;
                if let Some(s) = &f.step {
                    self.emit_stmt(s)?;
                }
                self.emit_br(&begin)?;

                self.emit_label(&exit)
            }
            Stmt::Break { span } => {
                let target = match self.loops.last() {
                    Some(labels) => labels.exit.clone(),
                    None => {
                        return Err(CompileError::source(
                            "break outside of a loop",
                            span.clone(),
                        ));
                    }
                };
                self.emit_br(&target)
            }
            Stmt::Continue { span } => {
                let target = match self.loops.last() {
                    Some(labels) => labels.step.clone(),
                    None => {
                        return Err(CompileError::source(
                            "continue outside of a loop",
                            span.clone(),
                        ));
                    }
                };
                self.emit_br(&target)
            }
            Stmt::Expr(es) => {
                self.lower_expr(&es.expr)?;
                Ok(())
            }
            Stmt::Empty { .. } => Ok(()),
        }
    }

    fn emit_assign(&mut self, assign: &AssignStmt) -> Result<()> {
        let target = self.lower_expr(&assign.l)?;
        let target = match target {
            Value::Expr(e) if e.lval => e,
            _ => {
                return Err(CompileError::source(
                    "cannot assign to this expression",
                    assign.l.span().clone(),
                ));
            }
        };
        let mut value = self.lower_expr(&assign.r)?;

        if assign.op != AssignOp::Assign {
            // Compound assignment: the binop of load(L) and R.
            let op = match assign.op {
                AssignOp::Add => BinOp::Add,
                AssignOp::Sub => BinOp::Sub,
                AssignOp::Mul => BinOp::Mul,
                AssignOp::Assign => unreachable!(),
            };
            let current = self.remove_lvalness(target.clone())?;
            value = self.lower_binop_values(
                op,
                Value::Expr(current),
                value,
                assign.l.span(),
                assign.r.span(),
                &assign.span,
            )?;
        }

        let value = self.remove_constant(value, &target.ty, assign.r.span())?;
        let value = self.remove_lvalness(value)?;
        let value = self.load_array_value(value)?;
        if !self.pkg.types.equals(&target.ty, &value.ty) {
            return Err(CompileError::source(
                format!(
                    "mismatched types in assignment ({} vs {})",
                    self.pkg.types.display(&target.ty),
                    self.pkg.types.display(&value.ty)
                ),
                assign.span.clone(),
            ));
        }
        let ty_text = self.llvm(&target.ty);
        self.emiti(format_args!(
            "store {} {}, {}* {}",
            ty_text, value.name, ty_text, target.name
        ))
    }

    /// Looks up the alloca of a local slot.
    pub(crate) fn slot_addr(&self, slot: SlotId) -> &str {
        self.slots
            .get(&slot)
            .expect("internal error: local used before its declaration was emitted")
    }
}
