//! Emitter tests.
//!
//! Programs are compiled to IR text and checked structurally: every block
//! must be non-empty with exactly one terminator, and the interesting
//! instructions must land where the lowering rules say they do.

use galec_lex::lex;
use galec_par::{parse, NodeIds};
use galec_sem::resolve_package;
use galec_util::{CompileError, X86_64Linux};

use crate::emit_module;

fn emit_source(src: &str) -> Result<String, CompileError> {
    let mut ids = NodeIds::new();
    let file = parse(lex("test.g", src), &mut ids)?;
    let files = vec![file];
    let resolved = resolve_package(&X86_64Linux, &files)?;
    let mut buf = Vec::new();
    emit_module(&X86_64Linux, &resolved, &files, &mut buf)?;
    Ok(String::from_utf8(buf).expect("emitter produced invalid UTF-8"))
}

fn emit_ok(src: &str) -> String {
    let ir = emit_source(src).expect("expected source to compile");
    assert_well_formed_blocks(&ir);
    ir
}

fn emit_err(src: &str) -> String {
    emit_source(src)
        .expect_err("expected source to fail compilation")
        .to_string()
}

fn is_terminator(instr: &str) -> bool {
    instr.starts_with("br ") || instr.starts_with("ret ") || instr == "ret void"
        || instr == "unreachable"
}

/// Every block in every function body has at least one instruction and
/// ends with its only terminator.
fn assert_well_formed_blocks(ir: &str) {
    let mut in_func = false;
    let mut block: Option<String> = None;
    let mut instrs = 0usize;
    let mut terms = 0usize;

    let close_block = |block: &Option<String>, instrs: usize, terms: usize| {
        if let Some(label) = block {
            assert!(instrs > 0, "empty block {}", label);
            assert_eq!(terms, 1, "block {} has {} terminators", label, terms);
        }
    };

    for line in ir.lines() {
        if line.starts_with("define ") {
            in_func = true;
            continue;
        }
        if !in_func {
            continue;
        }
        if line == "}" {
            close_block(&block, instrs, terms);
            block = None;
            in_func = false;
        } else if let Some(label) = line.strip_suffix(':') {
            close_block(&block, instrs, terms);
            block = Some(label.to_string());
            instrs = 0;
            terms = 0;
        } else if let Some(instr) = line.strip_prefix("  ") {
            assert!(block.is_some(), "instruction outside any block: {}", instr);
            assert_eq!(
                terms, 0,
                "instruction after terminator in block {:?}: {}",
                block, instr
            );
            instrs += 1;
            if is_terminator(instr) {
                terms += 1;
            }
        }
    }
}

// Module shape.

#[test]
fn test_module_prologue_has_target_triple() {
    let ir = emit_ok("package m; func main() int { return 0; };");
    assert!(ir.starts_with("target triple = \"x86_64-pc-linux-gnu\"\n"));
}

#[test]
fn test_entry_label_and_define() {
    let ir = emit_ok("package m; func main() int { return 0; };");
    assert!(ir.contains("define i64 @main() {"));
    assert!(ir.contains(".entry:"));
}

// Constant handling.

#[test]
fn test_return_constant_folds() {
    let ir = emit_ok("package m; func main() int { return 1 + 2; };");
    assert!(ir.contains("ret i64 3"), "missing folded return in:\n{}", ir);
}

#[test]
fn test_folding_follows_operator_table() {
    let ir = emit_ok("package m; func main() int { return (10 - 2) * 3 / 4 % 5 & 6 | 8 ^ 1; };");
    // ((((8 * 3) / 4) % 5) & 6) | 8 ^ 1 = ((24/4)%5 & 6) | 8 ^ 1 = (1 & 6) | 8 ^ 1 = 0 | 8 ^ 1 = 9
    assert!(ir.contains("ret i64 9"), "missing folded return in:\n{}", ir);
}

#[test]
fn test_constant_division_by_zero() {
    let msg = emit_err("package m; func main() int { return 1 / 0; };");
    assert!(msg.contains("division by zero"));
}

#[test]
fn test_unary_minus_folds() {
    let ir = emit_ok("package m; func main() int { return -5; };");
    assert!(ir.contains("ret i64 -5"));
}

#[test]
fn test_constant_out_of_range() {
    let msg = emit_err("package m; func main() { var x int8; x = 300; };");
    assert!(msg.contains("out of range"));
}

#[test]
fn test_int_constant_not_a_bool() {
    let msg = emit_err("package m; func main() { if 1 { }; };");
    assert!(msg.contains("cannot use integer constant as bool"));
}

// Locals and assignment.

#[test]
fn test_locals_spill_through_allocas() {
    let ir = emit_ok(
        "package m; func main() int { var a int = 2; var b int = 3; return a + b - 5; };",
    );
    assert!(ir.contains("= alloca i64"));
    // Zero store then initializer store.
    assert!(ir.contains("store i64 0, i64* %0"));
    assert!(ir.contains("store i64 2, i64* %0"));
    assert!(ir.contains("store i64 3, i64* %1"));
    assert!(ir.contains("add i64"));
    assert!(ir.contains("sub i64"));
}

#[test]
fn test_arguments_are_spilled() {
    let ir = emit_ok("package m; func add(a int, b int) int { return a + b; };");
    assert!(ir.contains("define i64 @add(i64 %0, i64 %1) {"));
    assert!(ir.contains("%2 = alloca i64"));
    assert!(ir.contains("store i64 %0, i64* %2"));
    assert!(ir.contains("%3 = alloca i64"));
    assert!(ir.contains("store i64 %1, i64* %3"));
}

#[test]
fn test_assignment_type_mismatch() {
    let msg = emit_err(
        "package m; func main() { var x int8; var y int64; x = y; };",
    );
    assert!(msg.contains("mismatched types in assignment"));
}

#[test]
fn test_assign_to_non_lvalue() {
    let msg = emit_err("package m; func main() { 1 = 2; };");
    assert!(msg.contains("cannot assign to this expression"));
}

#[test]
fn test_compound_assignment() {
    let ir = emit_ok("package m; func main() int { var x int = 4; x *= 3; x += 1; x -= 13; return x; };");
    assert!(ir.contains("mul i64"));
    assert!(ir.contains("add i64"));
    assert!(ir.contains("sub i64"));
}

// Control flow.

#[test]
fn test_if_else_blocks() {
    let ir = emit_ok(
        "package m; func main() int { if 1 == 1 { return 0; } else { return 1; }; return 2; };",
    );
    assert!(ir.contains("br i1 true, label %.L0, label %.L1"));
    assert!(ir.contains("ret i64 0"));
    assert!(ir.contains("ret i64 1"));
    assert!(ir.contains("ret i64 2"));
}

#[test]
fn test_if_condition_must_be_bool() {
    let msg = emit_err("package m; func main() { var x int; if x { }; };");
    assert!(msg.contains("condition must be a bool"));
}

#[test]
fn test_for_loop_shape() {
    let ir = emit_ok(
        "package m; func main() int { var i int = 0; for i < 10 { i = i + 1; }; return i - 10; };",
    );
    // Condition block compares and branches to body/exit.
    assert!(ir.contains("icmp slt i64"));
    assert!(ir.contains(", label %.L1, label %.L3"));
    // Step block closes the back edge.
    assert!(ir.contains("br label %.L0"));
}

#[test]
fn test_for_without_clauses() {
    let ir = emit_ok("package m; func main() { for { break; }; };");
    // begin .L0, body .L1, step .L2, exit .L3; break targets the exit.
    assert!(ir.contains("br label %.L3"));
}

#[test]
fn test_three_clause_for() {
    let ir = emit_ok(
        "package m; func main() int { var s int = 0; var i int = 0; for i = 0; i < 3; i++ { s += i; }; return s; };",
    );
    assert!(ir.contains("icmp slt i64"));
    assert!(ir.contains("add i64"));
}

#[test]
fn test_continue_targets_step_block() {
    let ir = emit_ok(
        "package m; func main() int { var i int = 0; var s int = 0; for i = 0; i < 9; i++ { continue; }; return s; };",
    );
    // begin .L0, body .L1, step .L2, exit .L3.
    assert!(ir.contains("br label %.L2"));
}

#[test]
fn test_break_outside_loop() {
    let msg = emit_err("package m; func main() { break; };");
    assert!(msg.contains("break outside of a loop"));
}

#[test]
fn test_continue_outside_loop() {
    let msg = emit_err("package m; func main() { continue; };");
    assert!(msg.contains("continue outside of a loop"));
}

#[test]
fn test_statements_after_return_stay_well_formed() {
    // The trailing statements land in an unreachable block that still
    // carries a terminator.
    emit_ok("package m; func main() int { return 1; var x int; x = 2; return x; };");
}

// Returns.

#[test]
fn test_void_return() {
    let ir = emit_ok("package m; func f() { return; };");
    assert!(ir.contains("ret void"));
}

#[test]
fn test_implicit_void_return() {
    let ir = emit_ok("package m; func f() { };");
    assert!(ir.contains("ret void"));
}

#[test]
fn test_missing_return_value() {
    let msg = emit_err("package m; func f() int { return; };");
    assert!(msg.contains("missing return value"));
}

#[test]
fn test_value_return_in_void_function() {
    let msg = emit_err("package m; func f() { return 1; };");
    assert!(msg.contains("no return type"));
}

#[test]
fn test_reachable_end_of_value_function() {
    let ir = emit_ok("package m; func f() int { if 1 == 2 { return 0; }; };");
    assert!(ir.contains("unreachable"));
}

// Pointers.

#[test]
fn test_pointer_roundtrip() {
    let ir = emit_ok(
        "package m; func main() int { var p *int; var v int = 7; p = &v; *p = 0; return v; };",
    );
    assert!(ir.contains("alloca i64*"));
    assert!(ir.contains("store i64* null"));
    // p = &v stores v's alloca into p.
    assert!(ir.contains("store i64* %1, i64** %0"));
    // *p = 0 stores through the loaded pointer.
    assert!(ir.contains("load i64*, i64** %0"));
}

#[test]
fn test_deref_requires_pointer() {
    let msg = emit_err("package m; func main() { var x int; *x = 1; };");
    assert!(msg.contains("cannot dereference"));
}

#[test]
fn test_address_requires_lvalue() {
    let msg = emit_err("package m; func main() { var p *int; p = &1; };");
    assert!(msg.contains("cannot take the address"));
}

// Arrays.

#[test]
fn test_array_indexing() {
    let ir = emit_ok(
        "package m; func main() int { var a [4]int; a[1] = 9; return a[1] - 9; };",
    );
    assert!(ir.contains("alloca [4 x i64]"));
    assert!(ir.contains("store [4 x i64] zeroinitializer"));
    assert!(ir.contains("getelementptr [4 x i64], [4 x i64]* %0, i64 0, i64 1"));
}

#[test]
fn test_pointer_indexing() {
    let ir = emit_ok(
        "package m; func main() int { var v int; var p *int; p = &v; p[0] = 1; return p[0]; };",
    );
    assert!(ir.contains("getelementptr i64, i64*"));
}

#[test]
fn test_index_requires_indexable() {
    let msg = emit_err("package m; func main() { var x int; x[0] = 1; };");
    assert!(msg.contains("cannot index"));
}

// Structs and selectors.

#[test]
fn test_recursive_struct_type_and_selector() {
    let ir = emit_ok(
        "package m; type T struct { x *T; v int }; func main() int { var t T; return t.v; };",
    );
    assert!(ir.contains("%T = type { %T*, i64 }"));
    assert!(ir.contains("alloca %T"));
    assert!(ir.contains("store %T zeroinitializer"));
    assert!(ir.contains("getelementptr %T, %T* %0, i64 0, i32 1"));
}

#[test]
fn test_selector_through_pointer() {
    let ir = emit_ok(
        "package m; type T struct { v int }; func main() int { var t T; var p *T; p = &t; p.v = 3; return t.v - 3; };",
    );
    // The pointer is loaded, then the field address computed.
    assert!(ir.contains("load %T*, %T**"));
    assert!(ir.contains("getelementptr %T, %T* %"));
}

#[test]
fn test_unknown_field() {
    let msg = emit_err(
        "package m; type T struct { v int }; func main() int { var t T; return t.w; };",
    );
    assert!(msg.contains("has no field w"));
}

#[test]
fn test_selector_on_non_struct() {
    let msg = emit_err("package m; func main() { var x int; x.v = 1; };");
    assert!(msg.contains("has no fields"));
}

// Calls.

#[test]
fn test_call_with_arguments() {
    let ir = emit_ok(
        "package m; func add(a int, b int) int { return a + b; }; func main() int { return add(2, 3) - 5; };",
    );
    assert!(ir.contains("call i64 @add(i64 2, i64 3)"));
}

#[test]
fn test_void_call() {
    let ir = emit_ok("package m; func f() { }; func main() { f(); };");
    assert!(ir.contains("call void @f()"));
}

#[test]
fn test_call_arity_mismatch() {
    let msg = emit_err(
        "package m; func f(a int) { }; func main() { f(); };",
    );
    assert!(msg.contains("wrong number of arguments"));
}

#[test]
fn test_call_argument_type_mismatch() {
    let msg = emit_err(
        "package m; func f(a int8) { }; func main() { var x int64; f(x); };",
    );
    assert!(msg.contains("mismatched types in call"));
}

#[test]
fn test_call_of_non_function() {
    let msg = emit_err("package m; func main() { var x int; x(); };");
    assert!(msg.contains("not a function"));
}

#[test]
fn test_function_used_as_value() {
    let msg = emit_err("package m; func f() { }; func main() int { return f; };");
    assert!(msg.contains("used as a value"));
}

#[test]
fn test_variadic_define_and_call() {
    let ir = emit_ok(
        "package m; func f(a int, ...) { }; func main() { f(1); f(1, 2, 3); };",
    );
    assert!(ir.contains("define void @f(i64 %0, ...) {"));
    assert!(ir.contains("call void @f(i64 1, i64 2, i64 3)"));
}

// Short-circuit booleans.

#[test]
fn test_short_circuit_and_branches() {
    let ir = emit_ok(
        "package m; func main() int { var x int = 1; var y int = 2; if x == 1 && y == 2 { return 0; }; return 1; };",
    );
    // The right comparison must sit in its own block behind the
    // conditional branch, with the result carried through an i1 slot.
    assert!(ir.contains("alloca i1"));
    let first_cmp = ir.find("icmp eq").unwrap();
    let branch = ir[first_cmp..].find("br i1").unwrap() + first_cmp;
    let second_cmp = ir.rfind("icmp eq").unwrap();
    assert!(
        second_cmp > branch,
        "right-hand comparison not behind the branch in:\n{}",
        ir
    );
}

#[test]
fn test_short_circuit_or_skips_rhs_block() {
    let ir = emit_ok(
        "package m; func main() int { var a int = 1; if a == 0 || a == 1 { return 0; }; return 1; };",
    );
    assert!(ir.contains("alloca i1"));
    // `||` branches to the after block when the left side is true.
    assert!(ir.contains("br i1 %"));
}

#[test]
fn test_constant_left_or_decides_without_rhs() {
    let ir = emit_ok(
        "package m; func f() bool { return true; }; func main() int { if true || f() { return 0; }; return 1; };",
    );
    assert!(!ir.contains("call"), "rhs must not be evaluated in:\n{}", ir);
}

#[test]
fn test_short_circuit_requires_bools() {
    let msg = emit_err("package m; func main() { var x int; if x && x { }; };");
    assert!(msg.contains("bool"));
}

// Unsigned operations.

#[test]
fn test_unsigned_operations() {
    let ir = emit_ok(
        "package m; func main() int { var a uint8; var b uint8; a = 200; b = 3; a = a / b; a = a >> 1; if a < b { return 1; }; return 0; };",
    );
    assert!(ir.contains("udiv i8"));
    assert!(ir.contains("lshr i8"));
    assert!(ir.contains("icmp ult i8"));
}

#[test]
fn test_signed_shift_and_div() {
    let ir = emit_ok(
        "package m; func main() int { var a int; var b int; a = -16; b = 2; a = a / b; a = a >> 1; return a + 4; };",
    );
    assert!(ir.contains("sdiv i64"));
    assert!(ir.contains("ashr i64"));
}

#[test]
fn test_andnot_lowering() {
    let ir = emit_ok(
        "package m; func main() int { var a int = 12; var b int = 10; return (a &^ b) - 4; };",
    );
    assert!(ir.contains("xor i64"));
    assert!(ir.contains(", -1"));
    assert!(ir.contains("and i64"));
}

#[test]
fn test_negate_typed_value() {
    let ir = emit_ok("package m; func main() int { var x int = 5; return -x + 5; };");
    assert!(ir.contains("sub i64 0, %"));
}

#[test]
fn test_binop_type_mismatch() {
    let msg = emit_err(
        "package m; func main() int { var a int8; var b int16; return a + b; };",
    );
    assert!(msg.contains("mismatched types for '+'"));
}

// Globals.

#[test]
fn test_globals_emitted_with_initializers() {
    let ir = emit_ok(
        "package m; var g int = 5; var h bool; func main() int { return g - 5; };",
    );
    assert!(ir.contains("@g = global i64 5"));
    assert!(ir.contains("@h = global i1 0"));
    assert!(ir.contains("load i64, i64* @g"));
}

#[test]
fn test_import_is_not_a_value() {
    let msg = emit_err(
        "package m; import \"a/b\"; func main() int { return b; };",
    );
    assert!(msg.contains("not a value"));
}

#[test]
fn test_string_literal_is_not_a_value() {
    let msg = emit_err("package m; func main() { var x int; x = \"s\"; };");
    assert!(msg.contains("string literal"));
}

// Value numbering.

#[test]
fn test_value_numbers_are_sequential() {
    let ir = emit_ok(
        "package m; func add(a int, b int) int { var c int = 0; c = a + b; return c; };",
    );
    let mut expected = 0u32;
    for line in ir.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix('%') {
            if let Some((num, _)) = rest.split_once(" = ") {
                if let Ok(n) = num.parse::<u32>() {
                    // Parameters %0 and %1 claim the first two numbers.
                    if expected == 0 {
                        expected = 2;
                    }
                    assert_eq!(n, expected, "non-sequential value in: {}", line);
                    expected += 1;
                }
            }
        }
    }
    assert!(expected > 2, "no numbered values found in:\n{}", ir);
}
