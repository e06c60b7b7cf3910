//! galec-par - Recursive descent parser for gale source code.
//!
//! The parser consumes the lexer's token stream with one token of current
//! and one of lookahead. The first syntax error aborts the parse of the
//! file: a [`SyntaxError`] unwinds through `?` to [`parse`], which drains
//! the remaining tokens and reports the error. A lex `ERROR` token is
//! promoted to a syntax error at its span.

pub mod ast;
mod expr;
mod items;
mod stmt;
mod types;

pub use ast::{File, NodeId, NodeIds};

use galec_lex::{Token, TokenKind, TokenStream};
use galec_util::{CompileError, FileSpan};

/// Parses one file's token stream into its AST.
///
/// Always drains the stream, so an aborted parse never leaves the lexer
/// task blocked on a full channel.
pub fn parse(stream: TokenStream, ids: &mut NodeIds) -> Result<File, CompileError> {
    let mut parser = Parser::new(stream, ids);
    let result = parser.parse_file();
    parser.stream.drain();
    result.map_err(|e| CompileError::source(e.message, e.span))
}

/// The sentinel unwound to `parse_file` on the first syntax error.
pub(crate) struct SyntaxError {
    pub message: String,
    pub span: FileSpan,
}

pub(crate) type PResult<T> = Result<T, SyntaxError>;

pub(crate) struct Parser<'a> {
    stream: TokenStream,
    pub(crate) cur: Token,
    pub(crate) lookahead: Token,
    /// Span of the most recently consumed token, for end-of-node spans.
    pub(crate) prev_span: FileSpan,
    pub(crate) ids: &'a mut NodeIds,
}

impl<'a> Parser<'a> {
    fn new(stream: TokenStream, ids: &'a mut NodeIds) -> Self {
        let first = Self::pull(&stream, None);
        let second = Self::pull(&stream, Some(&first));
        let prev_span = first.span.clone();
        Self {
            stream,
            cur: first,
            lookahead: second,
            prev_span,
            ids,
        }
    }

    /// Receives the next token, synthesizing `EOF` after channel close.
    fn pull(stream: &TokenStream, last: Option<&Token>) -> Token {
        stream.recv().unwrap_or_else(|| {
            let span = last.map_or_else(FileSpan::dummy, |t| t.span.clone());
            Token::new(TokenKind::Eof, "", span)
        })
    }

    /// Consumes and returns the current token.
    pub(crate) fn next(&mut self) -> Token {
        let new_lookahead = Self::pull(&self.stream, Some(&self.lookahead));
        let cur = std::mem::replace(&mut self.lookahead, new_lookahead);
        let consumed = std::mem::replace(&mut self.cur, cur);
        self.prev_span = consumed.span.clone();
        consumed
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.cur.kind == kind
    }

    /// Consumes the current token if it has the given kind.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) {
            Some(self.next())
        } else {
            None
        }
    }

    /// Promotes a lex error token to a syntax error.
    pub(crate) fn check_error(&self) -> PResult<()> {
        if self.cur.kind == TokenKind::Error {
            return Err(SyntaxError {
                message: self.cur.text.clone(),
                span: self.cur.span.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        self.check_error()?;
        if self.at(kind) {
            Ok(self.next())
        } else {
            Err(self.unexpected(&format!("expected '{}'", kind)))
        }
    }

    pub(crate) fn error_at(&self, message: impl Into<String>, span: &FileSpan) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            span: span.clone(),
        }
    }

    pub(crate) fn unexpected(&self, context: &str) -> SyntaxError {
        let what = match self.cur.kind {
            TokenKind::Eof => "unexpected end of file".to_string(),
            TokenKind::Identifier | TokenKind::Constant => {
                format!("unexpected token '{}'", self.cur.text)
            }
            TokenKind::String => "unexpected string literal".to_string(),
            kind => format!("unexpected token '{}'", kind),
        };
        self.error_at(format!("{}, {}", what, context), &self.cur.span)
    }
}

#[cfg(test)]
mod tests {
    use super::ast::*;
    use super::*;
    use galec_lex::lex;

    pub(crate) fn parse_source(src: &str) -> Result<File, CompileError> {
        let mut ids = NodeIds::new();
        parse(lex("test.g", src), &mut ids)
    }

    fn parse_ok(src: &str) -> File {
        parse_source(src).expect("expected source to parse")
    }

    fn parse_err(src: &str) -> CompileError {
        parse_source(src).expect_err("expected a syntax error")
    }

    /// Parses `src` as the body of `func f() { ... }`.
    fn parse_stmts(src: &str) -> Vec<Stmt> {
        let file = parse_ok(&format!("package t; func f() {{ {} }};", src));
        file.func_decls.into_iter().next().unwrap().body
    }

    fn parse_expr(src: &str) -> Expr {
        let mut stmts = parse_stmts(&format!("{};", src));
        match stmts.remove(0) {
            Stmt::Expr(e) => e.expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_package_header() {
        let file = parse_ok("package mypkg;");
        assert_eq!(file.pkg, "mypkg");
    }

    #[test]
    fn test_malformed_package_header() {
        let err = parse_err("packag mypkg;");
        assert!(err.to_string().contains("expected 'package'"));
    }

    #[test]
    fn test_automatic_semicolons_terminate_decls() {
        let file = parse_ok("package t\nvar x int\nfunc f() {\n}\n");
        assert_eq!(file.var_decls.len(), 1);
        assert_eq!(file.func_decls.len(), 1);
    }

    #[test]
    fn test_imports() {
        let file = parse_ok("package t; import \"x/y/z\"; import (\"a\"\n\"b/c\"); ");
        let names: Vec<_> = file.imports.iter().map(|i| i.local_name()).collect();
        assert_eq!(names, vec!["z", "a", "c"]);
    }

    #[test]
    fn test_func_decl() {
        let file = parse_ok("package t; func add(a int, b int) int { return a + b; };");
        let f = &file.func_decls[0];
        assert_eq!(f.name, "add");
        assert_eq!(f.args.len(), 2);
        assert!(!f.is_var_arg);
        assert!(f.ret.is_some());
    }

    #[test]
    fn test_func_decl_no_ret_vararg() {
        let file = parse_ok("package t; func log(level int, ...) { };");
        let f = &file.func_decls[0];
        assert!(f.ret.is_none());
        assert!(f.is_var_arg);
        assert_eq!(f.args.len(), 1);
    }

    #[test]
    fn test_type_decl_struct() {
        let file = parse_ok("package t; type T struct { x *T; v int };");
        let td = &file.type_decls[0];
        assert_eq!(td.name, "T");
        match &td.ty {
            TypeExpr::Struct { fields, .. } => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].name, "x");
                assert!(matches!(fields[0].ty, TypeExpr::Pointer { .. }));
                assert_eq!(fields[1].name, "v");
            }
            other => panic!("expected struct type, got {:?}", other),
        }
    }

    #[test]
    fn test_array_type() {
        let file = parse_ok("package t; var a [4][2]int;");
        match &file.var_decls[0].ty {
            TypeExpr::Array { dim: 4, elem, .. } => {
                assert!(matches!(**elem, TypeExpr::Array { dim: 2, .. }));
            }
            other => panic!("expected array type, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_array_dimension() {
        let err = parse_err("package t; var a [2.5]int;");
        assert!(err.to_string().contains("array dimension"));
    }

    #[test]
    fn test_var_decl_lowering() {
        // var x T = E lowers to an init assignment over a synthesized
        // identifier node covering the name's source range.
        let file = parse_ok("package t; func f() { var x int = 3; };");
        let f = &file.func_decls[0];
        match &f.body[0] {
            Stmt::VarDecl(vd) => {
                let init = vd.init.as_ref().expect("expected an initializer");
                assert_eq!(init.op, AssignOp::Assign);
                match &init.l {
                    Expr::Ident(id) => {
                        assert_eq!(id.name, "x");
                        assert_ne!(id.id, vd.id);
                        assert!(vd.span.contains(&id.span));
                    }
                    other => panic!("expected identifier, got {:?}", other),
                }
                assert!(matches!(init.r, Expr::Constant(ConstantLit { value: 3, .. })));
            }
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_const_decl() {
        let file = parse_ok("package t; const limit = 4096;");
        assert_eq!(file.const_decls[0].name, "limit");
    }

    // Precedence.

    #[test]
    fn test_precedence_mul_over_add() {
        match parse_expr("1 + 2 * 3") {
            Expr::Binop(b) => {
                assert_eq!(b.op, BinOp::Add);
                assert!(matches!(b.l, Expr::Constant(ConstantLit { value: 1, .. })));
                match &b.r {
                    Expr::Binop(inner) => assert_eq!(inner.op, BinOp::Mul),
                    other => panic!("expected binop, got {:?}", other),
                }
            }
            other => panic!("expected binop, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_and_over_or() {
        match parse_expr("a && b || c") {
            Expr::Binop(b) => {
                assert_eq!(b.op, BinOp::Or);
                match &b.l {
                    Expr::Binop(inner) => assert_eq!(inner.op, BinOp::And),
                    other => panic!("expected binop, got {:?}", other),
                }
            }
            other => panic!("expected binop, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_minus_binds_tighter_than_mul() {
        match parse_expr("-a * b") {
            Expr::Binop(b) => {
                assert_eq!(b.op, BinOp::Mul);
                match &b.l {
                    Expr::Unop(u) => assert_eq!(u.op, UnOp::Neg),
                    other => panic!("expected unop, got {:?}", other),
                }
            }
            other => panic!("expected binop, got {:?}", other),
        }
    }

    #[test]
    fn test_left_associativity() {
        match parse_expr("a - b - c") {
            Expr::Binop(b) => {
                assert_eq!(b.op, BinOp::Sub);
                assert!(matches!(b.l, Expr::Binop(_)));
                assert!(matches!(b.r, Expr::Ident(_)));
            }
            other => panic!("expected binop, got {:?}", other),
        }
    }

    #[test]
    fn test_comparison_level() {
        // a + b == c * d parses as (a + b) == (c * d).
        match parse_expr("a + b == c * d") {
            Expr::Binop(b) => {
                assert_eq!(b.op, BinOp::Eq);
                assert!(matches!(b.l, Expr::Binop(_)));
                assert!(matches!(b.r, Expr::Binop(_)));
            }
            other => panic!("expected binop, got {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_grouping() {
        match parse_expr("(1 + 2) * 3") {
            Expr::Binop(b) => assert_eq!(b.op, BinOp::Mul),
            other => panic!("expected binop, got {:?}", other),
        }
    }

    #[test]
    fn test_postfix_chain() {
        // f(x)[1].field
        match parse_expr("f(x)[1].field") {
            Expr::Selector(sel) => {
                assert_eq!(sel.name, "field");
                match &sel.expr {
                    Expr::Index(idx) => assert!(matches!(idx.expr, Expr::Call(_))),
                    other => panic!("expected index, got {:?}", other),
                }
            }
            other => panic!("expected selector, got {:?}", other),
        }
    }

    #[test]
    fn test_address_and_deref() {
        match parse_expr("&v") {
            Expr::Unop(u) => assert_eq!(u.op, UnOp::Addr),
            other => panic!("expected unop, got {:?}", other),
        }
        let stmts = parse_stmts("*p = 0;");
        match &stmts[0] {
            Stmt::Assign(a) => match &a.l {
                Expr::Unop(u) => assert_eq!(u.op, UnOp::Deref),
                other => panic!("expected unop, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    // Statements.

    #[test]
    fn test_assign_ops() {
        for (src, op) in [
            ("x = 1;", AssignOp::Assign),
            ("x += 1;", AssignOp::Add),
            ("x -= 1;", AssignOp::Sub),
            ("x *= 2;", AssignOp::Mul),
        ] {
            match &parse_stmts(src)[0] {
                Stmt::Assign(a) => assert_eq!(a.op, op, "for {}", src),
                other => panic!("expected assignment for {}, got {:?}", src, other),
            }
        }
    }

    #[test]
    fn test_inc_dec_desugar() {
        match &parse_stmts("i++;")[0] {
            Stmt::Assign(a) => {
                assert_eq!(a.op, AssignOp::Add);
                assert!(matches!(a.r, Expr::Constant(ConstantLit { value: 1, .. })));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
        match &parse_stmts("i--;")[0] {
            Stmt::Assign(a) => assert_eq!(a.op, AssignOp::Sub),
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_if_else_chain() {
        let stmts = parse_stmts("if a { } else if b { } else { x = 1; };");
        match &stmts[0] {
            Stmt::If(ifs) => {
                assert_eq!(ifs.els.len(), 1);
                match &ifs.els[0] {
                    Stmt::If(inner) => assert_eq!(inner.els.len(), 1),
                    other => panic!("expected nested if, got {:?}", other),
                }
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_for_shapes() {
        let stmts = parse_stmts("for { };");
        match &stmts[0] {
            Stmt::For(f) => {
                assert!(f.init.is_none() && f.cond.is_none() && f.step.is_none());
            }
            other => panic!("expected for, got {:?}", other),
        }

        let stmts = parse_stmts("for i < 10 { };");
        match &stmts[0] {
            Stmt::For(f) => {
                assert!(f.init.is_none() && f.cond.is_some() && f.step.is_none());
            }
            other => panic!("expected for, got {:?}", other),
        }

        let stmts = parse_stmts("for i = 0; i < 10; i++ { };");
        match &stmts[0] {
            Stmt::For(f) => {
                assert!(f.init.is_some() && f.cond.is_some() && f.step.is_some());
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_return_forms() {
        match &parse_stmts("return;")[0] {
            Stmt::Return(r) => assert!(r.expr.is_none()),
            other => panic!("expected return, got {:?}", other),
        }
        match &parse_stmts("return 1 + 2;")[0] {
            Stmt::Return(r) => assert!(r.expr.is_some()),
            other => panic!("expected return, got {:?}", other),
        }
    }

    #[test]
    fn test_break_continue_empty() {
        let stmts = parse_stmts("break; continue; ;");
        assert!(matches!(stmts[0], Stmt::Break { .. }));
        assert!(matches!(stmts[1], Stmt::Continue { .. }));
        assert!(matches!(stmts[2], Stmt::Empty { .. }));
    }

    // Error reporting.

    #[test]
    fn test_lex_error_promoted() {
        let err = parse_err("package t; var x@ int;");
        assert!(err.to_string().contains("bad character '@'"));
    }

    #[test]
    fn test_error_carries_position() {
        let err = parse_err("package t;\nfunc f() { return }; }");
        let msg = err.to_string();
        assert!(msg.contains("test.g:"), "missing position in: {}", msg);
    }

    #[test]
    fn test_spans_nest() {
        let file = parse_ok("package t; func f() { x = a + b * c; };");
        let f = &file.func_decls[0];
        match &f.body[0] {
            Stmt::Assign(a) => {
                assert!(a.span.contains(a.l.span()));
                assert!(a.span.contains(a.r.span()));
                if let Expr::Binop(add) = &a.r {
                    assert!(add.span.contains(add.l.span()));
                    assert!(add.span.contains(add.r.span()));
                }
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }
}
