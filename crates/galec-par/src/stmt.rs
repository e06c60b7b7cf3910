//! Parsing of statements and blocks.

use galec_lex::TokenKind;

use crate::ast::*;
use crate::{PResult, Parser};

impl Parser<'_> {
    /// `"{" (stmt ";")* "}"`; the terminator may be omitted before `}`.
    pub(crate) fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) {
            self.check_error()?;
            stmts.push(self.parse_stmt()?);
            if self.eat(TokenKind::Semicolon).is_none() && !self.at(TokenKind::RBrace) {
                return Err(self.unexpected("expected ';' after statement"));
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(stmts)
    }

    pub(crate) fn parse_stmt(&mut self) -> PResult<Stmt> {
        self.check_error()?;
        match self.cur.kind {
            TokenKind::Return => {
                let start = self.next().span;
                let expr = if self.at(TokenKind::Semicolon) || self.at(TokenKind::RBrace) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                let span = match &expr {
                    Some(e) => start.to(e.span()),
                    None => start,
                };
                Ok(Stmt::Return(ReturnStmt { span, expr }))
            }
            TokenKind::Var => Ok(Stmt::VarDecl(self.parse_var_decl()?)),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break => Ok(Stmt::Break {
                span: self.next().span,
            }),
            TokenKind::Continue => Ok(Stmt::Continue {
                span: self.next().span,
            }),
            TokenKind::Semicolon => Ok(Stmt::Empty {
                span: self.cur.span.clone(),
            }),
            _ => self.parse_simple_stmt(),
        }
    }

    /// `if cond { … } ("else" (if … | { … }))?`
    fn parse_if(&mut self) -> PResult<Stmt> {
        let start = self.expect(TokenKind::If)?.span;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        let els = if self.eat(TokenKind::Else).is_some() {
            if self.at(TokenKind::If) {
                vec![self.parse_if()?]
            } else {
                self.parse_block()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If(IfStmt {
            span: start.to(&self.prev_span),
            cond,
            body,
            els,
        }))
    }

    /// The three loop shapes: `for { }`, `for cond { }`,
    /// `for init; cond; step { }` (clauses in the last form may be empty).
    fn parse_for(&mut self) -> PResult<Stmt> {
        let start = self.expect(TokenKind::For)?.span;

        let mut init = None;
        let mut cond = None;
        let mut step = None;

        if !self.at(TokenKind::LBrace) {
            if self.at(TokenKind::Semicolon) {
                self.next();
                self.parse_for_tail(&mut cond, &mut step)?;
            } else {
                let first = self.parse_simple_stmt()?;
                if self.at(TokenKind::LBrace) {
                    // Single-clause form: the statement must be a bare
                    // expression, the loop condition.
                    match first {
                        Stmt::Expr(e) => cond = Some(e.expr),
                        other => {
                            return Err(
                                self.error_at("expected loop condition", other.span())
                            );
                        }
                    }
                } else {
                    self.expect(TokenKind::Semicolon)?;
                    init = Some(Box::new(first));
                    self.parse_for_tail(&mut cond, &mut step)?;
                }
            }
        }

        let body = self.parse_block()?;
        Ok(Stmt::For(ForStmt {
            span: start.to(&self.prev_span),
            init,
            cond,
            step,
            body,
        }))
    }

    /// The `cond; step` part of a three-clause loop, after its first `;`.
    fn parse_for_tail(
        &mut self,
        cond: &mut Option<Expr>,
        step: &mut Option<Box<Stmt>>,
    ) -> PResult<()> {
        if !self.at(TokenKind::Semicolon) {
            *cond = Some(self.parse_expr()?);
        }
        self.expect(TokenKind::Semicolon)?;
        if !self.at(TokenKind::LBrace) {
            *step = Some(Box::new(self.parse_simple_stmt()?));
        }
        Ok(())
    }

    /// `simpleStmt ::= expr (assignOp expr | "++" | "--")?`
    fn parse_simple_stmt(&mut self) -> PResult<Stmt> {
        let expr = self.parse_expr()?;
        let op = match self.cur.kind {
            TokenKind::Eq => Some(AssignOp::Assign),
            TokenKind::PlusEq => Some(AssignOp::Add),
            TokenKind::MinusEq => Some(AssignOp::Sub),
            TokenKind::StarEq => Some(AssignOp::Mul),
            TokenKind::Inc | TokenKind::Dec => {
                // x++ / x-- desugar to x += 1 / x -= 1.
                let tok = self.next();
                let op = if tok.kind == TokenKind::Inc {
                    AssignOp::Add
                } else {
                    AssignOp::Sub
                };
                let one = Expr::Constant(ConstantLit {
                    span: tok.span.clone(),
                    value: 1,
                });
                return Ok(Stmt::Assign(AssignStmt {
                    span: expr.span().to(&tok.span),
                    op,
                    l: expr,
                    r: one,
                }));
            }
            _ => None,
        };
        match op {
            Some(op) => {
                self.next();
                let value = self.parse_expr()?;
                Ok(Stmt::Assign(AssignStmt {
                    span: expr.span().to(value.span()),
                    op,
                    l: expr,
                    r: value,
                }))
            }
            None => Ok(Stmt::Expr(ExprStmt {
                span: expr.span().clone(),
                expr,
            })),
        }
    }
}
