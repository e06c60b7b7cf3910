//! Expression parsing.
//!
//! A single precedence-climbing loop handles every binary operator; unary
//! prefixes and the postfix chain (call, selector, index) live below it.
//!
//! Precedence, lowest to highest, all left-associative:
//!
//! | Level | Operators |
//! |-------|-----------|
//! | 1 | `\|\|` |
//! | 2 | `&&` |
//! | 3 | `==`, `!=`, `<`, `<=`, `>`, `>=` |
//! | 4 | `+`, `-`, `\|`, `^` |
//! | 5 | `*`, `/`, `%`, `<<`, `>>`, `&`, `&^` |

use galec_lex::TokenKind;

use crate::ast::*;
use crate::{PResult, Parser};

/// Precedence level and AST operator for an infix token.
fn infix(kind: TokenKind) -> Option<(u8, BinOp)> {
    use TokenKind::*;
    Some(match kind {
        OrOr => (1, BinOp::Or),
        AndAnd => (2, BinOp::And),
        EqEq => (3, BinOp::Eq),
        NotEq => (3, BinOp::NotEq),
        Lt => (3, BinOp::Lt),
        LtEq => (3, BinOp::LtEq),
        Gt => (3, BinOp::Gt),
        GtEq => (3, BinOp::GtEq),
        Plus => (4, BinOp::Add),
        Minus => (4, BinOp::Sub),
        Pipe => (4, BinOp::BitOr),
        Caret => (4, BinOp::BitXor),
        Star => (5, BinOp::Mul),
        Slash => (5, BinOp::Div),
        Percent => (5, BinOp::Rem),
        Shl => (5, BinOp::Shl),
        Shr => (5, BinOp::Shr),
        Ampersand => (5, BinOp::BitAnd),
        AndNot => (5, BinOp::AndNot),
        _ => return None,
    })
}

impl Parser<'_> {
    pub(crate) fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some((prec, op)) = infix(self.cur.kind) {
            if prec < min_prec {
                break;
            }
            self.next();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = Expr::Binop(Box::new(Binop {
                span: lhs.span().to(rhs.span()),
                op,
                l: lhs,
                r: rhs,
            }));
        }
        Ok(lhs)
    }

    /// Unary prefixes `&`, `*`, `-` bind tighter than any binary operator.
    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.cur.kind {
            TokenKind::Ampersand => Some(UnOp::Addr),
            TokenKind::Star => Some(UnOp::Deref),
            TokenKind::Minus => Some(UnOp::Neg),
            _ => None,
        };
        match op {
            Some(op) => {
                let start = self.next().span;
                let operand = self.parse_unary()?;
                Ok(Expr::Unop(Box::new(Unop {
                    span: start.to(operand.span()),
                    op,
                    expr: operand,
                })))
            }
            None => self.parse_postfix(),
        }
    }

    /// A primary followed by any chain of `(args)`, `.name`, `[index]`.
    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.cur.kind {
                TokenKind::LParen => {
                    self.next();
                    let mut args = Vec::new();
                    while !self.at(TokenKind::RParen) {
                        args.push(self.parse_expr()?);
                        if self.eat(TokenKind::Comma).is_none() {
                            break;
                        }
                    }
                    let end = self.expect(TokenKind::RParen)?.span;
                    expr = Expr::Call(Box::new(Call {
                        span: expr.span().to(&end),
                        callee: expr,
                        args,
                    }));
                }
                TokenKind::Dot => {
                    self.next();
                    let name = self.expect(TokenKind::Identifier)?;
                    expr = Expr::Selector(Box::new(Selector {
                        span: expr.span().to(&name.span),
                        expr,
                        name: name.text,
                    }));
                }
                TokenKind::LBracket => {
                    self.next();
                    let index = self.parse_expr()?;
                    let end = self.expect(TokenKind::RBracket)?.span;
                    expr = Expr::Index(Box::new(IndexInto {
                        span: expr.span().to(&end),
                        expr,
                        index,
                    }));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        self.check_error()?;
        match self.cur.kind {
            TokenKind::Identifier => {
                let tok = self.next();
                Ok(Expr::Ident(Ident {
                    span: tok.span,
                    id: self.ids.fresh(),
                    name: tok.text,
                }))
            }
            TokenKind::Constant => {
                let tok = self.next();
                let value: i64 = tok.text.parse().map_err(|_| {
                    self.error_at("invalid integer constant", &tok.span)
                })?;
                Ok(Expr::Constant(ConstantLit {
                    span: tok.span,
                    value,
                }))
            }
            TokenKind::String => {
                let tok = self.next();
                Ok(Expr::Str(StringLit {
                    span: tok.span,
                    value: tok.text,
                }))
            }
            TokenKind::LParen => {
                self.next();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected("expected an expression")),
        }
    }
}
