//! Parsing of type expressions.

use galec_lex::TokenKind;

use crate::ast::{FieldDef, TypeExpr};
use crate::{PResult, Parser};

impl Parser<'_> {
    /// `type ::= "[" CONSTANT "]" type | "*" type
    ///         | "struct" "{" (IDENT type ";")* "}" | IDENT`
    pub(crate) fn parse_type_expr(&mut self) -> PResult<TypeExpr> {
        self.check_error()?;
        match self.cur.kind {
            TokenKind::LBracket => {
                let start = self.next().span;
                let dim_tok = self.expect(TokenKind::Constant)?;
                let dim: i64 = dim_tok.text.parse().map_err(|_| {
                    self.error_at(
                        "array dimension must be a non-negative integer constant",
                        &dim_tok.span,
                    )
                })?;
                self.expect(TokenKind::RBracket)?;
                let elem = self.parse_type_expr()?;
                Ok(TypeExpr::Array {
                    span: start.to(elem.span()),
                    dim,
                    elem: Box::new(elem),
                })
            }
            TokenKind::Star => {
                let start = self.next().span;
                let inner = self.parse_type_expr()?;
                Ok(TypeExpr::Pointer {
                    span: start.to(inner.span()),
                    inner: Box::new(inner),
                })
            }
            TokenKind::Struct => self.parse_struct_type(),
            TokenKind::Identifier => {
                let tok = self.next();
                Ok(TypeExpr::Name {
                    span: tok.span,
                    name: tok.text,
                })
            }
            _ => Err(self.unexpected("expected a type")),
        }
    }

    fn parse_struct_type(&mut self) -> PResult<TypeExpr> {
        let start = self.expect(TokenKind::Struct)?.span;
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.at(TokenKind::RBrace) {
            if self.eat(TokenKind::Semicolon).is_some() {
                continue;
            }
            let name = self.expect(TokenKind::Identifier)?;
            let ty = self.parse_type_expr()?;
            fields.push(FieldDef {
                span: name.span.to(ty.span()),
                name: name.text,
                ty,
            });
            // Field terminator; omissible before the closing brace.
            if self.eat(TokenKind::Semicolon).is_none() && !self.at(TokenKind::RBrace) {
                return Err(self.unexpected("expected ';' after struct field"));
            }
        }
        let end = self.expect(TokenKind::RBrace)?.span;
        Ok(TypeExpr::Struct {
            span: start.to(&end),
            fields,
        })
    }
}
