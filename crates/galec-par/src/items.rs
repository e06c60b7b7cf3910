//! Parsing of the file header and top-level declarations.

use galec_lex::TokenKind;

use crate::ast::*;
use crate::{PResult, Parser};

impl Parser<'_> {
    /// `file ::= "package" IDENT ";" import* topDecl*`
    pub(crate) fn parse_file(&mut self) -> PResult<File> {
        let start = self.cur.span.clone();
        self.expect(TokenKind::Package)?;
        let pkg = self.expect(TokenKind::Identifier)?.text;
        self.expect(TokenKind::Semicolon)?;

        let mut file = File {
            span: start,
            pkg,
            imports: Vec::new(),
            type_decls: Vec::new(),
            const_decls: Vec::new(),
            var_decls: Vec::new(),
            func_decls: Vec::new(),
        };

        while self.at(TokenKind::Import) {
            self.parse_import(&mut file.imports)?;
        }

        loop {
            self.check_error()?;
            match self.cur.kind {
                TokenKind::Type => {
                    file.type_decls.push(self.parse_type_decl()?);
                    self.expect(TokenKind::Semicolon)?;
                }
                TokenKind::Func => {
                    file.func_decls.push(self.parse_func_decl()?);
                    self.expect(TokenKind::Semicolon)?;
                }
                TokenKind::Var => {
                    file.var_decls.push(self.parse_var_decl()?);
                    self.expect(TokenKind::Semicolon)?;
                }
                TokenKind::Const => {
                    file.const_decls.push(self.parse_const_decl()?);
                    self.expect(TokenKind::Semicolon)?;
                }
                TokenKind::Eof => break,
                _ => return Err(self.unexpected("expected a top-level declaration")),
            }
        }

        file.span = file.span.to(&self.prev_span);
        Ok(file)
    }

    /// `import ::= "import" (STRING | "(" STRING* ")") ";"`
    fn parse_import(&mut self, imports: &mut Vec<ImportDecl>) -> PResult<()> {
        self.expect(TokenKind::Import)?;
        if self.eat(TokenKind::LParen).is_some() {
            loop {
                if self.at(TokenKind::String) {
                    let tok = self.next();
                    imports.push(ImportDecl {
                        span: tok.span,
                        path: tok.text,
                    });
                } else if self.at(TokenKind::Semicolon) {
                    self.next();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        } else {
            let tok = self.expect(TokenKind::String)?;
            imports.push(ImportDecl {
                span: tok.span,
                path: tok.text,
            });
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    /// `"type" IDENT type`
    fn parse_type_decl(&mut self) -> PResult<TypeDecl> {
        let start = self.expect(TokenKind::Type)?.span;
        let name = self.expect(TokenKind::Identifier)?.text;
        let ty = self.parse_type_expr()?;
        Ok(TypeDecl {
            span: start.to(ty.span()),
            name,
            ty,
        })
    }

    /// `"const" IDENT "=" expr`
    fn parse_const_decl(&mut self) -> PResult<ConstDecl> {
        let start = self.expect(TokenKind::Const)?.span;
        let name = self.expect(TokenKind::Identifier)?.text;
        self.expect(TokenKind::Eq)?;
        let body = self.parse_expr()?;
        Ok(ConstDecl {
            span: start.to(body.span()),
            name,
            body,
        })
    }

    /// `"var" IDENT type ("=" expr)?`
    ///
    /// An initializer is lowered to an assignment to a synthesized
    /// identifier node, so resolution and emission see an ordinary
    /// assignment whose left side binds to the declared name.
    pub(crate) fn parse_var_decl(&mut self) -> PResult<VarDecl> {
        let start = self.expect(TokenKind::Var)?.span;
        let name_tok = self.expect(TokenKind::Identifier)?;
        let ty = self.parse_type_expr()?;
        let mut span = start.to(ty.span());

        let init = if self.eat(TokenKind::Eq).is_some() {
            let value = self.parse_expr()?;
            span = span.to(value.span());
            let target = Expr::Ident(Ident {
                span: name_tok.span.clone(),
                id: self.ids.fresh(),
                name: name_tok.text.clone(),
            });
            Some(AssignStmt {
                span: name_tok.span.to(value.span()),
                op: AssignOp::Assign,
                l: target,
                r: value,
            })
        } else {
            None
        };

        Ok(VarDecl {
            span,
            id: self.ids.fresh(),
            name: name_tok.text,
            ty,
            init,
        })
    }

    /// `"func" IDENT "(" argList ")" type? "{" stmt* "}"`
    fn parse_func_decl(&mut self) -> PResult<FuncDecl> {
        let start = self.expect(TokenKind::Func)?.span;
        let name = self.expect(TokenKind::Identifier)?.text;
        self.expect(TokenKind::LParen)?;

        let mut args = Vec::new();
        let mut is_var_arg = false;
        while !self.at(TokenKind::RParen) {
            if self.eat(TokenKind::Ellipsis).is_some() {
                is_var_arg = true;
                break;
            }
            let arg_name = self.expect(TokenKind::Identifier)?;
            let arg_ty = self.parse_type_expr()?;
            args.push(ArgDef {
                span: arg_name.span.to(arg_ty.span()),
                id: self.ids.fresh(),
                name: arg_name.text,
                ty: arg_ty,
            });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let ret = if self.at(TokenKind::LBrace) {
            None
        } else {
            Some(self.parse_type_expr()?)
        };

        let body = self.parse_block()?;
        Ok(FuncDecl {
            span: start.to(&self.prev_span),
            name,
            args,
            ret,
            is_var_arg,
            body,
        })
    }
}
