// パス: src/parser/program.rs
// 役割: 文（宣言・インポート・式文）の列を解析し、文単位でエラー回復する
// 意図: トップレベルの解析ロジックを `Parser` 本体から分離し可読性を高める
// 関連ファイル: src/parser/expr.rs, src/parser/types.rs, src/parser/mod.rs

use super::*;
use crate::ast::{DefDef, Import, ImportSelector, Modifiers, Param, ValDef};

impl Parser {
    /// トップレベルの文を EOF まで読み、失敗した文は診断に回して読み飛ばす。
    pub(super) fn parse_statements(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.peek().kind == TokenKind::EOF {
                break;
            }
            let depth = self.newline_modes.len();
            match self.parse_statement() {
                Ok(stmt) => {
                    stmts.push(stmt);
                    if let Err(d) = self.expect_terminator(false) {
                        self.record(d);
                        self.synchronize(false);
                    }
                }
                Err(d) => {
                    self.record(d);
                    self.newline_modes.truncate(depth);
                    self.synchronize(false);
                }
            }
        }
        stmts
    }

    pub(super) fn skip_separators(&mut self) {
        while self.i + 1 < self.ts.len()
            && matches!(self.ts[self.i].kind, TokenKind::SEMI | TokenKind::NEWLINE)
        {
            self.i += 1;
        }
    }

    /// 文の直後が区切り（`;` / 改行 / EOF、ブロック内なら `}`）であることを確認する。
    pub(super) fn expect_terminator(&self, in_block: bool) -> PResult<()> {
        match self.peek().kind {
            TokenKind::SEMI | TokenKind::NEWLINE | TokenKind::EOF => Ok(()),
            TokenKind::RBRACE if in_block => Ok(()),
            _ => {
                let mut d = self.unexpected("';' or newline");
                d.code = "PAR010";
                Err(d)
            }
        }
    }

    pub(super) fn parse_statement(&mut self) -> PResult<Stmt> {
        match self.peek().kind {
            TokenKind::VAL | TokenKind::VAR => self.parse_val().map(Stmt::Val),
            TokenKind::DEF => self.parse_def().map(Stmt::Def),
            TokenKind::IMPORT => self.parse_import().map(Stmt::Import),
            TokenKind::OBJECT => {
                let t = self.peek();
                Err(Diagnostic::error(
                    DiagnosticKind::Parse,
                    "PAR050",
                    "object definitions are not supported here; declarations are wrapped automatically",
                    t.span(),
                ))
            }
            _ => self.parse_expr().map(Stmt::Expr),
        }
    }

    fn parse_val(&mut self) -> PResult<ValDef> {
        let kw = self.pop_any();
        let name = self.pop(TokenKind::IDENT)?;
        let ty = if self.accept(TokenKind::COLON).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.pop(TokenKind::EQUAL)?;
        self.skip_newlines();
        let rhs = self.parse_expr()?;
        Ok(ValDef {
            name: name.value,
            mutable: kw.kind == TokenKind::VAR,
            ty,
            span: kw.span().to(rhs.span()),
            rhs,
            mods: Modifiers::default(),
        })
    }

    fn parse_def(&mut self) -> PResult<DefDef> {
        let kw = self.pop(TokenKind::DEF)?;
        let name = self.pop(TokenKind::IDENT)?;
        let mut params = Vec::new();
        if self.accept(TokenKind::LPAREN).is_some() {
            self.enter_group(true);
            if self.peek().kind != TokenKind::RPAREN {
                loop {
                    params.push(self.parse_param()?);
                    if self.accept(TokenKind::COMMA).is_none() {
                        break;
                    }
                }
            }
            self.pop(TokenKind::RPAREN)?;
            self.leave_group();
        }
        let ret = if self.accept(TokenKind::COLON).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.pop(TokenKind::EQUAL)?;
        self.skip_newlines();
        let body = self.parse_expr()?;
        Ok(DefDef {
            name: name.value,
            params,
            ret,
            span: kw.span().to(body.span()),
            body,
        })
    }

    fn parse_param(&mut self) -> PResult<Param> {
        let name = self.pop(TokenKind::IDENT)?;
        if self.peek().kind != TokenKind::COLON {
            return Err(Diagnostic::error(
                DiagnosticKind::Parse,
                "PAR040",
                format!("parameter '{}' needs a type annotation", name.value),
                name.span(),
            ));
        }
        self.pop_any();
        let ty = self.parse_type()?;
        let span = name.span().to(ty.span());
        Ok(Param {
            name: name.value,
            span,
            ty,
        })
    }

    fn parse_import(&mut self) -> PResult<Import> {
        let kw = self.pop(TokenKind::IMPORT)?;
        let module = self.pop(TokenKind::IDENT)?;
        self.pop(TokenKind::DOT)?;
        let t = self.peek().clone();
        let selector = match t.kind {
            TokenKind::UNDERSCORE => ImportSelector::Wildcard,
            TokenKind::IDENT => ImportSelector::Member(t.value.clone()),
            _ => return Err(self.unexpected("'_' or a member name")),
        };
        self.pop_any();
        Ok(Import {
            module: module.value,
            selector,
            span: kw.span().to(t.span()),
        })
    }
}
