// パス: src/parser/types.rs
// 役割: 型注釈（`Int`、`(Int, Int) => Bool` など）の解析ロジックを提供する
// 意図: 型関連の処理を専用モジュールに集約し、Parser 実装を分割する
// 関連ファイル: src/parser/expr.rs, src/parser/program.rs, src/parser/mod.rs

use super::*;
use crate::ast::TypeExpr;

impl Parser {
    /// 関数型の矢印は右結合（`A => B => C` は `A => (B => C)`）。
    pub(super) fn parse_type(&mut self) -> PResult<TypeExpr> {
        self.nested(Self::parse_type_at_depth)
    }

    fn parse_type_at_depth(&mut self) -> PResult<TypeExpr> {
        let start = self.peek().span();
        if self.peek().kind == TokenKind::LPAREN {
            self.pop_any();
            self.enter_group(true);
            let mut items = Vec::new();
            if self.peek().kind != TokenKind::RPAREN {
                loop {
                    items.push(self.parse_type()?);
                    if self.accept(TokenKind::COMMA).is_none() {
                        break;
                    }
                }
            }
            let close = self.pop(TokenKind::RPAREN)?;
            self.leave_group();
            if self.accept(TokenKind::ARROW).is_some() {
                let ret = self.parse_type()?;
                return Ok(TypeExpr::Fun {
                    span: start.to(ret.span()),
                    params: items,
                    ret: Box::new(ret),
                });
            }
            if items.len() == 1 {
                if let Some(inner) = items.pop() {
                    return Ok(inner);
                }
            }
            return Err(Diagnostic::error(
                DiagnosticKind::Parse,
                "PAR101",
                "expected '=>' after a parameter type list",
                start.to(close.span()),
            ));
        }
        if self.peek().kind != TokenKind::IDENT {
            let mut d = self.unexpected("type");
            d.code = "PAR102";
            return Err(d);
        }
        let name = self.pop_any();
        let named = TypeExpr::Named {
            span: name.span(),
            name: name.value,
        };
        if self.accept(TokenKind::ARROW).is_some() {
            let ret = self.parse_type()?;
            return Ok(TypeExpr::Fun {
                span: start.to(ret.span()),
                params: vec![named],
                ret: Box::new(ret),
            });
        }
        Ok(named)
    }
}
