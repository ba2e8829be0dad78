// パス: src/parser/expr.rs
// 役割: 式の解析に関する `Parser` 実装をまとめる
// 意図: 中置演算・呼び出し・ブロックなど複雑なロジックを専用モジュールに切り分ける
// 関連ファイル: src/parser/program.rs, src/parser/types.rs, src/parser/mod.rs

use super::*;
use crate::ast::{BinOp, Expr, UnaryOp};

impl Parser {
    pub(super) fn parse_expr(&mut self) -> PResult<Expr> {
        self.nested(Self::parse_expr_at_depth)
    }

    fn parse_expr_at_depth(&mut self) -> PResult<Expr> {
        if self.peek().kind == TokenKind::IDENT && self.peek_kind(1) == TokenKind::ASSIGN {
            return self.parse_assign();
        }
        match self.peek().kind {
            TokenKind::IF => self.parse_if(),
            _ => self.parse_infix_level(0),
        }
    }

    fn parse_assign(&mut self) -> PResult<Expr> {
        let target = self.pop(TokenKind::IDENT)?;
        self.pop(TokenKind::ASSIGN)?;
        self.skip_newlines();
        let value = self.parse_expr()?;
        Ok(Expr::Assign {
            span: target.span().to(value.span()),
            target_span: target.span(),
            target: target.value,
            value: Box::new(value),
        })
    }

    fn parse_if(&mut self) -> PResult<Expr> {
        let if_tok = self.pop(TokenKind::IF)?;
        self.pop(TokenKind::LPAREN)?;
        self.enter_group(true);
        let cond = self.parse_expr()?;
        self.pop(TokenKind::RPAREN)?;
        self.leave_group();
        self.skip_newlines();
        let then_branch = self.parse_expr()?;
        self.newline_then(TokenKind::ELSE);
        self.pop(TokenKind::ELSE)?;
        self.skip_newlines();
        let else_branch = self.parse_expr()?;
        Ok(Expr::If {
            span: if_tok.span().to(else_branch.span()),
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_infix_level(&mut self, level: usize) -> PResult<Expr> {
        if level >= INFIX_LEVELS.len() {
            return self.parse_unary();
        }
        let spec = &INFIX_LEVELS[level];
        let mut left = self.parse_infix_level(level + 1)?;
        match spec.assoc {
            Assoc::Left => {
                // 左結合の連鎖も木を深くするので、演算子 1 個ごとに 1 段数える
                let mut chained = 0;
                let result = loop {
                    if !spec.contains(&self.peek().kind) {
                        break Ok(left);
                    }
                    if let Err(e) = self.descend() {
                        break Err(e);
                    }
                    chained += 1;
                    let op_token = self.pop_any();
                    self.skip_newlines();
                    match self.parse_infix_level(level + 1) {
                        Ok(right) => left = Self::mk_binop(left, &op_token, right),
                        Err(e) => break Err(e),
                    }
                };
                self.ascend(chained);
                result
            }
            Assoc::Non => {
                if spec.contains(&self.peek().kind) {
                    let op_token = self.pop_any();
                    self.skip_newlines();
                    let right = self.parse_infix_level(level + 1)?;
                    Ok(Self::mk_binop(left, &op_token, right))
                } else {
                    Ok(left)
                }
            }
        }
    }

    fn mk_binop(left: Expr, op_token: &Token, right: Expr) -> Expr {
        let op = match op_token.kind {
            TokenKind::OROR => BinOp::Or,
            TokenKind::ANDAND => BinOp::And,
            TokenKind::EQ => BinOp::Eq,
            TokenKind::NE => BinOp::Ne,
            TokenKind::LT => BinOp::Lt,
            TokenKind::LE => BinOp::Le,
            TokenKind::GT => BinOp::Gt,
            TokenKind::GE => BinOp::Ge,
            TokenKind::PLUS => BinOp::Add,
            TokenKind::MINUS => BinOp::Sub,
            TokenKind::PLUSPLUS => BinOp::Concat,
            TokenKind::STAR => BinOp::Mul,
            TokenKind::SLASH => BinOp::Div,
            _ => BinOp::Rem,
        };
        Expr::Binary {
            op,
            span: left.span().to(right.span()),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::MINUS => UnaryOp::Neg,
            TokenKind::BANG => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let op_tok = self.pop_any();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary {
            op,
            span: op_tok.span().to(operand.span()),
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_atom()?;
        while self.peek().kind == TokenKind::LPAREN {
            self.pop_any();
            self.enter_group(true);
            let mut args = Vec::new();
            if self.peek().kind != TokenKind::RPAREN {
                loop {
                    args.push(self.parse_expr()?);
                    if self.accept(TokenKind::COMMA).is_none() {
                        break;
                    }
                }
            }
            let close = self.pop(TokenKind::RPAREN)?;
            self.leave_group();
            expr = Expr::Call {
                span: expr.span().to(close.span()),
                func: Box::new(expr),
                args,
            };
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::INT => {
                self.pop_any();
                let value = t.value.parse::<i64>().map_err(|_| {
                    Diagnostic::error(
                        DiagnosticKind::Parse,
                        "PAR020",
                        format!("integer literal out of range: {}", t.value),
                        t.span(),
                    )
                })?;
                Ok(Expr::Int {
                    value,
                    span: t.span(),
                })
            }
            TokenKind::STRING => {
                self.pop_any();
                let value = decode_string(&t.value, t.span())?;
                Ok(Expr::Str {
                    value,
                    span: t.span(),
                })
            }
            TokenKind::TRUE | TokenKind::FALSE => {
                self.pop_any();
                Ok(Expr::Bool {
                    value: t.kind == TokenKind::TRUE,
                    span: t.span(),
                })
            }
            TokenKind::IDENT => {
                self.pop_any();
                if self.peek().kind == TokenKind::DOT {
                    self.pop_any();
                    let member = self.pop(TokenKind::IDENT)?;
                    return Ok(Expr::Select {
                        span: t.span().to(member.span()),
                        module: t.value,
                        member: member.value,
                    });
                }
                Ok(Expr::Ident {
                    span: t.span(),
                    name: t.value,
                })
            }
            TokenKind::LPAREN => {
                self.pop_any();
                self.enter_group(true);
                if let Some(close) = self.accept(TokenKind::RPAREN) {
                    self.leave_group();
                    return Ok(Expr::Unit {
                        span: t.span().to(close.span()),
                    });
                }
                let inner = self.parse_expr()?;
                self.pop(TokenKind::RPAREN)?;
                self.leave_group();
                Ok(inner)
            }
            TokenKind::LBRACE => self.parse_block(),
            _ => Err(self.unexpected("expression")),
        }
    }

    /// `{ s1; s2; e }`。最後の文が式ならブロックの値になる。
    fn parse_block(&mut self) -> PResult<Expr> {
        let open = self.pop(TokenKind::LBRACE)?;
        self.enter_group(false);
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.peek().kind == TokenKind::RBRACE {
                break;
            }
            if self.peek().kind == TokenKind::EOF {
                return Err(self.unexpected("'}'"));
            }
            stmts.push(self.parse_statement()?);
            self.expect_terminator(true)?;
        }
        let close = self.pop(TokenKind::RBRACE)?;
        self.leave_group();
        let result = match stmts.last() {
            Some(Stmt::Expr(_)) => match stmts.pop() {
                Some(Stmt::Expr(e)) => Some(Box::new(e)),
                _ => None,
            },
            _ => None,
        };
        Ok(Expr::Block {
            stmts,
            result,
            span: open.span().to(close.span()),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expr, Stmt};
    use crate::parser::{parse_source, MAX_NESTING};

    fn expr(src: &str) -> Expr {
        match parse_source(src).statements() {
            [Stmt::Expr(e)] => e.clone(),
            other => panic!("expected one expression for {src:?}, got {other:?}"),
        }
    }

    #[test]
    /// 優先順位表どおりに木が組まれることを表示で確認する。
    fn precedence_follows_infix_table() {
        assert_eq!(expr("1 + 2 * 3").to_string(), "1 + 2 * 3");
        assert_eq!(expr("(1 + 2) * 3").to_string(), "(1 + 2) * 3");
        assert_eq!(expr("a || b && c").to_string(), "a || b && c");
        assert_eq!(expr("1 - 2 - 3").to_string(), "1 - 2 - 3");
        assert_eq!(expr("-x * 2").to_string(), "-x * 2");
    }

    #[test]
    /// 二項演算子の直後と括弧内では改行を無視する。
    fn newlines_inside_parens_and_after_operators() {
        assert_eq!(expr("1 +\n  2").to_string(), "1 + 2");
        assert_eq!(expr("max(\n 1,\n 2\n)").to_string(), "max(1, 2)");
        assert_eq!(
            expr("if (a)\n 1\nelse 2").to_string(),
            "if (a) 1 else 2"
        );
    }

    #[test]
    fn blocks_yield_their_last_expression() {
        let e = expr("{ val a = 1\n a + 1 }");
        match e {
            Expr::Block { stmts, result, .. } => {
                assert_eq!(stmts.len(), 1);
                assert_eq!(result.map(|r| r.to_string()), Some("a + 1".into()));
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn qualified_calls_and_unit() {
        assert_eq!(expr("Math.max(1, 2)").to_string(), "Math.max(1, 2)");
        assert!(matches!(expr("()"), Expr::Unit { .. }));
    }

    #[test]
    /// 式の区間は先頭トークンから末尾トークンまでを覆う。
    fn spans_cover_whole_expression() {
        let src = "  foo(1, 2) + 3";
        let e = expr(src);
        let s = e.span();
        assert_eq!(&src[s.start..s.end], "foo(1, 2) + 3");
    }

    #[test]
    /// 深すぎる入れ子はスタックを使い切る前に診断になる。
    fn deep_nesting_is_reported() {
        let src = format!("{}1{}", "(".repeat(5000), ")".repeat(5000));
        let out = parse_source(&src);
        assert!(!out.is_clean());
        assert!(out.diagnostics().iter().any(|d| d.code == "PAR060"));

        let unary = format!("{}1", "-".repeat(5000));
        assert!(parse_source(&unary)
            .diagnostics()
            .iter()
            .any(|d| d.code == "PAR060"));
    }

    #[test]
    /// 長い演算子の連鎖も同じ上限で数える。上限内なら普通に解析できる。
    fn long_operator_chains_count_toward_nesting() {
        let ok = format!("1{}", " + 1".repeat(MAX_NESTING / 2));
        assert!(parse_source(&ok).is_clean());
        let long = format!("1{}", " + 1".repeat(MAX_NESTING * 4));
        assert_eq!(parse_source(&long).diagnostics()[0].code, "PAR060");
        let nested = format!("{}1{}", "(".repeat(MAX_NESTING / 2), ")".repeat(MAX_NESTING / 2));
        assert!(parse_source(&nested).is_clean());
    }

    #[test]
    fn out_of_range_integer_is_reported() {
        let out = parse_source("99999999999999999999");
        assert_eq!(out.diagnostics()[0].code, "PAR020");
    }
}
