// パス: src/parser/mod.rs
// 役割: トークン列から文の列を生成する再帰下降パーサのエントリポイント
// 意図: 文単位でエラー回復し、REPL が「解析成功/回復付き/解析不能」を区別できるようにする
// 関連ファイル: src/parser/program.rs, src/parser/expr.rs, src/parser/types.rs
//! 構文解析モジュール
//!
//! - 文の区切りは `;` または改行。括弧の内側と二項演算子の直後では改行を無視する。
//! - 演算子の優先順位は `INFIX_LEVELS` の表で管理する（`||` が最も弱く `* / %` が最も強い）。
//! - 1 文の解析に失敗したら診断を記録し、次の区切りまで読み飛ばして続行する。
//! - 式・型の入れ子と演算子の連鎖は合わせて `MAX_NESTING` までに制限する（PAR060）。
//! - 結果は `ParseOutcome` の 3 状態で返す。

use crate::ast::{Span, Stmt};
use crate::errors::{Diagnostic, DiagnosticKind, Diagnostics, ReplResult};
use crate::lexer::{lex, Token, TokenKind};

mod expr;
mod program;
mod types;

pub(super) type PResult<T> = Result<T, Diagnostic>;

/// 式・型の入れ子（演算子の連鎖を含む）の上限。
pub const MAX_NESTING: usize = 128;

pub struct Parser {
    ts: Vec<Token>,
    i: usize,
    /// 改行を読み飛ばすかどうかの入れ子スタック（`(` で true、`{` で false を積む）。
    newline_modes: Vec<bool>,
    /// 現在の入れ子の深さ。
    nesting: usize,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, Copy)]
pub(super) enum Assoc {
    Left,
    Non,
}

pub(super) struct InfixSpec {
    pub tokens: &'static [TokenKind],
    pub assoc: Assoc,
}

impl InfixSpec {
    pub(super) fn contains(&self, kind: &TokenKind) -> bool {
        self.tokens.iter().any(|tk| tk == kind)
    }
}

pub(super) const INFIX_LEVELS: &[InfixSpec] = &[
    InfixSpec {
        tokens: &[TokenKind::OROR],
        assoc: Assoc::Left,
    },
    InfixSpec {
        tokens: &[TokenKind::ANDAND],
        assoc: Assoc::Left,
    },
    InfixSpec {
        tokens: &[TokenKind::EQ, TokenKind::NE],
        assoc: Assoc::Non,
    },
    InfixSpec {
        tokens: &[TokenKind::LT, TokenKind::LE, TokenKind::GT, TokenKind::GE],
        assoc: Assoc::Non,
    },
    InfixSpec {
        tokens: &[TokenKind::PLUS, TokenKind::MINUS, TokenKind::PLUSPLUS],
        assoc: Assoc::Left,
    },
    InfixSpec {
        tokens: &[TokenKind::STAR, TokenKind::SLASH, TokenKind::PERCENT],
        assoc: Assoc::Left,
    },
];

impl Parser {
    /// トークン列から新しいパーサインスタンスを構築する。
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            ts: tokens,
            i: 0,
            newline_modes: Vec::new(),
            nesting: 0,
            diagnostics: Vec::new(),
        }
    }

    fn ignoring_newlines(&self) -> bool {
        self.newline_modes.last().copied().unwrap_or(false)
    }

    /// 改行の扱いを考慮して、現在位置から `offset` 個先のトークン添字を求める。
    fn index_at(&self, offset: usize) -> usize {
        let last = self.ts.len().saturating_sub(1);
        let skip = self.ignoring_newlines();
        let mut idx = self.i;
        let mut remaining = offset;
        loop {
            if idx >= last {
                return last;
            }
            if skip && self.ts[idx].kind == TokenKind::NEWLINE {
                idx += 1;
                continue;
            }
            if remaining == 0 {
                return idx;
            }
            remaining -= 1;
            idx += 1;
        }
    }

    pub(super) fn peek(&self) -> &Token {
        &self.ts[self.index_at(0)]
    }

    pub(super) fn peek_kind(&self, offset: usize) -> TokenKind {
        self.ts[self.index_at(offset)].kind
    }

    pub(super) fn pop_any(&mut self) -> Token {
        let idx = self.index_at(0);
        let t = self.ts[idx].clone();
        self.i = if t.kind == TokenKind::EOF { idx } else { idx + 1 };
        t
    }

    pub(super) fn pop(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.peek().kind != kind {
            return Err(self.unexpected(describe_kind(kind)));
        }
        Ok(self.pop_any())
    }

    pub(super) fn accept(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek().kind == kind {
            Some(self.pop_any())
        } else {
            None
        }
    }

    /// 改行トークンを明示的に読み飛ばす（二項演算子や `=` の直後で使う）。
    pub(super) fn skip_newlines(&mut self) {
        while self.i + 1 < self.ts.len() && self.ts[self.i].kind == TokenKind::NEWLINE {
            self.i += 1;
        }
    }

    /// 改行を挟んで `kind` が続くなら改行を捨てて true を返す。
    pub(super) fn newline_then(&mut self, kind: TokenKind) -> bool {
        let mut idx = self.i;
        while idx < self.ts.len() && self.ts[idx].kind == TokenKind::NEWLINE {
            idx += 1;
        }
        if idx < self.ts.len() && self.ts[idx].kind == kind {
            self.i = idx;
            true
        } else {
            false
        }
    }

    pub(super) fn enter_group(&mut self, ignore_newlines: bool) {
        self.newline_modes.push(ignore_newlines);
    }

    pub(super) fn leave_group(&mut self) {
        self.newline_modes.pop();
    }

    /// 入れ子を 1 段深くする。上限を超えたら PAR060。
    pub(super) fn descend(&mut self) -> PResult<()> {
        if self.nesting >= MAX_NESTING {
            return Err(Diagnostic::error(
                DiagnosticKind::Parse,
                "PAR060",
                format!("expression is nested more than {MAX_NESTING} levels deep"),
                self.peek().span(),
            ));
        }
        self.nesting += 1;
        Ok(())
    }

    pub(super) fn ascend(&mut self, levels: usize) {
        self.nesting = self.nesting.saturating_sub(levels);
    }

    /// 1 段深い位置で `f` を実行する。成否にかかわらず深さは元に戻る。
    pub(super) fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.descend()?;
        let result = f(self);
        self.ascend(1);
        result
    }

    /// 現在のトークンに対する「期待と異なる」診断を作る。
    pub(super) fn unexpected(&self, expected: &str) -> Diagnostic {
        let t = self.peek();
        Diagnostic::error(
            DiagnosticKind::Parse,
            "PAR001",
            format!("expected {}, found {}", expected, describe_token(t)),
            t.span(),
        )
    }

    pub(super) fn record(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// 文の区切り（深さ 0 の `;` / 改行 / `}`）まで読み飛ばす。
    ///
    /// `stop_at_rbrace` が true のときは対応する `}` を消費せずに止まる。
    pub(super) fn synchronize(&mut self, stop_at_rbrace: bool) {
        let mut depth = 0usize;
        while self.i < self.ts.len() {
            let kind = self.ts[self.i].kind;
            match kind {
                TokenKind::EOF => return,
                TokenKind::LPAREN | TokenKind::LBRACE => depth += 1,
                TokenKind::RPAREN => depth = depth.saturating_sub(1),
                TokenKind::RBRACE => {
                    if depth == 0 {
                        if stop_at_rbrace {
                            return;
                        }
                    } else {
                        depth -= 1;
                    }
                }
                TokenKind::SEMI | TokenKind::NEWLINE if depth == 0 => {
                    self.i += 1;
                    return;
                }
                _ => {}
            }
            self.i += 1;
        }
    }
}

pub(super) fn describe_kind(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::EOF => "end of input",
        TokenKind::NEWLINE => "newline",
        TokenKind::ASSIGN => "':='",
        TokenKind::ARROW => "'=>'",
        TokenKind::LPAREN => "'('",
        TokenKind::RPAREN => "')'",
        TokenKind::LBRACE => "'{'",
        TokenKind::RBRACE => "'}'",
        TokenKind::COMMA => "','",
        TokenKind::SEMI => "';'",
        TokenKind::COLON => "':'",
        TokenKind::DOT => "'.'",
        TokenKind::EQUAL => "'='",
        TokenKind::IDENT => "identifier",
        TokenKind::ELSE => "'else'",
        _ => "token",
    }
}

fn describe_token(t: &Token) -> String {
    match t.kind {
        TokenKind::EOF => "end of input".into(),
        TokenKind::NEWLINE => "newline".into(),
        _ => format!("'{}'", t.value),
    }
}

pub(super) fn decode_string(quoted: &str, span: Span) -> PResult<String> {
    if quoted.len() < 2 || !quoted.starts_with('"') || !quoted.ends_with('"') {
        return Err(Diagnostic::error(
            DiagnosticKind::Parse,
            "PAR201",
            "malformed string literal",
            span,
        ));
    }
    let s = &quoted[1..quoted.len() - 1];
    let mut out = String::new();
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            let Some(e) = chars.next() else {
                return Err(Diagnostic::error(
                    DiagnosticKind::Parse,
                    "PAR202",
                    "trailing backslash in string literal",
                    span,
                ));
            };
            match e {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                '\\' => out.push('\\'),
                '"' => out.push('"'),
                _ => out.push(e),
            }
        } else {
            out.push(ch);
        }
    }
    Ok(out)
}

/// 構文解析の 3 状態。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseOutcome {
    /// 診断なしで解析できた（空入力も含む）。
    Clean(Vec<Stmt>),
    /// 一部の文が解析でき、残りは診断として記録された。
    Recovered {
        stmts: Vec<Stmt>,
        diagnostics: Vec<Diagnostic>,
    },
    /// 1 文も回収できなかった。
    Unparseable { diagnostics: Vec<Diagnostic> },
}

impl ParseOutcome {
    pub fn statements(&self) -> &[Stmt] {
        match self {
            ParseOutcome::Clean(stmts) | ParseOutcome::Recovered { stmts, .. } => stmts,
            ParseOutcome::Unparseable { .. } => &[],
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ParseOutcome::Clean(_) => &[],
            ParseOutcome::Recovered { diagnostics, .. }
            | ParseOutcome::Unparseable { diagnostics } => diagnostics,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, ParseOutcome::Clean(_))
    }

    /// 診断が 1 件でもあれば失敗として扱う。
    pub fn into_result(self) -> ReplResult<Vec<Stmt>> {
        match self {
            ParseOutcome::Clean(stmts) => Ok(stmts),
            ParseOutcome::Recovered { diagnostics, .. }
            | ParseOutcome::Unparseable { diagnostics } => Err(
                Diagnostics::from_collected(diagnostics).unwrap_or_else(|| {
                    Diagnostics::error(
                        DiagnosticKind::Parse,
                        "PAR000",
                        "could not parse input",
                        Span::default(),
                    )
                }),
            ),
        }
    }
}

/// ソーステキストを文の列へ解析する。
pub fn parse_source(src: &str) -> ParseOutcome {
    let (ts, lex_diags) = lex(src);
    let mut p = Parser::new(ts);
    p.diagnostics = lex_diags;
    let stmts = p.parse_statements();
    let diagnostics = p.diagnostics;
    if diagnostics.is_empty() {
        ParseOutcome::Clean(stmts)
    } else if stmts.is_empty() {
        ParseOutcome::Unparseable { diagnostics }
    } else {
        ParseOutcome::Recovered { stmts, diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 文字列リテラルの基本的なエスケープをテストする。
    fn decode_string_basic_escapes() {
        let s = decode_string(r#""a\n\t\"b\\""#, Span::default()).unwrap();
        assert_eq!(s, "a\n\t\"b\\");
    }

    #[test]
    fn decode_string_rejects_unquoted() {
        let e = decode_string("abc", Span::new(0, 3)).unwrap_err();
        assert_eq!(e.code, "PAR201");
    }

    #[test]
    /// 空入力は診断なしの空列になる。
    fn empty_input_is_clean() {
        assert_eq!(parse_source(""), ParseOutcome::Clean(Vec::new()));
        assert_eq!(parse_source("\n  // c\n;;"), ParseOutcome::Clean(Vec::new()));
    }

    #[test]
    /// 途中までの式は 1 文も回収できず解析不能になる。
    fn dangling_operator_is_unparseable() {
        match parse_source("1 +") {
            ParseOutcome::Unparseable { diagnostics } => {
                assert_eq!(diagnostics.len(), 1);
                assert_eq!(diagnostics[0].code, "PAR001");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    /// 壊れた文の後ろにある文は回収される。
    fn recovers_at_next_statement() {
        let out = parse_source("val = 1\nval y = 2");
        match &out {
            ParseOutcome::Recovered { stmts, diagnostics } => {
                assert_eq!(stmts.len(), 1);
                assert_eq!(stmts[0].defined_name(), Some("y"));
                assert_eq!(diagnostics.len(), 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(out.into_result().is_err());
    }
}
