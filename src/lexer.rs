// パス: src/lexer.rs
// 役割: UTF-8 対応の字句解析器とトークン定義を提供する
// 意図: 構文解析に必要な位置付きトークンを生成し、不正文字があっても走査を続ける
// 関連ファイル: src/parser/mod.rs, src/errors.rs, tests/lexer_parser.rs
//! 字句解析モジュール
//!
//! - ソースをトークン列へ変換する。正規表現ライブラリは使わない。
//! - すべてのトークンにバイト位置（開始・終了）を記録し、診断の区間と連携させる。
//! - 改行は文の区切りとして `NEWLINE` トークンにする（連続する改行は 1 個にまとめる）。
//! - 不正な文字は診断として記録して読み飛ばし、後段の構文回復に委ねる。

use crate::ast::Span;
use crate::errors::{Diagnostic, DiagnosticKind};

#[derive(Debug, Clone, PartialEq, Eq)]
/// 生成されたトークンとその位置情報を保持するレコード。
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub pos: usize,
    pub end: usize,
}

impl Token {
    pub fn span(&self) -> Span {
        Span::new(self.pos, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// 字句解析で識別されるトークンの分類。
pub enum TokenKind {
    EOF,
    NEWLINE,
    // 演算子・記号トークン
    ASSIGN, // `:=`
    ARROW,  // `=>`
    LE,
    GE,
    EQ,
    NE,
    LT,
    GT,
    ANDAND,
    OROR,
    PLUSPLUS,
    PLUS,
    MINUS,
    STAR,
    SLASH,
    PERCENT,
    BANG,
    LPAREN,
    RPAREN,
    LBRACE,
    RBRACE,
    COMMA,
    SEMI,
    COLON,
    DOT,
    EQUAL,
    UNDERSCORE,
    // リテラル分類
    STRING,
    INT,
    // 識別子分類
    IDENT,
    // キーワード分類
    VAL,
    VAR,
    DEF,
    IF,
    ELSE,
    IMPORT,
    OBJECT,
    TRUE,
    FALSE,
}

/// 空白文字（改行を除く）かどうかを判定するユーティリティ。
fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r')
}
/// 10 進数字かどうかを判定するユーティリティ。
fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}
/// 識別子の先頭に使用可能な文字かどうかを判定する。
fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}
/// 識別子の後続として許容される文字か判定する。
fn is_ident_rest(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

struct Lexer<'a> {
    src: &'a str,
    cursor: usize,
    len: usize,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            cursor: 0,
            len: src.len(),
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while self.cursor < self.len {
            if self.consume_trivia() {
                continue;
            }
            if self.cursor >= self.len {
                break;
            }
            self.lex_token();
        }
        self.push_simple(TokenKind::EOF, "", self.len);
        (self.tokens, self.diagnostics)
    }

    fn consume_trivia(&mut self) -> bool {
        let mut advanced = false;
        loop {
            if self.consume_blanks() {
                advanced = true;
                continue;
            }
            if self.consume_newline() {
                advanced = true;
                continue;
            }
            if self.consume_line_comment() {
                advanced = true;
                continue;
            }
            break;
        }
        advanced
    }

    fn consume_blanks(&mut self) -> bool {
        let mut advanced = false;
        while let Some(ch) = self.peek_char() {
            if is_blank(ch) {
                self.advance_char();
                advanced = true;
            } else {
                break;
            }
        }
        advanced
    }

    fn consume_newline(&mut self) -> bool {
        if self.peek_char() != Some('\n') {
            return false;
        }
        let start = self.cursor;
        self.advance_char();
        // 先頭や連続した改行はトークンにしない
        let redundant = matches!(
            self.tokens.last().map(|t| t.kind),
            None | Some(TokenKind::NEWLINE)
        );
        if !redundant {
            self.push_simple(TokenKind::NEWLINE, "\n", start);
        }
        true
    }

    fn consume_line_comment(&mut self) -> bool {
        if !self.starts_with("//") {
            return false;
        }
        // 改行そのものは consume_newline に任せる
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.advance_char();
        }
        true
    }

    fn lex_token(&mut self) {
        let start = self.cursor;
        let Some(ch) = self.peek_char() else {
            return;
        };
        if self.try_multi_char_symbol(ch) {
            return;
        }
        if self.try_single_char_symbol(ch) {
            return;
        }
        if ch == '"' {
            self.lex_string_literal();
            return;
        }
        if is_digit(ch) {
            self.lex_number();
            return;
        }
        if is_letter(ch) {
            self.lex_identifier_or_keyword();
            return;
        }
        self.advance_char();
        self.error(
            "LEX090",
            format!("unexpected character {:?}", ch),
            Span::new(start, self.cursor),
        );
    }

    fn try_multi_char_symbol(&mut self, first: char) -> bool {
        let Some(second) = self.peek_second_char() else {
            return false;
        };
        let token = match (first, second) {
            (':', '=') => Some((TokenKind::ASSIGN, ":=")),
            ('=', '>') => Some((TokenKind::ARROW, "=>")),
            ('<', '=') => Some((TokenKind::LE, "<=")),
            ('>', '=') => Some((TokenKind::GE, ">=")),
            ('=', '=') => Some((TokenKind::EQ, "==")),
            ('!', '=') => Some((TokenKind::NE, "!=")),
            ('&', '&') => Some((TokenKind::ANDAND, "&&")),
            ('|', '|') => Some((TokenKind::OROR, "||")),
            ('+', '+') => Some((TokenKind::PLUSPLUS, "++")),
            _ => None,
        };
        if let Some((kind, value)) = token {
            let start = self.cursor;
            self.advance_bytes(first.len_utf8());
            self.advance_bytes(second.len_utf8());
            self.push_simple(kind, value, start);
            return true;
        }
        false
    }

    fn try_single_char_symbol(&mut self, ch: char) -> bool {
        let token = match ch {
            '<' => Some((TokenKind::LT, "<")),
            '>' => Some((TokenKind::GT, ">")),
            '+' => Some((TokenKind::PLUS, "+")),
            '-' => Some((TokenKind::MINUS, "-")),
            '*' => Some((TokenKind::STAR, "*")),
            '/' => Some((TokenKind::SLASH, "/")),
            '%' => Some((TokenKind::PERCENT, "%")),
            '!' => Some((TokenKind::BANG, "!")),
            '(' => Some((TokenKind::LPAREN, "(")),
            ')' => Some((TokenKind::RPAREN, ")")),
            '{' => Some((TokenKind::LBRACE, "{")),
            '}' => Some((TokenKind::RBRACE, "}")),
            ',' => Some((TokenKind::COMMA, ",")),
            ';' => Some((TokenKind::SEMI, ";")),
            ':' => Some((TokenKind::COLON, ":")),
            '.' => Some((TokenKind::DOT, ".")),
            '=' => Some((TokenKind::EQUAL, "=")),
            _ => None,
        };
        if let Some((kind, value)) = token {
            let start = self.cursor;
            self.advance_bytes(ch.len_utf8());
            self.push_simple(kind, value, start);
            return true;
        }
        false
    }

    fn lex_string_literal(&mut self) {
        let start = self.cursor;
        self.advance_bytes(1); // 開始ダブルクォート
        let mut escaped = false;
        let mut ok = false;
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.advance_char();
            if escaped {
                escaped = false;
                continue;
            }
            if ch == '\\' {
                escaped = true;
                continue;
            }
            if ch == '"' {
                ok = true;
                break;
            }
        }
        if !ok {
            self.error(
                "LEX003",
                "unclosed string literal",
                Span::new(start, self.cursor),
            );
            return;
        }
        let end = self.cursor;
        self.push_slice(TokenKind::STRING, start, end);
    }

    fn lex_number(&mut self) {
        let start = self.cursor;
        while let Some(ch) = self.peek_char() {
            if is_digit(ch) {
                self.advance_char();
            } else {
                break;
            }
        }
        let end = self.cursor;
        self.push_slice(TokenKind::INT, start, end);
    }

    fn lex_identifier_or_keyword(&mut self) {
        let start = self.cursor;
        self.advance_char();
        while let Some(ch) = self.peek_char() {
            if is_ident_rest(ch) {
                self.advance_char();
            } else {
                break;
            }
        }
        let slice = &self.src[start..self.cursor];
        let kind = match slice {
            "val" => TokenKind::VAL,
            "var" => TokenKind::VAR,
            "def" => TokenKind::DEF,
            "if" => TokenKind::IF,
            "else" => TokenKind::ELSE,
            "import" => TokenKind::IMPORT,
            "object" => TokenKind::OBJECT,
            "true" => TokenKind::TRUE,
            "false" => TokenKind::FALSE,
            "_" => TokenKind::UNDERSCORE,
            _ => TokenKind::IDENT,
        };
        let end = self.cursor;
        self.push_slice(kind, start, end);
    }

    fn push_simple(&mut self, kind: TokenKind, value: &str, start: usize) {
        self.tokens.push(Token {
            kind,
            value: value.into(),
            pos: start,
            end: start + value.len(),
        });
    }

    fn push_slice(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            value: self.src[start..end].into(),
            pos: start,
            end,
        });
    }

    fn peek_char(&self) -> Option<char> {
        if self.cursor >= self.len {
            None
        } else {
            self.src[self.cursor..].chars().next()
        }
    }

    fn peek_second_char(&self) -> Option<char> {
        let mut iter = self.src[self.cursor..].chars();
        iter.next()?;
        iter.next()
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.advance_bytes(ch.len_utf8());
        Some(ch)
    }

    fn advance_bytes(&mut self, count: usize) {
        self.cursor = (self.cursor + count).min(self.len);
    }

    fn starts_with(&self, pattern: &str) -> bool {
        self.src[self.cursor..].starts_with(pattern)
    }

    fn error(&mut self, code: &'static str, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(DiagnosticKind::Parse, code, message, span));
    }
}

/// ソースをトークン列へ変換する。末尾は必ず `EOF`。
/// 字句エラーは診断として返し、該当文字は読み飛ばす。
pub fn lex(src: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer::new(src).run()
}

#[cfg(test)]
mod tests {
    use super::{lex, TokenKind};

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    /// `$` を含む識別子（合成モジュール名）が 1 トークンになることを確認する。
    fn dollar_identifiers_are_single_tokens() {
        let (ts, diags) = lex("import ReplSession$0._");
        assert!(diags.is_empty());
        assert_eq!(ts[1].kind, TokenKind::IDENT);
        assert_eq!(ts[1].value, "ReplSession$0");
        assert_eq!(ts[2].kind, TokenKind::DOT);
        assert_eq!(ts[3].kind, TokenKind::UNDERSCORE);
    }

    #[test]
    /// 連続した改行とコメントが 1 個の NEWLINE にまとまる。
    fn newlines_collapse_and_comments_vanish() {
        assert_eq!(
            kinds("\n1 // one\n\n\n2"),
            vec![
                TokenKind::INT,
                TokenKind::NEWLINE,
                TokenKind::INT,
                TokenKind::EOF
            ]
        );
    }

    #[test]
    fn multi_char_operators() {
        assert_eq!(
            kinds("x := a ++ b => c != d"),
            vec![
                TokenKind::IDENT,
                TokenKind::ASSIGN,
                TokenKind::IDENT,
                TokenKind::PLUSPLUS,
                TokenKind::IDENT,
                TokenKind::ARROW,
                TokenKind::IDENT,
                TokenKind::NE,
                TokenKind::IDENT,
                TokenKind::EOF
            ]
        );
    }

    #[test]
    /// 不正文字は診断に記録され、走査は継続する。
    fn unexpected_characters_are_reported_and_skipped() {
        let (ts, diags) = lex("1 # 2");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "LEX090");
        assert_eq!((diags[0].span.start, diags[0].span.end), (2, 3));
        let ks: Vec<_> = ts.iter().map(|t| t.kind).collect();
        assert_eq!(ks, vec![TokenKind::INT, TokenKind::INT, TokenKind::EOF]);
    }

    #[test]
    fn unclosed_string_is_reported() {
        let (_, diags) = lex("\"abc");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "LEX003");
    }

    #[test]
    /// トークンの終了位置が元テキストの区間と一致する。
    fn token_spans_match_source() {
        let src = "val answer = 42";
        let (ts, _) = lex(src);
        let t = &ts[1];
        assert_eq!(&src[t.pos..t.end], "answer");
    }
}
