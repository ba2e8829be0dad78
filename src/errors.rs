// パス: src/errors.rs
// 役割: 診断レコード（Diagnostic）と失敗値（Diagnostics）、結果型 ReplResult を定義する
// 意図: 例外的な制御フローを使わず、複数の診断を値として呼び出し元へ返す
// 関連ファイル: src/pipeline/context.rs, src/repl/compiler.rs, src/repl/probe.rs
//! 診断の定義（共通フォーマット: \[CODE\] メッセージ @span=start..end）。
//!
//! - `Diagnostic` は重大度・分類・コード・本文・区間を持つ 1 件の記録。
//! - `Diagnostics` は「エラーを最低 1 件含む」非空の列で、`ReplResult` の失敗側になる。
//! - 段階の途中で失敗した場合は `?` で後続を打ち切り、状態は一切返さない。

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

use crate::ast::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// 診断の発生源による分類。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// 構文解析できない、または回復付きで解析されたテキスト。
    Parse,
    /// フロントエンド（名前解決・型推論）の報告。
    TypeCheck,
    /// 構造的な前提違反（空の入力など）。
    Wrap,
    /// コンパイル後に期待した合成束縛が見つからない。
    Extraction,
    /// 成果物の生成・書き出しの失敗。
    Codegen,
    /// 検査フェーズの警告。
    Lint,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub code: &'static str,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        kind: DiagnosticKind,
        code: &'static str,
        message: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            severity,
            kind,
            code,
            message: message.into(),
            span,
        }
    }

    pub fn error(
        kind: DiagnosticKind,
        code: &'static str,
        message: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::new(Severity::Error, kind, code, message, span)
    }

    pub fn warning(
        kind: DiagnosticKind,
        code: &'static str,
        message: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::new(Severity::Warning, kind, code, message, span)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// 元のテキストに対して、行番号・スニペット・キャレット付きで整形する。
    ///
    /// # Examples
    /// ```
    /// use replc::ast::Span;
    /// use replc::errors::{Diagnostic, DiagnosticKind};
    /// let d = Diagnostic::error(DiagnosticKind::Parse, "PAR001", "oops", Span::new(4, 5));
    /// let text = d.render("val = 1");
    /// assert!(text.contains("@line=1,col=5"));
    /// assert!(text.ends_with("    ^"));
    /// ```
    pub fn render(&self, src: &str) -> String {
        let start = clamp_to_char_boundary(src, self.span.start);
        let line_start = src[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = src[start..]
            .find('\n')
            .map(|i| start + i)
            .unwrap_or(src.len());
        let line_no = src[..start].matches('\n').count() + 1;
        let col = src[line_start..start].chars().count() + 1;
        let snippet = &src[line_start..line_end];
        // 行末を越える区間はその行の末尾で打ち切る
        let end = clamp_to_char_boundary(src, self.span.end.max(start)).min(line_end);
        let width = src[start..end].chars().count().max(1);
        format!(
            "{}: [{}] {} @line={},col={}\n{}\n{}{}",
            self.severity,
            self.code,
            self.message,
            line_no,
            col,
            snippet,
            " ".repeat(col - 1),
            "^".repeat(width)
        )
    }
}

fn clamp_to_char_boundary(src: &str, pos: usize) -> usize {
    let mut p = pos.min(src.len());
    while !src.is_char_boundary(p) {
        p -= 1;
    }
    p
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} @span={}..{}",
            self.code, self.message, self.span.start, self.span.end
        )
    }
}

/// 失敗を表す非空の診断列。必ずエラー重大度の診断を 1 件以上含む。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// エラー診断 1 件から失敗値を作る。
    pub fn error(
        kind: DiagnosticKind,
        code: &'static str,
        message: impl Into<String>,
        span: Span,
    ) -> Self {
        Self(vec![Diagnostic::error(kind, code, message, span)])
    }

    /// 収集済みの診断から失敗値を作る。エラーが無ければ `None`。
    pub fn from_collected(records: Vec<Diagnostic>) -> Option<Self> {
        if records.iter().any(Diagnostic::is_error) {
            Some(Self(records))
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    /// エラー重大度のものだけを列挙する。
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_error())
    }

    /// 最初のエラー診断（不変条件により必ず存在する）。
    pub fn primary(&self) -> &Diagnostic {
        self.errors().next().unwrap_or(&self.0[0])
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }

    /// すべての診断を元テキストに対して整形する。
    pub fn render(&self, src: &str) -> String {
        self.0
            .iter()
            .map(|d| d.render(src))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

impl StdError for Diagnostics {}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// REPL コアの結果型。失敗側は常に `Diagnostics`。
pub type ReplResult<T> = Result<T, Diagnostics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 警告だけの列は失敗値にならないことを確認する。
    fn from_collected_requires_an_error() {
        let w = Diagnostic::warning(DiagnosticKind::Lint, "LNT001", "w", Span::default());
        assert!(Diagnostics::from_collected(vec![w.clone()]).is_none());
        assert!(Diagnostics::from_collected(Vec::new()).is_none());

        let e = Diagnostic::error(DiagnosticKind::TypeCheck, "TYP001", "e", Span::new(0, 1));
        let ds = Diagnostics::from_collected(vec![w, e.clone()]).unwrap();
        assert_eq!(ds.as_slice().len(), 2);
        assert_eq!(ds.primary(), &e);
    }

    #[test]
    /// 失敗値に対する連鎖は後続を実行せず同じ失敗を伝搬する。
    fn and_then_short_circuits_on_failure() {
        let failed: ReplResult<i32> = Err(Diagnostics::error(
            DiagnosticKind::Parse,
            "PAR000",
            "x",
            Span::default(),
        ));
        let mut called = false;
        let chained = failed.clone().and_then(|v| {
            called = true;
            Ok(v + 1)
        });
        assert!(!called);
        assert_eq!(chained, failed);
    }

    #[test]
    fn display_uses_code_message_span_format() {
        let d = Diagnostic::error(DiagnosticKind::Parse, "PAR001", "bad", Span::new(2, 4));
        assert_eq!(d.to_string(), "[PAR001] bad @span=2..4");
    }

    #[test]
    /// 複数行テキストでは該当行だけを切り出してキャレットを付ける。
    fn render_points_into_the_right_line() {
        let src = "val a = 1\nval b = oops\n";
        let d = Diagnostic::error(
            DiagnosticKind::TypeCheck,
            "TYP010",
            "not found",
            Span::new(18, 22),
        );
        let text = d.render(src);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "error: [TYP010] not found @line=2,col=9");
        assert_eq!(lines[1], "val b = oops");
        assert_eq!(lines[2], "        ^^^^");
    }
}
