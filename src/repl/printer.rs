// パス: src/repl/printer.rs
// 役割: REPL のヘルプ・定義一覧・診断の表示
// 意図: 対話時の出力形式を一箇所にまとめる
// 関連ファイル: src/repl/cmd.rs, src/errors.rs, src/repl/compiler.rs

use std::io::{self, Write};

use super::compiler::Compiled;
use crate::errors::Diagnostic;

const HELP_TEXT: &str = concat!(
    "利用可能なコマンド:\n",
    "  :help              ヘルプ（本メッセージ）\n",
    "  :t EXPR            式の型を表示\n",
    "  :type EXPR         :t と同じ\n",
    "  :imports           現在の import 連鎖を表示\n",
    "  :reset             セッションを初期状態に戻す\n",
    "  :quit              終了\n",
    "\n",
    "例:\n",
    "  > val x = 5            -- val x: Int\n",
    "  > x * 2                -- val res0: Int\n",
    "  > :t res0 > 3          -- Bool\n",
    "  > import Math._\n",
    "  > max(res0, 7)         -- val res1: Int\n",
);

/// ヘルプメッセージを任意のライターへ描画する。
pub(crate) fn render_help<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(HELP_TEXT.as_bytes())
}

/// 成功した対話の表示行（合成束縛は除く）。
pub(crate) fn member_lines(compiled: &Compiled) -> Vec<String> {
    compiled
        .visible_members()
        .into_iter()
        .map(|b| format!("{} {}: {}", b.kind, b.name, b.type_display()))
        .collect()
}

/// 診断を入力テキストに対して整形した行。
pub(crate) fn diagnostic_lines<'a>(
    diagnostics: impl IntoIterator<Item = &'a Diagnostic>,
    src: &str,
) -> Vec<String> {
    diagnostics.into_iter().map(|d| d.render(src)).collect()
}
