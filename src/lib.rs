// パス: src/lib.rs
// 役割: クレートルート。ホスト言語のコンパイラ各段と REPL コアを束ねる
// 意図: 対話単位のコンパイルと型調査の API を公開する
// 関連ファイル: src/repl/mod.rs, src/pipeline/mod.rs, src/errors.rs
//! replc ルートモジュール
//!
//! 目的:
//! - 対話ごとの入力を合成モジュール `ReplSession$N` に包み、セッション状態を引き継ぎながら
//!   コンパイルする増分コンパイルドライバを提供する。
//!
//! 構成:
//! - ホスト言語: `lexer` → `parser` → `infer`（`typesys` / `registry`）→ `pipeline`（lower / codegen）
//! - REPL コア: `repl`（状態・定義合成・包装・import 連鎖・パイプライン差し替え・ドライバ・型調査）
//! - 周辺: `errors`（診断と結果型）、`config`、`logging`、`artifact`（成果物ストア）
//!
//! 方針:
//! - コメント/ドキュメントは日本語、識別子は英語。
//! - 診断は例外ではなく値（`ReplResult`）として返す。

pub mod artifact;
pub mod ast;
pub mod config;
pub mod errors;
pub mod infer;
pub mod ir;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod repl;
pub mod typesys;

// 便利な再エクスポート（診断と結果型のみ）
pub use crate::errors::{Diagnostic, DiagnosticKind, Diagnostics, ReplResult, Severity};
