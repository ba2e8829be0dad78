// パス: src/repl/mod.rs
// 役割: REPL コア（セッション状態・定義合成・包装・import 連鎖・パイプライン差し替え・ドライバ・型調査）の入口
// 意図: 外部には対話単位のコンパイルと型調査の API を公開する
// 関連ファイル: src/repl/compiler.rs, src/repl/probe.rs, src/repl/cmd.rs, src/bin/replc.rs
//! 対話的コンパイルを構成するモジュール群をまとめたファサード。
//!
//! - `state`: 対話をまたぐセッション状態
//! - `definitions`: `resN` / `xShow` 束縛の合成
//! - `wrapper`: `ReplSession$N` コンテナへの包装
//! - `imports`: セッションの import 連鎖
//! - `adapter`: REPL 用フロントエンドとコード生成
//! - `compiler`: 1 回の対話をコンパイルするドライバ
//! - `probe`: 式の型調査
//! - `cmd`: 対話シェル

pub mod adapter;
pub mod cmd;
pub mod compiler;
pub mod definitions;
pub mod imports;
mod printer;
pub mod probe;
pub mod state;
pub mod wrapper;

pub use adapter::{ReplCodeGen, ReplFrontEnd, ReplPipeline};
pub use cmd::{run_repl, run_repl_with, ReplSession};
pub use compiler::{Compiled, DriverStage, ParsedBatch, ReplCompiler};
pub use definitions::{definitions, Definitions};
pub use imports::import_chain;
pub use probe::{type_check, type_of, Probed};
pub use state::{ImportBinding, SessionState};
pub use wrapper::{wrap, wrapper_name};
