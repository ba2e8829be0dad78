// パス: src/repl/compiler.rs
// 役割: 1 回の対話をコンパイルするドライバ（定義合成 → 包装 → import 連鎖 → パイプライン）
// 意図: 成功時だけ新しいセッション状態を返し、失敗時は診断だけを返す
// 関連ファイル: src/repl/definitions.rs, src/repl/wrapper.rs, src/repl/imports.rs, src/repl/adapter.rs
//! コンパイルドライバ
//!
//! 状態遷移: Received → Defined → Wrapped → Contextualized → Compiled → Succeeded / Failed。
//! 成功してもモジュールが登録されなかった場合（`stop_after` でコード生成を省いた場合）は
//! セッション状態を進めない。
//! 実行には呼び出し側の文脈の複製（`Context::fresh`）を使うので、失敗しても呼び出し側の
//! 状態・文脈はそのまま残り、同じ入力をやり直せる。

use std::fmt;

use tracing::{debug, info};

use super::adapter::ReplPipeline;
use super::definitions::definitions;
use super::imports::import_chain;
use super::probe::{self, Probed};
use super::state::SessionState;
use super::wrapper::wrap;
use crate::ast::{Import, Span, Stmt};
use crate::errors::{Diagnostic, DiagnosticKind, Diagnostics, ReplResult};
use crate::infer::TypedBinding;
use crate::parser::parse_source;
use crate::pipeline::{CompilationUnit, Context};

/// 1 回の対話ぶんの構文解析済み入力。
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedBatch {
    pub source: String,
    pub stmts: Vec<Stmt>,
}

impl ParsedBatch {
    pub fn new(source: impl Into<String>, stmts: Vec<Stmt>) -> Self {
        Self {
            source: source.into(),
            stmts,
        }
    }

    /// 構文エラーが 1 件でもあれば失敗。
    pub fn parse(source: impl Into<String>) -> ReplResult<Self> {
        let source = source.into();
        let stmts = parse_source(&source).into_result()?;
        Ok(Self { source, stmts })
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// 利用者が書いた import。
    pub fn imports(&self) -> impl Iterator<Item = &Import> {
        self.stmts.iter().filter_map(|s| match s {
            Stmt::Import(i) => Some(i),
            _ => None,
        })
    }

    pub fn expression_count(&self) -> usize {
        self.stmts.iter().filter(|s| s.is_term()).count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverStage {
    Received,
    Defined,
    Wrapped,
    Contextualized,
    Compiled,
    Succeeded,
    Failed,
}

impl fmt::Display for DriverStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverStage::Received => "received",
            DriverStage::Defined => "defined",
            DriverStage::Wrapped => "wrapped",
            DriverStage::Contextualized => "contextualized",
            DriverStage::Compiled => "compiled",
            DriverStage::Succeeded => "succeeded",
            DriverStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 成功した対話の結果。
#[derive(Clone, Debug)]
pub struct Compiled {
    pub state: SessionState,
    pub unit: CompilationUnit,
    pub context: Context,
}

impl Compiled {
    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.context.diagnostics().warnings().collect()
    }

    /// 合成マークの無いメンバー（表示対象）。
    pub fn visible_members(&self) -> Vec<&TypedBinding> {
        self.unit
            .typed
            .iter()
            .flat_map(|t| t.members())
            .filter(|b| !b.synthetic)
            .collect()
    }

    pub fn artifacts(&self) -> &[String] {
        &self.unit.artifacts
    }
}

pub struct ReplCompiler {
    pipeline: ReplPipeline,
}

impl ReplCompiler {
    pub fn new() -> Self {
        Self {
            pipeline: ReplPipeline::new(),
        }
    }

    pub fn pipeline(&self) -> &ReplPipeline {
        &self.pipeline
    }

    /// 構文解析済みの入力をコンパイルする。
    pub fn compile(
        &self,
        batch: &ParsedBatch,
        state: &SessionState,
        ctx: &Context,
    ) -> ReplResult<Compiled> {
        let module = state.module_name();
        debug!(
            %module,
            stage = %DriverStage::Received,
            statements = batch.stmts.len(),
            "driver stage"
        );
        if batch.is_empty() {
            debug!(%module, stage = %DriverStage::Failed, "empty batch");
            return Err(Diagnostics::error(
                DiagnosticKind::Wrap,
                "WRAP001",
                "nothing to compile: the batch has no statements",
                Span::new(0, batch.source.len()),
            ));
        }

        let defs = definitions(&batch.stmts, state);
        debug!(
            %module,
            stage = %DriverStage::Defined,
            val_index = defs.state.val_index(),
            "driver stage"
        );

        let mut unit = wrap(defs.stmts, &defs.state)?;
        debug!(%module, stage = %DriverStage::Wrapped, "driver stage");

        let mut run_ctx = ctx
            .fresh()
            .with_root_imports(import_chain(state.object_index()));
        debug!(
            %module,
            stage = %DriverStage::Contextualized,
            imports = run_ctx.root_imports().len(),
            "driver stage"
        );

        let outcome = self.pipeline.run_full_pipeline(&mut unit, &mut run_ctx);
        debug!(%module, stage = %DriverStage::Compiled, "driver stage");
        match outcome {
            Ok(()) if !run_ctx.registry().contains(&module) => {
                // コード生成前で止まった実行はモジュールを残さないので、状態は進めない
                info!(
                    %module,
                    stage = %DriverStage::Succeeded,
                    "interaction checked without code generation"
                );
                Ok(Compiled {
                    state: state.clone(),
                    unit,
                    context: run_ctx,
                })
            }
            Ok(()) => {
                let next = defs.state.next_object(batch.imports().cloned());
                info!(
                    %module,
                    stage = %DriverStage::Succeeded,
                    val_index = next.val_index(),
                    object_index = next.object_index(),
                    "interaction compiled"
                );
                Ok(Compiled {
                    state: next,
                    unit,
                    context: run_ctx,
                })
            }
            Err(diagnostics) => {
                info!(
                    %module,
                    stage = %DriverStage::Failed,
                    errors = diagnostics.errors().count(),
                    "interaction rejected"
                );
                Err(diagnostics)
            }
        }
    }

    /// テキストを解析してからコンパイルする。
    pub fn compile_source(
        &self,
        source: &str,
        state: &SessionState,
        ctx: &Context,
    ) -> ReplResult<Compiled> {
        let batch = ParsedBatch::parse(source)?;
        self.compile(&batch, state, ctx)
    }

    /// 式を型付けし、束縛 `expr` を取り出す。状態は変更しない。
    pub fn type_check(
        &self,
        expr: &str,
        state: &SessionState,
        ctx: &Context,
        errors_allowed: bool,
    ) -> ReplResult<Probed> {
        probe::type_check(&self.pipeline, expr, state, ctx, errors_allowed)
    }

    /// 式の型を表示用の文字列で返す。
    pub fn type_of(&self, expr: &str, state: &SessionState, ctx: &Context) -> ReplResult<String> {
        probe::type_of(&self.pipeline, expr, state, ctx)
    }
}

impl Default for ReplCompiler {
    fn default() -> Self {
        Self::new()
    }
}
