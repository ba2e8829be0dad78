// パス: src/repl/adapter.rs
// 役割: 標準パイプラインのフロントエンドとコード生成を REPL 用に差し替える
// 意図: 合成コンテナをファイルなしで型付けし、成果物をメモリストアへ書き出す
// 関連ファイル: src/pipeline/mod.rs, src/pipeline/codegen.rs, src/repl/compiler.rs, src/repl/probe.rs
//! パイプラインアダプタ
//!
//! - `ReplFrontEnd`: 合成済みの木をそのまま型付けする。ファイル単位なら標準版へ委ねる。
//! - `ReplCodeGen`: 出力ディレクトリ未指定ならメモリストア、指定時は標準のディスク出力。
//! - 差し替えは `PhaseId` で位置を探して行うので、他のフェーズの並びは変わらない。

use std::rc::Rc;

use tracing::debug;

use crate::errors::ReplResult;
use crate::infer::TypedModule;
use crate::pipeline::codegen::{emit, CodeGen};
use crate::pipeline::frontend::{type_object, FrontEnd};
use crate::pipeline::{CompilationUnit, Context, Phase, PhaseId, Pipeline, UnitSource};

pub struct ReplFrontEnd;

impl Phase for ReplFrontEnd {
    fn id(&self) -> PhaseId {
        PhaseId::FrontEnd
    }

    fn name(&self) -> &'static str {
        "repl-frontend"
    }

    fn run(&self, unit: &mut CompilationUnit, ctx: &mut Context) {
        if let UnitSource::Synthetic(tree) = &unit.source {
            let typed = type_object(tree, ctx);
            unit.typed = Some(typed);
            return;
        }
        FrontEnd.run(unit, ctx);
    }
}

pub struct ReplCodeGen;

impl Phase for ReplCodeGen {
    fn id(&self) -> PhaseId {
        PhaseId::CodeGen
    }

    fn name(&self) -> &'static str {
        "repl-codegen"
    }

    fn run(&self, unit: &mut CompilationUnit, ctx: &mut Context) {
        if ctx.settings().output_dir.is_some() {
            debug!(unit = %unit.name, "explicit output directory, writing to disk");
            CodeGen.run(unit, ctx);
            return;
        }
        let shared = Rc::clone(ctx.store());
        let mut store = shared.borrow_mut();
        emit(unit, ctx, &mut *store);
    }
}

/// REPL 用に差し替えたパイプライン。
pub struct ReplPipeline {
    pipeline: Pipeline,
}

impl ReplPipeline {
    pub fn new() -> Self {
        Self {
            pipeline: Pipeline::standard()
                .with_phase(Box::new(ReplFrontEnd))
                .with_phase(Box::new(ReplCodeGen)),
        }
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.pipeline.phase_names()
    }

    /// 全フェーズを実行する。エラーが記録されていれば収集した診断を返す。
    pub fn run_full_pipeline(
        &self,
        unit: &mut CompilationUnit,
        ctx: &mut Context,
    ) -> ReplResult<()> {
        self.pipeline.run(unit, ctx)
    }

    /// フロントエンドだけを実行し、型付きの木を返す。
    /// 診断は `ctx` に残るので、エラーの扱いは呼び出し側が決める。
    pub fn run_front_end_only(
        &self,
        unit: &mut CompilationUnit,
        ctx: &mut Context,
    ) -> Option<TypedModule> {
        self.pipeline.execute(unit, ctx, Some(PhaseId::FrontEnd));
        unit.typed.clone()
    }
}

impl Default for ReplPipeline {
    fn default() -> Self {
        Self::new()
    }
}
