// パス: src/pipeline/mod.rs
// 役割: フェーズ列（フロントエンド → 参照検査 → 低レベル化 → コード生成）とコンパイル単位
// 意図: フェーズを識別子で探して差し替えられる汎用パイプラインを提供する
// 関連ファイル: src/pipeline/context.rs, src/repl/adapter.rs, src/config.rs
//! コンパイルパイプライン
//!
//! - 各フェーズは `Phase` トレイトを実装し、`CompilationUnit` と `Context` を受け取る。
//! - フェーズは診断を文脈の収集器へ報告し、エラーが記録された時点で後続は実行しない。
//! - `Pipeline::replace` は同じ `PhaseId` のフェーズをその場で置き換える（前後の順序は保つ）。

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ast::{ObjectDef, Span};
use crate::errors::{DiagnosticKind, Diagnostics, ReplResult};
use crate::infer::TypedModule;
use crate::ir::ModuleIr;

pub mod codegen;
pub mod context;
pub mod frontend;
pub mod lower;
pub mod refchecks;

pub use self::codegen::CodeGen;
pub use self::context::{Context, DiagnosticCollector};
pub use self::frontend::FrontEnd;
pub use self::lower::Lower;
pub use self::refchecks::RefChecks;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseId {
    FrontEnd,
    RefChecks,
    Lower,
    CodeGen,
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseId::FrontEnd => f.write_str("frontend"),
            PhaseId::RefChecks => f.write_str("refchecks"),
            PhaseId::Lower => f.write_str("lower"),
            PhaseId::CodeGen => f.write_str("codegen"),
        }
    }
}

pub trait Phase {
    fn id(&self) -> PhaseId;
    /// ログ表示用の名前（置き換えたフェーズは別名を持つ）。
    fn name(&self) -> &'static str;
    fn run(&self, unit: &mut CompilationUnit, ctx: &mut Context);
}

/// コンパイル単位の入力。
#[derive(Debug, Clone, PartialEq)]
pub enum UnitSource {
    /// ディスク上のソースファイル。
    File(PathBuf),
    /// 合成済みのコンテナ（REPL が生成する）。
    Synthetic(ObjectDef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompilationUnit {
    pub name: String,
    pub source: UnitSource,
    pub typed: Option<TypedModule>,
    pub ir: Option<ModuleIr>,
    /// 書き出した成果物のパス。
    pub artifacts: Vec<String>,
}

impl CompilationUnit {
    pub fn synthetic(tree: ObjectDef) -> Self {
        Self {
            name: tree.name.clone(),
            source: UnitSource::Synthetic(tree),
            typed: None,
            ir: None,
            artifacts: Vec::new(),
        }
    }

    /// ファイル名（拡張子なし）をモジュール名にする。
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Main".to_string());
        Self {
            name,
            source: UnitSource::File(path),
            typed: None,
            ir: None,
            artifacts: Vec::new(),
        }
    }

    pub fn tree(&self) -> Option<&ObjectDef> {
        match &self.source {
            UnitSource::Synthetic(tree) => Some(tree),
            UnitSource::File(_) => None,
        }
    }
}

pub struct Pipeline {
    phases: Vec<Box<dyn Phase>>,
}

impl Pipeline {
    pub fn new(phases: Vec<Box<dyn Phase>>) -> Self {
        Self { phases }
    }

    /// 標準のフェーズ列。
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(FrontEnd),
            Box::new(RefChecks),
            Box::new(Lower),
            Box::new(CodeGen),
        ])
    }

    /// 同じ識別子のフェーズをその場で置き換え、元のフェーズを返す。
    pub fn replace(&mut self, phase: Box<dyn Phase>) -> Option<Box<dyn Phase>> {
        let id = phase.id();
        let slot = self.phases.iter_mut().find(|p| p.id() == id)?;
        Some(std::mem::replace(slot, phase))
    }

    /// `replace` のビルダー形式。見つからなければ何もしない。
    pub fn with_phase(mut self, phase: Box<dyn Phase>) -> Self {
        let id = phase.id();
        if self.replace(phase).is_none() {
            warn!(phase = %id, "no phase to replace");
        }
        self
    }

    pub fn phase_ids(&self) -> Vec<PhaseId> {
        self.phases.iter().map(|p| p.id()).collect()
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|p| p.name()).collect()
    }

    pub fn phase(&self, id: PhaseId) -> Option<&dyn Phase> {
        self.phases.iter().find(|p| p.id() == id).map(|p| p.as_ref())
    }

    /// フェーズを順に実行する。`last` の後、またはエラーが記録された時点で止まる。
    /// エラーなく終われば true。
    pub fn execute(
        &self,
        unit: &mut CompilationUnit,
        ctx: &mut Context,
        last: Option<PhaseId>,
    ) -> bool {
        for phase in &self.phases {
            debug!(phase = phase.name(), unit = %unit.name, "phase start");
            phase.run(unit, ctx);
            if ctx.diagnostics().has_errors() {
                debug!(
                    phase = phase.name(),
                    errors = ctx.diagnostics().error_count(),
                    "phase reported errors"
                );
                return false;
            }
            debug!(phase = phase.name(), "phase done");
            if Some(phase.id()) == last {
                break;
            }
        }
        true
    }

    /// 設定の `stop_after` まで実行し、エラーがあれば収集した診断を失敗として返す。
    pub fn run(&self, unit: &mut CompilationUnit, ctx: &mut Context) -> ReplResult<()> {
        let last = ctx.settings().stop_after;
        if self.execute(unit, ctx, last) {
            Ok(())
        } else {
            Err(collected_failure(ctx))
        }
    }
}

/// 収集器の中身を失敗値にする（エラーが捨てられていた場合も必ず 1 件は含む）。
pub(crate) fn collected_failure(ctx: &mut Context) -> Diagnostics {
    let dropped = ctx.diagnostics().dropped();
    Diagnostics::from_collected(ctx.diagnostics_mut().drain()).unwrap_or_else(|| {
        Diagnostics::error(
            DiagnosticKind::TypeCheck,
            "PIPE001",
            format!("compilation failed ({dropped} errors suppressed)"),
            Span::default(),
        )
    })
}
