// パス: src/pipeline/frontend.rs
// 役割: 標準フロントエンド（ソースファイル読み込み → 構文解析 → 型付け）
// 意図: ファイル単位のコンパイルを担う。REPL では src/repl/adapter.rs の版に差し替えられる
// 関連ファイル: src/parser/mod.rs, src/infer.rs, src/repl/adapter.rs

use std::fs;

use tracing::debug;

use super::{CompilationUnit, Context, Phase, PhaseId, UnitSource};
use crate::ast::{Modifiers, ObjectDef, Span};
use crate::errors::{Diagnostic, DiagnosticKind};
use crate::infer::{type_module, TypedModule};
use crate::parser::parse_source;

pub struct FrontEnd;

impl Phase for FrontEnd {
    fn id(&self) -> PhaseId {
        PhaseId::FrontEnd
    }

    fn name(&self) -> &'static str {
        "frontend"
    }

    fn run(&self, unit: &mut CompilationUnit, ctx: &mut Context) {
        let path = match &unit.source {
            UnitSource::File(path) => path.clone(),
            UnitSource::Synthetic(_) => {
                ctx.diagnostics_mut().report(Diagnostic::error(
                    DiagnosticKind::Parse,
                    "PAR901",
                    format!("unit {} has no source file to read", unit.name),
                    Span::default(),
                ));
                return;
            }
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                ctx.diagnostics_mut().report(Diagnostic::error(
                    DiagnosticKind::Parse,
                    "PAR900",
                    format!("cannot read {}: {e}", path.display()),
                    Span::default(),
                ));
                return;
            }
        };
        let outcome = parse_source(&text);
        if !outcome.is_clean() {
            ctx.diagnostics_mut()
                .extend(outcome.diagnostics().iter().cloned());
            return;
        }
        let tree = ObjectDef {
            name: unit.name.clone(),
            span: Span::new(0, text.len()),
            body: outcome.statements().to_vec(),
            mods: Modifiers {
                is_final: true,
                synthetic: false,
            },
        };
        debug!(unit = %unit.name, statements = tree.body.len(), "parsed source file");
        unit.typed = Some(type_object(&tree, ctx));
    }
}

/// ルート import と登録済みモジュールを使ってコンテナを型付けし、診断を文脈へ報告する。
pub fn type_object(tree: &ObjectDef, ctx: &mut Context) -> TypedModule {
    let mut diags = Vec::new();
    let typed = type_module(tree, ctx.root_imports(), ctx.registry(), &mut diags);
    ctx.diagnostics_mut().extend(diags);
    typed
}
