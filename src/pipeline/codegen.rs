// パス: src/pipeline/codegen.rs
// 役割: IR を成果物（`<module>.tlir`）として書き出し、モジュール表へ登録する
// 意図: 書き出し先はストアで抽象化し、標準版はディスク、REPL 版はメモリを使う
// 関連ファイル: src/artifact.rs, src/ir.rs, src/repl/adapter.rs

use std::path::PathBuf;

use tracing::info;

use super::{CompilationUnit, Context, Phase, PhaseId};
use crate::artifact::{ArtifactStore, DiskStore};
use crate::errors::{Diagnostic, DiagnosticKind};

pub struct CodeGen;

impl CodeGen {
    /// 出力ディレクトリ（未指定ならカレント）。
    pub fn output_dir(ctx: &Context) -> PathBuf {
        ctx.settings()
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Phase for CodeGen {
    fn id(&self) -> PhaseId {
        PhaseId::CodeGen
    }

    fn name(&self) -> &'static str {
        "codegen"
    }

    fn run(&self, unit: &mut CompilationUnit, ctx: &mut Context) {
        let mut store = DiskStore::new(Self::output_dir(ctx));
        emit(unit, ctx, &mut store);
    }
}

/// IR を `store` へ書き、成功したらシグネチャをモジュール表へ登録する。
pub fn emit(unit: &mut CompilationUnit, ctx: &mut Context, store: &mut dyn ArtifactStore) {
    let Some(ir) = &unit.ir else {
        ctx.diagnostics_mut().report(Diagnostic::error(
            DiagnosticKind::Codegen,
            "GEN001",
            format!("unit {} has no IR to emit", unit.name),
            Default::default(),
        ));
        return;
    };
    let path = ir.artifact_path();
    let bytes = match ir.to_json() {
        Ok(bytes) => bytes,
        Err(e) => {
            ctx.diagnostics_mut().report(Diagnostic::error(
                DiagnosticKind::Codegen,
                "GEN002",
                format!("cannot serialize {}: {e}", unit.name),
                Default::default(),
            ));
            return;
        }
    };
    let size = bytes.len();
    if let Err(e) = store.write(&path, bytes) {
        ctx.diagnostics_mut().report(Diagnostic::error(
            DiagnosticKind::Codegen,
            "GEN003",
            format!("cannot write artifact {path}: {e}"),
            Default::default(),
        ));
        return;
    }
    info!(artifact = %path, bytes = size, "artifact written");
    unit.artifacts.push(path);
    if let Some(typed) = &unit.typed {
        ctx.registry_mut().register(typed.signature());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemoryStore;
    use crate::ast::{Modifiers, ObjectDef, Span};
    use crate::config::Settings;
    use crate::ir::ModuleIr;
    use crate::parser::parse_source;
    use crate::pipeline::{frontend::type_object, lower::lower_module};

    fn unit(name: &str, src: &str, ctx: &mut Context) -> CompilationUnit {
        let tree = ObjectDef {
            name: name.into(),
            body: parse_source(src).into_result().unwrap(),
            span: Span::new(0, src.len()),
            mods: Modifiers::default(),
        };
        let mut unit = CompilationUnit::synthetic(tree.clone());
        let typed = type_object(&tree, ctx);
        unit.ir = Some(lower_module(&typed, &[]));
        unit.typed = Some(typed);
        unit
    }

    #[test]
    /// 書き出した IR は読み戻せ、モジュールは登録される。
    fn emit_writes_and_registers() {
        let mut ctx = Context::default();
        let mut u = unit("Lib", "val answer = 42", &mut ctx);
        let mut store = MemoryStore::new();
        emit(&mut u, &mut ctx, &mut store);
        assert_eq!(u.artifacts, vec!["Lib.tlir"]);
        let back = ModuleIr::from_json(&store.read("Lib.tlir").unwrap()).unwrap();
        assert_eq!(back.fields[0].ty, "Int");
        assert!(ctx.registry().get("Lib").unwrap().member("answer").is_some());
    }

    #[test]
    fn missing_ir_is_a_codegen_error() {
        let mut ctx = Context::default();
        let mut u = unit("Lib", "val a = 1", &mut ctx);
        u.ir = None;
        emit(&mut u, &mut ctx, &mut MemoryStore::new());
        assert_eq!(ctx.diagnostics().records()[0].code, "GEN001");
        assert!(!ctx.registry().contains("Lib"));
    }

    #[test]
    /// 標準コード生成は出力ディレクトリへ書く。
    fn standard_codegen_writes_to_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            output_dir: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };
        let mut ctx = Context::new(settings);
        let mut u = unit("Disk", "val a = true", &mut ctx);
        CodeGen.run(&mut u, &mut ctx);
        assert!(dir.path().join("Disk.tlir").is_file());
    }
}
