// パス: tests/pipeline_phases.rs
// 役割: 標準パイプラインと REPL 用パイプラインの段構成・出力先・設定の統合テスト
// 意図: ファイル単位のコンパイル、出力ディレクトリ指定、stop_after と fatal_warnings の効き方を保証する
// 関連ファイル: src/pipeline/mod.rs, src/repl/adapter.rs, src/config.rs, src/artifact.rs
#[path = "test_support.rs"]
mod support;

use std::fs;

use replc::config::Settings;
use replc::ir::ModuleIr;
use replc::pipeline::{CompilationUnit, Context, PhaseId, Pipeline};
use replc::repl::ReplPipeline;
use support::{codes, member_lines, SessionFixture};

fn settings_with(f: impl FnOnce(&mut Settings)) -> Settings {
    let mut s = Settings::default();
    f(&mut s);
    s
}

#[test]
/// REPL 用パイプラインは段の並びを保ったまま 2 段だけ差し替える。
fn repl_pipeline_swaps_two_phases_in_place() {
    let standard = Pipeline::standard();
    let repl = ReplPipeline::new();
    assert_eq!(
        standard.phase_names(),
        vec!["frontend", "refchecks", "lower", "codegen"]
    );
    assert_eq!(
        repl.phase_names(),
        vec!["repl-frontend", "refchecks", "lower", "repl-codegen"]
    );
}

#[test]
/// ソースファイルは標準パイプラインでコンパイルされ、出力ディレクトリへ書き出される。
fn standard_pipeline_compiles_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("Geometry.tl");
    fs::write(&src, "val side = 4\ndef area(n: Int) = n * n\nval a = area(side)").unwrap();
    let out = dir.path().join("out");

    let mut unit = CompilationUnit::from_file(&src);
    let mut ctx = Context::new(settings_with(|s| s.output_dir = Some(out.clone())));
    Pipeline::standard().run(&mut unit, &mut ctx).unwrap();

    assert_eq!(unit.artifacts, vec!["Geometry.tlir"]);
    let ir = ModuleIr::from_json(&fs::read(out.join("Geometry.tlir")).unwrap()).unwrap();
    assert_eq!(ir.name, "Geometry");
    assert_eq!(ir.methods.len(), 1);
    assert!(ctx.registry().contains("Geometry"));
}

#[test]
fn missing_source_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut unit = CompilationUnit::from_file(dir.path().join("Nope.tl"));
    let mut ctx = Context::default();
    let err = Pipeline::standard().run(&mut unit, &mut ctx).unwrap_err();
    assert_eq!(codes(&err), vec!["PAR900"]);
}

#[test]
/// 出力ディレクトリを指定すると REPL の成果物もディスクへ書かれる。
fn repl_writes_to_output_dir_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = Context::new(settings_with(|s| {
        s.output_dir = Some(dir.path().to_path_buf())
    }));
    let mut session = SessionFixture::with_context(ctx);
    let compiled = session.run("val greeting = \"hi\"");

    assert_eq!(compiled.artifacts(), ["ReplSession$0.tlir"]);
    assert!(dir.path().join("ReplSession$0.tlir").is_file());
    assert!(session.context.store().borrow().paths().is_empty());
}

#[test]
/// 出力ディレクトリが無ければ成果物はメモリ上のストアに溜まる。
fn repl_keeps_artifacts_in_memory_by_default() {
    let mut session = SessionFixture::new();
    session.run("val a = 1");
    session.run("a + 1");
    assert_eq!(
        session.context.store().borrow().paths(),
        vec!["ReplSession$0.tlir", "ReplSession$1.tlir"]
    );
    let bytes = session
        .context
        .store()
        .borrow()
        .read("ReplSession$1.tlir")
        .unwrap();
    let ir = ModuleIr::from_json(&bytes).unwrap();
    assert_eq!(
        ir.imports,
        vec!["import ReplShow._", "import ReplSession$0._"]
    );
}

#[test]
/// コード生成前で止めた対話は検査だけで終わり、状態を進めないので次の対話も続けられる。
fn stop_after_checks_without_advancing_session() {
    let ctx = Context::new(settings_with(|s| s.stop_after = Some(PhaseId::Lower)));
    let mut session = SessionFixture::with_context(ctx);
    let compiled = session.run("val a = 1");
    assert!(compiled.artifacts().is_empty());
    assert!(compiled.unit.ir.is_some());
    assert_eq!(session.state.object_index(), 0);
    assert_eq!(session.state.val_index(), 0);

    let next = session.run("2");
    assert_eq!(next.unit.name, "ReplSession$0");
    assert_eq!(member_lines(&next), vec!["val res0: Int"]);
    assert_eq!(session.state.object_index(), 0);
    assert!(session.context.store().borrow().paths().is_empty());
}

#[test]
fn stop_after_front_end_keeps_later_interactions_working() {
    let ctx = Context::new(settings_with(|s| s.stop_after = Some(PhaseId::FrontEnd)));
    let mut session = SessionFixture::with_context(ctx);
    session.run("val a = 1");
    session.run("2");
    assert!(!session.context.registry().contains("ReplSession$0"));
}

#[test]
/// 警告は通常は成功に添えられ、fatal_warnings ではエラーになる。
fn pure_statement_warning_respects_fatal_warnings() {
    let src = "val a = { 1; 2 }";
    let mut lenient = SessionFixture::new();
    let compiled = lenient.run(src);
    let warnings: Vec<&str> = compiled.warnings().iter().map(|d| d.code).collect();
    assert_eq!(warnings, vec!["LNT001"]);
    assert_eq!(member_lines(&compiled), vec!["val a: Int"]);

    let strict = SessionFixture::with_context(Context::new(settings_with(|s| {
        s.fatal_warnings = true
    })));
    let err = strict.fail(src);
    assert_eq!(codes(&err), vec!["LNT001"]);
    assert_eq!(strict.state.object_index(), 0);
}

#[test]
/// max_errors を超えた分は捨てられるが、失敗は必ず報告される。
fn max_errors_caps_reported_diagnostics() {
    let ctx = Context::new(settings_with(|s| s.max_errors = 1));
    let session = SessionFixture::with_context(ctx);
    let err = session.fail("val a: Int = true\nval b: Bool = 1");
    assert_eq!(err.errors().count(), 1);
}
